/// Share repository - direct (email) and group view grants
///
/// Emails are stored normalized; callers pass them through
/// `models::normalize_email` first.
use crate::models::{GroupShare, Share};
use sqlx::PgPool;
use uuid::Uuid;

/// Grant `email` view access. Re-sharing to the same email is a no-op.
pub async fn add_share(
    pool: &PgPool,
    video_id: Uuid,
    email: &str,
    created_by: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO video_shares (video_id, email, created_by)
        VALUES ($1, $2, $3)
        ON CONFLICT (video_id, email) DO NOTHING
        "#,
    )
    .bind(video_id)
    .bind(email)
    .bind(created_by)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn remove_share(pool: &PgPool, video_id: Uuid, email: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM video_shares WHERE video_id = $1 AND email = $2")
        .bind(video_id)
        .bind(email)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn has_share(pool: &PgPool, video_id: Uuid, email: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM video_shares WHERE video_id = $1 AND email = $2)",
    )
    .bind(video_id)
    .bind(email)
    .fetch_one(pool)
    .await
}

pub async fn list_shares(pool: &PgPool, video_id: Uuid) -> Result<Vec<Share>, sqlx::Error> {
    sqlx::query_as::<_, Share>(
        r#"
        SELECT video_id, email, created_by, created_at
        FROM video_shares WHERE video_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(video_id)
    .fetch_all(pool)
    .await
}

pub async fn add_group_share(
    pool: &PgPool,
    video_id: Uuid,
    group_id: Uuid,
    created_by: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO video_group_shares (video_id, group_id, created_by)
        VALUES ($1, $2, $3)
        ON CONFLICT (video_id, group_id) DO NOTHING
        "#,
    )
    .bind(video_id)
    .bind(group_id)
    .bind(created_by)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn remove_group_share(
    pool: &PgPool,
    video_id: Uuid,
    group_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM video_group_shares WHERE video_id = $1 AND group_id = $2")
            .bind(video_id)
            .bind(group_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected() == 1)
}

/// Whether any group shared with the video currently lists `email`.
/// Membership is read at call time, never snapshotted. Member rows come from
/// upstream unnormalized, so they are normalized here before comparing.
pub async fn in_shared_group(
    pool: &PgPool,
    video_id: Uuid,
    email: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM video_group_shares gs
            JOIN user_group_members m ON m.group_id = gs.group_id
            WHERE gs.video_id = $1 AND lower(trim(m.email)) = $2
        )
        "#,
    )
    .bind(video_id)
    .bind(email)
    .fetch_one(pool)
    .await
}

pub async fn list_group_shares(
    pool: &PgPool,
    video_id: Uuid,
) -> Result<Vec<GroupShare>, sqlx::Error> {
    sqlx::query_as::<_, GroupShare>(
        r#"
        SELECT gs.video_id, gs.group_id, g.name AS group_name, gs.created_by, gs.created_at
        FROM video_group_shares gs
        JOIN user_groups g ON g.id = gs.group_id
        WHERE gs.video_id = $1
        ORDER BY gs.created_at ASC
        "#,
    )
    .bind(video_id)
    .fetch_all(pool)
    .await
}
