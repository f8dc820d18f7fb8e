/// Video repository - database operations for videos
///
/// Status transitions are compare-and-set updates guarded by the expected
/// current status; a transition that lost the race returns `None`.
use crate::models::{NewVideo, TranscodingStatus, Video, Visibility};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn create_video(pool: &PgPool, video: &NewVideo) -> Result<Video, sqlx::Error> {
    sqlx::query_as::<_, Video>(
        r#"
        INSERT INTO videos (
            id, owner_id, team_id, title, description, file_name, content_type,
            file_size, original_key, output_key_prefix, storage_team_id,
            visibility, transcoding_status
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'PRIVATE', 'PENDING'
        )
        RETURNING id, owner_id, team_id, title, description, file_name, content_type,
                  file_size, original_key, output_key_prefix, visibility, transcoding_status,
                  manifest_key, transcode_job_id, failure_reason, storage_team_id,
                  created_at, updated_at
        "#,
    )
    .bind(video.id)
    .bind(video.owner_id)
    .bind(video.team_id)
    .bind(&video.title)
    .bind(video.description.as_deref())
    .bind(&video.file_name)
    .bind(&video.content_type)
    .bind(video.file_size)
    .bind(&video.original_key)
    .bind(&video.output_key_prefix)
    .bind(video.storage_team_id)
    .fetch_one(pool)
    .await
}

pub async fn get_video(pool: &PgPool, id: Uuid) -> Result<Option<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(
        r#"
        SELECT id, owner_id, team_id, title, description, file_name, content_type,
               file_size, original_key, output_key_prefix, visibility, transcoding_status,
               manifest_key, transcode_job_id, failure_reason, storage_team_id,
               created_at, updated_at
        FROM videos WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_job_id(pool: &PgPool, job_id: &str) -> Result<Option<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(
        r#"
        SELECT id, owner_id, team_id, title, description, file_name, content_type,
               file_size, original_key, output_key_prefix, visibility, transcoding_status,
               manifest_key, transcode_job_id, failure_reason, storage_team_id,
               created_at, updated_at
        FROM videos WHERE transcode_job_id = $1
        "#,
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await
}

/// Videos the user uploaded plus every video of teams they administer
pub async fn list_manageable(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(
        r#"
        SELECT id, owner_id, team_id, title, description, file_name, content_type,
               file_size, original_key, output_key_prefix, visibility, transcoding_status,
               manifest_key, transcode_job_id, failure_reason, storage_team_id,
               created_at, updated_at
        FROM videos v
        WHERE v.owner_id = $1
           OR v.team_id IN (
                SELECT team_id FROM team_members
                WHERE user_id = $1 AND role IN ('OWNER', 'ADMIN')
           )
        ORDER BY v.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Atomically move PENDING -> PROCESSING. Only one caller ever gets `Some`.
pub async fn claim_for_transcoding(pool: &PgPool, id: Uuid) -> Result<Option<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(
        r#"
        UPDATE videos SET
            transcoding_status = 'PROCESSING',
            failure_reason = NULL,
            updated_at = NOW()
        WHERE id = $1 AND transcoding_status = 'PENDING'
        RETURNING id, owner_id, team_id, title, description, file_name, content_type,
                  file_size, original_key, output_key_prefix, visibility, transcoding_status,
                  manifest_key, transcode_job_id, failure_reason, storage_team_id,
                  created_at, updated_at
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn record_job_id(pool: &PgPool, id: Uuid, job_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE videos SET transcode_job_id = $2, updated_at = NOW()
        WHERE id = $1 AND transcoding_status = 'PROCESSING'
        "#,
    )
    .bind(id)
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// PROCESSING -> COMPLETED, setting the manifest in the same statement
pub async fn mark_completed(
    pool: &PgPool,
    id: Uuid,
    manifest_key: &str,
) -> Result<Option<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(
        r#"
        UPDATE videos SET
            transcoding_status = 'COMPLETED',
            manifest_key = $2,
            failure_reason = NULL,
            updated_at = NOW()
        WHERE id = $1 AND transcoding_status = 'PROCESSING'
        RETURNING id, owner_id, team_id, title, description, file_name, content_type,
                  file_size, original_key, output_key_prefix, visibility, transcoding_status,
                  manifest_key, transcode_job_id, failure_reason, storage_team_id,
                  created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(manifest_key)
    .fetch_optional(pool)
    .await
}

/// `expected` -> FAILED with a reason. FAILED is terminal.
pub async fn mark_failed(
    pool: &PgPool,
    id: Uuid,
    expected: TranscodingStatus,
    reason: &str,
) -> Result<Option<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(
        r#"
        UPDATE videos SET
            transcoding_status = 'FAILED',
            manifest_key = NULL,
            failure_reason = $3,
            updated_at = NOW()
        WHERE id = $1 AND transcoding_status = $2
        RETURNING id, owner_id, team_id, title, description, file_name, content_type,
                  file_size, original_key, output_key_prefix, visibility, transcoding_status,
                  manifest_key, transcode_job_id, failure_reason, storage_team_id,
                  created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(expected.as_str())
    .bind(reason)
    .fetch_optional(pool)
    .await
}

/// PROCESSING videos with a submitted job, oldest first
pub async fn list_processing_with_job(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(
        r#"
        SELECT id, owner_id, team_id, title, description, file_name, content_type,
               file_size, original_key, output_key_prefix, visibility, transcoding_status,
               manifest_key, transcode_job_id, failure_reason, storage_team_id,
               created_at, updated_at
        FROM videos
        WHERE transcoding_status = 'PROCESSING' AND transcode_job_id IS NOT NULL
        ORDER BY updated_at ASC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Fail PENDING videos whose upload was never completed
pub async fn fail_stale_pending(
    pool: &PgPool,
    older_than: DateTime<Utc>,
    reason: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE videos SET
            transcoding_status = 'FAILED',
            failure_reason = $2,
            updated_at = NOW()
        WHERE transcoding_status = 'PENDING' AND updated_at < $1
        "#,
    )
    .bind(older_than)
    .bind(reason)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Fail PROCESSING videos that never got a job id recorded (crash between
/// claim and submission)
pub async fn fail_orphaned_processing(
    pool: &PgPool,
    older_than: DateTime<Utc>,
    reason: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE videos SET
            transcoding_status = 'FAILED',
            failure_reason = $2,
            updated_at = NOW()
        WHERE transcoding_status = 'PROCESSING'
          AND transcode_job_id IS NULL
          AND updated_at < $1
        "#,
    )
    .bind(older_than)
    .bind(reason)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn set_visibility(
    pool: &PgPool,
    id: Uuid,
    visibility: Visibility,
) -> Result<Option<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(
        r#"
        UPDATE videos SET visibility = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING id, owner_id, team_id, title, description, file_name, content_type,
                  file_size, original_key, output_key_prefix, visibility, transcoding_status,
                  manifest_key, transcode_job_id, failure_reason, storage_team_id,
                  created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(visibility.as_str())
    .fetch_optional(pool)
    .await
}

pub async fn update_metadata(
    pool: &PgPool,
    id: Uuid,
    title: Option<&str>,
    description: Option<&str>,
) -> Result<Option<Video>, sqlx::Error> {
    sqlx::query_as::<_, Video>(
        r#"
        UPDATE videos SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, owner_id, team_id, title, description, file_name, content_type,
                  file_size, original_key, output_key_prefix, visibility, transcoding_status,
                  manifest_key, transcode_job_id, failure_reason, storage_team_id,
                  created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(description)
    .fetch_optional(pool)
    .await
}

/// Delete a video; shares and group shares cascade
pub async fn delete_video(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM videos WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}
