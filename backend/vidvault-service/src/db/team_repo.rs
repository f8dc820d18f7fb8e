/// Team repository - membership and role lookups
use crate::models::TeamRole;
use sqlx::PgPool;
use uuid::Uuid;

/// Role of `user_id` in `team_id`, or `None` if not a member
pub async fn member_role(
    pool: &PgPool,
    team_id: Uuid,
    user_id: Uuid,
) -> Result<Option<TeamRole>, sqlx::Error> {
    let role = sqlx::query_scalar::<_, String>(
        "SELECT role FROM team_members WHERE team_id = $1 AND user_id = $2",
    )
    .bind(team_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(role.as_deref().and_then(TeamRole::from_str))
}

/// Whether the user registered under `email` belongs to the team
pub async fn is_member_email(pool: &PgPool, team_id: Uuid, email: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM team_members tm
            JOIN users u ON u.id = tm.user_id
            WHERE tm.team_id = $1 AND lower(trim(u.email)) = $2
        )
        "#,
    )
    .bind(team_id)
    .bind(email)
    .fetch_one(pool)
    .await
}
