/// Group repository - read-only view of user groups
///
/// Groups and their member lists are maintained by the dashboard; vidvault
/// only needs to look them up when a group is shared.
use crate::models::Group;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn get_group(pool: &PgPool, id: Uuid) -> Result<Option<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>(
        "SELECT id, owner_id, name, created_at FROM user_groups WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
