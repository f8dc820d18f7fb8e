/// User repository - replicated identity reference data
use sqlx::PgPool;
use uuid::Uuid;

/// Record the id/email pair carried by a validated access token
pub async fn upsert_user(pool: &PgPool, id: Uuid, email: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email) VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email
        WHERE users.email IS DISTINCT FROM EXCLUDED.email
        "#,
    )
    .bind(id)
    .bind(email)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_email(pool: &PgPool, id: Uuid) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}
