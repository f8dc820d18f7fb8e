/// Storage credential repository
///
/// Rows hold the secret only as ciphertext + nonce + key version. Sealing and
/// opening happen in `services::vault`; nothing here ever sees plaintext.
use crate::models::{CredentialOwner, CredentialRecord};
use crypto_core::SealedSecret;
use sqlx::PgPool;
use uuid::Uuid;

/// Non-secret fields of a credential being stored
#[derive(Debug, Clone)]
pub struct CredentialFields<'a> {
    pub access_key_id: &'a str,
    pub bucket: &'a str,
    pub region: &'a str,
    pub role_arn: &'a str,
    pub endpoint: Option<&'a str>,
}

pub async fn get_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<CredentialRecord>, sqlx::Error> {
    sqlx::query_as::<_, CredentialRecord>(
        r#"
        SELECT id, user_id, team_id, access_key_id, secret_ciphertext, secret_nonce,
               key_version, bucket, region, role_arn, endpoint, created_at, updated_at
        FROM storage_credentials WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_for_team(
    pool: &PgPool,
    team_id: Uuid,
) -> Result<Option<CredentialRecord>, sqlx::Error> {
    sqlx::query_as::<_, CredentialRecord>(
        r#"
        SELECT id, user_id, team_id, access_key_id, secret_ciphertext, secret_nonce,
               key_version, bucket, region, role_arn, endpoint, created_at, updated_at
        FROM storage_credentials WHERE team_id = $1
        "#,
    )
    .bind(team_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_for_owner(
    pool: &PgPool,
    owner: CredentialOwner,
) -> Result<Option<CredentialRecord>, sqlx::Error> {
    match owner {
        CredentialOwner::User(id) => get_for_user(pool, id).await,
        CredentialOwner::Team(id) => get_for_team(pool, id).await,
    }
}

/// Insert or replace the owner's credentials
pub async fn upsert(
    pool: &PgPool,
    owner: CredentialOwner,
    fields: &CredentialFields<'_>,
    sealed: &SealedSecret,
) -> Result<CredentialRecord, sqlx::Error> {
    let (user_id, team_id, conflict_target) = match owner {
        CredentialOwner::User(id) => (Some(id), None, "user_id"),
        CredentialOwner::Team(id) => (None, Some(id), "team_id"),
    };

    let sql = format!(
        r#"
        INSERT INTO storage_credentials (
            id, user_id, team_id, access_key_id, secret_ciphertext, secret_nonce,
            key_version, bucket, region, role_arn, endpoint
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT ({}) DO UPDATE SET
            access_key_id = EXCLUDED.access_key_id,
            secret_ciphertext = EXCLUDED.secret_ciphertext,
            secret_nonce = EXCLUDED.secret_nonce,
            key_version = EXCLUDED.key_version,
            bucket = EXCLUDED.bucket,
            region = EXCLUDED.region,
            role_arn = EXCLUDED.role_arn,
            endpoint = EXCLUDED.endpoint,
            updated_at = NOW()
        RETURNING id, user_id, team_id, access_key_id, secret_ciphertext, secret_nonce,
                  key_version, bucket, region, role_arn, endpoint, created_at, updated_at
        "#,
        conflict_target
    );

    sqlx::query_as::<_, CredentialRecord>(&sql)
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(team_id)
        .bind(fields.access_key_id)
        .bind(&sealed.ciphertext)
        .bind(&sealed.nonce)
        .bind(sealed.key_version)
        .bind(fields.bucket)
        .bind(fields.region)
        .bind(fields.role_arn)
        .bind(fields.endpoint)
        .fetch_one(pool)
        .await
}

pub async fn delete_for_owner(pool: &PgPool, owner: CredentialOwner) -> Result<bool, sqlx::Error> {
    let result = match owner {
        CredentialOwner::User(id) => {
            sqlx::query("DELETE FROM storage_credentials WHERE user_id = $1")
                .bind(id)
                .execute(pool)
                .await?
        }
        CredentialOwner::Team(id) => {
            sqlx::query("DELETE FROM storage_credentials WHERE team_id = $1")
                .bind(id)
                .execute(pool)
                .await?
        }
    };

    Ok(result.rows_affected() == 1)
}
