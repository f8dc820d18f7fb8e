/// Storage credential administration
///
/// Personal credentials are managed by their user; team credentials by a
/// team OWNER or ADMIN. Secrets are sealed by the vault before they reach the
/// repository and are never returned.
use sqlx::PgPool;
use tracing::info;
use validator::Validate;

use crate::db::credential_repo::{self, CredentialFields};
use crate::db::user_repo;
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::{CredentialOwner, CredentialSummary, PutCredentialsRequest};
use crate::services::access::AccessFacts;
use crate::services::vault::CredentialVault;

/// Check `actor` may administer `owner`'s credentials
pub async fn require_admin(
    facts: &dyn AccessFacts,
    actor: &AuthUser,
    owner: CredentialOwner,
) -> Result<()> {
    match owner {
        CredentialOwner::User(id) if id == actor.user_id => Ok(()),
        CredentialOwner::User(_) => Err(AppError::Forbidden(
            "credentials belong to another user".to_string(),
        )),
        CredentialOwner::Team(team_id) => match facts.team_role(team_id, actor.user_id).await? {
            Some(role) if role.can_manage_team() => Ok(()),
            Some(_) => Err(AppError::Forbidden(
                "only team owners and admins can manage team storage".to_string(),
            )),
            None => Err(AppError::NotFound("team not found".to_string())),
        },
    }
}

pub async fn put_credentials(
    pool: &PgPool,
    vault: &CredentialVault,
    facts: &dyn AccessFacts,
    actor: &AuthUser,
    owner: CredentialOwner,
    request: &PutCredentialsRequest,
) -> Result<CredentialSummary> {
    request.validate()?;
    require_admin(facts, actor, owner).await?;

    if let CredentialOwner::User(_) = owner {
        user_repo::upsert_user(pool, actor.user_id, &actor.email).await?;
    }

    let fields = CredentialFields {
        access_key_id: request.access_key_id.trim(),
        bucket: request.bucket.trim(),
        region: request.region.trim(),
        role_arn: request.role_arn.trim(),
        endpoint: request.endpoint.as_deref().map(str::trim),
    };
    let record = vault
        .store(pool, owner, &fields, &request.secret_access_key)
        .await?;

    info!(
        credential_id = %record.id,
        owner = owner.kind(),
        actor = %actor.user_id,
        bucket = %record.bucket,
        "storage credentials saved"
    );
    Ok(CredentialSummary::from(&record))
}

pub async fn get_credentials(
    pool: &PgPool,
    facts: &dyn AccessFacts,
    actor: &AuthUser,
    owner: CredentialOwner,
) -> Result<CredentialSummary> {
    require_admin(facts, actor, owner).await?;
    credential_repo::get_for_owner(pool, owner)
        .await?
        .map(|record| CredentialSummary::from(&record))
        .ok_or_else(|| {
            AppError::NotConfigured(
                "no storage credentials configured; add them under Settings > Storage".to_string(),
            )
        })
}

pub async fn delete_credentials(
    pool: &PgPool,
    facts: &dyn AccessFacts,
    actor: &AuthUser,
    owner: CredentialOwner,
) -> Result<()> {
    require_admin(facts, actor, owner).await?;
    if !credential_repo::delete_for_owner(pool, owner).await? {
        return Err(AppError::NotFound("no stored credentials".to_string()));
    }
    info!(owner = owner.kind(), actor = %actor.user_id, "storage credentials removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TeamRole;
    use crate::services::access::testing::{auth, MemoryFacts};
    use uuid::Uuid;

    #[tokio::test]
    async fn users_manage_only_their_own_credentials() {
        let facts = MemoryFacts::default();
        let me = auth(Uuid::new_v4(), "me@example.com");

        assert!(require_admin(&facts, &me, CredentialOwner::User(me.user_id))
            .await
            .is_ok());
        assert!(matches!(
            require_admin(&facts, &me, CredentialOwner::User(Uuid::new_v4())).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn team_credentials_need_owner_or_admin() {
        let facts = MemoryFacts::default();
        let team = Uuid::new_v4();
        let admin = auth(Uuid::new_v4(), "admin@example.com");
        let member = auth(Uuid::new_v4(), "member@example.com");
        let outsider = auth(Uuid::new_v4(), "outsider@example.com");
        facts.add_team_member(team, admin.user_id, TeamRole::Admin);
        facts.add_team_member(team, member.user_id, TeamRole::Member);

        assert!(require_admin(&facts, &admin, CredentialOwner::Team(team))
            .await
            .is_ok());
        assert!(matches!(
            require_admin(&facts, &member, CredentialOwner::Team(team)).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            require_admin(&facts, &outsider, CredentialOwner::Team(team)).await,
            Err(AppError::NotFound(_))
        ));
    }
}
