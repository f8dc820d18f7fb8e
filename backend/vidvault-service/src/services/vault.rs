/// Credential Vault
///
/// Seals storage secrets before they reach the database and resolves which
/// credentials apply to an operation. Precedence for new uploads is a pure
/// function over the two candidate records ([`select_credentials`]); an
/// existing video always goes back to the set it was uploaded with
/// ([`stored_credentials`]). Only the selected record is ever decrypted, and
/// decrypted values live only for the request that asked for them.
use crate::config::VaultConfig;
use crate::db::credential_repo::{self, CredentialFields};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{CredentialOwner, CredentialRecord, StorageCredentials, Video};
use crypto_core::{SealedSecret, SecretBox, SecretBoxError};
use sqlx::PgPool;
use tracing::{debug, error};
use uuid::Uuid;

pub struct CredentialVault {
    secret_box: SecretBox,
}

impl CredentialVault {
    /// Build the vault from injected key material
    pub fn from_config(config: &VaultConfig) -> std::result::Result<Self, SecretBoxError> {
        let mut secret_box = SecretBox::new(config.key_version, &config.master_key)?;
        for (version, key) in &config.previous_keys {
            secret_box = secret_box.with_previous_key(*version, key)?;
        }
        Ok(Self { secret_box })
    }

    pub fn new(secret_box: SecretBox) -> Self {
        Self { secret_box }
    }

    /// Encrypt a secret for storage under `owner`
    pub fn encrypt(&self, owner: CredentialOwner, secret: &str) -> Result<SealedSecret> {
        self.secret_box
            .seal(secret, owner.aad().as_bytes())
            .map_err(|e| AppError::Internal(format!("failed to seal storage secret: {}", e)))
    }

    /// Decrypt a stored record into usable credentials.
    ///
    /// Any failure (tampering, wrong owner, retired key) is a
    /// `CredentialCorrupted` fault and is logged as an alert.
    pub fn decrypt(&self, record: &CredentialRecord) -> Result<StorageCredentials> {
        let owner = record.owner();
        let sealed = SealedSecret {
            ciphertext: record.secret_ciphertext.clone(),
            nonce: record.secret_nonce.clone(),
            key_version: record.key_version,
        };

        let secret = self
            .secret_box
            .open(&sealed, owner.aad().as_bytes())
            .map_err(|e| {
                error!(
                    credential_id = %record.id,
                    owner = owner.kind(),
                    key_version = record.key_version,
                    error = %e,
                    "stored storage credential could not be decrypted"
                );
                metrics::CREDENTIAL_FAULTS.with_label_values(&["decrypt"]).inc();
                AppError::CredentialCorrupted(format!(
                    "credential {} could not be decrypted",
                    record.id
                ))
            })?;

        Ok(StorageCredentials {
            source: owner,
            access_key_id: record.access_key_id.clone(),
            secret_access_key: secret,
            bucket: record.bucket.clone(),
            region: record.region.clone(),
            role_arn: record.role_arn.clone(),
            endpoint: record.endpoint.clone(),
        })
    }

    /// Resolve credentials for `actor`, optionally acting for `team_id`.
    ///
    /// Team credentials win when the team has any; otherwise the actor's
    /// personal credentials; otherwise `NotConfigured`.
    pub async fn resolve(
        &self,
        pool: &PgPool,
        actor_id: Uuid,
        team_id: Option<Uuid>,
    ) -> Result<StorageCredentials> {
        let team = match team_id {
            Some(team_id) => credential_repo::get_for_team(pool, team_id).await?,
            None => None,
        };
        let personal = if team.is_some() {
            None
        } else {
            credential_repo::get_for_user(pool, actor_id).await?
        };

        let record = select_credentials(team.as_ref(), personal.as_ref(), team_id)?;
        debug!(
            actor_id = %actor_id,
            team_id = ?team_id,
            source = record.owner().kind(),
            "resolved storage credentials"
        );
        self.decrypt(record)
    }

    /// Resolve the credentials that hold an existing video's objects: the
    /// set recorded at upload, never re-chosen by precedence.
    pub async fn resolve_for_video(
        &self,
        pool: &PgPool,
        video: &Video,
    ) -> Result<StorageCredentials> {
        let owner = video.storage_owner();
        let record = match owner {
            CredentialOwner::Team(team_id) => credential_repo::get_for_team(pool, team_id).await?,
            CredentialOwner::User(user_id) => credential_repo::get_for_user(pool, user_id).await?,
        };

        let record = stored_credentials(owner, record.as_ref())?;
        debug!(
            video_id = %video.id,
            source = owner.kind(),
            "resolved storage credentials for video"
        );
        self.decrypt(record)
    }

    /// Seal and persist credentials for `owner`
    pub async fn store(
        &self,
        pool: &PgPool,
        owner: CredentialOwner,
        fields: &CredentialFields<'_>,
        secret: &str,
    ) -> Result<CredentialRecord> {
        let sealed = self.encrypt(owner, secret)?;
        Ok(credential_repo::upsert(pool, owner, fields, &sealed).await?)
    }
}

/// Credential precedence: team record, then personal record, else
/// `NotConfigured` with a message telling the actor where to fix it.
pub fn select_credentials<'a>(
    team: Option<&'a CredentialRecord>,
    personal: Option<&'a CredentialRecord>,
    team_id: Option<Uuid>,
) -> Result<&'a CredentialRecord> {
    if let Some(record) = team {
        return Ok(record);
    }
    if let Some(record) = personal {
        return Ok(record);
    }

    let message = match team_id {
        Some(team_id) => format!(
            "no storage credentials configured for team {} or for you; \
             add them under Settings > Storage",
            team_id
        ),
        None => "no storage credentials configured; add them under Settings > Storage".to_string(),
    };
    Err(AppError::NotConfigured(message))
}

/// The record for exactly `owner`. A video's objects are never looked up
/// under another credential set, even one that exists.
pub fn stored_credentials(
    owner: CredentialOwner,
    record: Option<&CredentialRecord>,
) -> Result<&CredentialRecord> {
    match record {
        Some(record) if record.owner() == owner => Ok(record),
        _ => Err(AppError::NotConfigured(format!(
            "the {} storage credentials this video was uploaded with have been removed; \
             restore them under Settings > Storage",
            owner.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crypto_core::generate_key;

    fn vault() -> CredentialVault {
        CredentialVault::new(SecretBox::new(1, &generate_key()).unwrap())
    }

    fn record(vault: &CredentialVault, owner: CredentialOwner, secret: &str) -> CredentialRecord {
        let sealed = vault.encrypt(owner, secret).unwrap();
        let (user_id, team_id) = match owner {
            CredentialOwner::User(id) => (Some(id), None),
            CredentialOwner::Team(id) => (None, Some(id)),
        };
        CredentialRecord {
            id: Uuid::new_v4(),
            user_id,
            team_id,
            access_key_id: "AKIAEXAMPLE".into(),
            secret_ciphertext: sealed.ciphertext,
            secret_nonce: sealed.nonce,
            key_version: sealed.key_version,
            bucket: "bucket".into(),
            region: "us-east-1".into(),
            role_arn: "arn:aws:iam::123456789012:role/transcode".into(),
            endpoint: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn team_credentials_take_precedence() {
        let v = vault();
        let team_id = Uuid::new_v4();
        let team = record(&v, CredentialOwner::Team(team_id), "team-secret");
        let personal = record(&v, CredentialOwner::User(Uuid::new_v4()), "personal-secret");

        let chosen = select_credentials(Some(&team), Some(&personal), Some(team_id)).unwrap();
        assert_eq!(chosen.id, team.id);
    }

    #[test]
    fn falls_back_to_personal_credentials() {
        let v = vault();
        let personal = record(&v, CredentialOwner::User(Uuid::new_v4()), "personal-secret");

        let chosen = select_credentials(None, Some(&personal), Some(Uuid::new_v4())).unwrap();
        assert_eq!(chosen.id, personal.id);
    }

    #[test]
    fn missing_credentials_is_not_configured() {
        let err = select_credentials(None, None, None).unwrap_err();
        assert!(matches!(err, AppError::NotConfigured(_)));
        assert!(err.to_string().contains("Settings > Storage"));
    }

    #[test]
    fn video_keeps_personal_credentials_after_team_configures_its_own() {
        let v = vault();
        let uploader = Uuid::new_v4();
        let team_id = Uuid::new_v4();
        let team = record(&v, CredentialOwner::Team(team_id), "team-secret");
        let personal = record(&v, CredentialOwner::User(uploader), "personal-secret");

        // The upload happened while the team had nothing configured
        let at_upload = select_credentials(None, Some(&personal), Some(team_id)).unwrap();
        let stored_owner = at_upload.owner();

        // Team credentials added later must not redirect reads
        let later = select_credentials(Some(&team), Some(&personal), Some(team_id)).unwrap();
        assert_eq!(later.id, team.id);
        let chosen = stored_credentials(stored_owner, Some(&personal)).unwrap();
        assert_eq!(chosen.id, personal.id);
        assert!(matches!(
            stored_credentials(stored_owner, Some(&team)),
            Err(AppError::NotConfigured(_))
        ));
    }

    #[test]
    fn removed_upload_credentials_are_not_configured() {
        let err = stored_credentials(CredentialOwner::Team(Uuid::new_v4()), None).unwrap_err();
        assert!(matches!(err, AppError::NotConfigured(_)));
        assert!(err.to_string().contains("Settings > Storage"));
    }

    #[test]
    fn decrypt_returns_plaintext_secret() {
        let v = vault();
        let owner = CredentialOwner::User(Uuid::new_v4());
        let rec = record(&v, owner, "wJalrXUtnFEMI/K7MDENG");

        let creds = v.decrypt(&rec).unwrap();
        assert_eq!(creds.secret_access_key, "wJalrXUtnFEMI/K7MDENG");
        assert_eq!(creds.source, owner);
        assert_eq!(creds.bucket, "bucket");
    }

    #[test]
    fn tampered_record_is_credential_corrupted() {
        let v = vault();
        let mut rec = record(&v, CredentialOwner::User(Uuid::new_v4()), "secret");
        rec.secret_ciphertext[0] ^= 0x01;

        assert!(matches!(
            v.decrypt(&rec),
            Err(AppError::CredentialCorrupted(_))
        ));
    }

    #[test]
    fn ciphertext_moved_to_other_owner_is_rejected() {
        let v = vault();
        let mut rec = record(&v, CredentialOwner::User(Uuid::new_v4()), "secret");
        rec.user_id = Some(Uuid::new_v4());

        assert!(matches!(
            v.decrypt(&rec),
            Err(AppError::CredentialCorrupted(_))
        ));
    }

    #[test]
    fn rotated_master_key_still_decrypts() {
        let old_key = generate_key();
        let old = CredentialVault::new(SecretBox::new(1, &old_key).unwrap());
        let rec = record(&old, CredentialOwner::Team(Uuid::new_v4()), "legacy");

        let rotated = CredentialVault::from_config(&VaultConfig {
            key_version: 2,
            master_key: generate_key(),
            previous_keys: vec![(1, old_key)],
        })
        .unwrap();

        assert_eq!(rotated.decrypt(&rec).unwrap().secret_access_key, "legacy");
    }

    #[test]
    fn retired_key_missing_is_credential_corrupted() {
        let old = vault();
        let rec = record(&old, CredentialOwner::User(Uuid::new_v4()), "secret");
        let fresh = CredentialVault::new(SecretBox::new(2, &generate_key()).unwrap());

        assert!(matches!(
            fresh.decrypt(&rec),
            Err(AppError::CredentialCorrupted(_))
        ));
    }
}
