/// Upload Authorizer
///
/// Issues one presigned PUT per video, scoped to a single object key and a
/// short TTL, and records the PENDING video. Input validation and credential
/// resolution both happen before anything is written, so a rejected upload
/// never leaves a row behind.
use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::config::UploadConfig;
use crate::db::{user_repo, video_repo};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::middleware::AuthUser;
use crate::models::{NewVideo, UploadUrlRequest, UploadUrlResponse, VideoOwner};
use crate::services::access::AccessFacts;
use crate::services::storage::ObjectStore;
use crate::services::vault::CredentialVault;

const MAX_STORED_FILE_NAME: usize = 200;

/// Storage keys for one video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoKeys {
    pub original_key: String,
    pub output_key_prefix: String,
}

/// Keys are rooted at the owning tenant and the video id, so two tenants (or
/// two uploads of the same file) can never collide
pub fn derive_keys(owner: VideoOwner, video_id: Uuid, file_name: &str) -> VideoKeys {
    let root = match owner {
        VideoOwner::User(id) => format!("users/{id}/videos/{video_id}"),
        VideoOwner::Team(id) => format!("teams/{id}/videos/{video_id}"),
    };
    VideoKeys {
        original_key: format!("{root}/original/{}", sanitize_file_name(file_name)),
        output_key_prefix: format!("{root}/hls/"),
    }
}

/// Reduce a client-supplied file name to a safe single path segment
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STORED_FILE_NAME)
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "video".to_string()
    } else {
        cleaned.to_string()
    }
}

/// `Video/MP4; codecs=avc1` -> `video/mp4`
pub fn normalize_content_type(file_type: &str) -> String {
    file_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Size and type limits. Returns the normalized content type.
pub fn validate_request(config: &UploadConfig, request: &UploadUrlRequest) -> Result<String> {
    request.validate()?;

    if request.file_size <= 0 {
        return Err(AppError::Validation(
            "fileSize must be greater than zero".to_string(),
        ));
    }
    if request.file_size > config.max_file_size_bytes {
        return Err(AppError::Validation(format!(
            "fileSize {} exceeds the maximum of {} bytes",
            request.file_size, config.max_file_size_bytes
        )));
    }

    let content_type = normalize_content_type(&request.file_type);
    if !config
        .allowed_content_types
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&content_type))
    {
        return Err(AppError::Validation(format!(
            "fileType {} is not an accepted video type",
            request.file_type
        )));
    }

    Ok(content_type)
}

pub struct UploadAuthorizer {
    pool: PgPool,
    vault: Arc<CredentialVault>,
    store: Arc<dyn ObjectStore>,
    config: UploadConfig,
}

impl UploadAuthorizer {
    pub fn new(
        pool: PgPool,
        vault: Arc<CredentialVault>,
        store: Arc<dyn ObjectStore>,
        config: UploadConfig,
    ) -> Self {
        Self {
            pool,
            vault,
            store,
            config,
        }
    }

    pub async fn begin_upload(
        &self,
        facts: &dyn AccessFacts,
        actor: &AuthUser,
        request: &UploadUrlRequest,
    ) -> Result<UploadUrlResponse> {
        let content_type = validate_request(&self.config, request)?;

        if let Some(team_id) = request.team_id {
            if facts.team_role(team_id, actor.user_id).await?.is_none() {
                return Err(AppError::Forbidden(
                    "you are not a member of this team".to_string(),
                ));
            }
        }

        let creds = self
            .vault
            .resolve(&self.pool, actor.user_id, request.team_id)
            .await?;

        let video_id = Uuid::new_v4();
        let owner = match request.team_id {
            Some(team_id) => VideoOwner::Team(team_id),
            None => VideoOwner::User(actor.user_id),
        };
        let keys = derive_keys(owner, video_id, &request.file_name);

        let upload_url = self
            .store
            .presign_put(
                &creds,
                &keys.original_key,
                &content_type,
                request.file_size,
                self.config.url_ttl,
            )
            .await?;
        let storage_owner = creds.source;
        drop(creds);

        user_repo::upsert_user(&self.pool, actor.user_id, &actor.email).await?;
        let video = video_repo::create_video(
            &self.pool,
            &NewVideo {
                id: video_id,
                owner_id: actor.user_id,
                team_id: request.team_id,
                title: request.title.trim().to_string(),
                description: request.description.clone(),
                file_name: request.file_name.clone(),
                content_type,
                file_size: request.file_size,
                original_key: keys.original_key,
                output_key_prefix: keys.output_key_prefix,
                storage_team_id: storage_owner.team_id(),
            },
        )
        .await?;

        metrics::UPLOADS_AUTHORIZED
            .with_label_values(&[match owner {
                VideoOwner::User(_) => "user",
                VideoOwner::Team(_) => "team",
            }])
            .inc();
        info!(
            video_id = %video.id,
            owner_id = %actor.user_id,
            team_id = ?request.team_id,
            storage = storage_owner.kind(),
            key = %video.original_key,
            size = video.file_size,
            "upload authorized"
        );

        Ok(UploadUrlResponse {
            video_id: video.id,
            upload_url,
            original_key: video.original_key,
            output_key_prefix: video.output_key_prefix,
            expires_in_seconds: self.config.url_ttl.as_secs(),
        })
    }
}
