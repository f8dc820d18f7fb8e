/// Video management: metadata, visibility, deletion and sharing
///
/// Every mutation is gated by `access::require_manage`; reads by
/// `access::require_view`. Shares are written by email (normalized) or by
/// group id and take effect on the next access check.
use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::{group_repo, share_repo, video_repo};
use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::{
    GroupShareEntry, ShareEntry, ShareRequest, ShareTarget, SharesResponse, UpdateVideoRequest,
    Video, Visibility,
};
use crate::services::access::{self, AccessFacts, Viewer};
use crate::services::storage::ObjectStore;
use crate::services::vault::CredentialVault;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

/// Everything stored for a video lives under `.../videos/{id}/`
pub fn storage_root(video: &Video) -> &str {
    video
        .output_key_prefix
        .strip_suffix("hls/")
        .unwrap_or(&video.output_key_prefix)
}

pub struct VideoManager {
    pool: PgPool,
    vault: Arc<CredentialVault>,
    store: Arc<dyn ObjectStore>,
}

impl VideoManager {
    pub fn new(pool: PgPool, vault: Arc<CredentialVault>, store: Arc<dyn ObjectStore>) -> Self {
        Self { pool, vault, store }
    }

    async fn load(&self, video_id: Uuid) -> Result<Video> {
        video_repo::get_video(&self.pool, video_id)
            .await?
            .ok_or_else(|| AppError::NotFound("video not found".to_string()))
    }

    async fn load_managed(
        &self,
        facts: &dyn AccessFacts,
        actor: &AuthUser,
        video_id: Uuid,
    ) -> Result<Video> {
        let video = self.load(video_id).await?;
        access::require_manage(facts, actor, &video).await?;
        Ok(video)
    }

    pub async fn list_manageable(
        &self,
        actor: &AuthUser,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Video>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);
        Ok(video_repo::list_manageable(&self.pool, actor.user_id, limit, offset).await?)
    }

    pub async fn get(&self, facts: &dyn AccessFacts, viewer: &Viewer, video_id: Uuid) -> Result<Video> {
        let video = self.load(video_id).await?;
        access::require_view(facts, viewer, &video).await?;
        Ok(video)
    }

    pub async fn update(
        &self,
        facts: &dyn AccessFacts,
        actor: &AuthUser,
        video_id: Uuid,
        request: &UpdateVideoRequest,
    ) -> Result<Video> {
        request.validate()?;
        self.load_managed(facts, actor, video_id).await?;

        let title = request.title.as_deref().map(str::trim);
        if title == Some("") {
            return Err(AppError::Validation("title must not be blank".to_string()));
        }

        video_repo::update_metadata(&self.pool, video_id, title, request.description.as_deref())
            .await?
            .ok_or_else(|| AppError::NotFound("video not found".to_string()))
    }

    pub async fn set_visibility(
        &self,
        facts: &dyn AccessFacts,
        actor: &AuthUser,
        video_id: Uuid,
        visibility: Visibility,
    ) -> Result<Video> {
        self.load_managed(facts, actor, video_id).await?;
        let video = video_repo::set_visibility(&self.pool, video_id, visibility)
            .await?
            .ok_or_else(|| AppError::NotFound("video not found".to_string()))?;
        info!(video_id = %video_id, visibility = visibility.as_str(), "visibility changed");
        Ok(video)
    }

    /// Delete the record, then remove its objects from storage. Storage
    /// cleanup is best effort; the record is gone either way.
    pub async fn delete(
        &self,
        facts: &dyn AccessFacts,
        actor: &AuthUser,
        video_id: Uuid,
    ) -> Result<()> {
        let video = self.load_managed(facts, actor, video_id).await?;

        if !video_repo::delete_video(&self.pool, video.id).await? {
            return Err(AppError::NotFound("video not found".to_string()));
        }
        info!(video_id = %video.id, actor = %actor.user_id, "video deleted");

        let creds = match self
            .vault
            .resolve_for_video(&self.pool, &video)
            .await
        {
            Ok(creds) => creds,
            Err(e) => {
                warn!(video_id = %video.id, error = %e, "skipping storage cleanup; no usable credentials");
                return Ok(());
            }
        };

        match self.store.delete_prefix(&creds, storage_root(&video)).await {
            Ok(removed) => info!(video_id = %video.id, removed, "storage objects removed"),
            Err(e) => warn!(video_id = %video.id, error = %e, "storage cleanup failed"),
        }
        Ok(())
    }

    /// Grant view access. Returns whether a new share was created.
    pub async fn share(
        &self,
        facts: &dyn AccessFacts,
        actor: &AuthUser,
        video_id: Uuid,
        request: &ShareRequest,
    ) -> Result<bool> {
        let target = request.target().map_err(AppError::Validation)?;
        self.load_managed(facts, actor, video_id).await?;

        let created = match &target {
            ShareTarget::Email(email) => {
                share_repo::add_share(&self.pool, video_id, email, actor.user_id).await?
            }
            ShareTarget::Group(group_id) => {
                self.require_own_group(actor, *group_id).await?;
                share_repo::add_group_share(&self.pool, video_id, *group_id, actor.user_id).await?
            }
        };
        info!(video_id = %video_id, target = ?target, created, "video shared");
        Ok(created)
    }

    /// Revoke a share. Returns whether one existed.
    pub async fn revoke(
        &self,
        facts: &dyn AccessFacts,
        actor: &AuthUser,
        video_id: Uuid,
        request: &ShareRequest,
    ) -> Result<bool> {
        let target = request.target().map_err(AppError::Validation)?;
        self.load_managed(facts, actor, video_id).await?;

        let removed = match &target {
            ShareTarget::Email(email) => share_repo::remove_share(&self.pool, video_id, email).await?,
            ShareTarget::Group(group_id) => {
                share_repo::remove_group_share(&self.pool, video_id, *group_id).await?
            }
        };
        info!(video_id = %video_id, target = ?target, removed, "share revoked");
        Ok(removed)
    }

    pub async fn list_shares(
        &self,
        facts: &dyn AccessFacts,
        actor: &AuthUser,
        video_id: Uuid,
    ) -> Result<SharesResponse> {
        self.load_managed(facts, actor, video_id).await?;

        let emails = share_repo::list_shares(&self.pool, video_id)
            .await?
            .into_iter()
            .map(|s| ShareEntry {
                email: s.email,
                created_at: s.created_at,
            })
            .collect();
        let groups = share_repo::list_group_shares(&self.pool, video_id)
            .await?
            .into_iter()
            .map(|g| GroupShareEntry {
                group_id: g.group_id,
                group_name: g.group_name,
                created_at: g.created_at,
            })
            .collect();

        Ok(SharesResponse { emails, groups })
    }

    /// Groups can only be shared with by their owner; others are concealed
    async fn require_own_group(&self, actor: &AuthUser, group_id: Uuid) -> Result<()> {
        match group_repo::get_group(&self.pool, group_id).await? {
            Some(group) if group.owner_id == actor.user_id => Ok(()),
            _ => Err(AppError::NotFound("group not found".to_string())),
        }
    }
}
