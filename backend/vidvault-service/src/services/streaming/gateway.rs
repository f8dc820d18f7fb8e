/// Streaming Gateway
///
/// Every manifest and segment request is authorized against current access
/// data, then proxied from storage through a presigned GET the gateway fetches
/// itself. Storage URLs never reach the client: playlists are rewritten to
/// point back here and segment bytes are streamed through.
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use resilience::{presets, with_retry_if, RetryConfig};
use sqlx::PgPool;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::manifest::{content_type_for, is_playlist, resolve_requested_key, ManifestRewriter};
use crate::config::StreamingConfig;
use crate::db::video_repo;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{ManifestKeyResponse, StorageCredentials, TranscodingStatus, Video};
use crate::services::access::{self, AccessFacts, Viewer};
use crate::services::storage::ObjectStore;
use crate::services::vault::CredentialVault;

pub enum StreamBody {
    /// Rewritten playlist
    Full(Bytes),
    /// Upstream body, dropped (and its connection released) with the response.
    /// Chunk errors carry no URL.
    Stream(BoxStream<'static, std::result::Result<Bytes, reqwest::Error>>),
}

pub struct StreamedObject {
    pub key: String,
    pub content_type: &'static str,
    pub cache_control: String,
    pub content_length: Option<u64>,
    pub body: StreamBody,
}

/// Outcome of one upstream GET
#[derive(Debug)]
enum UpstreamError {
    Missing,
    Rejected(u16),
    Transient(String),
    Failed(String),
}

impl UpstreamError {
    fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Transient(_))
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamError::Missing => write!(f, "object not found"),
            UpstreamError::Rejected(status) => write!(f, "storage rejected credentials ({status})"),
            UpstreamError::Transient(msg) => write!(f, "transient storage error: {msg}"),
            UpstreamError::Failed(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

pub struct StreamingGateway {
    pool: PgPool,
    vault: Arc<CredentialVault>,
    store: Arc<dyn ObjectStore>,
    http: reqwest::Client,
    config: StreamingConfig,
    public_base_url: String,
    retry: RetryConfig,
}

impl StreamingGateway {
    pub fn new(
        pool: PgPool,
        vault: Arc<CredentialVault>,
        store: Arc<dyn ObjectStore>,
        config: StreamingConfig,
        public_base_url: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client error: {e}")))?;

        Ok(Self {
            pool,
            vault,
            store,
            http,
            config,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            retry: presets::object_storage_retry(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Base of every gateway URL for `video_id`
    pub fn stream_base(&self, video_id: Uuid) -> String {
        format!("{}/videos/{}/stream", self.public_base_url, video_id)
    }

    /// Load the video and check the viewer may see it. Denials are NotFound.
    pub async fn authorize(
        &self,
        facts: &dyn AccessFacts,
        viewer: &Viewer,
        video_id: Uuid,
    ) -> Result<Video> {
        let video = video_repo::get_video(&self.pool, video_id)
            .await?
            .ok_or_else(|| AppError::NotFound("video not found".to_string()))?;
        access::require_view(facts, viewer, &video).await?;
        Ok(video)
    }

    /// Manifest key and gateway URL for an authorized viewer
    pub async fn manifest_location(
        &self,
        facts: &dyn AccessFacts,
        viewer: &Viewer,
        video_id: Uuid,
    ) -> Result<ManifestKeyResponse> {
        let video = self.authorize(facts, viewer, video_id).await?;
        let key = ready_manifest_key(&video)?;
        Ok(ManifestKeyResponse {
            hls_manifest_key: key.to_string(),
            stream_url: format!("{}/{}", self.stream_base(video.id), key),
        })
    }

    /// Top-level playlist, rewritten
    pub async fn get_manifest(
        &self,
        facts: &dyn AccessFacts,
        viewer: &Viewer,
        video_id: Uuid,
    ) -> Result<StreamedObject> {
        let result = async {
            let video = self.authorize(facts, viewer, video_id).await?;
            let key = ready_manifest_key(&video)?.to_string();
            let creds = self.vault.resolve_for_video(&self.pool, &video).await?;
            self.fetch_for_video(&video, &creds, &key).await
        }
        .await;
        record_outcome("manifest", &result);
        result
    }

    /// Any object under the video's output prefix: variant playlists
    /// (rewritten), segments, keys, subtitles
    pub async fn get_object(
        &self,
        facts: &dyn AccessFacts,
        viewer: &Viewer,
        video_id: Uuid,
        requested_key: &str,
    ) -> Result<StreamedObject> {
        let kind = if is_playlist(requested_key) {
            "manifest"
        } else {
            "segment"
        };

        let result = async {
            let video = self.authorize(facts, viewer, video_id).await?;
            let key = resolve_requested_key(&video.output_key_prefix, requested_key)
                .ok_or_else(|| {
                    debug!(video_id = %video.id, requested_key, "key outside output prefix");
                    AppError::NotFound("object not found".to_string())
                })?;
            ready_manifest_key(&video)?;
            let creds = self.vault.resolve_for_video(&self.pool, &video).await?;
            self.fetch_for_video(&video, &creds, &key).await
        }
        .await;
        record_outcome(kind, &result);
        result
    }

    /// Fetch `key` from storage with already-resolved credentials
    pub(crate) async fn fetch_for_video(
        &self,
        video: &Video,
        creds: &StorageCredentials,
        key: &str,
    ) -> Result<StreamedObject> {
        let url = self
            .store
            .presign_get(creds, key, self.config.presigned_get_ttl)
            .await?;

        let started = Instant::now();
        let http = self.http.clone();
        let fetched = with_retry_if(
            self.retry.clone(),
            || {
                let http = http.clone();
                let url = url.clone();
                async move { get_object(&http, &url).await }
            },
            UpstreamError::is_transient,
        )
        .await;
        metrics::observe_upstream("object_storage", "get", started.elapsed());

        let response = fetched.map_err(|e| upstream_error(video, key, e.into_inner()))?;
        let content_type = content_type_for(key);

        if is_playlist(key) {
            let playlist = response
                .text()
                .await
                .map_err(|e| {
                    AppError::Storage(format!("failed to read playlist: {}", e.without_url()))
                })?;
            let stream_base = self.stream_base(video.id);
            let rewritten = ManifestRewriter::new(key, &stream_base).rewrite(&playlist);
            debug!(video_id = %video.id, key, "playlist rewritten");

            return Ok(StreamedObject {
                key: key.to_string(),
                content_type,
                cache_control: "private, no-store".to_string(),
                content_length: Some(rewritten.len() as u64),
                body: StreamBody::Full(Bytes::from(rewritten)),
            });
        }

        Ok(StreamedObject {
            key: key.to_string(),
            content_type,
            cache_control: format!("private, max-age={}", self.config.segment_max_age_secs),
            content_length: response.content_length(),
            body: StreamBody::Stream(
                response
                    .bytes_stream()
                    .map(|chunk| chunk.map_err(reqwest::Error::without_url))
                    .boxed(),
            ),
        })
    }
}

/// Manifest key of a COMPLETED video; NotReady with the reason otherwise
pub fn ready_manifest_key(video: &Video) -> Result<&str> {
    if let Some(key) = video.ready_manifest() {
        return Ok(key);
    }
    let message = match video.status() {
        TranscodingStatus::Pending => "upload has not been completed yet".to_string(),
        TranscodingStatus::Processing => "video is still transcoding".to_string(),
        TranscodingStatus::Failed => format!(
            "transcoding failed: {}",
            video.failure_reason.as_deref().unwrap_or("unknown reason")
        ),
        TranscodingStatus::Completed => "manifest is missing".to_string(),
    };
    Err(AppError::NotReady(message))
}

async fn get_object(
    http: &reqwest::Client,
    url: &str,
) -> std::result::Result<reqwest::Response, UpstreamError> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| UpstreamError::Transient(e.without_url().to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status.as_u16() {
        404 => Err(UpstreamError::Missing),
        401 | 403 => Err(UpstreamError::Rejected(status.as_u16())),
        429 => Err(UpstreamError::Transient(status.to_string())),
        s if s >= 500 => Err(UpstreamError::Transient(status.to_string())),
        _ => Err(UpstreamError::Failed(status.to_string())),
    }
}

fn upstream_error(video: &Video, key: &str, err: UpstreamError) -> AppError {
    match err {
        UpstreamError::Missing => {
            warn!(video_id = %video.id, key, "object missing in storage");
            AppError::NotReady("requested rendition is not available".to_string())
        }
        UpstreamError::Rejected(status) => {
            error!(
                video_id = %video.id,
                key,
                status,
                "storage rejected resolved credentials"
            );
            metrics::CREDENTIAL_FAULTS
                .with_label_values(&["storage_auth"])
                .inc();
            AppError::CredentialCorrupted(format!("storage returned {status} for {key}"))
        }
        other => {
            warn!(video_id = %video.id, key, error = %other, "storage read failed");
            AppError::Storage(other.to_string())
        }
    }
}

fn record_outcome(kind: &str, result: &Result<StreamedObject>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::STREAM_REQUESTS
        .with_label_values(&[kind, outcome])
        .inc();
}
