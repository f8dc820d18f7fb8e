/// Transcode Orchestrator
///
/// Drives `transcoding_status` through PENDING -> PROCESSING -> {COMPLETED,
/// FAILED}. Every transition is a compare-and-set in the store, so duplicate
/// `complete-upload` calls, webhook retries and the poller can all race
/// without double-submitting or regressing a terminal state.
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use resilience::{presets, with_retry_if, RetryError};
use sqlx::PgPool;
use tracing::{error, info, warn};

use super::job_client::{JobApiError, JobState, JobStatus, JobSubmission, TranscodeJobClient};
use crate::db::video_repo;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::middleware::AuthUser;
use crate::models::{CompleteUploadRequest, TranscodingStatus, Video};
use crate::services::access::{self, AccessFacts};
use crate::services::vault::CredentialVault;

const STALE_PENDING_REASON: &str = "upload never completed";
const ORPHANED_PROCESSING_REASON: &str = "transcode job was never submitted";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollSummary {
    pub checked: usize,
    pub completed: usize,
    pub failed: usize,
    pub still_running: usize,
    pub errors: usize,
}

pub struct TranscodeOrchestrator {
    pool: PgPool,
    vault: Arc<CredentialVault>,
    jobs: Arc<dyn TranscodeJobClient>,
    manifest_file_name: String,
    retry: resilience::RetryConfig,
}

impl TranscodeOrchestrator {
    pub fn new(
        pool: PgPool,
        vault: Arc<CredentialVault>,
        jobs: Arc<dyn TranscodeJobClient>,
        manifest_file_name: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            vault,
            jobs,
            manifest_file_name: manifest_file_name.into(),
            retry: presets::job_api_retry(),
        }
    }

    pub fn with_retry(mut self, retry: resilience::RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Start transcoding an uploaded video.
    ///
    /// Returns the status after the call. A video that already left PENDING
    /// is acknowledged without side effects.
    pub async fn complete_upload(
        &self,
        facts: &dyn AccessFacts,
        actor: &AuthUser,
        request: &CompleteUploadRequest,
    ) -> Result<TranscodingStatus> {
        let video = video_repo::get_video(&self.pool, request.video_id)
            .await?
            .ok_or_else(|| AppError::NotFound("video not found".to_string()))?;

        access::require_manage(facts, actor, &video).await?;

        if request.original_key != video.original_key
            || request.output_key_prefix != video.output_key_prefix
        {
            return Err(AppError::Validation(
                "originalKey and outputKeyPrefix must match the keys issued for this video"
                    .to_string(),
            ));
        }

        if video.status() != TranscodingStatus::Pending {
            info!(
                video_id = %video.id,
                status = video.status().as_str(),
                "complete-upload repeated; nothing to do"
            );
            return Ok(video.status());
        }

        // Resolve before claiming so a credential problem leaves the video PENDING
        let creds = self.vault.resolve_for_video(&self.pool, &video).await?;

        let Some(claimed) = video_repo::claim_for_transcoding(&self.pool, video.id).await? else {
            let current = video_repo::get_video(&self.pool, video.id)
                .await?
                .map(|v| v.status())
                .unwrap_or(TranscodingStatus::Processing);
            info!(video_id = %video.id, "lost race to start transcoding; acknowledging");
            return Ok(current);
        };
        metrics::TRANSCODE_TRANSITIONS
            .with_label_values(&["PROCESSING", "complete_upload"])
            .inc();

        let submission = JobSubmission {
            input_key: claimed.original_key.clone(),
            output_prefix: claimed.output_key_prefix.clone(),
            role_arn: creds.role_arn.clone(),
            bucket: creds.bucket.clone(),
            region: creds.region.clone(),
            manifest_name: self.manifest_file_name.clone(),
            client_reference: claimed.id,
        };
        drop(creds);

        let jobs = self.jobs.clone();
        let submitted = with_retry_if(
            self.retry.clone(),
            || {
                let jobs = jobs.clone();
                let submission = submission.clone();
                async move { jobs.submit_job(&submission).await }
            },
            JobApiError::is_transient,
        )
        .await;

        match submitted {
            Ok(job_id) => {
                if !video_repo::record_job_id(&self.pool, claimed.id, &job_id).await? {
                    // The row left PROCESSING before the id landed, so it was
                    // reaped. A webhook can also beat this write for a fast
                    // job; it gets a 404 and the poller converges the video
                    // once the id is stored.
                    warn!(video_id = %claimed.id, job_id = %job_id, "video left PROCESSING before job id was recorded");
                }
                info!(video_id = %claimed.id, job_id = %job_id, "transcoding started");
                Ok(TranscodingStatus::Processing)
            }
            Err(e) => {
                let reason = submission_failure_reason(&e);
                error!(video_id = %claimed.id, reason = %reason, "transcode job submission failed");
                if video_repo::mark_failed(
                    &self.pool,
                    claimed.id,
                    TranscodingStatus::Processing,
                    &reason,
                )
                .await?
                .is_some()
                {
                    metrics::TRANSCODE_TRANSITIONS
                        .with_label_values(&["FAILED", "complete_upload"])
                        .inc();
                }
                Err(AppError::TranscodeJob(reason))
            }
        }
    }

    /// Apply a job status report to its video. Non-terminal states and
    /// reports for videos no longer PROCESSING are ignored.
    pub async fn apply_job_status(
        &self,
        video: &Video,
        status: &JobStatus,
        source: &str,
    ) -> Result<Option<Video>> {
        let updated = match status.state {
            JobState::Submitted | JobState::Progressing => return Ok(None),
            JobState::Complete => {
                let manifest_key = resolve_manifest_key(
                    &video.output_key_prefix,
                    status.output_manifest_key.as_deref(),
                    &self.manifest_file_name,
                );
                video_repo::mark_completed(&self.pool, video.id, &manifest_key).await?
            }
            JobState::Error | JobState::Canceled => {
                let reason = job_failure_reason(status);
                video_repo::mark_failed(
                    &self.pool,
                    video.id,
                    TranscodingStatus::Processing,
                    &reason,
                )
                .await?
            }
        };

        match &updated {
            Some(v) => {
                info!(
                    video_id = %v.id,
                    status = v.transcoding_status.as_str(),
                    source,
                    "transcoding finished"
                );
                metrics::TRANSCODE_TRANSITIONS
                    .with_label_values(&[v.transcoding_status.as_str(), source])
                    .inc();
            }
            None => info!(
                video_id = %video.id,
                source,
                "job report ignored; video not PROCESSING"
            ),
        }
        Ok(updated)
    }

    /// Webhook entry point
    pub async fn handle_job_event(&self, job_id: &str, status: &JobStatus) -> Result<Option<Video>> {
        let video = video_repo::find_by_job_id(&self.pool, job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no video for job {}", job_id)))?;
        self.apply_job_status(&video, status, "webhook").await
    }

    /// Poll the job API once for every PROCESSING video with a job id
    pub async fn poll_once(&self, batch_size: i64) -> Result<PollSummary> {
        let videos = video_repo::list_processing_with_job(&self.pool, batch_size).await?;
        let mut summary = PollSummary::default();

        for video in videos {
            let Some(job_id) = video.transcode_job_id.clone() else {
                continue;
            };
            summary.checked += 1;

            let jobs = self.jobs.clone();
            let status = with_retry_if(
                self.retry.clone(),
                || {
                    let jobs = jobs.clone();
                    let job_id = job_id.clone();
                    async move { jobs.get_job_status(&job_id).await }
                },
                JobApiError::is_transient,
            )
            .await;

            let status = match status {
                Ok(status) => status,
                Err(e) => {
                    warn!(video_id = %video.id, job_id = %job_id, error = %e, "job status unavailable");
                    summary.errors += 1;
                    continue;
                }
            };

            match self.apply_job_status(&video, &status, "poller").await {
                Ok(Some(updated)) => match updated.status() {
                    TranscodingStatus::Completed => summary.completed += 1,
                    TranscodingStatus::Failed => summary.failed += 1,
                    _ => {}
                },
                Ok(None) => summary.still_running += 1,
                Err(e) => {
                    error!(video_id = %video.id, error = %e, "failed to apply job status");
                    summary.errors += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Fail uploads abandoned in PENDING and claims that never produced a job
    pub async fn reap_stale(&self, pending_ttl: Duration) -> Result<u64> {
        let ttl = chrono::Duration::from_std(pending_ttl)
            .map_err(|e| AppError::Internal(format!("invalid stale TTL: {e}")))?;
        let cutoff = Utc::now() - ttl;

        let pending = video_repo::fail_stale_pending(&self.pool, cutoff, STALE_PENDING_REASON).await?;
        let orphaned =
            video_repo::fail_orphaned_processing(&self.pool, cutoff, ORPHANED_PROCESSING_REASON)
                .await?;

        if pending + orphaned > 0 {
            info!(pending, orphaned, "reaped stale videos");
            metrics::TRANSCODE_TRANSITIONS
                .with_label_values(&["FAILED", "reaper"])
                .inc_by(pending + orphaned);
        }
        Ok(pending + orphaned)
    }
}

/// Manifest key for a completed job. A key reported under the output prefix
/// is used as is, a relative one is joined to the prefix, and a missing one
/// falls back to `{prefix}{manifest_name}`.
pub fn resolve_manifest_key(output_prefix: &str, reported: Option<&str>, manifest_name: &str) -> String {
    match reported.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) if key.starts_with(output_prefix) => key.to_string(),
        Some(key) => format!("{}{}", output_prefix, key.trim_start_matches('/')),
        None => format!("{}{}", output_prefix, manifest_name),
    }
}

fn job_failure_reason(status: &JobStatus) -> String {
    match status.failure_reason.as_deref().map(str::trim) {
        Some(reason) if !reason.is_empty() => reason.to_string(),
        _ => match status.state {
            JobState::Canceled => "transcode job was canceled".to_string(),
            _ => "transcode job failed without a reason".to_string(),
        },
    }
}

fn submission_failure_reason(err: &RetryError<JobApiError>) -> String {
    match err {
        RetryError::Exhausted { attempts, last } => {
            format!("transcode job submission failed after {} attempts: {}", attempts, last)
        }
        RetryError::Permanent(e) => format!("transcode job submission rejected: {}", e),
    }
}
