/// Transcode job API client
///
/// The transcoding engine is an external, asynchronous job service:
///
/// - `POST {base}/jobs` with `{inputKey, outputPrefix, roleArn, bucket, region,
///   manifestName, clientReference}` returns `{jobId}`
/// - `GET {base}/jobs/{jobId}` returns `{state, outputManifestKey?, failureReason?}`
///
/// Submissions carry the video id as an `Idempotency-Key` header; the job API
/// returns the existing job for a key it has already accepted.
///
/// Errors are split into transient (network, 429, 5xx) and permanent (every
/// other 4xx, malformed responses) so callers can retry only the former. A
/// submission that timed out may have been accepted, so only a failure to
/// connect counts as transient for it.
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::TranscodeConfig;
use crate::metrics;

/// Job state as reported by the job API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Submitted,
    Progressing,
    Complete,
    Error,
    Canceled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Canceled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub state: JobState,
    #[serde(default)]
    pub output_manifest_key: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Everything the job API needs to transcode one upload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmission {
    pub input_key: String,
    pub output_prefix: String,
    pub role_arn: String,
    pub bucket: String,
    pub region: String,
    pub manifest_name: String,
    /// Video id, echoed back by the job API for correlation
    pub client_reference: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum JobApiError {
    #[error("transient job API error: {0}")]
    Transient(String),

    #[error("job API rejected request: {0}")]
    Permanent(String),
}

impl JobApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

#[async_trait]
pub trait TranscodeJobClient: Send + Sync {
    async fn submit_job(&self, job: &JobSubmission) -> Result<String, JobApiError>;

    async fn get_job_status(&self, job_id: &str) -> Result<JobStatus, JobApiError>;
}

/// HTTP client for the job API
pub struct HttpJobClient {
    base_url: String,
    api_token: Option<String>,
    http_client: reqwest::Client,
}

impl HttpJobClient {
    pub fn new(config: &TranscodeConfig) -> Result<Self, JobApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| JobApiError::Permanent(format!("HTTP client error: {e}")))?;

        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            http_client,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// `replay_safe` is false when the request may have reached the job API and
/// repeating it could start a second job.
fn classify_send_error(e: reqwest::Error, replay_safe: bool) -> JobApiError {
    let e = e.without_url();
    if e.is_connect() || (replay_safe && (e.is_timeout() || e.is_request())) {
        JobApiError::Transient(format!("Job API request failed: {e}"))
    } else {
        JobApiError::Permanent(format!("Job API request failed: {e}"))
    }
}

async fn classify_status(response: reqwest::Response) -> JobApiError {
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        JobApiError::Transient(format!("{}: {}", status, error_text))
    } else {
        JobApiError::Permanent(format!("{}: {}", status, error_text))
    }
}

#[async_trait]
impl TranscodeJobClient for HttpJobClient {
    async fn submit_job(&self, job: &JobSubmission) -> Result<String, JobApiError> {
        let url = format!("{}/jobs", self.base_url);
        let started = Instant::now();

        info!(
            video_id = %job.client_reference,
            input_key = %job.input_key,
            output_prefix = %job.output_prefix,
            "Submitting transcode job"
        );

        let response = self
            .authorize(self.http_client.post(&url))
            .header(IDEMPOTENCY_KEY_HEADER, job.client_reference.to_string())
            .json(job)
            .send()
            .await
            .map_err(|e| classify_send_error(e, false))?;
        metrics::observe_upstream("job_api", "submit_job", started.elapsed());

        if !response.status().is_success() {
            let err = classify_status(response).await;
            error!(video_id = %job.client_reference, error = %err, "Transcode job submission failed");
            return Err(err);
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct JobResponse {
            job_id: String,
        }

        let job_response: JobResponse = response
            .json()
            .await
            .map_err(|e| JobApiError::Permanent(format!("Failed to parse job response: {e}")))?;

        if job_response.job_id.trim().is_empty() {
            return Err(JobApiError::Permanent("job API returned an empty job id".into()));
        }

        info!(
            video_id = %job.client_reference,
            job_id = %job_response.job_id,
            "Transcode job created"
        );
        Ok(job_response.job_id)
    }

    async fn get_job_status(&self, job_id: &str) -> Result<JobStatus, JobApiError> {
        let url = format!("{}/jobs/{}", self.base_url, job_id);
        let started = Instant::now();

        let response = self
            .authorize(self.http_client.get(&url))
            .send()
            .await
            .map_err(|e| classify_send_error(e, true))?;
        metrics::observe_upstream("job_api", "get_job_status", started.elapsed());

        if !response.status().is_success() {
            return Err(classify_status(response).await);
        }

        response
            .json::<JobStatus>()
            .await
            .map_err(|e| JobApiError::Permanent(format!("Failed to parse job status: {e}")))
    }
}
