/// S3-compatible implementation of [`ObjectStore`]
///
/// A client is built per call from the caller's credentials. Custom
/// endpoints (MinIO, R2, ...) use path-style addressing.
use std::time::{Duration, Instant};

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use tracing::{debug, warn};

use super::ObjectStore;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::StorageCredentials;

const CREDENTIALS_PROVIDER_NAME: &str = "vidvault_vault";
/// S3 DeleteObjects accepts at most 1000 keys per call
const DELETE_BATCH: usize = 1000;

#[derive(Debug, Clone, Default)]
pub struct S3ObjectStore;

impl S3ObjectStore {
    pub fn new() -> Self {
        Self
    }
}

/// Build an S3 client bound to one set of resolved credentials. Nothing is
/// read from the environment or the shared AWS profile.
pub fn client_for(creds: &StorageCredentials) -> Client {
    let credentials = Credentials::new(
        &creds.access_key_id,
        &creds.secret_access_key,
        None, // No session token
        None, // No expiration
        CREDENTIALS_PROVIDER_NAME,
    );

    let mut builder = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(creds.region.clone()))
        .credentials_provider(credentials);
    if let Some(endpoint) = &creds.endpoint {
        builder = builder.endpoint_url(endpoint).force_path_style(true);
    }

    Client::from_conf(builder.build())
}

fn presigning(ttl: Duration) -> Result<PresigningConfig> {
    PresigningConfig::builder()
        .expires_in(ttl)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to create presigning config: {e}")))
}

/// Storage rejecting the credentials themselves is a credential fault, not a
/// generic storage outage
fn classify(operation: &str, code: Option<&str>, message: String) -> AppError {
    match code {
        Some("AccessDenied")
        | Some("InvalidAccessKeyId")
        | Some("SignatureDoesNotMatch")
        | Some("ExpiredToken")
        | Some("InvalidToken") => {
            metrics::CREDENTIAL_FAULTS
                .with_label_values(&["storage_auth"])
                .inc();
            AppError::CredentialCorrupted(format!("{operation} rejected by storage: {message}"))
        }
        _ => AppError::Storage(format!("{operation} failed: {message}")),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn presign_put(
        &self,
        creds: &StorageCredentials,
        key: &str,
        content_type: &str,
        content_length: i64,
        ttl: Duration,
    ) -> Result<String> {
        let client = client_for(creds);
        let started = Instant::now();

        let presigned_request = client
            .put_object()
            .bucket(&creds.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(content_length)
            .presigned(presigning(ttl)?)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to presign upload: {e}")))?;

        metrics::observe_upstream("s3", "presign_put", started.elapsed());
        debug!(bucket = %creds.bucket, key, "presigned upload url issued");
        Ok(presigned_request.uri().to_string())
    }

    async fn presign_get(
        &self,
        creds: &StorageCredentials,
        key: &str,
        ttl: Duration,
    ) -> Result<String> {
        let client = client_for(creds);

        let presigned_request = client
            .get_object()
            .bucket(&creds.bucket)
            .key(key)
            .presigned(presigning(ttl)?)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to presign read: {e}")))?;

        Ok(presigned_request.uri().to_string())
    }

    async fn delete_prefix(&self, creds: &StorageCredentials, prefix: &str) -> Result<usize> {
        let client = client_for(creds);
        let started = Instant::now();
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = client
                .list_objects_v2()
                .bucket(&creds.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| classify("ListObjectsV2", e.code(), e.to_string()))?;

            keys.extend(page.contents().iter().filter_map(|o| o.key().map(str::to_string)));

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        let mut deleted = 0;
        for chunk in keys.chunks(DELETE_BATCH) {
            let objects = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AppError::Internal(format!("Invalid object key: {e}")))?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| AppError::Internal(format!("Invalid delete request: {e}")))?;

            let output = client
                .delete_objects()
                .bucket(&creds.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| classify("DeleteObjects", e.code(), e.to_string()))?;

            let failed = output.errors().len();
            if failed > 0 {
                warn!(prefix, failed, "some objects could not be deleted");
            }
            deleted += chunk.len() - failed;
        }

        metrics::observe_upstream("s3", "delete_prefix", started.elapsed());
        Ok(deleted)
    }
}
