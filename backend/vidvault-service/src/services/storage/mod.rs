/// Object storage seam
///
/// Every operation takes the per-request [`StorageCredentials`] resolved by
/// the vault; implementations hold no credentials of their own.
pub mod s3;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::StorageCredentials;

pub use s3::S3ObjectStore;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Presigned PUT scoped to exactly `key`, `content_type` and `content_length`
    async fn presign_put(
        &self,
        creds: &StorageCredentials,
        key: &str,
        content_type: &str,
        content_length: i64,
        ttl: Duration,
    ) -> Result<String>;

    /// Presigned GET for a single object
    async fn presign_get(
        &self,
        creds: &StorageCredentials,
        key: &str,
        ttl: Duration,
    ) -> Result<String>;

    /// Remove every object under `prefix`, returning how many were deleted
    async fn delete_prefix(&self, creds: &StorageCredentials, prefix: &str) -> Result<usize>;
}
