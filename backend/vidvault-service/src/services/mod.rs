//! Service layer
//!
//! - **vault** - credential sealing and resolution
//! - **upload** - presigned upload issuance
//! - **transcode** - job submission and status tracking
//! - **access** - view/manage decisions
//! - **streaming** - authenticated manifest and segment proxy
//! - **videos** / **credentials** - owner-facing management

pub mod access;
pub mod credentials;
pub mod storage;
pub mod streaming;
pub mod transcode;
pub mod upload;
pub mod vault;
pub mod videos;

pub use access::{AccessFacts, PgAccessFacts, Viewer};
pub use storage::{ObjectStore, S3ObjectStore};
pub use streaming::StreamingGateway;
pub use transcode::TranscodeOrchestrator;
pub use upload::UploadAuthorizer;
pub use vault::CredentialVault;
pub use videos::VideoManager;
