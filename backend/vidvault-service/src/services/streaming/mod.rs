//! Authenticated HLS streaming
//!
//! - **gateway.rs** - access check, credential resolution, proxied storage reads
//! - **manifest.rs** - playlist rewriting and object key handling

pub mod gateway;
pub mod manifest;

// Re-export commonly used types
pub use gateway::{ready_manifest_key, StreamBody, StreamedObject, StreamingGateway};
pub use manifest::ManifestRewriter;
