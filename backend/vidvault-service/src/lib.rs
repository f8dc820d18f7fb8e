//! Vidvault Service
//!
//! Video ingestion into owner-supplied object storage, transcode
//! orchestration, access control and authenticated HLS streaming.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod services;

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result};
pub use handlers::AppState;
