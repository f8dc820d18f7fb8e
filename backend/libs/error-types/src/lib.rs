//! Shared error envelope for Vidvault HTTP services.
//!
//! Every error leaving a service is rendered as an [`ErrorResponse`] so that
//! clients can branch on the stable `code` instead of parsing messages.
use serde::{Deserialize, Serialize};

/// Unified API error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short status text, e.g. "Not Found"
    pub error: String,

    /// Human readable message
    pub message: String,

    /// HTTP status code
    pub status: u16,

    /// Error category used by clients for routing:
    /// - "validation_error"
    /// - "authentication_error"
    /// - "authorization_error"
    /// - "not_found_error"
    /// - "configuration_error"
    /// - "not_ready_error"
    /// - "server_error"
    /// - "service_unavailable_error"
    pub error_type: String,

    /// Stable machine-readable code, see [`error_codes`]
    pub code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            status,
            error_type: error_type.to_string(),
            code: code.to_string(),
            details: None,
            trace_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }
}

/// Stable error codes shared by all services
pub mod error_codes {
    // Input
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";

    // Identity
    pub const TOKEN_INVALID: &str = "TOKEN_INVALID";
    pub const TOKEN_MISSING: &str = "TOKEN_MISSING";

    // Authorization
    pub const ACCESS_FORBIDDEN: &str = "ACCESS_FORBIDDEN";

    // Videos
    pub const VIDEO_NOT_FOUND: &str = "VIDEO_NOT_FOUND";
    pub const VIDEO_NOT_READY: &str = "VIDEO_NOT_READY";
    pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";

    // Storage
    pub const STORAGE_NOT_CONFIGURED: &str = "STORAGE_NOT_CONFIGURED";
    pub const STORAGE_CREDENTIALS_UNAVAILABLE: &str = "STORAGE_CREDENTIALS_UNAVAILABLE";
    pub const STORAGE_UNAVAILABLE: &str = "STORAGE_UNAVAILABLE";

    // Transcoding
    pub const TRANSCODE_JOB_ERROR: &str = "TRANSCODE_JOB_ERROR";

    // Server
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_fields_are_omitted() {
        let body = ErrorResponse::new(
            "Not Found",
            "video not found",
            404,
            "not_found_error",
            error_codes::VIDEO_NOT_FOUND,
        );
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["code"], "VIDEO_NOT_FOUND");
        assert_eq!(json["status"], 404);
        assert!(json.get("details").is_none());
        assert!(json.get("trace_id").is_none());
    }

    #[test]
    fn details_and_trace_id_are_attached() {
        let body = ErrorResponse::new("Bad Request", "bad", 400, "validation_error", "X")
            .with_details("fileSize".into())
            .with_trace_id("abc".into());

        assert_eq!(body.details.as_deref(), Some("fileSize"));
        assert_eq!(body.trace_id.as_deref(), Some("abc"));
    }
}
