/// Error types for Vidvault
///
/// Every failure that reaches a handler is an [`AppError`]. Each variant maps to
/// one HTTP status and one stable code from `error_types::error_codes`, so the
/// player and dashboard can tell "not ready yet" from "access denied" from
/// "broken" without parsing messages.
use actix_web::{
    error::ResponseError,
    http::{header, StatusCode},
    HttpResponse,
};
use error_types::{error_codes, ErrorResponse};

/// Result type for vidvault-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Seconds a player should wait before asking again for a video still transcoding
pub const NOT_READY_RETRY_AFTER_SECS: u32 = 5;
/// Seconds to wait after a storage credential fault before retrying
pub const CREDENTIAL_RETRY_AFTER_SECS: u32 = 30;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad input: size or type limits, malformed fields
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is known to be able to see the resource but may not act on it
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Missing, or concealed because the caller may not view it
    #[error("Not found: {0}")]
    NotFound(String),

    /// No storage credentials for the actor or the team
    #[error("Storage not configured: {0}")]
    NotConfigured(String),

    /// Stored credentials cannot be decrypted or were rejected by storage
    #[error("Storage credentials unavailable: {0}")]
    CredentialCorrupted(String),

    /// Asset not transcoded yet, or transcoding failed
    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transcode job error: {0}")]
    TranscodeJob(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable kind, also used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::NotConfigured(_) => "not_configured",
            AppError::CredentialCorrupted(_) => "credential_corrupted",
            AppError::NotReady(_) => "not_ready",
            AppError::Storage(_) => "storage",
            AppError::TranscodeJob(_) => "transcode_job",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }

    /// Whether a client may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NotReady(_)
                | AppError::CredentialCorrupted(_)
                | AppError::Storage(_)
                | AppError::TranscodeJob(_)
        )
    }

    fn retry_after(&self) -> Option<u32> {
        match self {
            AppError::NotReady(_) => Some(NOT_READY_RETRY_AFTER_SECS),
            AppError::CredentialCorrupted(_) => Some(CREDENTIAL_RETRY_AFTER_SECS),
            _ => None,
        }
    }

    /// Message returned to the client. Operational faults never expose their
    /// internal detail; it stays in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::CredentialCorrupted(_) => {
                "Storage credentials could not be used. Please retry later.".to_string()
            }
            AppError::Storage(_) => {
                "Object storage is unavailable. Please retry later.".to_string()
            }
            AppError::TranscodeJob(_) => {
                "The transcoding service is unavailable. Please retry later.".to_string()
            }
            AppError::Database(_) | AppError::Internal(_) => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotConfigured(_) => StatusCode::PRECONDITION_FAILED,
            AppError::NotReady(_) => {
                StatusCode::from_u16(425).unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
            }
            AppError::CredentialCorrupted(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(_) | AppError::TranscodeJob(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let (error_type, code) = match self {
            AppError::Validation(_) => ("validation_error", error_codes::VALIDATION_ERROR),
            AppError::BadRequest(_) => ("validation_error", error_codes::INVALID_REQUEST),
            AppError::Unauthorized(_) => ("authentication_error", error_codes::TOKEN_INVALID),
            AppError::Forbidden(_) => ("authorization_error", error_codes::ACCESS_FORBIDDEN),
            AppError::NotFound(_) => ("not_found_error", error_codes::VIDEO_NOT_FOUND),
            AppError::NotConfigured(_) => {
                ("configuration_error", error_codes::STORAGE_NOT_CONFIGURED)
            }
            AppError::NotReady(_) => ("not_ready_error", error_codes::VIDEO_NOT_READY),
            AppError::CredentialCorrupted(_) => (
                "service_unavailable_error",
                error_codes::STORAGE_CREDENTIALS_UNAVAILABLE,
            ),
            AppError::Storage(_) => ("server_error", error_codes::STORAGE_UNAVAILABLE),
            AppError::TranscodeJob(_) => ("server_error", error_codes::TRANSCODE_JOB_ERROR),
            AppError::Database(_) => ("server_error", error_codes::DATABASE_ERROR),
            AppError::Internal(_) => ("server_error", error_codes::INTERNAL_SERVER_ERROR),
        };

        let response = ErrorResponse::new(
            status.canonical_reason().unwrap_or("Error"),
            &self.public_message(),
            status.as_u16(),
            error_type,
            code,
        );

        let mut builder = HttpResponse::build(status);
        if let Some(secs) = self.retry_after() {
            builder.insert_header((header::RETRY_AFTER, secs.to_string()));
        }
        builder.json(response)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<crypto_core::JwtError> for AppError {
    fn from(err: crypto_core::JwtError) -> Self {
        AppError::Unauthorized(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            AppError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotConfigured("x".into()).status_code(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(AppError::NotReady("x".into()).status_code().as_u16(), 425);
        assert_eq!(
            AppError::CredentialCorrupted("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Storage("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn retryable_errors_carry_retry_after() {
        let resp = AppError::NotReady("transcoding".into()).error_response();
        assert_eq!(
            resp.headers().get(header::RETRY_AFTER).unwrap(),
            &NOT_READY_RETRY_AFTER_SECS.to_string()
        );

        let resp = AppError::Forbidden("no".into()).error_response();
        assert!(resp.headers().get(header::RETRY_AFTER).is_none());
    }

    #[actix_rt::test]
    async fn credential_fault_detail_is_not_exposed() {
        let resp =
            AppError::CredentialCorrupted("aead tag mismatch for team:1234".into()).error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["code"], error_codes::STORAGE_CREDENTIALS_UNAVAILABLE);
        assert!(!json["message"].as_str().unwrap().contains("team:1234"));
    }

    #[actix_rt::test]
    async fn upstream_fault_detail_is_not_exposed() {
        let faults = [
            AppError::Storage("GET https://b.s3.amazonaws.com/k?X-Amz-Signature=abc failed".into()),
            AppError::TranscodeJob("POST https://jobs.internal/jobs returned 500".into()),
        ];
        for fault in faults {
            let code = fault.status_code();
            let body = to_bytes(fault.error_response().into_body()).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

            assert_eq!(json["status"], code.as_u16());
            let message = json["message"].as_str().unwrap();
            assert!(!message.contains("X-Amz-Signature"), "{message}");
            assert!(!message.contains("https://"), "{message}");
        }
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(AppError::NotReady(String::new()).kind(), "not_ready");
        assert!(AppError::NotReady(String::new()).is_retryable());
        assert!(!AppError::NotFound(String::new()).is_retryable());
    }
}
