//! Error types for the discovery feed engine
//!
//! - `thiserror` for the error hierarchy
//! - configuration errors are fatal at startup, request errors map to 4xx
//! - HTTP status code mapping for API responses
//!
//! Ranking itself never fails: items with unusable data are dropped one by
//! one, and an empty page is a valid outcome.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::borrow::Cow;
use thiserror::Error;

/// Result type alias for feed engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the feed engine
#[derive(Debug, Error)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Configuration error: {message}")]
    Config {
        message: Cow<'static, str>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Missing required environment variable: {var}")]
    MissingEnvVar { var: &'static str },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig {
        key: &'static str,
        message: Cow<'static, str>,
    },

    // ========================================================================
    // Candidate Store Errors
    // ========================================================================
    #[error("Database error: {message}")]
    Database {
        message: Cow<'static, str>,
        #[source]
        source: Option<sqlx::Error>,
    },

    #[error("Database connection pool exhausted")]
    PoolExhausted,

    // ========================================================================
    // Request Errors
    // ========================================================================
    #[error("Bad request: {message}")]
    BadRequest { message: Cow<'static, str> },

    #[error("Invalid {pool} cursor: {message}")]
    InvalidCursor {
        pool: &'static str,
        message: Cow<'static, str>,
    },

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create an invalid cursor error for the named pool
    pub fn invalid_cursor(pool: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidCursor {
            pool,
            message: message.into(),
        }
    }

    // ========================================================================
    // Error Classification
    // ========================================================================

    /// Returns true if the caller may retry the request
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Database { .. } | Error::PoolExhausted)
    }

    /// Returns true if this error should be logged at error level
    pub fn is_error_level(&self) -> bool {
        matches!(self, Error::Database { .. } | Error::Other(_))
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } | Error::InvalidCursor { .. } => StatusCode::BAD_REQUEST,
            Error::PoolExhausted => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } | Error::MissingEnvVar { .. } | Error::InvalidConfig { .. } => {
                "CONFIG_ERROR"
            }
            Error::Database { .. } | Error::PoolExhausted => "DATABASE_ERROR",
            Error::BadRequest { .. } => "BAD_REQUEST",
            Error::InvalidCursor { .. } => "INVALID_CURSOR",
            Error::Json(_) => "SERIALIZATION_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }
}

// ============================================================================
// Error Response for API
// ============================================================================

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Don't expose internal error details
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let retry_after = if self.is_retryable() { Some(1) } else { None };

        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message,
                retry_after,
            },
        };

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// From implementations for external error types
// ============================================================================

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => Error::PoolExhausted,
            sqlx::Error::Database(db_err) => Error::Database {
                message: db_err.message().to_string().into(),
                source: Some(err),
            },
            _ => Error::Database {
                message: err.to_string().into(),
                source: Some(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(Error::PoolExhausted.is_retryable());
        assert!(!Error::bad_request("limit must be positive").is_retryable());
        assert!(!Error::invalid_cursor("units", "not hex").is_retryable());
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            Error::invalid_cursor("collections", "bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::bad_request("invalid").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::PoolExhausted.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::from(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::InvalidConfig {
                key: "FEED_INTERLEAVE_PATTERN",
                message: "empty".into()
            }
            .error_code(),
            "CONFIG_ERROR"
        );
        assert_eq!(
            Error::invalid_cursor("units", "bad").error_code(),
            "INVALID_CURSOR"
        );
    }

    #[test]
    fn test_invalid_cursor_message_names_pool() {
        let err = Error::invalid_cursor("units", "odd number of digits");
        assert_eq!(err.to_string(), "Invalid units cursor: odd number of digits");
    }

    #[test]
    fn test_pool_timeout_maps_to_retryable_unavailable() {
        let err = Error::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, Error::PoolExhausted));
        assert!(err.is_retryable());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
    }

    #[test]
    fn test_other_sqlx_errors_are_database_errors() {
        let err = Error::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, Error::Database { source: Some(_), .. }));
        assert!(err.is_error_level());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_internal_details_masked_in_response() {
        let response = Error::from(anyhow::anyhow!("secret connection string")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], "An internal error occurred");
        assert!(body["error"].get("retry_after").is_none());
    }
}
