//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps node, store and key errors to HTTP status codes with a JSON body
//! of the form `{"error": {"code", "message"}}`. Internal error details
//! are logged and never returned to the client.
//!
//! Semantic outcomes are not errors: a validator rejection and a failed
//! signature check are both `200 OK` responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use attestgrid_crypto::CryptoError;
use attestgrid_node::{AttestError, StoreError, VerifyError};

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request is well-formed JSON but semantically unusable (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => {
                tracing::error!(error = %self, "internal server error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<AttestError> for AppError {
    fn from(err: AttestError) -> Self {
        match err {
            AttestError::InvalidTaskId | AttestError::Canonicalization(_) => {
                Self::Validation(err.to_string())
            }
            AttestError::KeyUnavailable(_)
            | AttestError::Execution(_)
            | AttestError::StoreRead(_)
            | AttestError::StoreWrite(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<VerifyError> for AppError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::MalformedReceipt(_) => Self::BadRequest(err.to_string()),
            VerifyError::Canonicalization(_) => Self::Validation(err.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<CryptoError> for AppError {
    fn from(err: CryptoError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                AppError::Validation("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
            ),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code));
        }
    }

    #[test]
    fn attest_error_mapping() {
        assert!(matches!(
            AppError::from(AttestError::InvalidTaskId),
            AppError::Validation(_)
        ));
        assert!(matches!(
            AppError::from(AttestError::Execution("boom".into())),
            AppError::Internal(_)
        ));
        assert!(matches!(
            AppError::from(AttestError::KeyUnavailable(CryptoError::KeyUnavailable(
                "ro".into()
            ))),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn malformed_receipt_is_bad_request() {
        let err = AppError::from(VerifyError::MalformedReceipt("missing field".into()));
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn internal_message_is_withheld() {
        let response = AppError::Internal("/secret/path unreadable".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert!(!body.error.message.contains("/secret/path"));
    }
}
