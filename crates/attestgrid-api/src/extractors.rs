//! Request body extraction.
//!
//! Handlers take `Result<Json<T>, JsonRejection>` so that a malformed body
//! produces the structured [`AppError`] body instead of axum's plain-text
//! rejection.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Unwrap a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(value)| value)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}
