//! # Verification Route
//!
//! `POST /v1/verify` checks a receipt against this node's public key.
//!
//! A receipt that fails verification is a `200` with `valid: false`; only
//! a body that cannot be read as a receipt at all is a client error.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use attestgrid_node::VerificationReport;

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/verify", post(verify))
}

/// Body of `POST /v1/verify`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// The receipt as issued. Fields outside the signed payload are ignored.
    pub receipt: Value,
}

async fn verify(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerificationReport>, AppError> {
    let request = extract_json(body)?;
    let node = state.node.clone();
    let public_key = tokio::task::spawn_blocking(move || node.public_key()).await??;

    let report = state.verifier.verify_value(&request.receipt, &public_key)?;
    state.stats.record_verification();
    Ok(Json(report))
}
