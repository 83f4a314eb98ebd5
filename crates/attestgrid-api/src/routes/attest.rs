//! # Attestation Routes
//!
//! - `POST /v1/attest`              — Issue (or return the stored) receipt for a task
//! - `GET  /v1/receipts/{task_id}`  — Fetch a stored receipt
//!
//! The HTTP task is a passthrough: the output is the input, checked
//! against the built-in `required_keys` / `max_len` rules. A rejected
//! output still produces a signed receipt with `validator.passed == false`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use attestgrid_core::Receipt;
use attestgrid_node::passthrough_task;

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/attest", post(attest))
        .route("/v1/receipts/{task_id}", get(get_receipt))
}

/// Body of `POST /v1/attest`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AttestRequest {
    pub task_id: String,
    pub input: Value,
    /// Validator rules. Absent means no rules.
    #[serde(default = "empty_rules")]
    pub rules: Value,
}

fn empty_rules() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Response of `POST /v1/attest`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AttestResponse {
    pub receipt: Receipt,
    /// The receipt was already stored; the task did not run again.
    pub cached: bool,
    /// The stored receipt was issued for a different input or rule set.
    pub input_conflict: bool,
}

async fn attest(
    State(state): State<AppState>,
    body: Result<Json<AttestRequest>, JsonRejection>,
) -> Result<Json<AttestResponse>, AppError> {
    let request = extract_json(body)?;
    let node = state.node.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        node.attest_detailed(
            &request.task_id,
            &request.input,
            &request.rules,
            passthrough_task,
        )
    })
    .await??;

    Ok(Json(AttestResponse {
        receipt: outcome.receipt,
        cached: outcome.cached,
        input_conflict: outcome.input_conflict,
    }))
}

async fn get_receipt(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Receipt>, AppError> {
    let store = state.node.store().clone();
    let lookup = task_id.clone();
    let found = tokio::task::spawn_blocking(move || store.get(&lookup)).await??;
    found
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no receipt for task {task_id}")))
}
