//! # Node Routes
//!
//! - `GET /v1/node/public-key` — The key receipts from this node verify against
//! - `GET /v1/stats`           — Transparency statistics

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use attestgrid_node::Stats;

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/node/public-key", get(public_key))
        .route("/v1/stats", get(stats))
}

/// Response of `GET /v1/node/public-key`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicKeyResponse {
    pub node_id: String,
    /// Lowercase hex of the 32-byte Ed25519 public key.
    pub public_key_hex: String,
    /// Which Ed25519 implementation signs on this node.
    pub backend: String,
}

async fn public_key(State(state): State<AppState>) -> Result<Json<PublicKeyResponse>, AppError> {
    let node = state.node.clone();
    let key = tokio::task::spawn_blocking(move || node.public_key()).await??;
    Ok(Json(PublicKeyResponse {
        node_id: state.node.node_id().to_string(),
        public_key_hex: key.to_hex(),
        backend: state.node.keys().backend_kind().to_string(),
    }))
}

async fn stats(State(state): State<AppState>) -> Result<Json<Stats>, AppError> {
    let aggregator = state.stats.clone();
    let snapshot = tokio::task::spawn_blocking(move || aggregator.snapshot()).await??;
    Ok(Json(snapshot))
}
