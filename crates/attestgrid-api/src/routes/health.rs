//! Liveness probe. Deliberately touches neither the store nor the key.

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health/liveness", get(liveness))
}

async fn liveness() -> &'static str {
    "ok"
}
