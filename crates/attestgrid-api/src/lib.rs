//! # attestgrid-api — HTTP Service for AttestGrid
//!
//! Axum front end over an [`attestgrid_node::AttestationNode`]:
//!
//! | Method | Path                       | Purpose                              |
//! |--------|----------------------------|--------------------------------------|
//! | POST   | `/v1/attest`               | Issue or return a task's receipt     |
//! | GET    | `/v1/receipts/{task_id}`   | Fetch a stored receipt               |
//! | POST   | `/v1/verify`               | Verify a receipt against the node key|
//! | GET    | `/v1/node/public-key`      | Publish the node's public key        |
//! | GET    | `/v1/stats`                | Transparency statistics              |
//! | GET    | `/health/liveness`         | Liveness probe                       |
//!
//! Store and key access is blocking file I/O and runs on tokio's blocking
//! pool.

pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::{AppError, ErrorBody, ErrorDetail};
pub use state::{port_from_env, AppState, BootstrapError, DEFAULT_PORT};

/// Request bodies above this size are rejected with `413`.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::attest::router())
        .merge(routes::verify::router())
        .merge(routes::node::router())
        .merge(routes::health::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
