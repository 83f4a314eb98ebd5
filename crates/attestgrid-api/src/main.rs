//! # attestgrid-api binary
//!
//! Configuration comes from the environment:
//!
//! - `PORT` — listen port (default: 8000)
//! - `NODE_ID`, `ATTESTGRID_LOGIC_VERSION`, `ATTESTGRID_KEY_DIR`,
//!   `ATTESTGRID_STORE_DIR`, `ATTESTGRID_CRYPTO_BACKEND` — see `NodeConfig`
//! - `RUST_LOG` — tracing filter (default: `info`)
//! - `ATTESTGRID_LOG_JSON=1` — emit JSON log lines

use attestgrid_api::{app, port_from_env, AppState};
use attestgrid_node::NodeConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = NodeConfig::from_env()?;
    let port = port_from_env()?;
    let state = tokio::task::spawn_blocking(move || AppState::bootstrap(config)).await??;

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("attestgrid-api listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("ATTESTGRID_LOG_JSON").is_ok_and(|v| v == "1");
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
