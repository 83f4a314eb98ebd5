//! # Application State
//!
//! Shared state handed to every handler. All members are cheap to clone
//! (`Arc`s), as axum requires.

use std::path::PathBuf;
use std::sync::Arc;

use attestgrid_crypto::{select_backend, CryptoError, KeyManager};
use attestgrid_node::{
    AttestationNode, ConfigError, FileReceiptStore, NodeConfig, StatsAggregator, StoreError,
    Verifier,
};
use thiserror::Error;

/// Default listen port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 8000;

/// Handler state.
#[derive(Clone)]
pub struct AppState {
    pub node: Arc<AttestationNode>,
    pub verifier: Verifier,
    pub stats: Arc<StatsAggregator>,
}

impl AppState {
    /// Wrap an already-built node.
    pub fn new(node: AttestationNode) -> Self {
        let verifier = Verifier::new(Arc::clone(node.keys().backend()));
        let stats = Arc::new(StatsAggregator::new(Arc::clone(node.store())));
        Self {
            node: Arc::new(node),
            verifier,
            stats,
        }
    }

    /// Open the key directory and file store named by `config`.
    ///
    /// The signing key is loaded or generated here so that an unusable key
    /// directory fails startup rather than the first request.
    pub fn bootstrap(config: NodeConfig) -> Result<Self, BootstrapError> {
        let backend = select_backend(config.crypto_backend);
        let keys = KeyManager::open(&config.key_dir, backend).map_err(|source| {
            BootstrapError::Keys {
                dir: config.key_dir.clone(),
                source,
            }
        })?;
        let public_key = keys.public_key().map_err(|source| BootstrapError::Keys {
            dir: config.key_dir.clone(),
            source,
        })?;
        let store = FileReceiptStore::open(&config.store_dir).map_err(|source| {
            BootstrapError::Store {
                dir: config.store_dir.clone(),
                source,
            }
        })?;

        tracing::info!(
            node_id = %config.node_id,
            logic_version = %config.logic_version,
            backend = %keys.backend_kind(),
            public_key = %public_key.to_hex(),
            store_dir = %config.store_dir.display(),
            "attestation node ready"
        );

        Ok(Self::new(AttestationNode::new(
            config,
            Arc::new(keys),
            Arc::new(store),
        )))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("node_id", &self.node.node_id())
            .field("verifier", &self.verifier)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Startup failures.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("signing key in {dir} unavailable: {source}")]
    Keys {
        dir: PathBuf,
        #[source]
        source: CryptoError,
    },

    #[error("receipt store at {dir} unavailable: {source}")]
    Store {
        dir: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("invalid PORT {value:?}: expected an integer in 1..=65535")]
    InvalidPort { value: String },
}

/// Parse the listen port from `PORT`, defaulting to [`DEFAULT_PORT`].
pub fn port_from_env() -> Result<u16, BootstrapError> {
    parse_port(std::env::var("PORT").ok())
}

fn parse_port(value: Option<String>) -> Result<u16, BootstrapError> {
    match value {
        None => Ok(DEFAULT_PORT),
        Some(raw) => match raw.trim().parse::<u16>() {
            Ok(port) if port != 0 => Ok(port),
            _ => Err(BootstrapError::InvalidPort { value: raw }),
        },
    }
}
