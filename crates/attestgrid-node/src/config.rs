//! Node configuration.
//!
//! Read from environment variables at startup. Every variable has a
//! default, so an empty environment yields a working local node.

use std::path::PathBuf;

use attestgrid_core::DEFAULT_LOGIC_VERSION;
use attestgrid_crypto::BackendPreference;

/// Default `node_id` when `NODE_ID` is unset.
pub const DEFAULT_NODE_ID: &str = "default-node";

/// Runtime configuration for an attestation node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Identifier embedded in every signed payload.
    pub node_id: String,
    /// Version of the attestation logic, embedded in every signed payload.
    pub logic_version: String,
    /// Directory holding `ed25519_private.hex` and `ed25519_public.hex`.
    pub key_dir: PathBuf,
    /// Root directory of the file receipt store.
    pub store_dir: PathBuf,
    /// Which Ed25519 implementation to run.
    pub crypto_backend: BackendPreference,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: DEFAULT_NODE_ID.to_string(),
            logic_version: DEFAULT_LOGIC_VERSION.to_string(),
            key_dir: PathBuf::from(".keys"),
            store_dir: PathBuf::from("receipts"),
            crypto_backend: BackendPreference::Auto,
        }
    }
}

impl NodeConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `NODE_ID` (default: `default-node`)
    /// - `ATTESTGRID_LOGIC_VERSION` (default: `1.0.0`)
    /// - `ATTESTGRID_KEY_DIR` (default: `.keys`)
    /// - `ATTESTGRID_STORE_DIR` (default: `receipts`)
    /// - `ATTESTGRID_CRYPTO_BACKEND` (`auto` | `dalek` | `portable`, default: `auto`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let node_id = non_empty(&lookup, "NODE_ID")?.unwrap_or(defaults.node_id);
        let logic_version =
            non_empty(&lookup, "ATTESTGRID_LOGIC_VERSION")?.unwrap_or(defaults.logic_version);
        let key_dir = lookup("ATTESTGRID_KEY_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.key_dir);
        let store_dir = lookup("ATTESTGRID_STORE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.store_dir);
        let crypto_backend = match lookup("ATTESTGRID_CRYPTO_BACKEND") {
            Some(raw) => raw
                .parse::<BackendPreference>()
                .map_err(|e| ConfigError::Invalid {
                    var: "ATTESTGRID_CRYPTO_BACKEND",
                    reason: e.to_string(),
                })?,
            None => defaults.crypto_backend,
        };

        Ok(Self {
            node_id,
            logic_version,
            key_dir,
            store_dir,
            crypto_backend,
        })
    }
}

/// Set-but-blank identifiers are rejected rather than silently defaulted.
fn non_empty(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<String>, ConfigError> {
    match lookup(var) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::Invalid {
            var,
            reason: "must not be empty".to_string(),
        }),
        other => Ok(other),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let cfg = NodeConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, NodeConfig::default());
        assert_eq!(cfg.node_id, "default-node");
        assert_eq!(cfg.logic_version, "1.0.0");
        assert_eq!(cfg.key_dir, PathBuf::from(".keys"));
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = NodeConfig::from_lookup(lookup(&[
            ("NODE_ID", "node-7"),
            ("ATTESTGRID_LOGIC_VERSION", "2.0.0"),
            ("ATTESTGRID_KEY_DIR", "/var/lib/attestgrid/keys"),
            ("ATTESTGRID_STORE_DIR", "/var/lib/attestgrid/receipts"),
            ("ATTESTGRID_CRYPTO_BACKEND", "portable"),
        ]))
        .unwrap();
        assert_eq!(cfg.node_id, "node-7");
        assert_eq!(cfg.logic_version, "2.0.0");
        assert_eq!(cfg.key_dir, PathBuf::from("/var/lib/attestgrid/keys"));
        assert_eq!(cfg.store_dir, PathBuf::from("/var/lib/attestgrid/receipts"));
        assert_eq!(cfg.crypto_backend, BackendPreference::Portable);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = NodeConfig::from_lookup(lookup(&[("ATTESTGRID_CRYPTO_BACKEND", "openssl")]))
            .unwrap_err();
        assert!(err.to_string().contains("ATTESTGRID_CRYPTO_BACKEND"));
    }

    #[test]
    fn blank_node_id_is_rejected() {
        assert!(NodeConfig::from_lookup(lookup(&[("NODE_ID", "  ")])).is_err());
    }
}
