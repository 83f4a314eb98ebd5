//! # attestgrid-cli — Command-Line Tools for AttestGrid
//!
//! Provides the `attestgrid` binary:
//!
//! - `attestgrid verify` — Check a receipt file against a node public key,
//!   with no network access and no node state.
//! - `attestgrid keygen` — Load or generate a node signing key.
//! - `attestgrid stats` — Roll up a receipt store and refresh the README
//!   transparency block.
//!
//! Each subcommand handler returns the process exit code, with `Err`
//! reserved for failures that stop the command from producing a verdict.

pub mod keygen;
pub mod stats;
pub mod verify;

use std::path::Path;

use anyhow::{Context, Result};

/// Read and parse a JSON file.
pub(crate) fn read_json(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}
