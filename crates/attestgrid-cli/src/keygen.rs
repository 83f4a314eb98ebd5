//! # Keygen Subcommand
//!
//! Loads the node key from `--dir`, generating it first if the directory
//! holds none. Running it against an existing key is a no-op that prints
//! the same public key, so it is safe in provisioning scripts.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use attestgrid_crypto::{select_backend, BackendPreference, KeyManager, PUBLIC_KEY_FILE};

/// Arguments for `attestgrid keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Key directory (same layout as `ATTESTGRID_KEY_DIR`).
    #[arg(long, default_value = ".keys")]
    pub dir: PathBuf,

    /// Ed25519 implementation to derive the public key with.
    #[arg(long, default_value = "auto")]
    pub backend: BackendPreference,
}

/// Execute `attestgrid keygen`.
pub fn run_keygen(args: &KeygenArgs, out: &mut impl Write) -> Result<u8> {
    let keys = KeyManager::open(&args.dir, select_backend(args.backend))
        .with_context(|| format!("failed to open key directory {}", args.dir.display()))?;
    let existed = keys.is_loaded();
    let public_key = keys
        .public_key()
        .with_context(|| format!("failed to load or generate key in {}", args.dir.display()))?;

    if existed {
        writeln!(out, "OK: loaded existing Ed25519 key")?;
    } else {
        writeln!(out, "OK: Ed25519 key ready")?;
    }
    writeln!(out, "  Key directory:    {}", args.dir.display())?;
    writeln!(out, "  Public key file:  {}", args.dir.join(PUBLIC_KEY_FILE).display())?;
    writeln!(out, "  Public key (hex): {}", public_key.to_hex())?;
    Ok(0)
}
