//! # Verify Subcommand
//!
//! Offline receipt verification. Only the signed payload fields and the
//! signature are consulted; `timestamp`, `proof` and `meta` may be edited
//! freely without affecting the verdict.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use attestgrid_core::SigPayload;
use attestgrid_crypto::{select_backend, BackendPreference, Ed25519PublicKey};
use attestgrid_node::Verifier;

/// Arguments for `attestgrid verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Receipt JSON file. A `POST /v1/attest` response body is accepted too.
    #[arg(long)]
    pub receipt: PathBuf,

    /// Public key: a file holding 64 hex characters, or the hex itself.
    #[arg(long)]
    pub pubkey: String,

    /// Ed25519 implementation to verify with (auto, dalek, portable).
    #[arg(long, default_value = "auto")]
    pub backend: BackendPreference,
}

/// Execute `attestgrid verify`. Exit code 0 when the signature checks out.
pub fn run_verify(args: &VerifyArgs, out: &mut impl Write) -> Result<u8> {
    let document = crate::read_json(&args.receipt)?;
    let receipt = unwrap_response(document);
    let public_key = load_public_key(&args.pubkey)?;

    let task_id = receipt.get("task_id").and_then(Value::as_str).unwrap_or("unknown");
    let node_id = receipt.get("node_id").and_then(Value::as_str).unwrap_or("unknown");
    writeln!(out, "Verifying receipt for task: {task_id}")?;
    writeln!(out, "Node ID: {node_id}")?;

    let verifier = Verifier::new(select_backend(args.backend));
    let report = verifier
        .verify_value(&receipt, &public_key)
        .with_context(|| format!("cannot verify {}", args.receipt.display()))?;

    if !report.valid {
        writeln!(out)?;
        writeln!(out, "VERIFICATION FAILED")?;
        writeln!(out, "The signature does not match the signed payload.")?;
        return Ok(1);
    }

    writeln!(out)?;
    writeln!(out, "VERIFICATION SUCCESSFUL")?;
    writeln!(out, "Receipt hash: {}", report.receipt_hash)?;
    let stored_hash = receipt
        .get("meta")
        .and_then(|meta| meta.get("receipt_hash"))
        .and_then(Value::as_str);
    if let Some(stored) = stored_hash {
        if stored != report.receipt_hash {
            writeln!(out, "Note: stored meta.receipt_hash differs ({stored})")?;
        }
    }

    let payload = SigPayload::deserialize(&receipt)?;
    writeln!(out)?;
    writeln!(out, "Verified payload:")?;
    writeln!(out, "{}", serde_json::to_string_pretty(&payload)?)?;
    Ok(0)
}

/// Accept either a bare receipt or an attest response wrapping one.
fn unwrap_response(document: Value) -> Value {
    match document {
        Value::Object(mut map) if !map.contains_key("signature") && map.contains_key("receipt") => {
            map.remove("receipt").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Resolve `--pubkey`: an existing file is read, anything else is taken as hex.
pub fn load_public_key(arg: &str) -> Result<Ed25519PublicKey> {
    let path = Path::new(arg);
    let hex = if path.is_file() {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read public key {}", path.display()))?
    } else {
        arg.to_string()
    };
    Ed25519PublicKey::from_hex(hex.trim()).map_err(|e| anyhow!("invalid public key: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_wrapper_is_unwrapped() {
        let inner = json!({"task_id": "t", "signature": "00"});
        let wrapped = json!({"receipt": inner.clone(), "cached": false});
        assert_eq!(unwrap_response(wrapped), inner);
        assert_eq!(unwrap_response(inner.clone()), inner);
    }

    #[test]
    fn public_key_from_hex_or_file() {
        let hex = "ea4a6c63e29c520abef5507b132ec5f9954776aebebe7b92421eea691446d22c";
        assert_eq!(load_public_key(hex).unwrap().to_hex(), hex);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pub.hex");
        std::fs::write(&path, format!("{hex}\n")).unwrap();
        assert_eq!(load_public_key(path.to_str().unwrap()).unwrap().to_hex(), hex);

        assert!(load_public_key("not-a-key").is_err());
    }
}
