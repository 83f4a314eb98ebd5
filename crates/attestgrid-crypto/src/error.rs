//! # Cryptographic Error Types
//!
//! Structured errors for key handling, signing and verification input
//! parsing. A signature that fails to verify is not an error: verification
//! returns `false`.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from cryptographic operations in AttestGrid.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Public key bytes or hex could not be parsed.
    #[error("invalid Ed25519 public key: {0}")]
    InvalidPublicKey(String),

    /// Signature bytes or hex could not be parsed.
    #[error("invalid Ed25519 signature: {0}")]
    InvalidSignature(String),

    /// Private key material on disk is malformed.
    #[error("invalid Ed25519 private key material: {0}")]
    InvalidPrivateKey(String),

    /// Key material is missing and could not be generated or persisted.
    #[error("signing key unavailable: {0}")]
    KeyUnavailable(String),

    /// The public key file does not belong to the private key next to it.
    #[error("public key file {} does not match the private key", path.display())]
    KeyMismatch { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_mismatch_display_names_path() {
        let err = CryptoError::KeyMismatch {
            path: PathBuf::from("/keys/ed25519_public.hex"),
        };
        assert!(err.to_string().contains("/keys/ed25519_public.hex"));
    }

    #[test]
    fn key_unavailable_display() {
        let err = CryptoError::KeyUnavailable("read-only filesystem".to_string());
        assert_eq!(
            err.to_string(),
            "signing key unavailable: read-only filesystem"
        );
    }
}
