//! # Error Types
//!
//! Errors produced while building canonical bytes and parsing digests.
//! All errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.

use thiserror::Error;

/// Error during canonical serialization.
///
/// Fatal to the operation that requested the bytes: nothing is hashed or
/// signed when canonicalization fails.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// NaN and the infinities have no canonical JSON form.
    #[error("non-finite number has no canonical form: {0}")]
    NonFiniteNumber(f64),

    /// The value could not be serialized to JSON at all.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error parsing a hex-encoded SHA-256 digest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    /// Digest hex must be exactly 64 characters.
    #[error("digest hex must be 64 chars, got {0}")]
    InvalidLength(usize),

    /// Digest contains non-hex characters.
    #[error("invalid digest hex: {0}")]
    InvalidHex(String),
}
