//! # Content Digests
//!
//! Defines `ContentDigest` and the SHA-256 hashing entry points used for
//! `input_hash`, `rules_hash`, `output_hash` and `meta.receipt_hash`.
//!
//! ## Security Invariant
//!
//! Every digest is computed over `CanonicalBytes`. `sha256_digest()` and
//! `receipt_hash()` do not accept raw `&[u8]`, so no code path can hash a
//! non-canonical serialization.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::{CanonicalizationError, DigestError};

/// A 32-byte SHA-256 digest, rendered as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32-byte digest value.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex digest. Uppercase input is accepted.
    pub fn from_hex(s: &str) -> Result<Self, DigestError> {
        let s = s.trim();
        if s.len() != 64 {
            return Err(DigestError::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| DigestError::InvalidHex(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Compute a SHA-256 content digest from canonical bytes.
pub fn sha256_digest(data: &CanonicalBytes) -> ContentDigest {
    ContentDigest(Sha256::digest(data.as_bytes()).into())
}

/// Compute a SHA-256 hex string from canonical bytes.
pub fn sha256_hex(data: &CanonicalBytes) -> String {
    sha256_digest(data).to_hex()
}

/// `sha256(canonicalize(value))`. Used for input, rules and output hashes.
pub fn content_hash(value: &(impl Serialize + ?Sized)) -> Result<ContentDigest, CanonicalizationError> {
    let canonical = CanonicalBytes::new(value)?;
    Ok(sha256_digest(&canonical))
}

/// `sha256(canonical(sig_payload) || "." || signature_hex)`.
///
/// The receipt hash identifies a receipt independently of its unsigned
/// metadata. It is computed over the signature string exactly as carried,
/// so a receipt with a malformed signature still has a stable identifier.
pub fn receipt_hash(sig_payload: &CanonicalBytes, signature_hex: &str) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(sig_payload.as_bytes());
    hasher.update(b".");
    hasher.update(signature_hex.as_bytes());
    ContentDigest(hasher.finalize().into())
}
