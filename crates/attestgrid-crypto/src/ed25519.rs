//! # Ed25519 Key and Signature Types
//!
//! Backend-neutral value types shared by every signing backend.
//!
//! ## Security Invariant
//!
//! - `SecretSeed` never implements `Serialize`, its `Debug` output is
//!   redacted, and its buffer is zeroized on drop.
//! - Public keys and signatures serialize as lowercase hex strings.

use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// An Ed25519 public key (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey([u8; 32]);

/// An Ed25519 signature (64 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519Signature([u8; 64]);

/// The raw 32-byte Ed25519 private seed.
pub struct SecretSeed(Zeroizing<[u8; 32]>);

// ---------------------------------------------------------------------------
// Ed25519PublicKey
// ---------------------------------------------------------------------------

impl Ed25519PublicKey {
    /// Create a public key from raw 32 bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the raw 32-byte public key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the public key as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a public key from a 64-character hex string.
    ///
    /// Only the encoding is checked here; whether the bytes are a valid
    /// curve point is decided by the verifying backend.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let s = s.trim();
        if s.len() != 64 {
            return Err(CryptoError::InvalidPublicKey(format!(
                "public key hex must be 64 chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Ed25519PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Ed25519PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519PublicKey({}...)", hex::encode(&self.0[..4]))
    }
}

impl std::fmt::Display for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Ed25519Signature
// ---------------------------------------------------------------------------

impl Ed25519Signature {
    /// Create a signature from raw 64 bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Return the raw 64-byte signature.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Render the signature as a lowercase hex string (128 chars).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a signature from a 128-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let s = s.trim();
        if s.len() != 128 {
            return Err(CryptoError::InvalidSignature(format!(
                "signature hex must be 128 chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 64];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Ed25519Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Ed25519Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519Signature({}...)", hex::encode(&self.0[..4]))
    }
}

impl std::fmt::Display for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// SecretSeed
// ---------------------------------------------------------------------------

impl SecretSeed {
    /// Generate a fresh seed from the operating system CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; 32]);
        rand::rngs::OsRng.fill_bytes(bytes.as_mut());
        Self(bytes)
    }

    /// Wrap an existing 32-byte seed.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Parse a seed from its 64-character hex form.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let s = s.trim();
        if s.len() != 64 {
            return Err(CryptoError::InvalidPrivateKey(format!(
                "private key hex must be 64 chars, got {}",
                s.len()
            )));
        }
        let mut bytes = Zeroizing::new([0u8; 32]);
        hex::decode_to_slice(s, bytes.as_mut())
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Hex-encode the seed for persistence. The returned buffer is zeroized
    /// on drop.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0.as_ref()))
    }

    pub(crate) fn expose(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SecretSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretSeed(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_hex_roundtrip() {
        let pk = Ed25519PublicKey::from_bytes([7u8; 32]);
        let hex = pk.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(Ed25519PublicKey::from_hex(&hex).unwrap(), pk);
    }

    #[test]
    fn public_key_accepts_surrounding_whitespace() {
        let hex = format!("{}\n", "ab".repeat(32));
        assert!(Ed25519PublicKey::from_hex(&hex).is_ok());
    }

    #[test]
    fn public_key_invalid_hex() {
        assert!(Ed25519PublicKey::from_hex("not-hex").is_err());
        assert!(Ed25519PublicKey::from_hex("aabb").is_err());
        assert!(Ed25519PublicKey::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn signature_hex_roundtrip() {
        let sig = Ed25519Signature::from_bytes([0xcd; 64]);
        let hex = sig.to_hex();
        assert_eq!(hex.len(), 128);
        assert_eq!(Ed25519Signature::from_hex(&hex).unwrap(), sig);
    }

    #[test]
    fn signature_invalid_hex() {
        assert!(Ed25519Signature::from_hex("aabb").is_err());
        assert!(Ed25519Signature::from_hex(&"g0".repeat(64)).is_err());
    }

    #[test]
    fn public_key_serde_is_hex_string() {
        let pk = Ed25519PublicKey::from_bytes([1u8; 32]);
        let json = serde_json::to_string(&pk).unwrap();
        assert_eq!(json.len(), 64 + 2);
        let back: Ed25519PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pk);
    }

    #[test]
    fn seed_hex_roundtrip() {
        let seed = SecretSeed::from_bytes([42u8; 32]);
        let hex = seed.to_hex();
        let back = SecretSeed::from_hex(&hex).unwrap();
        assert_eq!(back.expose(), seed.expose());
    }

    #[test]
    fn generated_seeds_differ() {
        assert_ne!(SecretSeed::generate().expose(), SecretSeed::generate().expose());
    }

    #[test]
    fn debug_does_not_leak_seed() {
        let seed = SecretSeed::from_bytes([0xaa; 32]);
        let debug = format!("{seed:?}");
        assert_eq!(debug, "SecretSeed(<redacted>)");
        assert!(!debug.contains("aa"));
    }

    #[test]
    fn debug_public_key_shows_prefix() {
        let pk = Ed25519PublicKey::from_bytes([0xab; 32]);
        assert_eq!(format!("{pk:?}"), "Ed25519PublicKey(abababab...)");
    }
}
