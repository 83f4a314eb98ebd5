//! # attestgrid-crypto — Signing for AttestGrid
//!
//! Ed25519 key management, signing and verification behind a pluggable
//! backend.
//!
//! - **`ed25519`**: backend-neutral public key, signature and seed types.
//! - **`backend`**: the `SigningBackend` trait and backend selection.
//! - **`key_manager`**: the node's single signing key, loaded or generated
//!   on first use.
//!
//! Signing inputs are `CanonicalBytes` wherever a receipt is involved, so
//! every signature covers the canonical form of its payload.

pub mod backend;
#[cfg(feature = "dalek")]
pub mod dalek;
pub mod ed25519;
pub mod error;
pub mod key_manager;
#[cfg(feature = "portable")]
pub mod portable;

pub use backend::{
    available_backends, select_backend, BackendKind, BackendPreference, KeySigner, SigningBackend,
    UnknownBackend,
};
#[cfg(feature = "dalek")]
pub use dalek::DalekBackend;
pub use ed25519::{Ed25519PublicKey, Ed25519Signature, SecretSeed};
pub use error::CryptoError;
pub use key_manager::{KeyManager, PRIVATE_KEY_FILE, PUBLIC_KEY_FILE};
#[cfg(feature = "portable")]
pub use portable::PortableBackend;
