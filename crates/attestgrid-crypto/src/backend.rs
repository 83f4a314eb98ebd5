//! # Signing Backends
//!
//! Abstracts the Ed25519 implementation behind `SigningBackend` so the node
//! can run on whichever library a deployment ships with. Two backends exist:
//!
//! - **`ed25519-dalek`** (feature `dalek`): the primary implementation.
//! - **`ed25519-consensus`** (feature `portable`): a pure-Rust fallback
//!   with ZIP-215 verification rules.
//!
//! Both produce standard RFC 8032 signatures, so a receipt signed by one
//! verifies under the other for every honestly generated key.
//!
//! ## Selection
//!
//! `select_backend()` honours a `BackendPreference` when the requested
//! backend is compiled in and otherwise falls back to whatever is available,
//! logging a warning. `Auto` prefers `dalek`.

use std::str::FromStr;
use std::sync::Arc;

use crate::ed25519::{Ed25519PublicKey, Ed25519Signature, SecretSeed};

#[cfg(not(any(feature = "dalek", feature = "portable")))]
compile_error!("attestgrid-crypto needs at least one of the `dalek` or `portable` features");

/// A signer bound to one private key.
pub trait KeySigner: Send + Sync {
    /// The public half of the bound key.
    fn public_key(&self) -> Ed25519PublicKey;

    /// Sign `message` with the bound key.
    fn sign(&self, message: &[u8]) -> Ed25519Signature;
}

/// An Ed25519 implementation.
///
/// Verification never errors: malformed keys and signatures that fail
/// to verify both yield `false`.
pub trait SigningBackend: Send + Sync {
    /// Which implementation this is.
    fn kind(&self) -> BackendKind;

    /// Bind a private seed, deriving the expanded key once.
    fn signer(&self, seed: &SecretSeed) -> Box<dyn KeySigner>;

    /// Check `signature` over `message` against `public_key`.
    fn verify(
        &self,
        message: &[u8],
        signature: &Ed25519Signature,
        public_key: &Ed25519PublicKey,
    ) -> bool;
}

/// Identifies a concrete backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Dalek,
    Portable,
}

impl BackendKind {
    /// The library name, as reported in logs and by the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dalek => "ed25519-dalek",
            Self::Portable => "ed25519-consensus",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator preference for which backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    #[default]
    Auto,
    Dalek,
    Portable,
}

/// Unrecognised backend name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown crypto backend {0:?}, expected one of: auto, dalek, portable")]
pub struct UnknownBackend(pub String);

impl FromStr for BackendPreference {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "dalek" | "ed25519-dalek" => Ok(Self::Dalek),
            "portable" | "consensus" | "ed25519-consensus" => Ok(Self::Portable),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

/// Backends compiled into this build, in preference order.
pub fn available_backends() -> Vec<BackendKind> {
    let mut kinds = Vec::new();
    #[cfg(feature = "dalek")]
    kinds.push(BackendKind::Dalek);
    #[cfg(feature = "portable")]
    kinds.push(BackendKind::Portable);
    kinds
}

/// Pick a backend for `preference`, falling back when the requested one is
/// not compiled in.
pub fn select_backend(preference: BackendPreference) -> Arc<dyn SigningBackend> {
    let requested = match preference {
        BackendPreference::Auto => None,
        BackendPreference::Dalek => Some((BackendKind::Dalek, dalek_backend())),
        BackendPreference::Portable => Some((BackendKind::Portable, portable_backend())),
    };

    let backend = match requested {
        None => fallback_backend(),
        Some((_, Some(backend))) => backend,
        Some((kind, None)) => {
            let fallback = fallback_backend();
            tracing::warn!(
                requested = kind.as_str(),
                selected = fallback.kind().as_str(),
                "requested crypto backend is not compiled in, falling back"
            );
            fallback
        }
    };
    tracing::debug!(backend = backend.kind().as_str(), "crypto backend selected");
    backend
}

#[cfg(feature = "dalek")]
fn dalek_backend() -> Option<Arc<dyn SigningBackend>> {
    Some(Arc::new(crate::dalek::DalekBackend))
}

#[cfg(not(feature = "dalek"))]
fn dalek_backend() -> Option<Arc<dyn SigningBackend>> {
    None
}

#[cfg(feature = "portable")]
fn portable_backend() -> Option<Arc<dyn SigningBackend>> {
    Some(Arc::new(crate::portable::PortableBackend))
}

#[cfg(not(feature = "portable"))]
fn portable_backend() -> Option<Arc<dyn SigningBackend>> {
    None
}

#[cfg(feature = "dalek")]
fn fallback_backend() -> Arc<dyn SigningBackend> {
    Arc::new(crate::dalek::DalekBackend)
}

#[cfg(all(not(feature = "dalek"), feature = "portable"))]
fn fallback_backend() -> Arc<dyn SigningBackend> {
    Arc::new(crate::portable::PortableBackend)
}
