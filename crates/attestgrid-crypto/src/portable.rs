//! `ed25519-consensus` backend.
//!
//! Verification follows ZIP-215, which accepts a few edge-case encodings
//! that `ed25519-dalek` rejects. Keys and signatures produced by a correct
//! signer verify identically under both.

use crate::backend::{BackendKind, KeySigner, SigningBackend};
use crate::ed25519::{Ed25519PublicKey, Ed25519Signature, SecretSeed};

/// Signs and verifies with `ed25519-consensus`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableBackend;

struct PortableSigner(ed25519_consensus::SigningKey);

impl KeySigner for PortableSigner {
    fn public_key(&self) -> Ed25519PublicKey {
        let bytes: [u8; 32] = self.0.verification_key().into();
        Ed25519PublicKey::from_bytes(bytes)
    }

    fn sign(&self, message: &[u8]) -> Ed25519Signature {
        let bytes: [u8; 64] = self.0.sign(message).into();
        Ed25519Signature::from_bytes(bytes)
    }
}

impl SigningBackend for PortableBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Portable
    }

    fn signer(&self, seed: &SecretSeed) -> Box<dyn KeySigner> {
        Box::new(PortableSigner(ed25519_consensus::SigningKey::from(
            *seed.expose(),
        )))
    }

    fn verify(
        &self,
        message: &[u8],
        signature: &Ed25519Signature,
        public_key: &Ed25519PublicKey,
    ) -> bool {
        let Ok(key) = ed25519_consensus::VerificationKey::try_from(*public_key.as_bytes()) else {
            return false;
        };
        let sig = ed25519_consensus::Signature::from(*signature.as_bytes());
        key.verify(&sig, message).is_ok()
    }
}
