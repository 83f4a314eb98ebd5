//! `ed25519-dalek` backend.

use ed25519_dalek::{Signer as _, Verifier as _};

use crate::backend::{BackendKind, KeySigner, SigningBackend};
use crate::ed25519::{Ed25519PublicKey, Ed25519Signature, SecretSeed};

/// Signs and verifies with `ed25519-dalek`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DalekBackend;

// `ed25519_dalek::SigningKey` zeroizes itself on drop.
struct DalekSigner(ed25519_dalek::SigningKey);

impl KeySigner for DalekSigner {
    fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey::from_bytes(self.0.verifying_key().to_bytes())
    }

    fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature::from_bytes(self.0.sign(message).to_bytes())
    }
}

impl SigningBackend for DalekBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Dalek
    }

    fn signer(&self, seed: &SecretSeed) -> Box<dyn KeySigner> {
        Box::new(DalekSigner(ed25519_dalek::SigningKey::from_bytes(
            seed.expose(),
        )))
    }

    fn verify(
        &self,
        message: &[u8],
        signature: &Ed25519Signature,
        public_key: &Ed25519PublicKey,
    ) -> bool {
        let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(public_key.as_bytes()) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
        key.verify(message, &sig).is_ok()
    }
}
