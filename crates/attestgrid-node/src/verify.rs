//! # Receipt Verification
//!
//! Checks a receipt's signature against a public key using only the seven
//! signed fields. Extra fields and unsigned metadata (`timestamp`, `proof`,
//! `meta.receipt_hash`) never influence the outcome.
//!
//! An invalid signature is a normal result (`valid == false`), not an
//! error. The receipt hash is always computed, so a caller can identify a
//! receipt that failed verification.

use std::sync::Arc;

use attestgrid_core::{CanonicalizationError, Receipt, SigPayload};
use attestgrid_crypto::{Ed25519PublicKey, Ed25519Signature, SigningBackend};
use serde::{Deserialize, Serialize};

use crate::error::VerifyError;

/// Outcome of verifying one receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub valid: bool,
    /// `sha256(canonical(sig_payload) || "." || signature)`, recomputed.
    pub receipt_hash: String,
}

/// Verifies receipts with a given signing backend.
#[derive(Clone)]
pub struct Verifier {
    backend: Arc<dyn SigningBackend>,
}

impl Verifier {
    pub fn new(backend: Arc<dyn SigningBackend>) -> Self {
        Self { backend }
    }

    /// Verify a typed receipt.
    pub fn verify(
        &self,
        receipt: &Receipt,
        public_key: &Ed25519PublicKey,
    ) -> Result<VerificationReport, CanonicalizationError> {
        self.verify_payload(receipt.sig_payload(), &receipt.signature, public_key)
    }

    /// Verify an untyped receipt, e.g. straight from a request body or file.
    ///
    /// Only the signed fields and `signature` are read; everything else
    /// may be absent or malformed.
    pub fn verify_value(
        &self,
        receipt: &serde_json::Value,
        public_key: &Ed25519PublicKey,
    ) -> Result<VerificationReport, VerifyError> {
        let payload = SigPayload::deserialize(receipt)
            .map_err(|e| VerifyError::MalformedReceipt(e.to_string()))?;
        let signature = receipt
            .get("signature")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| VerifyError::MalformedReceipt("missing string field `signature`".to_string()))?;
        Ok(self.verify_payload(&payload, signature, public_key)?)
    }

    fn verify_payload(
        &self,
        payload: &SigPayload,
        signature_hex: &str,
        public_key: &Ed25519PublicKey,
    ) -> Result<VerificationReport, CanonicalizationError> {
        let canonical = payload.canonical_bytes()?;
        let receipt_hash = attestgrid_core::receipt_hash(&canonical, signature_hex).to_hex();

        let valid = match Ed25519Signature::from_hex(signature_hex) {
            // Lowercase hex is part of the wire format.
            Ok(sig) if sig.to_hex() == signature_hex => {
                self.backend.verify(canonical.as_bytes(), &sig, public_key)
            }
            _ => false,
        };

        tracing::debug!(task_id = %payload.task_id, valid, "receipt verified");
        Ok(VerificationReport {
            valid,
            receipt_hash,
        })
    }
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("backend", &self.backend.kind())
            .finish()
    }
}
