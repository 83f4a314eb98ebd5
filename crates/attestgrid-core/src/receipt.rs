//! # Receipt Wire Format
//!
//! The JSON shape of an attestation receipt and the seven-field signature
//! payload embedded in it.
//!
//! ## Signature Contract
//!
//! A receipt's signature covers `canonical(SigPayload)` and nothing else.
//! `SigPayload` has exactly these keys: `task_id`, `node_id`,
//! `logic_version`, `input_hash`, `rules_hash`, `output_hash`, `validator`.
//! Changing that set changes the meaning of every signature ever issued, so
//! it is a breaking schema change and must come with a new `logic_version`.
//!
//! `signature`, `timestamp`, `proof`, `result` and `meta.receipt_hash` are
//! unsigned metadata. Mutating them never changes the verification outcome.
//!
//! `result` is the recorded task output. It is bound to the signature
//! through `output_hash`: `content_hash(result)` must equal `output_hash`.
//!
//! Hash and signature fields are carried as plain strings so that a
//! tampered receipt still deserializes and can be reported as invalid
//! rather than rejected as unparseable.

use serde::{Deserialize, Serialize};

use crate::canonical::CanonicalBytes;
use crate::digest::{content_hash, receipt_hash, ContentDigest};
use crate::error::CanonicalizationError;

/// The `logic_version` a node signs with unless configured otherwise.
pub const DEFAULT_LOGIC_VERSION: &str = "1.0.0";

/// The signed field set, in canonical (sorted) order.
pub const SIG_PAYLOAD_FIELDS: [&str; 7] = [
    "input_hash",
    "logic_version",
    "node_id",
    "output_hash",
    "rules_hash",
    "task_id",
    "validator",
];

/// Outcome of the domain checks run alongside a task.
///
/// `passed == false` is a normal, signed outcome recording a rejection. It
/// is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorResult {
    pub passed: bool,
    pub errors: Vec<String>,
}

impl ValidatorResult {
    /// A passing result with no errors.
    pub fn pass() -> Self {
        Self {
            passed: true,
            errors: Vec::new(),
        }
    }

    /// A rejecting result carrying the given errors.
    pub fn reject(errors: Vec<String>) -> Self {
        Self {
            passed: false,
            errors,
        }
    }
}

/// The exact field set covered by a receipt's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigPayload {
    pub task_id: String,
    pub node_id: String,
    pub logic_version: String,
    pub input_hash: String,
    pub rules_hash: String,
    pub output_hash: String,
    pub validator: ValidatorResult,
}

impl SigPayload {
    /// The bytes that are signed and that seed the receipt hash.
    pub fn canonical_bytes(&self) -> Result<CanonicalBytes, CanonicalizationError> {
        CanonicalBytes::new(self)
    }
}

/// Reserved container for future attestations (e.g. TEE quotes). Always
/// `{}` on receipts issued by this version.
pub type Proof = serde_json::Map<String, serde_json::Value>;

/// Unsigned receipt metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptMeta {
    /// `sha256(canonical(sig_payload) || "." || signature)`, lowercase hex.
    pub receipt_hash: String,
}

/// A signed attestation receipt.
///
/// Serializes flat: the seven payload fields sit at the top level next to
/// `signature`, `timestamp`, `proof`, `result` and `meta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(flatten)]
    pub payload: SigPayload,
    /// Ed25519 signature over `canonical(payload)`, 128 lowercase hex chars.
    pub signature: String,
    /// Issue time in epoch seconds.
    pub timestamp: i64,
    #[serde(default)]
    pub proof: Proof,
    /// The attested task output, parsed from its canonical form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub meta: ReceiptMeta,
}

impl Receipt {
    /// The signed subset of this receipt. Any extra fields are ignored.
    pub fn sig_payload(&self) -> &SigPayload {
        &self.payload
    }

    pub fn task_id(&self) -> &str {
        &self.payload.task_id
    }

    /// `true` when the validator rejected the task output.
    pub fn is_blocked(&self) -> bool {
        !self.payload.validator.passed
    }

    /// Recompute the receipt hash from the payload and the signature as
    /// carried, ignoring the stored `meta.receipt_hash`.
    pub fn compute_receipt_hash(&self) -> Result<ContentDigest, CanonicalizationError> {
        let canonical = self.payload.canonical_bytes()?;
        Ok(receipt_hash(&canonical, &self.signature))
    }

    /// Whether the recorded `result` hashes to the signed `output_hash`.
    ///
    /// `None` when the receipt carries no result.
    pub fn result_matches_output_hash(&self) -> Option<bool> {
        let result = self.result.as_ref()?;
        let matches = match (
            content_hash(result),
            ContentDigest::from_hex(&self.payload.output_hash),
        ) {
            (Ok(actual), Ok(signed)) => actual == signed,
            _ => false,
        };
        Some(matches)
    }
}
