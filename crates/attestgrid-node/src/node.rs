//! # Attestation Node
//!
//! Turns one task execution into one signed, persisted receipt.
//!
//! ## Pipeline
//!
//! 1. Idempotency: a stored receipt for `task_id` is returned unchanged and
//!    the task function is not invoked. Concurrent first calls for the same
//!    `task_id` on one node are serialized, so the task runs once.
//! 2. The task function runs exactly once and yields the output plus its
//!    `ValidatorResult`. A task failure aborts with no receipt; a validator
//!    rejection is signed like any other result.
//! 3. Input, rules and output are content-hashed. The canonical output is
//!    kept on the receipt as the unsigned `result`.
//! 4. The seven-field `SigPayload` is canonicalized and signed.
//! 5. `meta.receipt_hash` is derived from the canonical payload and the
//!    signature.
//! 6. The receipt is persisted insert-if-absent. If another process sharing
//!    the store won the insert, the winner's receipt is returned.
//!
//! A repeated `task_id` whose input or rules hash differs from the stored
//! receipt is never re-signed. The original receipt is returned with
//! `input_conflict` set.

use std::collections::HashSet;
use std::sync::Arc;

use attestgrid_core::{
    content_hash, receipt_hash, sha256_digest, CanonicalBytes, ContentDigest, Proof, Receipt,
    ReceiptMeta, SigPayload, ValidatorResult,
};
use attestgrid_crypto::{CryptoError, Ed25519PublicKey, KeyManager};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::config::NodeConfig;
use crate::error::AttestError;
use crate::store::{PersistOutcome, ReceiptStore};

/// What a task function returns: its output and the domain checks on it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutput<O> {
    pub output: O,
    pub validator: ValidatorResult,
}

/// A receipt together with how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestOutcome {
    pub receipt: Receipt,
    /// The receipt was already stored and the task was not run.
    pub cached: bool,
    /// The stored receipt was issued for a different input or rule set.
    pub input_conflict: bool,
}

/// Issues receipts for one node identity.
pub struct AttestationNode {
    config: NodeConfig,
    keys: Arc<KeyManager>,
    store: Arc<dyn ReceiptStore>,
    in_flight: InFlight,
}

impl AttestationNode {
    pub fn new(config: NodeConfig, keys: Arc<KeyManager>, store: Arc<dyn ReceiptStore>) -> Self {
        Self {
            config,
            keys,
            store,
            in_flight: InFlight::default(),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    pub fn logic_version(&self) -> &str {
        &self.config.logic_version
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub fn store(&self) -> &Arc<dyn ReceiptStore> {
        &self.store
    }

    /// The public key receipts from this node verify against.
    pub fn public_key(&self) -> Result<Ed25519PublicKey, CryptoError> {
        self.keys.public_key()
    }

    /// Run `run_fn` for `task_id` and return its signed receipt.
    ///
    /// Calling again with the same `task_id` returns the stored receipt
    /// byte-for-byte without re-running the task.
    pub fn attest<I, R, O, E, F>(
        &self,
        task_id: &str,
        input: &I,
        rules: &R,
        run_fn: F,
    ) -> Result<Receipt, AttestError>
    where
        I: Serialize + ?Sized,
        R: Serialize + ?Sized,
        O: Serialize,
        F: FnOnce(&I, &R) -> Result<TaskOutput<O>, E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        self.attest_detailed(task_id, input, rules, run_fn)
            .map(|outcome| outcome.receipt)
    }

    /// Like [`attest`](Self::attest), also reporting whether the receipt
    /// came from the store and whether it conflicts with the new request.
    pub fn attest_detailed<I, R, O, E, F>(
        &self,
        task_id: &str,
        input: &I,
        rules: &R,
        run_fn: F,
    ) -> Result<AttestOutcome, AttestError>
    where
        I: Serialize + ?Sized,
        R: Serialize + ?Sized,
        O: Serialize,
        F: FnOnce(&I, &R) -> Result<TaskOutput<O>, E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if task_id.is_empty() {
            return Err(AttestError::InvalidTaskId);
        }

        // Held until the receipt is persisted.
        let _claim = self.in_flight.claim(task_id);

        if let Some(existing) = self.store.get(task_id).map_err(AttestError::StoreRead)? {
            return Ok(self.cached(existing, input, rules));
        }

        let task = run_fn(input, rules).map_err(|e| {
            let err: Box<dyn std::error::Error + Send + Sync> = e.into();
            tracing::warn!(task_id, error = %err, "task execution failed");
            AttestError::Execution(err)
        })?;

        let output = CanonicalBytes::new(&task.output)?;
        let payload = SigPayload {
            task_id: task_id.to_string(),
            node_id: self.config.node_id.clone(),
            logic_version: self.config.logic_version.clone(),
            input_hash: content_hash(input)?.to_hex(),
            rules_hash: content_hash(rules)?.to_hex(),
            output_hash: sha256_digest(&output).to_hex(),
            validator: task.validator,
        };
        let receipt = self.sign(payload, output.to_value()?)?;

        match self
            .store
            .persist(task_id, receipt)
            .map_err(AttestError::StoreWrite)?
        {
            PersistOutcome::Inserted(receipt) => {
                tracing::info!(
                    task_id,
                    passed = receipt.payload.validator.passed,
                    receipt_hash = %receipt.meta.receipt_hash,
                    "receipt issued"
                );
                Ok(AttestOutcome {
                    receipt,
                    cached: false,
                    input_conflict: false,
                })
            }
            PersistOutcome::AlreadyPresent(winner) => {
                tracing::debug!(task_id, "concurrent attest won the insert, returning its receipt");
                Ok(self.cached(winner, input, rules))
            }
        }
    }

    fn sign(&self, payload: SigPayload, result: serde_json::Value) -> Result<Receipt, AttestError> {
        let canonical = payload.canonical_bytes()?;
        let signature = self.keys.sign_canonical(&canonical)?.to_hex();
        let receipt_hash = receipt_hash(&canonical, &signature).to_hex();
        Ok(Receipt {
            payload,
            signature,
            timestamp: chrono::Utc::now().timestamp(),
            proof: Proof::new(),
            result: Some(result),
            meta: ReceiptMeta { receipt_hash },
        })
    }

    fn cached<I, R>(&self, receipt: Receipt, input: &I, rules: &R) -> AttestOutcome
    where
        I: Serialize + ?Sized,
        R: Serialize + ?Sized,
    {
        let input_conflict = !hash_matches(input, &receipt.payload.input_hash)
            || !hash_matches(rules, &receipt.payload.rules_hash);
        if input_conflict {
            tracing::warn!(
                task_id = receipt.task_id(),
                "task_id reused with different input or rules, returning original receipt"
            );
        } else {
            tracing::debug!(task_id = receipt.task_id(), "returning stored receipt");
        }
        AttestOutcome {
            receipt,
            cached: true,
            input_conflict,
        }
    }
}

impl std::fmt::Debug for AttestationNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationNode")
            .field("config", &self.config)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

/// Task ids with an attestation currently running on this node.
#[derive(Default)]
struct InFlight {
    tasks: Mutex<HashSet<String>>,
    released: Condvar,
}

impl InFlight {
    /// Block until no other caller holds `task_id`, then hold it.
    fn claim(&self, task_id: &str) -> Claim<'_> {
        let mut tasks = self.tasks.lock();
        while tasks.contains(task_id) {
            self.released.wait(&mut tasks);
        }
        tasks.insert(task_id.to_string());
        Claim {
            in_flight: self,
            task_id: task_id.to_string(),
        }
    }
}

/// Releases its task id on drop, including when the task panics.
struct Claim<'a> {
    in_flight: &'a InFlight,
    task_id: String,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.in_flight.tasks.lock().remove(&self.task_id);
        self.in_flight.released.notify_all();
    }
}

/// A value with no canonical form cannot match any stored hash.
fn hash_matches(value: &(impl Serialize + ?Sized), stored_hex: &str) -> bool {
    match (content_hash(value), ContentDigest::from_hex(stored_hex)) {
        (Ok(actual), Ok(stored)) => actual == stored,
        _ => false,
    }
}
