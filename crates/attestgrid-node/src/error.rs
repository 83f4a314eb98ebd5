//! # Node Error Types
//!
//! Failures that abort an attestation or verification request. Semantic
//! outcomes are not errors: a validator rejection is a signed receipt with
//! `validator.passed == false`, and a bad signature is a report with
//! `valid == false`.

use std::path::PathBuf;

use attestgrid_core::CanonicalizationError;
use attestgrid_crypto::CryptoError;
use thiserror::Error;

/// Errors from the receipt persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing storage could not be read or written.
    #[error("receipt store I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored record does not parse or does not belong to its key.
    #[error("corrupt receipt record at {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// A receipt was offered under a key other than its own `task_id`.
    #[error("receipt for task {task_id:?} offered under key {key:?}")]
    KeyMismatch { key: String, task_id: String },

    /// A receipt could not be encoded for storage.
    #[error("failed to encode receipt: {0}")]
    Encode(#[from] serde_json::Error),

    /// A record key could not be derived from the `task_id`.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),
}

/// Errors that abort `AttestationNode::attest`.
#[derive(Error, Debug)]
pub enum AttestError {
    /// `task_id` was empty.
    #[error("task_id must be a non-empty string")]
    InvalidTaskId,

    /// Input, rules or output has no canonical form.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// The node key could not be loaded or generated.
    #[error(transparent)]
    KeyUnavailable(#[from] CryptoError),

    /// The caller-supplied task function failed. No receipt was produced.
    #[error("task execution failed: {0}")]
    Execution(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The idempotency lookup could not read the store.
    #[error("receipt lookup failed: {0}")]
    StoreRead(#[source] StoreError),

    /// The receipt was signed but could not be durably recorded.
    #[error("receipt persistence failed: {0}")]
    StoreWrite(#[source] StoreError),
}

/// Errors from verifying an untyped receipt.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// The value is not a receipt (missing or mistyped contract fields).
    #[error("malformed receipt: {0}")]
    MalformedReceipt(String),

    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),
}
