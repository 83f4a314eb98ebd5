//! # attestgrid-core — Foundational Types for AttestGrid
//!
//! This crate is the leaf of the AttestGrid dependency graph. It defines the
//! byte-exact pieces every other guarantee rests on: canonical JSON
//! serialization, SHA-256 content addressing, and the receipt wire format
//! including the fixed seven-field signature payload.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** ALL hashing and signing flows through
//!    `CanonicalBytes::new()` / `CanonicalBytes::from_value()`. No raw
//!    `serde_json::to_vec()` output is ever hashed or signed.
//!
//! 2. **`sha256_digest()` accepts only `&CanonicalBytes`.** The function
//!    signature makes it impossible to hash non-canonical bytes.
//!
//! 3. **The signature contract is a type.** [`SigPayload`] has exactly the
//!    seven signed fields. Adding, removing or renaming one is a breaking
//!    change that requires a new `logic_version`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `attestgrid-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod receipt;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{content_hash, receipt_hash, sha256_digest, sha256_hex, ContentDigest};
pub use error::{CanonicalizationError, DigestError};
pub use receipt::{
    Proof, Receipt, ReceiptMeta, SigPayload, ValidatorResult, DEFAULT_LOGIC_VERSION,
    SIG_PAYLOAD_FIELDS,
};
