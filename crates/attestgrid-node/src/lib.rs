//! # attestgrid-node — Receipt Issuance and Verification
//!
//! The attestation pipeline on top of `attestgrid-core` and
//! `attestgrid-crypto`:
//!
//! - **`node`**: `AttestationNode`, which runs a task once per `task_id`
//!   and issues a signed receipt for it.
//! - **`store`** / **`file_store`**: append-only receipt storage with
//!   atomic insert-if-absent.
//! - **`verify`**: signature and receipt-hash checks for any receipt.
//! - **`stats`**: transparency rollups over the store.
//! - **`validator`**: the built-in `required_keys` / `max_len` rule checks.
//!
//! Everything here is synchronous. Store and key I/O may block, so async
//! hosts should call in from a blocking thread pool.

pub mod config;
pub mod error;
pub mod file_store;
pub mod node;
pub mod stats;
pub mod store;
pub mod validator;
pub mod verify;

pub use config::{ConfigError, NodeConfig, DEFAULT_NODE_ID};
pub use error::{AttestError, StoreError, VerifyError};
pub use file_store::FileReceiptStore;
pub use node::{AttestOutcome, AttestationNode, TaskOutput};
pub use stats::{ReadmeMarkersMissing, Stats, StatsAggregator, README_STATS_END, README_STATS_START};
pub use store::{MemoryReceiptStore, PersistOutcome, ReceiptStore};
pub use validator::{passthrough_task, RulesValidator};
pub use verify::{VerificationReport, Verifier};
