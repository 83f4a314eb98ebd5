//! # API Route Modules
//!
//! - `attest` — receipt issuance and lookup by `task_id`.
//! - `verify` — signature and receipt-hash checks against this node's key.
//! - `node` — public key publication and transparency statistics.
//! - `health` — liveness probe.

pub mod attest;
pub mod health;
pub mod node;
pub mod verify;
