//! # Receipt Store
//!
//! Append-only mapping from `task_id` to the receipt first issued for it.
//!
//! ## Invariants
//!
//! - `persist` inserts only if absent. Under concurrent inserts for one
//!   `task_id` exactly one receipt is stored, and every losing caller gets
//!   the winner back in `PersistOutcome::AlreadyPresent`.
//! - An insert is all-or-nothing: a failed or interrupted `persist` never
//!   leaves a partial record visible to `get`.
//! - There is no update or delete.

use std::collections::BTreeMap;

use attestgrid_core::Receipt;
use parking_lot::RwLock;

use crate::error::StoreError;

/// Result of an insert-if-absent.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    /// The receipt was stored.
    Inserted(Receipt),
    /// A receipt for this `task_id` already existed; it is returned
    /// unchanged and the offered receipt was discarded.
    AlreadyPresent(Receipt),
}

impl PersistOutcome {
    pub fn receipt(&self) -> &Receipt {
        match self {
            Self::Inserted(r) | Self::AlreadyPresent(r) => r,
        }
    }

    pub fn into_receipt(self) -> Receipt {
        match self {
            Self::Inserted(r) | Self::AlreadyPresent(r) => r,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// Durable, append-only receipt storage keyed by `task_id`.
///
/// All methods are blocking. Async callers should run them on a blocking
/// thread pool.
pub trait ReceiptStore: Send + Sync {
    /// Insert `receipt` under `task_id` unless a receipt already exists.
    ///
    /// `receipt.task_id` must equal `task_id`.
    fn persist(&self, task_id: &str, receipt: Receipt) -> Result<PersistOutcome, StoreError>;

    /// The receipt stored for `task_id`, if any.
    fn get(&self, task_id: &str) -> Result<Option<Receipt>, StoreError>;

    /// Every stored receipt, ordered by `task_id`.
    fn list_all(&self) -> Result<Vec<Receipt>, StoreError>;

    /// Number of stored receipts.
    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

pub(crate) fn check_key(task_id: &str, receipt: &Receipt) -> Result<(), StoreError> {
    if receipt.task_id() == task_id {
        Ok(())
    } else {
        Err(StoreError::KeyMismatch {
            key: task_id.to_string(),
            task_id: receipt.task_id().to_string(),
        })
    }
}

// -- In-Memory Store ----------------------------------------------------------

/// Process-local store for tests and ephemeral nodes.
///
/// The `parking_lot` lock is never held across an `.await`, and a
/// panicking writer does not poison it.
#[derive(Debug, Default)]
pub struct MemoryReceiptStore {
    records: RwLock<BTreeMap<String, Receipt>>,
}

impl MemoryReceiptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReceiptStore for MemoryReceiptStore {
    fn persist(&self, task_id: &str, receipt: Receipt) -> Result<PersistOutcome, StoreError> {
        check_key(task_id, &receipt)?;
        let mut records = self.records.write();
        if let Some(existing) = records.get(task_id) {
            return Ok(PersistOutcome::AlreadyPresent(existing.clone()));
        }
        records.insert(task_id.to_string(), receipt.clone());
        Ok(PersistOutcome::Inserted(receipt))
    }

    fn get(&self, task_id: &str) -> Result<Option<Receipt>, StoreError> {
        Ok(self.records.read().get(task_id).cloned())
    }

    fn list_all(&self) -> Result<Vec<Receipt>, StoreError> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().len())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{receipt, receipt_with_result};
    use super::*;
    use std::sync::Arc;

    #[test]
    fn insert_then_get() {
        let store = MemoryReceiptStore::new();
        assert!(store.is_empty().unwrap());
        let outcome = store.persist("t1", receipt("t1", "1")).unwrap();
        assert!(outcome.was_inserted());
        assert_eq!(store.get("t1").unwrap(), Some(receipt("t1", "1")));
        assert_eq!(store.get("t2").unwrap(), None);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn second_insert_returns_first_receipt() {
        let store = MemoryReceiptStore::new();
        store.persist("t1", receipt("t1", "1")).unwrap();
        let outcome = store.persist("t1", receipt("t1", "2")).unwrap();
        assert_eq!(outcome, PersistOutcome::AlreadyPresent(receipt("t1", "1")));
        assert_eq!(store.get("t1").unwrap().unwrap().signature, "1".repeat(128));
    }

    #[test]
    fn stored_result_matches_output_hash() {
        let store = MemoryReceiptStore::new();
        let output = serde_json::json!({"result": 3, "notes": ["ok"]});
        store
            .persist("t1", receipt_with_result("t1", output.clone()))
            .unwrap();
        let stored = store.get("t1").unwrap().unwrap();
        assert_eq!(stored.result, Some(output));
        assert_eq!(stored.result_matches_output_hash(), Some(true));
    }

    #[test]
    fn key_must_match_receipt() {
        let store = MemoryReceiptStore::new();
        let err = store.persist("t1", receipt("t2", "1")).unwrap_err();
        assert!(matches!(err, StoreError::KeyMismatch { .. }));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn list_all_is_sorted_by_task_id() {
        let store = MemoryReceiptStore::new();
        for id in ["zeta", "alpha", "mu"] {
            store.persist(id, receipt(id, "1")).unwrap();
        }
        let ids: Vec<String> = store
            .list_all()
            .unwrap()
            .iter()
            .map(|r| r.task_id().to_string())
            .collect();
        assert_eq!(ids, ["alpha", "mu", "zeta"]);
    }

    #[test]
    fn concurrent_inserts_store_exactly_one() {
        let store = Arc::new(MemoryReceiptStore::new());
        let sigs = ["1", "2", "3", "4", "5", "6", "7", "8"];
        let handles: Vec<_> = sigs
            .iter()
            .map(|sig| {
                let store = Arc::clone(&store);
                let sig = sig.to_string();
                std::thread::spawn(move || store.persist("race", receipt("race", &sig)).unwrap())
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(outcomes.iter().filter(|o| o.was_inserted()).count(), 1);
        let stored = store.get("race").unwrap().unwrap();
        assert!(outcomes.iter().all(|o| *o.receipt() == stored));
    }
}
