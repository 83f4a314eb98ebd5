//! # Transparency Statistics
//!
//! Read-only rollup over the receipt store, published at `GET /v1/stats`
//! and rendered into a README block by the CLI.
//!
//! `verifications_total` counts verification requests served by this
//! process since start. It is not persisted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use attestgrid_core::Receipt;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::ReceiptStore;

/// Start marker of the README stats block.
pub const README_STATS_START: &str = "<!-- ATTESTGRID_STATS_START -->";
/// End marker of the README stats block.
pub const README_STATS_END: &str = "<!-- ATTESTGRID_STATS_END -->";

/// A point-in-time rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub receipts_total: u64,
    pub verifications_total: u64,
    /// Receipts whose validator rejected the output.
    pub passed_false: u64,
    /// `passed_false / receipts_total`, or `0.0` with no receipts.
    pub block_rate: f64,
}

impl Stats {
    /// Roll up `receipts`.
    pub fn from_receipts<'a>(
        receipts: impl IntoIterator<Item = &'a Receipt>,
        verifications_total: u64,
    ) -> Self {
        let (total, blocked) = receipts
            .into_iter()
            .fold((0u64, 0u64), |(total, blocked), r| {
                (total + 1, blocked + u64::from(r.is_blocked()))
            });
        let block_rate = if total == 0 {
            0.0
        } else {
            blocked as f64 / total as f64
        };
        Self {
            receipts_total: total,
            verifications_total,
            passed_false: blocked,
            block_rate,
        }
    }

    /// The marked README block, markers included.
    pub fn readme_block(&self) -> String {
        format!(
            "{README_STATS_START}\n\
             **Live stats (auto-updated):**\n\
             - Total Receipts: **{}**\n\
             - Verifications: **{}**\n\
             - Blocked (passed:false): **{}**\n\
             - Block rate: **{:.3}**\n\
             {README_STATS_END}",
            self.receipts_total, self.verifications_total, self.passed_false, self.block_rate
        )
    }

    /// Replace the marked block in `readme` with [`readme_block`](Self::readme_block).
    pub fn replace_readme_block(&self, readme: &str) -> Result<String, ReadmeMarkersMissing> {
        let start = readme.find(README_STATS_START).ok_or(ReadmeMarkersMissing)?;
        let end_rel = readme[start..]
            .find(README_STATS_END)
            .ok_or(ReadmeMarkersMissing)?;
        let end = start + end_rel + README_STATS_END.len();

        let mut out = String::with_capacity(readme.len());
        out.push_str(&readme[..start]);
        out.push_str(&self.readme_block());
        out.push_str(&readme[end..]);
        Ok(out)
    }
}

/// The README has no complete stats marker pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("README is missing the ATTESTGRID_STATS_START / ATTESTGRID_STATS_END markers")]
pub struct ReadmeMarkersMissing;

/// Live statistics for a running node.
pub struct StatsAggregator {
    store: Arc<dyn ReceiptStore>,
    verifications: AtomicU64,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn ReceiptStore>) -> Self {
        Self {
            store,
            verifications: AtomicU64::new(0),
        }
    }

    /// Count one served verification request.
    pub fn record_verification(&self) {
        self.verifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn verifications_total(&self) -> u64 {
        self.verifications.load(Ordering::Relaxed)
    }

    /// Roll up the store as it is now.
    pub fn snapshot(&self) -> Result<Stats, StoreError> {
        let receipts = self.store.list_all()?;
        Ok(Stats::from_receipts(&receipts, self.verifications_total()))
    }
}

impl std::fmt::Debug for StatsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsAggregator")
            .field("verifications", &self.verifications_total())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::receipt;
    use crate::store::MemoryReceiptStore;
    use attestgrid_core::ValidatorResult;

    fn blocked(task_id: &str) -> Receipt {
        let mut r = receipt(task_id, "1");
        r.payload.validator = ValidatorResult::reject(vec!["Missing key: x".into()]);
        r
    }

    #[test]
    fn empty_rollup_has_zero_rate() {
        let stats = Stats::from_receipts(&[], 3);
        assert_eq!(stats.receipts_total, 0);
        assert_eq!(stats.verifications_total, 3);
        assert_eq!(stats.block_rate, 0.0);
    }

    #[test]
    fn block_rate_is_blocked_over_total() {
        let receipts: Vec<Receipt> = (0..4)
            .map(|i| {
                if i == 0 {
                    blocked(&format!("t{i}"))
                } else {
                    receipt(&format!("t{i}"), "1")
                }
            })
            .collect();
        let stats = Stats::from_receipts(&receipts, 0);
        assert_eq!(stats.receipts_total, 4);
        assert_eq!(stats.passed_false, 1);
        assert_eq!(stats.block_rate, 0.25);
    }

    #[test]
    fn aggregator_counts_verifications_and_reads_store() {
        let store = Arc::new(MemoryReceiptStore::new());
        store.persist("a", receipt("a", "1")).unwrap();
        store.persist("b", blocked("b")).unwrap();
        let agg = StatsAggregator::new(store);
        agg.record_verification();
        agg.record_verification();

        let stats = agg.snapshot().unwrap();
        assert_eq!(stats.receipts_total, 2);
        assert_eq!(stats.passed_false, 1);
        assert_eq!(stats.verifications_total, 2);
        assert_eq!(stats.block_rate, 0.5);
    }

    #[test]
    fn stats_json_shape() {
        let value = serde_json::to_value(Stats::from_receipts(&[], 0)).unwrap();
        let mut keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        keys.sort();
        assert_eq!(
            keys,
            ["block_rate", "passed_false", "receipts_total", "verifications_total"]
        );
    }

    #[test]
    fn readme_block_formats_rate_to_three_places() {
        let stats = Stats {
            receipts_total: 27,
            verifications_total: 5,
            passed_false: 10,
            block_rate: 10.0 / 27.0,
        };
        let block = stats.readme_block();
        assert!(block.starts_with(README_STATS_START));
        assert!(block.ends_with(README_STATS_END));
        assert_eq!(
            block,
            format!(
                "{README_STATS_START}\n\
                 **Live stats (auto-updated):**\n\
                 - Total Receipts: **27**\n\
                 - Verifications: **5**\n\
                 - Blocked (passed:false): **10**\n\
                 - Block rate: **0.370**\n\
                 {README_STATS_END}"
            )
        );
    }

    #[test]
    fn replace_readme_block_keeps_surroundings() {
        let readme = format!(
            "# Project\n\nIntro.\n\n{README_STATS_START}\nold\n{README_STATS_END}\n\n## Usage\n"
        );
        let stats = Stats::from_receipts(&[receipt("a", "1")], 1);
        let updated = stats.replace_readme_block(&readme).unwrap();
        assert!(updated.starts_with("# Project\n\nIntro.\n\n"));
        assert!(updated.ends_with("\n\n## Usage\n"));
        assert!(!updated.contains("\nold\n"));
        assert!(updated.contains("- Total Receipts: **1**"));

        // Idempotent once updated.
        assert_eq!(stats.replace_readme_block(&updated).unwrap(), updated);
    }

    #[test]
    fn replace_requires_both_markers() {
        let stats = Stats::from_receipts(&[], 0);
        assert_eq!(
            stats.replace_readme_block("# no markers"),
            Err(ReadmeMarkersMissing)
        );
        assert!(stats
            .replace_readme_block(&format!("{README_STATS_START} but no end"))
            .is_err());
    }
}
