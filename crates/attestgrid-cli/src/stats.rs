//! # Stats Subcommand
//!
//! Computes transparency statistics offline, either from a file receipt
//! store or from a saved `GET /v1/stats` response, and optionally rewrites
//! the marked stats block in a README.
//!
//! A store rollup has no record of verifications, so it reports
//! `verifications_total` as 0 unless `--verifications` is given.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use attestgrid_node::{FileReceiptStore, ReceiptStore, Stats};

/// Arguments for `attestgrid stats`.
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Root directory of a file receipt store (`ATTESTGRID_STORE_DIR`).
    #[arg(long, required_unless_present = "from_json", conflicts_with = "from_json")]
    pub store: Option<PathBuf>,

    /// A saved `GET /v1/stats` response to use instead of a store.
    #[arg(long)]
    pub from_json: Option<PathBuf>,

    /// Verification count to report with a store rollup.
    #[arg(long, default_value_t = 0, conflicts_with = "from_json")]
    pub verifications: u64,

    /// README whose stats block should be replaced.
    #[arg(long)]
    pub readme: Option<PathBuf>,
}

/// Execute `attestgrid stats`.
pub fn run_stats(args: &StatsArgs, out: &mut impl Write) -> Result<u8> {
    let stats = load_stats(args)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;

    let Some(readme) = &args.readme else {
        return Ok(0);
    };
    let content = std::fs::read_to_string(readme)
        .with_context(|| format!("failed to read {}", readme.display()))?;
    let updated = stats
        .replace_readme_block(&content)
        .with_context(|| readme.display().to_string())?;

    if updated == content {
        writeln!(out, "No changes needed.")?;
    } else {
        std::fs::write(readme, &updated)
            .with_context(|| format!("failed to write {}", readme.display()))?;
        writeln!(out, "{} updated.", readme.display())?;
        tracing::info!(readme = %readme.display(), "stats block replaced");
    }
    Ok(0)
}

fn load_stats(args: &StatsArgs) -> Result<Stats> {
    if let Some(path) = &args.from_json {
        let value = crate::read_json(path)?;
        return serde_json::from_value(value)
            .with_context(|| format!("{} is not a stats response", path.display()));
    }

    let Some(root) = &args.store else {
        bail!("either --store or --from-json is required");
    };
    if !root.is_dir() {
        bail!("receipt store not found: {}", root.display());
    }
    let store = FileReceiptStore::open(root)?;
    let receipts = store.list_all()?;
    tracing::debug!(count = receipts.len(), store = %root.display(), "read receipt store");
    Ok(Stats::from_receipts(&receipts, args.verifications))
}
