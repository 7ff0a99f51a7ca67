//! # Manual-Override Reconciler
//!
//! Merges a prior (hand-edited) ledger into a freshly computed one.
//!
//! For a line present in both ledgers:
//! - dates before `cutoff`: the prior value where the prior ledger has one
//!   (an explicit zero counts), otherwise the new value
//! - dates on or after `cutoff`: the new value only
//!
//! Lines only in the new ledger pass through. Lines only in the prior ledger
//! are dropped. Line metadata always comes from the new ledger.
//!
//! The merge is pure and idempotent: `reconcile(old, reconcile(old, new, c), c)`
//! equals `reconcile(old, new, c)`.

use chrono::NaiveDate;
use dccs_models::{AllocationLedger, LedgerLine};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Counts describing one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    /// Lines found in both ledgers
    pub merged_lines: usize,
    /// Lines only in the new ledger
    pub new_lines: usize,
    /// Lines only in the prior ledger
    pub dropped_lines: usize,
    /// Pre-cutoff dates whose prior value was kept
    pub preserved_dates: usize,
}

/// Merge `old` into `new` at `cutoff`.
pub fn reconcile(
    old: &AllocationLedger,
    new: &AllocationLedger,
    cutoff: NaiveDate,
) -> AllocationLedger {
    reconcile_with_summary(old, new, cutoff).0
}

/// As [`reconcile`], also returning merge counts.
pub fn reconcile_with_summary(
    old: &AllocationLedger,
    new: &AllocationLedger,
    cutoff: NaiveDate,
) -> (AllocationLedger, ReconcileSummary) {
    let mut summary = ReconcileSummary::default();
    let mut merged = AllocationLedger::new();

    for line in new.iter() {
        match old.get(line.key()) {
            Some(prior) => {
                summary.merged_lines += 1;
                let (line, preserved) = merge_line(prior, line, cutoff);
                summary.preserved_dates += preserved;
                merged.insert(line);
            }
            None => {
                summary.new_lines += 1;
                merged.insert(line.clone());
            }
        }
    }

    for prior in old.iter().filter(|l| !new.contains(l.key())) {
        summary.dropped_lines += 1;
        debug!(line = %prior.key(), "Prior line has no current definition, dropped");
    }

    (merged, summary)
}

fn merge_line(prior: &LedgerLine, current: &LedgerLine, cutoff: NaiveDate) -> (LedgerLine, usize) {
    let mut allocations = current.allocations.clone();
    let mut preserved = 0;
    for (date, quantity) in prior.allocations.range(..cutoff) {
        allocations.insert(*date, *quantity);
        preserved += 1;
    }
    (LedgerLine::with_overrides(current.item.clone(), allocations), preserved)
}
