//! # Proration Allocator
//!
//! Spreads a resolved instruction's quantity over calendar dates.
//!
//! ## Rules
//! | rule       | weight on `date`                                      | cap   |
//! |------------|-------------------------------------------------------|-------|
//! | date range | Σ fractions of the line's well (and event)            | yes   |
//! | phase set  | Σ fractions of the listed phases of the line's well   | yes   |
//! | lump sum   | full quantity if the well is active that day          | no    |
//!
//! ## Cap Depletion
//! `allocated = min(quantity × weight, remaining)`; the loop stops as soon as
//! `remaining <= 0`. Reaching the cap is a normal outcome, reported as a notice.
//!
//! Zero quantities are never stored and every stored date lies in the campaign range.

use crate::config::LumpSumPolicy;
use crate::resolver::{AllocationRule, ResolvedInstruction};
use crate::schedule::{CampaignRange, DayFractionTable, dates_between};
use chrono::NaiveDate;
use dccs_models::{EventKey, PhaseCode, WellName};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Whose activity weights the allocation: the line's well and grouping key.
#[derive(Debug, Clone, Copy)]
pub struct LineTarget<'a> {
    pub well: &'a WellName,
    pub event: Option<&'a EventKey>,
}

/// Informational outcomes of an allocation. None of these exclude the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllocationNote {
    /// Occurrence cap fully consumed on `date`
    CapExhausted { date: NaiveDate, cap: Decimal },
    /// Lump-sum date with no activity for the line's well
    LumpSumInactive { date: NaiveDate, allocated: bool },
    /// Lump-sum date outside the campaign range; never allocated
    LumpSumOutsideCampaign { date: NaiveDate },
}

impl std::fmt::Display for AllocationNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocationNote::CapExhausted { date, cap } => {
                write!(f, "occurrence cap {} exhausted on {}", cap, date)
            }
            AllocationNote::LumpSumInactive { date, allocated: true } => {
                write!(f, "lump sum allocated on {} although the well is inactive", date)
            }
            AllocationNote::LumpSumInactive { date, allocated: false } => {
                write!(f, "lump sum withheld: well inactive on {}", date)
            }
            AllocationNote::LumpSumOutsideCampaign { date } => {
                write!(f, "lump sum withheld: {} is outside the campaign", date)
            }
        }
    }
}

/// Result of allocating one line item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Allocation {
    /// Sparse: no zero quantities
    pub quantities: BTreeMap<NaiveDate, Decimal>,
    pub notes: Vec<AllocationNote>,
}

impl Allocation {
    pub fn total(&self) -> Decimal {
        self.quantities.values().copied().sum()
    }
}

/// Allocate `resolved` for `target` over the table's campaign range.
pub fn allocate(
    resolved: &ResolvedInstruction,
    target: LineTarget<'_>,
    table: &DayFractionTable,
    policy: LumpSumPolicy,
) -> Allocation {
    let range = table.range();
    match &resolved.rule {
        AllocationRule::DateRange { start, end } => {
            let dates = clamp(*start, *end, &range);
            capped(resolved, dates, |date| {
                table.well_fraction(target.well, target.event, date)
            })
        }
        AllocationRule::PhaseSet { phases } => {
            let codes: &[PhaseCode] = phases.get(target.well).map(Vec::as_slice).unwrap_or(&[]);
            capped(resolved, range.dates(), |date| {
                table.phase_set_fraction(target.well, codes, target.event, date)
            })
        }
        AllocationRule::LumpSum { date } => {
            lump_sum(resolved.quantity, *date, target, table, policy)
        }
    }
}

/// Dates of `[start, end]` that fall inside `range`.
fn clamp(start: NaiveDate, end: NaiveDate, range: &CampaignRange) -> Vec<NaiveDate> {
    let lo = start.max(range.start);
    let hi = end.min(range.end);
    if hi < lo {
        return Vec::new();
    }
    dates_between(lo, hi).collect()
}

fn capped<I, W>(resolved: &ResolvedInstruction, dates: I, weight: W) -> Allocation
where
    I: IntoIterator<Item = NaiveDate>,
    W: Fn(NaiveDate) -> Decimal,
{
    let mut allocation = Allocation::default();
    let mut remaining = resolved.cap;
    if remaining <= Decimal::ZERO {
        return allocation;
    }
    for date in dates {
        let wanted = resolved.quantity * weight(date);
        let amount = wanted.min(remaining);
        if amount <= Decimal::ZERO {
            continue;
        }
        allocation.quantities.insert(date, amount);
        remaining -= amount;
        if remaining <= Decimal::ZERO {
            allocation.notes.push(AllocationNote::CapExhausted {
                date,
                cap: resolved.cap,
            });
            break;
        }
    }
    allocation
}

fn lump_sum(
    quantity: Decimal,
    date: NaiveDate,
    target: LineTarget<'_>,
    table: &DayFractionTable,
    policy: LumpSumPolicy,
) -> Allocation {
    let mut allocation = Allocation::default();
    if !table.range().contains(date) {
        warn!(well = %target.well, %date, "Lump-sum date outside campaign range, withheld");
        allocation
            .notes
            .push(AllocationNote::LumpSumOutsideCampaign { date });
        return allocation;
    }

    let active = !table.well_fraction(target.well, target.event, date).is_zero();
    let allocate = active || policy == LumpSumPolicy::AllocateWithWarning;
    if !active {
        warn!(well = %target.well, %date, ?policy, "Lump-sum date has no activity");
        allocation.notes.push(AllocationNote::LumpSumInactive {
            date,
            allocated: allocate,
        });
    }
    if allocate && !quantity.is_zero() {
        allocation.quantities.insert(date, quantity);
    }
    allocation
}
