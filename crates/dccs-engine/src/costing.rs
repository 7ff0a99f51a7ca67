//! # Costing
//!
//! USD valuation of an allocation ledger.
//!
//! - Per line: `unit_price_usd × total_units`
//! - Per well and date: Σ USD cost of every allocation on that date
//! - Per phase: each (line, date) allocation split across the phases of the
//!   line's well active that day, in proportion to their day fractions
//!
//! Products and sums saturate at `Decimal::MAX` instead of overflowing.

use crate::schedule::DayFractionTable;
use chrono::NaiveDate;
use dccs_models::{AllocationLedger, LineKey, PhaseCode, WellName, line_cost, saturating_sum};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use dccs_models::unit_price_usd;

/// Actual for dates before the reporting day, projected from it onwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostStatus {
    Actual,
    Projected,
}

impl CostStatus {
    pub fn on(date: NaiveDate, today: NaiveDate) -> Self {
        if date < today {
            CostStatus::Actual
        } else {
            CostStatus::Projected
        }
    }
}

/// One line's allocation on one date, attributed to one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseCostRow {
    pub line: LineKey,
    /// `None` when no phase of the line's well was active on `date`
    pub phase: Option<PhaseCode>,
    pub date: NaiveDate,
    pub quantity: Decimal,
    pub day_fraction_share: Decimal,
    pub line_cost_usd: Decimal,
    pub status: CostStatus,
}

/// Per well, per date, USD cost of all allocations.
pub fn daily_cost_by_well(
    ledger: &AllocationLedger,
    usd_rate: Decimal,
) -> BTreeMap<WellName, BTreeMap<NaiveDate, Decimal>> {
    let mut costs: BTreeMap<WellName, BTreeMap<NaiveDate, Decimal>> = BTreeMap::new();
    for line in ledger.iter() {
        let price = line.unit_price_usd(usd_rate);
        let by_date = costs.entry(line.key().well.clone()).or_default();
        for (date, quantity) in &line.allocations {
            let cost = by_date.entry(*date).or_default();
            *cost = cost.saturating_add(line_cost(price, *quantity));
        }
    }
    costs
}

/// Total USD cost of the ledger.
pub fn total_cost_usd(ledger: &AllocationLedger, usd_rate: Decimal) -> Decimal {
    saturating_sum(ledger.iter().map(|l| l.total_cost_usd(usd_rate)))
}

/// Split every allocation across the phases active on its date.
pub fn expand_by_phase(
    ledger: &AllocationLedger,
    table: &DayFractionTable,
    today: NaiveDate,
    usd_rate: Decimal,
) -> Vec<PhaseCostRow> {
    let mut rows = Vec::new();
    for line in ledger.iter() {
        let key = line.key();
        let price = line.unit_price_usd(usd_rate);
        for (&date, &quantity) in &line.allocations {
            if quantity.is_zero() {
                continue;
            }
            let status = CostStatus::on(date, today);
            let active = table.active_phases(&key.well, key.event.as_ref(), date);
            let total = saturating_sum(active.iter().map(|(_, f)| *f));

            if total.is_zero() {
                rows.push(PhaseCostRow {
                    line: key.clone(),
                    phase: None,
                    date,
                    quantity,
                    day_fraction_share: Decimal::ONE,
                    line_cost_usd: line_cost(price, quantity),
                    status,
                });
                continue;
            }

            for (code, fraction) in active {
                let share = fraction / total;
                rows.push(PhaseCostRow {
                    line: key.clone(),
                    phase: Some(code),
                    date,
                    quantity: quantity.saturating_mul(share),
                    day_fraction_share: share,
                    line_cost_usd: line_cost(line_cost(price, quantity), share),
                    status,
                });
            }
        }
    }
    rows
}
