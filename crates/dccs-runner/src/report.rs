//! # Text Rendering
//!
//! Human-readable summaries printed by the `dccs` subcommands. JSON output
//! serializes the same structures directly.

use chrono::NaiveDate;
use dccs_engine::{DayFractionTable, RunReport, Schedule, daily_cost_by_well, total_cost_usd};
use dccs_models::{AllocationLedger, LineKey, WellName, saturating_sum};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

const MAX_LISTED: usize = 20;

// =============================================================================
// Costs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineCost {
    pub line: LineKey,
    pub total_units: Decimal,
    pub unit_price_usd: Decimal,
    pub total_cost_usd: Decimal,
}

/// Ledger valuation in USD.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostSummary {
    pub usd_rate: Decimal,
    pub total_cost_usd: Decimal,
    pub lines: Vec<LineCost>,
    pub daily_by_well: BTreeMap<WellName, BTreeMap<NaiveDate, Decimal>>,
}

impl CostSummary {
    pub fn from_ledger(ledger: &AllocationLedger, usd_rate: Decimal) -> Self {
        let lines = ledger
            .iter()
            .map(|l| LineCost {
                line: l.key().clone(),
                total_units: l.total_units(),
                unit_price_usd: l.unit_price_usd(usd_rate),
                total_cost_usd: l.total_cost_usd(usd_rate),
            })
            .collect();
        Self {
            usd_rate,
            total_cost_usd: total_cost_usd(ledger, usd_rate),
            lines,
            daily_by_well: daily_cost_by_well(ledger, usd_rate),
        }
    }
}

pub fn render_costs(summary: &CostSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Costs (USD, rate {} local/USD)", summary.usd_rate);
    for line in &summary.lines {
        let _ = writeln!(
            out,
            "  {:<50} {:>10} x {:>12} = {:>14}",
            line.line.to_string(),
            line.total_units.round_dp(4),
            line.unit_price_usd.round_dp(2),
            line.total_cost_usd.round_dp(2)
        );
    }
    let _ = writeln!(out, "\nDaily cost by well:");
    for (well, days) in &summary.daily_by_well {
        let well_total = saturating_sum(days.values().copied());
        let _ = writeln!(out, "  {} ({} days, {})", well, days.len(), well_total.round_dp(2));
        for (date, cost) in days {
            let _ = writeln!(out, "    {}  {:>14}", date, cost.round_dp(2));
        }
    }
    let _ = writeln!(out, "\nTotal: {}", summary.total_cost_usd.round_dp(2));
    out
}

// =============================================================================
// Schedule
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleView<'a> {
    pub campaign: dccs_engine::CampaignRange,
    pub phases: &'a [dccs_models::ActivityPhase],
    pub day_fractions: Vec<dccs_models::DayFractionEntry>,
    /// Headline well for the day before `today`
    pub yesterday: NaiveDate,
    pub active_well: Option<WellName>,
}

impl<'a> ScheduleView<'a> {
    pub fn new(schedule: &'a Schedule, table: &DayFractionTable, today: NaiveDate) -> Self {
        let yesterday = today.pred_opt().unwrap_or(today);
        Self {
            campaign: table.range(),
            phases: schedule.phases(),
            day_fractions: table.entries(),
            yesterday,
            active_well: table.active_well(yesterday).cloned(),
        }
    }
}

pub fn render_schedule(view: &ScheduleView<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Campaign {} ({} phases)", view.campaign, view.phases.len());
    if let Some(well) = &view.active_well {
        let _ = writeln!(out, "Active well on {}: {}", view.yesterday, well);
    }
    for phase in view.phases {
        let hours = phase
            .effective_hours
            .map(|h| h.to_string())
            .unwrap_or_else(|| "gap".to_string());
        let _ = writeln!(
            out,
            "  {:<12} {:>5} {:<24} {} -> {}  ({} h)",
            phase.well.to_string(),
            phase.phase_code.to_string(),
            phase.phase_label,
            phase.start,
            phase.end,
            hours
        );
    }
    let _ = writeln!(out, "\nDay fractions:");
    for entry in &view.day_fractions {
        let _ = writeln!(
            out,
            "  {:<12} {:>5} {}  {}",
            entry.well.to_string(),
            entry.phase_code.to_string(),
            entry.date,
            entry.fraction.round_dp(6)
        );
    }
    out
}

// =============================================================================
// Run
// =============================================================================

pub fn render_run(report: &RunReport, ledger_sha256: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Charging run {} (cutoff {})", report.today, report.cutoff);
    let _ = writeln!(out, "  Campaign: {}", report.campaign);
    let _ = writeln!(
        out,
        "  Lines: {} allocated of {} ({} errors, {} notices)",
        report.lines_allocated,
        report.lines_total,
        report.errors.len(),
        report.notices.len()
    );
    if let Some(summary) = &report.reconcile {
        let _ = writeln!(
            out,
            "  Reconciled: {} merged, {} new, {} dropped, {} dates preserved",
            summary.merged_lines, summary.new_lines, summary.dropped_lines, summary.preserved_dates
        );
    }
    if let Some(sha) = ledger_sha256 {
        let _ = writeln!(out, "  Ledger SHA-256: {}", sha);
    }

    if !report.errors.is_empty() {
        let _ = writeln!(out, "\nErrors ({}):", report.errors.len());
        for (i, e) in report.errors.iter().enumerate() {
            if i >= MAX_LISTED {
                let _ = writeln!(out, "  ... and {} more", report.errors.len() - MAX_LISTED);
                break;
            }
            let _ = writeln!(out, "  - [{}] {}: {}", e.kind, e.line, e.message);
        }
    }
    if !report.notices.is_empty() {
        let _ = writeln!(out, "\nNotices ({}):", report.notices.len());
        for (i, n) in report.notices.iter().enumerate() {
            if i >= MAX_LISTED {
                let _ = writeln!(out, "  ... and {} more", report.notices.len() - MAX_LISTED);
                break;
            }
            let _ = writeln!(out, "  - {}: {}", n.line, n.note);
        }
    }
    out
}
