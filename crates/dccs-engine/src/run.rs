//! # Charging Run
//!
//! Batch driver: every line item is parsed, resolved against its well,
//! allocated, and finally reconciled with the prior ledger.
//!
//! ## Failure Scope
//! - Schedule or configuration problems fail the run (`RunError`)
//! - A bad line item becomes a `LineError` and is left out of the ledger;
//!   all other lines still allocate
//! - Cap depletion and lump-sum withholding are `LineNotice`s, not errors

use crate::config::{ConfigError, EngineConfig};
use crate::instruction::{ParseError, parse_instruction};
use crate::proration::{Allocation, AllocationNote, LineTarget, allocate};
use crate::reconcile::{ReconcileSummary, reconcile_with_summary};
use crate::resolver::{ResolveError, resolve};
use crate::schedule::{CampaignRange, DayFractionTable, Schedule, ScheduleError};
use chrono::NaiveDate;
use dccs_models::{AllocationLedger, LedgerLine, LineItem, LineKey, WellName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

// =============================================================================
// Errors and Notices
// =============================================================================

/// Failures that stop the whole run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Invalid engine configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineErrorKind {
    Parse,
    ReferenceNotFound,
    ScheduleGap,
    InvertedRange,
    DuplicateLine,
}

impl std::fmt::Display for LineErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LineErrorKind::Parse => "parse",
            LineErrorKind::ReferenceNotFound => "reference_not_found",
            LineErrorKind::ScheduleGap => "schedule_gap",
            LineErrorKind::InvertedRange => "inverted_range",
            LineErrorKind::DuplicateLine => "duplicate_line",
        };
        write!(f, "{}", s)
    }
}

/// A line item excluded from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineError {
    pub well: WellName,
    pub line: LineKey,
    pub kind: LineErrorKind,
    pub message: String,
}

impl LineError {
    fn new(line: &LineKey, kind: LineErrorKind, message: impl Into<String>) -> Self {
        Self {
            well: line.well.clone(),
            line: line.clone(),
            kind,
            message: message.into(),
        }
    }

    fn parse(line: &LineKey, err: ParseError) -> Self {
        Self::new(line, LineErrorKind::Parse, err.to_string())
    }

    fn resolve(line: &LineKey, err: ResolveError) -> Self {
        let kind = match err {
            ResolveError::ReferenceNotFound { .. } => LineErrorKind::ReferenceNotFound,
            ResolveError::ScheduleGap { .. } => LineErrorKind::ScheduleGap,
            ResolveError::InvertedRange { .. } => LineErrorKind::InvertedRange,
        };
        Self::new(line, kind, err.to_string())
    }
}

/// Informational outcome attached to an allocated line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineNotice {
    pub line: LineKey,
    pub note: AllocationNote,
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub today: NaiveDate,
    pub cutoff: NaiveDate,
    pub campaign: CampaignRange,
    pub lines_total: usize,
    pub lines_allocated: usize,
    pub errors: Vec<LineError>,
    pub notices: Vec<LineNotice>,
    /// Present when a prior ledger was merged
    pub reconcile: Option<ReconcileSummary>,
    pub ledger_digest: String,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors_of(&self, kind: LineErrorKind) -> impl Iterator<Item = &LineError> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ledger: AllocationLedger,
    pub table: DayFractionTable,
    pub report: RunReport,
}

// =============================================================================
// Run
// =============================================================================

pub struct ChargingRun;

impl ChargingRun {
    /// Allocate every line item and merge with `prior` at the configured cutoff.
    pub fn execute(
        schedule: &Schedule,
        lines: &[LineItem],
        prior: Option<&AllocationLedger>,
        config: &EngineConfig,
        today: NaiveDate,
    ) -> Result<RunOutput, RunError> {
        config.validate()?;
        let campaign = config.campaign_range(schedule)?;
        let cutoff = config.resolve_cutoff(today);
        let table = schedule.day_fractions(Some(campaign));
        info!(%campaign, %cutoff, lines = lines.len(), "Starting charging run");

        let mut seen: BTreeSet<&LineKey> = BTreeSet::new();
        let mut errors = Vec::new();
        let mut notices = Vec::new();
        let mut computed = AllocationLedger::new();

        for item in lines {
            if !seen.insert(&item.key) {
                warn!(line = %item.key, "Duplicate line item skipped");
                errors.push(LineError::new(
                    &item.key,
                    LineErrorKind::DuplicateLine,
                    "line identity already used by an earlier row",
                ));
                continue;
            }

            match allocate_line(schedule, &table, item, config) {
                Ok(allocation) => {
                    debug!(
                        line = %item.key,
                        dates = allocation.quantities.len(),
                        total = %allocation.total(),
                        "Allocated"
                    );
                    notices.extend(allocation.notes.iter().map(|note| LineNotice {
                        line: item.key.clone(),
                        note: note.clone(),
                    }));
                    computed.insert(LedgerLine::new(item.clone(), allocation.quantities));
                }
                Err(err) => {
                    warn!(
                        line = %item.key,
                        kind = %err.kind,
                        error = %err.message,
                        "Line item skipped"
                    );
                    errors.push(err);
                }
            }
        }

        let (ledger, reconcile) = match prior {
            Some(prior) => {
                let (ledger, summary) = reconcile_with_summary(prior, &computed, cutoff);
                (ledger, Some(summary))
            }
            None => (computed, None),
        };

        let report = RunReport {
            today,
            cutoff,
            campaign,
            lines_total: lines.len(),
            lines_allocated: ledger.len(),
            errors,
            notices,
            reconcile,
            ledger_digest: ledger.digest(),
        };
        info!(
            allocated = report.lines_allocated,
            errors = report.errors.len(),
            notices = report.notices.len(),
            "Charging run complete"
        );

        Ok(RunOutput { ledger, table, report })
    }
}

/// Parse, resolve and allocate one line item.
pub fn allocate_line(
    schedule: &Schedule,
    table: &DayFractionTable,
    item: &LineItem,
    config: &EngineConfig,
) -> Result<Allocation, LineError> {
    let key = &item.key;
    let instruction =
        parse_instruction(&item.charging_mechanism).map_err(|e| LineError::parse(key, e))?;
    let default_cap = item.occurrence_cap.or(config.default_occurrence_cap);
    let resolved = resolve(schedule, &key.well, &instruction, default_cap)
        .map_err(|e| LineError::resolve(key, e))?;
    Ok(allocate(
        &resolved,
        LineTarget {
            well: &key.well,
            event: key.event.as_ref(),
        },
        table,
        config.lump_sum_policy,
    ))
}
