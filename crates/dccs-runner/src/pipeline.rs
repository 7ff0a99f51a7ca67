//! # Pipelines
//!
//! File-to-file drivers behind the `dccs` subcommands.

use crate::config::RunnerConfig;
use crate::io::{self, PersistResult};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use dccs_engine::{ChargingRun, ReconcileSummary, RunOutput, Schedule, reconcile_with_summary};
use dccs_models::AllocationLedger;
use std::path::Path;
use tracing::info;

/// Outcome of `allocate`: engine output plus what was written to disk.
#[derive(Debug)]
pub struct AllocateOutcome {
    pub output: RunOutput,
    pub persisted: PersistResult,
}

/// Build a schedule from a lookahead JSON file.
pub fn load_schedule(path: &Path) -> Result<Schedule> {
    let source = io::load_schedule(path)?;
    Schedule::build(&source).with_context(|| format!("Invalid schedule in {:?}", path))
}

/// Full run: load inputs, allocate, reconcile with the prior ledger, persist.
pub fn run_allocation(config: &RunnerConfig, today: NaiveDate) -> Result<AllocateOutcome> {
    let paths = &config.paths;
    let schedule = load_schedule(&paths.schedule)?;
    let lines = io::load_line_items(&paths.line_items)?;
    let prior = io::load_prior_ledger(paths.prior_ledger.as_deref())?;
    info!(
        phases = schedule.phases().len(),
        lines = lines.len(),
        prior = prior.is_some(),
        "Inputs loaded"
    );

    let output = ChargingRun::execute(&schedule, &lines, prior.as_ref(), &config.engine, today)?;
    let persisted = io::persist_run(&paths.output_dir, &output.ledger, &output.report)?;
    info!(path = ?persisted.ledger_path, sha256 = %persisted.sha256, "Ledger written");

    Ok(AllocateOutcome { output, persisted })
}

/// Standalone reconciliation of two ledger files.
pub fn run_reconcile(
    old: &Path,
    new: &Path,
    cutoff: NaiveDate,
    out: &Path,
) -> Result<(AllocationLedger, ReconcileSummary)> {
    let old_ledger = io::load_ledger(old)?;
    let new_ledger = io::load_ledger(new)?;
    let (merged, summary) = reconcile_with_summary(&old_ledger, &new_ledger, cutoff);

    let bytes = merged.canonical_json().context("Failed to serialize ledger")?;
    io::write_atomic(out, &bytes).with_context(|| format!("Failed to write ledger: {:?}", out))?;
    info!(
        path = ?out,
        merged = summary.merged_lines,
        preserved = summary.preserved_dates,
        "Reconciled ledger written"
    );

    Ok((merged, summary))
}
