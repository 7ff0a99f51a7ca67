//! dccs CLI: daily charging allocation for a drilling campaign.
//!
//! ## Usage
//!
//! ```bash
//! # Inspect the resolved schedule and day fractions
//! dccs schedule --schedule data/lookahead.json
//!
//! # Check one charging mechanism
//! dccs parse "2 unit/day from start phase 10 to end phase 30 for maximum 20 occurrences"
//!
//! # Full run: allocate, reconcile with the prior ledger, write out/ledger.json
//! dccs allocate --config configs/dccs.toml --today 2024-03-01 --strict
//!
//! # Merge a hand-edited ledger into a fresh one
//! dccs reconcile --old prior.json --new fresh.json --cutoff 2024-02-28 --out merged.json
//!
//! # Value a ledger in USD
//! dccs costs --ledger out/ledger.json --config configs/dccs.toml
//! ```
//!
//! ## Exit Codes
//! - 0: Success
//! - 1: Line items failed (`allocate --strict`) or the instruction did not parse
//! - 2: Error (missing files, invalid schedule or configuration, etc.)

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dccs_engine::{EngineConfig, expand_by_phase, parse_instruction};
use dccs_runner::config::{DEFAULT_CONFIG_PATH, RunnerConfig};
use dccs_runner::report::{CostSummary, ScheduleView, render_costs, render_run, render_schedule};
use dccs_runner::{io, logging, pipeline};

/// dccs: daily charging allocation for a drilling campaign.
#[derive(Parser)]
#[command(name = "dccs")]
#[command(version)]
#[command(about = "Charging allocation engine for drilling campaign cost reporting")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: text (default) or json
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Debug-level logging for dccs crates (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print resolved phases and the day-fraction table
    Schedule {
        /// Path to the lookahead JSON
        #[arg(long, short = 's')]
        schedule: PathBuf,

        /// Reporting date (YYYY-MM-DD); defaults to the local date
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Parse one charging-mechanism instruction
    Parse {
        /// Instruction text (quote it)
        instruction: String,
    },

    /// Allocate every line item and write the ledger
    Allocate {
        /// Path to the runner TOML config
        #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_PATH)]
        config: String,

        /// Reporting day (defaults to the local date)
        #[arg(long)]
        today: Option<NaiveDate>,

        /// Exit 1 if any line item failed
        #[arg(long, default_value = "false")]
        strict: bool,
    },

    /// Merge a prior ledger into a new one at a cutoff date
    Reconcile {
        /// Prior (hand-edited) ledger JSON
        #[arg(long)]
        old: PathBuf,

        /// Freshly computed ledger JSON
        #[arg(long)]
        new: PathBuf,

        /// First date taken from the new ledger
        #[arg(long)]
        cutoff: NaiveDate,

        /// Output ledger JSON
        #[arg(long)]
        out: PathBuf,
    },

    /// Value a ledger in USD
    Costs {
        /// Ledger JSON
        #[arg(long, short = 'l')]
        ledger: PathBuf,

        /// Runner config supplying usd_rate (defaults to 1 local/USD without it)
        #[arg(long, short = 'c')]
        config: Option<String>,

        /// Lookahead JSON; enables the per-phase breakdown
        #[arg(long, short = 's')]
        schedule: Option<PathBuf>,

        /// Reporting day for actual/projected status (defaults to the local date)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(passed) => {
            if passed {
                ExitCode::from(0)
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Schedule { schedule, today } => run_schedule(&schedule, today, cli.format),
        Commands::Parse { instruction } => run_parse(&instruction, cli.format),
        Commands::Allocate {
            config,
            today,
            strict,
        } => run_allocate(&config, today, strict, cli.format),
        Commands::Reconcile {
            old,
            new,
            cutoff,
            out,
        } => run_reconcile(&old, &new, cutoff, &out, cli.format),
        Commands::Costs {
            ledger,
            config,
            schedule,
            today,
        } => run_costs(&ledger, config.as_deref(), schedule.as_deref(), today, cli.format),
    }
}

fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn run_schedule(path: &Path, today: Option<NaiveDate>, format: OutputFormat) -> Result<bool> {
    let schedule = pipeline::load_schedule(path)?;
    let table = schedule.day_fractions(None);
    let view = ScheduleView::new(&schedule, &table, today.unwrap_or_else(local_today));

    match format {
        OutputFormat::Text => print!("{}", render_schedule(&view)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&view)?),
    }
    Ok(true)
}

fn run_parse(text: &str, format: OutputFormat) -> Result<bool> {
    match parse_instruction(text) {
        Ok(instruction) => {
            match format {
                OutputFormat::Text => {
                    println!("Quantity: {} {}", instruction.quantity, instruction.unit);
                    println!("Recurrence: {:?}", instruction.recurrence);
                    match instruction.max_occurrences {
                        Some(cap) => println!("Cap: {}", cap),
                        None => println!("Cap: unbounded"),
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&instruction)?),
            }
            Ok(true)
        }
        Err(e) => {
            match format {
                OutputFormat::Text => println!("Parse error: {}", e),
                OutputFormat::Json => println!("{}", serde_json::json!({ "error": e.to_string() })),
            }
            Ok(false)
        }
    }
}

fn run_allocate(
    config_path: &str,
    today: Option<NaiveDate>,
    strict: bool,
    format: OutputFormat,
) -> Result<bool> {
    let config = RunnerConfig::load(config_path)?;
    let today = today.unwrap_or_else(local_today);
    let outcome = pipeline::run_allocation(&config, today)?;
    let report = &outcome.output.report;

    match format {
        OutputFormat::Text => {
            print!("{}", render_run(report, Some(&outcome.persisted.sha256)));
            println!("\nWrote {:?}", outcome.persisted.ledger_path);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }

    Ok(!(strict && report.has_errors()))
}

fn run_reconcile(
    old: &Path,
    new: &Path,
    cutoff: NaiveDate,
    out: &Path,
    format: OutputFormat,
) -> Result<bool> {
    let (merged, summary) = pipeline::run_reconcile(old, new, cutoff, out)?;

    match format {
        OutputFormat::Text => {
            println!("Reconciled at cutoff {}", cutoff);
            println!(
                "  {} merged, {} new, {} dropped, {} dates preserved",
                summary.merged_lines,
                summary.new_lines,
                summary.dropped_lines,
                summary.preserved_dates
            );
            println!("  Ledger SHA-256: {}", merged.digest());
            println!("Wrote {:?}", out);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(true)
}

fn run_costs(
    ledger_path: &Path,
    config_path: Option<&str>,
    schedule_path: Option<&Path>,
    today: Option<NaiveDate>,
    format: OutputFormat,
) -> Result<bool> {
    let engine = match config_path {
        Some(path) => RunnerConfig::load(path)?.engine,
        None => EngineConfig::default(),
    };
    let ledger = io::load_ledger(ledger_path)?;
    let summary = CostSummary::from_ledger(&ledger, engine.usd_rate);

    let by_phase = match schedule_path {
        Some(path) => {
            let schedule = pipeline::load_schedule(path)?;
            let table = schedule.day_fractions(Some(engine.campaign_range(&schedule)?));
            Some(expand_by_phase(
                &ledger,
                &table,
                today.unwrap_or_else(local_today),
                engine.usd_rate,
            ))
        }
        None => None,
    };

    match format {
        OutputFormat::Text => {
            print!("{}", render_costs(&summary));
            if let Some(rows) = &by_phase {
                println!("\nBy phase ({} rows):", rows.len());
                for row in rows {
                    let phase = row.phase.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
                    println!(
                        "  {}  {:<40} {:>5} {:>10} {:>14} {:?}",
                        row.date,
                        row.line.to_string(),
                        phase,
                        row.quantity.round_dp(4),
                        row.line_cost_usd.round_dp(2),
                        row.status
                    );
                }
            }
        }
        OutputFormat::Json => {
            let value = serde_json::json!({ "costs": summary, "by_phase": by_phase });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(true)
}
