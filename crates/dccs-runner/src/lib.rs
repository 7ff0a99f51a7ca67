//! # DCCS Runner
//!
//! Shell around `dccs-engine`: TOML configuration, JSON inputs, atomic
//! ledger persistence with a SHA-256 sidecar, tracing setup and text reports.

pub mod config;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod report;

pub use config::{DEFAULT_CONFIG_PATH, RunnerConfig};
pub use pipeline::{AllocateOutcome, run_allocation, run_reconcile};
