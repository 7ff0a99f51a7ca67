//! # DCCS Engine
//!
//! Charging allocation engine for a drilling campaign.
//!
//! ## Pipeline
//! ```text
//! ScheduleSource ──► Schedule ──► DayFractionTable ──┐
//!                        │                           ▼
//! mechanism ──► Instruction ──► resolve ──► allocate ──► reconcile ──► ledger
//!                                                          ▲
//!                                       prior ledger ──────┘
//! ```
//!
//! Every stage is a pure function of its inputs. A bad line item is reported
//! and skipped; only a structurally invalid schedule or configuration fails
//! the run.

pub mod config;
pub mod costing;
pub mod instruction;
pub mod proration;
pub mod reconcile;
pub mod resolver;
pub mod run;
pub mod schedule;

pub use config::{ConfigError, EngineConfig, LumpSumPolicy};
pub use costing::{CostStatus, PhaseCostRow, daily_cost_by_well, expand_by_phase, total_cost_usd};
pub use instruction::{ParseError, parse_instruction};
pub use proration::{Allocation, AllocationNote, LineTarget, allocate};
pub use reconcile::{ReconcileSummary, reconcile, reconcile_with_summary};
pub use resolver::{AllocationRule, ResolveError, ResolvedInstruction, resolve};
pub use run::{ChargingRun, LineError, LineErrorKind, LineNotice, RunError, RunOutput, RunReport};
pub use schedule::{CampaignRange, DayFractionTable, Schedule, ScheduleError};
