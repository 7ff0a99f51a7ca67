//! # Reference Resolver
//!
//! Turns symbolic date references into calendar dates for one well.
//!
//! - `start phase P` → date of the phase's resolved start instant
//! - `end phase P` → date of the phase's resolved end instant
//! - A missing (well, phase) pair is `ReferenceNotFound`
//! - A phase placed with no duration data is `ScheduleGap`
//!
//! Both errors are scoped to the line item being resolved.

use crate::schedule::Schedule;
use chrono::NaiveDate;
use dccs_models::{DateRef, Instruction, PhaseCode, PhaseEdge, PhaseSet, Recurrence, WellName};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Resolution failures for one line item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Phase {phase} not found for well {well}")]
    ReferenceNotFound { well: WellName, phase: PhaseCode },

    #[error("Phase {phase} of well {well} has no duration data")]
    ScheduleGap { well: WellName, phase: PhaseCode },

    #[error("Date range ends before it starts: {start} to {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
}

/// Matching rule with every date made concrete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllocationRule {
    DateRange { start: NaiveDate, end: NaiveDate },
    PhaseSet { phases: PhaseSet },
    LumpSum { date: NaiveDate },
}

/// An instruction with no symbolic references left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedInstruction {
    pub quantity: Decimal,
    pub rule: AllocationRule,
    /// Cap enforced by the date-range and phase-set loops
    pub cap: Decimal,
}

/// Resolve one date reference for `well`.
pub fn resolve_date(
    schedule: &Schedule,
    well: &WellName,
    date: &DateRef,
) -> Result<NaiveDate, ResolveError> {
    match *date {
        DateRef::Literal { date } => Ok(date),
        DateRef::Phase { edge, code } => {
            let phase = lookup(schedule, well, code)?;
            Ok(match edge {
                PhaseEdge::Start => phase.start.date(),
                PhaseEdge::End => phase.end.date(),
            })
        }
    }
}

fn lookup<'a>(
    schedule: &'a Schedule,
    well: &WellName,
    code: PhaseCode,
) -> Result<&'a dccs_models::ActivityPhase, ResolveError> {
    let phase = schedule
        .phase(well, code)
        .ok_or_else(|| ResolveError::ReferenceNotFound {
            well: well.clone(),
            phase: code,
        })?;
    if phase.is_gap() {
        return Err(ResolveError::ScheduleGap {
            well: well.clone(),
            phase: code,
        });
    }
    Ok(phase)
}

/// Resolve every reference of `instruction` against `well`'s phases.
///
/// Phase-set mappings are validated pair by pair; any listed (well, phase)
/// absent from the schedule fails the whole instruction.
pub fn resolve(
    schedule: &Schedule,
    well: &WellName,
    instruction: &Instruction,
    default_cap: Option<Decimal>,
) -> Result<ResolvedInstruction, ResolveError> {
    let rule = match &instruction.recurrence {
        Recurrence::DateRange { start, end } => {
            let start = resolve_date(schedule, well, start)?;
            let end = resolve_date(schedule, well, end)?;
            if end < start {
                return Err(ResolveError::InvertedRange { start, end });
            }
            AllocationRule::DateRange { start, end }
        }
        Recurrence::PhaseSet { phases } => {
            for (mapped_well, codes) in phases {
                for &code in codes {
                    if schedule.phase(mapped_well, code).is_none() {
                        return Err(ResolveError::ReferenceNotFound {
                            well: mapped_well.clone(),
                            phase: code,
                        });
                    }
                }
            }
            AllocationRule::PhaseSet {
                phases: phases.clone(),
            }
        }
        Recurrence::LumpSum { date, .. } => AllocationRule::LumpSum {
            date: resolve_date(schedule, well, date)?,
        },
    };

    Ok(ResolvedInstruction {
        quantity: instruction.quantity,
        rule,
        cap: instruction.effective_cap(default_cap),
    })
}
