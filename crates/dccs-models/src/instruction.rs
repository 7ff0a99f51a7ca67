//! # Charging Instructions
//!
//! Typed form of a charging-mechanism string. Produced by the engine's parser;
//! symbolic date references are resolved against the schedule later.

use crate::{PhaseCode, WellName};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Occurrence cap used when no cap is stated anywhere.
/// A large finite sentinel keeps cap arithmetic well-defined.
pub const UNBOUNDED_OCCURRENCES: Decimal = Decimal::from_parts(99_999, 0, 0, false, 0);

/// Which edge of a phase a symbolic reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseEdge {
    Start,
    End,
}

impl std::fmt::Display for PhaseEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseEdge::Start => write!(f, "start"),
            PhaseEdge::End => write!(f, "end"),
        }
    }
}

/// A date as written in an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DateRef {
    /// `2024/01/31` or `2024-01-31`
    Literal { date: NaiveDate },
    /// `start phase 50` / `end phase 50`, against the line item's well
    Phase { edge: PhaseEdge, code: PhaseCode },
}

impl std::fmt::Display for DateRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateRef::Literal { date } => write!(f, "{}", date.format("%Y/%m/%d")),
            DateRef::Phase { edge, code } => write!(f, "{} phase {}", edge, code),
        }
    }
}

/// Well → ordered, de-duplicated phase codes.
pub type PhaseSet = BTreeMap<WellName, Vec<PhaseCode>>;

/// Matching rule of an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recurrence {
    /// `from <ref> to <ref>`: prorate over an inclusive date range
    DateRange { start: DateRef, end: DateRef },
    /// `for {well: [codes]}`: prorate over the listed phases
    PhaseSet { phases: PhaseSet },
    /// `on <ref>` (or any other keyword): the full quantity on one date
    LumpSum { keyword: String, date: DateRef },
}

/// A parsed charging mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Quantity per unit of day fraction
    pub quantity: Decimal,
    /// Unit token, e.g. `unit/day`
    pub unit: String,
    pub recurrence: Recurrence,
    /// Cap stated by `for maximum N occurrences`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_occurrences: Option<Decimal>,
}

impl Instruction {
    /// Cap to enforce, falling back to `default_cap` and then the sentinel.
    pub fn effective_cap(&self, default_cap: Option<Decimal>) -> Decimal {
        self.max_occurrences
            .or(default_cap)
            .unwrap_or(UNBOUNDED_OCCURRENCES)
    }

    pub fn is_lump_sum(&self) -> bool {
        matches!(self.recurrence, Recurrence::LumpSum { .. })
    }
}
