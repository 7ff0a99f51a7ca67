//! # DCCS Models
//!
//! Value types shared by the charging allocation engine and its runner.
//!
//! ## Contents
//! - Identifier newtypes (`WellName`, `PhaseCode`, `EventKey`)
//! - Schedule records (`PhaseRecord`, `ActivityPhase`, `DayFractionEntry`)
//! - Charging instructions (`Instruction`, `DateRef`, `PhaseSet`)
//! - Line items and the allocation ledger (`LineKey`, `LineItem`, `AllocationLedger`)
//!
//! ## Numeric Convention
//! Every quantity, price, cap, duration and day fraction is a `rust_decimal::Decimal`.
//! Floating point never enters a ledger value.

pub mod instruction;
pub mod ledger;
pub mod schedule;

pub use instruction::{DateRef, Instruction, PhaseEdge, PhaseSet, Recurrence, UNBOUNDED_OCCURRENCES};
pub use ledger::{
    AllocationLedger, Currency, LedgerLine, LineItem, LineKey, line_cost, saturating_sum,
    sha256_hex, unit_price_usd,
};
pub use schedule::{ActivityPhase, DayFractionEntry, PhaseRecord, ScheduleSource};

use serde::{Deserialize, Serialize};

// =============================================================================
// Identifier Types
// =============================================================================

/// Well identifier as it appears in the lookahead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WellName(pub String);

impl WellName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WellName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric phase code within a well (e.g. 10 = surface, 50 = completion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseCode(pub u32);

impl std::fmt::Display for PhaseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Grouping key that ties line items to a set of phases (the lookahead "Event").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventKey(pub String);

impl EventKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl std::fmt::Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
