//! # Schedule Records
//!
//! Raw lookahead rows and the resolved timeline derived from them.

use crate::{EventKey, PhaseCode, WellName};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Lookahead Input
// =============================================================================

/// One lookahead row: a phase of a well with its duration sources, in hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub well: WellName,
    pub phase_code: PhaseCode,
    #[serde(default)]
    pub phase_label: String,
    /// Grouping key linking the phase to line items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventKey>,
    /// Actual duration, once the phase has been drilled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<Decimal>,
    /// Primary plan (AFE time)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_hours: Option<Decimal>,
    /// Secondary plan (DSV time)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_hours: Option<Decimal>,
}

impl PhaseRecord {
    /// Duration sources in priority order.
    pub fn duration_sources(&self) -> [Option<Decimal>; 3] {
        [self.actual_hours, self.planned_hours, self.alternate_hours]
    }

    /// First available duration source, if any.
    pub fn effective_hours(&self) -> Option<Decimal> {
        self.duration_sources().into_iter().flatten().next()
    }
}

/// The full lookahead: a campaign start instant and phase rows in activity order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleSource {
    /// Start instant of the first well in the sequence
    pub start: Option<NaiveDateTime>,
    /// Explicit start instants for wells that do not follow the previous well
    #[serde(default)]
    pub well_starts: BTreeMap<WellName, NaiveDateTime>,
    pub records: Vec<PhaseRecord>,
}

// =============================================================================
// Resolved Timeline
// =============================================================================

/// A phase placed on the timeline. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPhase {
    pub well: WellName,
    pub phase_code: PhaseCode,
    pub phase_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_hours: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_hours: Option<Decimal>,
    /// Hours used for the walk; `None` when no duration source was available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_hours: Option<Decimal>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ActivityPhase {
    /// True when no duration source was available for this phase.
    pub fn is_gap(&self) -> bool {
        self.effective_hours.is_none()
    }

    /// True when the phase belongs to `event`, or when no event filter is given.
    pub fn matches_event(&self, event: Option<&EventKey>) -> bool {
        match event {
            None => true,
            Some(e) => self.event.as_ref() == Some(e),
        }
    }
}

/// Fraction of one calendar day occupied by one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayFractionEntry {
    pub well: WellName,
    pub phase_code: PhaseCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventKey>,
    pub date: NaiveDate,
    pub fraction: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(actual: Option<i64>, planned: Option<i64>, alternate: Option<i64>) -> PhaseRecord {
        PhaseRecord {
            well: WellName::new("W1"),
            phase_code: PhaseCode(10),
            phase_label: "Surface".to_string(),
            event: None,
            actual_hours: actual.map(Decimal::from),
            planned_hours: planned.map(Decimal::from),
            alternate_hours: alternate.map(Decimal::from),
        }
    }

    #[test]
    fn test_effective_hours_prefers_actual() {
        assert_eq!(record(Some(30), Some(24), Some(12)).effective_hours(), Some(Decimal::from(30)));
    }

    #[test]
    fn test_effective_hours_falls_back_in_order() {
        assert_eq!(record(None, Some(24), Some(12)).effective_hours(), Some(Decimal::from(24)));
        assert_eq!(record(None, None, Some(12)).effective_hours(), Some(Decimal::from(12)));
        assert_eq!(record(None, None, None).effective_hours(), None);
    }
}
