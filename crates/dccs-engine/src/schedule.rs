//! # Schedule Builder
//!
//! Places lookahead phases on a timeline and derives the day-fraction table.
//!
//! ## Walk
//! - Wells appear as contiguous blocks in activity order
//! - A well starts at its explicit start instant, or where the previous well ended
//! - Phase `i` starts at `well start + Σ effective hours of phases 0..i`
//! - Instants are computed from the cumulative offset and rounded to the second,
//!   so `phase[i].end == phase[i + 1].start` holds exactly
//!
//! ## Day Fraction
//! `overlap([start, end), [date 00:00, date + 1 00:00)) / 1 day`, zero when disjoint.
//!
//! ## Gaps
//! A phase with no duration source is placed as a zero-length interval and logged.
//! It only becomes an error when an instruction references it (see `resolver`).

use chrono::{Duration, NaiveDate, NaiveDateTime};
use dccs_models::{ActivityPhase, DayFractionEntry, EventKey, PhaseCode, ScheduleSource, WellName};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_HOUR: i64 = 3_600;

// =============================================================================
// Errors
// =============================================================================

/// Structural problems in the lookahead. These fail the whole run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Schedule has no phase records")]
    Empty,

    #[error("No start instant for well {well}: no campaign start or well start given")]
    MissingStart { well: WellName },

    #[error("Phases of well {well} are not contiguous: well reappears at row {row}")]
    NonContiguousWell { well: WellName, row: usize },

    #[error("Duplicate phase {phase} for well {well} at row {row}")]
    DuplicatePhase {
        well: WellName,
        phase: PhaseCode,
        row: usize,
    },

    #[error("Negative duration for well {well} phase {phase}: {hours}h")]
    NegativeDuration {
        well: WellName,
        phase: PhaseCode,
        hours: Decimal,
    },

    #[error("Timeline overflow for well {well} phase {phase}")]
    TimeOverflow { well: WellName, phase: PhaseCode },

    #[error("Invalid campaign range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

// =============================================================================
// Campaign Range
// =============================================================================

/// Inclusive calendar range of the campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CampaignRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ScheduleError> {
        if start > end {
            return Err(ScheduleError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days in the range.
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Every date in the range, ascending.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        dates_between(self.start, self.end)
    }
}

impl std::fmt::Display for CampaignRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Inclusive date iterator; empty when `start > end`.
pub fn dates_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    std::iter::successors(Some(start), |d| d.succ_opt()).take_while(move |d| *d <= end)
}

// =============================================================================
// Schedule
// =============================================================================

/// Resolved timeline of every well phase in the lookahead.
#[derive(Debug, Clone)]
pub struct Schedule {
    phases: Vec<ActivityPhase>,
    index: BTreeMap<(WellName, PhaseCode), usize>,
    wells: Vec<WellName>,
}

impl Schedule {
    /// Walk the lookahead and place every phase on the timeline.
    pub fn build(source: &ScheduleSource) -> Result<Self, ScheduleError> {
        if source.records.is_empty() {
            return Err(ScheduleError::Empty);
        }

        let mut phases: Vec<ActivityPhase> = Vec::with_capacity(source.records.len());
        let mut index = BTreeMap::new();
        let mut wells: Vec<WellName> = Vec::new();
        let mut closed: BTreeSet<WellName> = BTreeSet::new();

        let mut cursor = source.start;
        let mut origin = NaiveDateTime::MIN;
        let mut offset_hours = Decimal::ZERO;

        for (row, record) in source.records.iter().enumerate() {
            let new_block = wells.last() != Some(&record.well);
            if new_block {
                if closed.contains(&record.well) {
                    return Err(ScheduleError::NonContiguousWell {
                        well: record.well.clone(),
                        row,
                    });
                }
                if let Some(previous) = wells.last() {
                    closed.insert(previous.clone());
                    cursor = phases.last().map(|p| p.end);
                }
                origin = source
                    .well_starts
                    .get(&record.well)
                    .copied()
                    .or(cursor)
                    .ok_or_else(|| ScheduleError::MissingStart {
                        well: record.well.clone(),
                    })?;
                offset_hours = Decimal::ZERO;
                wells.push(record.well.clone());
            }

            let key = (record.well.clone(), record.phase_code);
            if index.contains_key(&key) {
                return Err(ScheduleError::DuplicatePhase {
                    well: record.well.clone(),
                    phase: record.phase_code,
                    row,
                });
            }

            let effective = record.effective_hours();
            match effective {
                Some(hours) if hours < Decimal::ZERO => {
                    return Err(ScheduleError::NegativeDuration {
                        well: record.well.clone(),
                        phase: record.phase_code,
                        hours,
                    });
                }
                Some(_) => {}
                None => warn!(
                    well = %record.well,
                    phase = %record.phase_code,
                    "no duration source for phase; treating as zero-length"
                ),
            }

            let overflow = || ScheduleError::TimeOverflow {
                well: record.well.clone(),
                phase: record.phase_code,
            };
            let start = offset_instant(origin, offset_hours).ok_or_else(overflow)?;
            offset_hours = offset_hours
                .checked_add(effective.unwrap_or(Decimal::ZERO))
                .ok_or_else(overflow)?;
            let end = offset_instant(origin, offset_hours).ok_or_else(overflow)?;

            index.insert(key, phases.len());
            phases.push(ActivityPhase {
                well: record.well.clone(),
                phase_code: record.phase_code,
                phase_label: record.phase_label.clone(),
                event: record.event.clone(),
                planned_hours: record.planned_hours,
                actual_hours: record.actual_hours,
                effective_hours: effective,
                start,
                end,
            });
        }

        debug!(phases = phases.len(), wells = wells.len(), "schedule built");
        Ok(Self {
            phases,
            index,
            wells,
        })
    }

    /// All phases in activity order.
    pub fn phases(&self) -> &[ActivityPhase] {
        &self.phases
    }

    /// Wells in the order they first appear.
    pub fn wells(&self) -> &[WellName] {
        &self.wells
    }

    /// Look up one phase of one well.
    pub fn phase(&self, well: &WellName, code: PhaseCode) -> Option<&ActivityPhase> {
        self.index
            .get(&(well.clone(), code))
            .map(|&i| &self.phases[i])
    }

    /// Phases of one well in activity order.
    pub fn phases_for_well<'a>(
        &'a self,
        well: &'a WellName,
    ) -> impl Iterator<Item = &'a ActivityPhase> + 'a {
        self.phases.iter().filter(move |p| &p.well == well)
    }

    /// Earliest start date to latest end date, inclusive.
    pub fn campaign_range(&self) -> CampaignRange {
        let start = self
            .phases
            .iter()
            .map(|p| p.start)
            .min()
            .unwrap_or(NaiveDateTime::MIN);
        let end = self
            .phases
            .iter()
            .map(|p| p.end)
            .max()
            .unwrap_or(start);
        CampaignRange {
            start: start.date(),
            end: end.date(),
        }
    }

    /// Build the day-fraction table over `range`, or over the derived campaign range.
    pub fn day_fractions(&self, range: Option<CampaignRange>) -> DayFractionTable {
        let range = range.unwrap_or_else(|| self.campaign_range());
        let rows = self
            .phases
            .iter()
            .map(|phase| FractionRow {
                well: phase.well.clone(),
                phase_code: phase.phase_code,
                event: phase.event.clone(),
                fractions: phase_fractions(phase, &range),
            })
            .collect();
        DayFractionTable {
            range,
            rows,
            wells: self.wells.clone(),
        }
    }
}

/// `origin + hours`, rounded to the nearest second.
fn offset_instant(origin: NaiveDateTime, hours: Decimal) -> Option<NaiveDateTime> {
    let seconds = hours
        .checked_mul(Decimal::from(SECONDS_PER_HOUR))?
        .round()
        .to_i64()?;
    origin.checked_add_signed(Duration::try_seconds(seconds)?)
}

/// Non-zero day fractions of one phase, restricted to `range`.
fn phase_fractions(phase: &ActivityPhase, range: &CampaignRange) -> BTreeMap<NaiveDate, Decimal> {
    let mut fractions = BTreeMap::new();
    if phase.end <= phase.start {
        return fractions;
    }
    let day = Decimal::from(SECONDS_PER_DAY);
    for date in dates_between(phase.start.date(), phase.end.date()) {
        if !range.contains(date) {
            continue;
        }
        let overlap = day_overlap_seconds(phase.start, phase.end, date);
        if overlap > 0 {
            fractions.insert(date, Decimal::from(overlap) / day);
        }
    }
    fractions
}

/// Seconds of `[start, end)` that fall on `date`, clamped at zero.
pub fn day_overlap_seconds(start: NaiveDateTime, end: NaiveDateTime, date: NaiveDate) -> i64 {
    let day_start = date.and_time(chrono::NaiveTime::MIN);
    let day_end = day_start + Duration::days(1);
    let lo = start.max(day_start);
    let hi = end.min(day_end);
    (hi - lo).num_seconds().max(0)
}

// =============================================================================
// Day Fraction Table
// =============================================================================

#[derive(Debug, Clone)]
struct FractionRow {
    well: WellName,
    phase_code: PhaseCode,
    event: Option<EventKey>,
    fractions: BTreeMap<NaiveDate, Decimal>,
}

impl FractionRow {
    fn on(&self, date: NaiveDate) -> Decimal {
        self.fractions.get(&date).copied().unwrap_or(Decimal::ZERO)
    }

    fn matches(&self, well: &WellName, event: Option<&EventKey>) -> bool {
        &self.well == well && event.is_none_or(|e| self.event.as_ref() == Some(e))
    }
}

/// Sparse per-phase, per-date fractions over the campaign range.
#[derive(Debug, Clone)]
pub struct DayFractionTable {
    range: CampaignRange,
    rows: Vec<FractionRow>,
    wells: Vec<WellName>,
}

impl DayFractionTable {
    pub fn range(&self) -> CampaignRange {
        self.range
    }

    /// Fraction of `date` occupied by one phase.
    pub fn fraction(&self, well: &WellName, code: PhaseCode, date: NaiveDate) -> Decimal {
        self.rows
            .iter()
            .find(|r| &r.well == well && r.phase_code == code)
            .map(|r| r.on(date))
            .unwrap_or(Decimal::ZERO)
    }

    /// Sum of fractions of the well's phases on `date`, restricted to `event` when given.
    pub fn well_fraction(
        &self,
        well: &WellName,
        event: Option<&EventKey>,
        date: NaiveDate,
    ) -> Decimal {
        self.rows
            .iter()
            .filter(|r| r.matches(well, event))
            .map(|r| r.on(date))
            .sum()
    }

    /// Sum of fractions of the listed phases of one well on `date`,
    /// restricted to `event` when given.
    pub fn phase_set_fraction(
        &self,
        well: &WellName,
        codes: &[PhaseCode],
        event: Option<&EventKey>,
        date: NaiveDate,
    ) -> Decimal {
        self.rows
            .iter()
            .filter(|r| r.matches(well, event) && codes.contains(&r.phase_code))
            .map(|r| r.on(date))
            .sum()
    }

    /// Phases of the well active on `date` with their fractions, in activity order.
    pub fn active_phases(
        &self,
        well: &WellName,
        event: Option<&EventKey>,
        date: NaiveDate,
    ) -> Vec<(PhaseCode, Decimal)> {
        self.rows
            .iter()
            .filter(|r| r.matches(well, event))
            .filter_map(|r| {
                let f = r.on(date);
                (!f.is_zero()).then_some((r.phase_code, f))
            })
            .collect()
    }

    /// First well with any activity on `date`, else the first well of the schedule.
    pub fn active_well(&self, date: NaiveDate) -> Option<&WellName> {
        self.wells
            .iter()
            .find(|w| !self.well_fraction(w, None, date).is_zero())
            .or_else(|| self.wells.first())
    }

    /// Flattened non-zero entries, in activity order then date order.
    pub fn entries(&self) -> Vec<DayFractionEntry> {
        self.rows
            .iter()
            .flat_map(|r| {
                r.fractions.iter().map(move |(date, fraction)| DayFractionEntry {
                    well: r.well.clone(),
                    phase_code: r.phase_code,
                    event: r.event.clone(),
                    date: *date,
                    fraction: *fraction,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dccs_models::PhaseRecord;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn record(well: &str, code: u32, hours: Option<i64>) -> PhaseRecord {
        PhaseRecord {
            well: WellName::new(well),
            phase_code: PhaseCode(code),
            phase_label: format!("Phase {}", code),
            event: Some(EventKey::new("DRILL")),
            actual_hours: None,
            planned_hours: hours.map(Decimal::from),
            alternate_hours: None,
        }
    }

    fn source(records: Vec<PhaseRecord>) -> ScheduleSource {
        ScheduleSource {
            start: Some(at(2024, 1, 1, 0)),
            well_starts: BTreeMap::new(),
            records,
        }
    }

    // =========================================================================
    // Test 1: Day fractions for a phase ending mid-day
    // =========================================================================
    #[test]
    fn test_day_fraction_partial_last_day() {
        // 60h: 2024-01-01T00:00 → 2024-01-03T12:00
        let schedule = Schedule::build(&source(vec![record("W", 1, Some(60))])).unwrap();
        let phase = schedule.phase(&WellName::new("W"), PhaseCode(1)).unwrap();
        assert_eq!(phase.end, at(2024, 1, 3, 12));

        let table = schedule.day_fractions(None);
        let w = WellName::new("W");
        assert_eq!(table.fraction(&w, PhaseCode(1), day(1, 1)), Decimal::ONE);
        assert_eq!(table.fraction(&w, PhaseCode(1), day(1, 2)), Decimal::ONE);
        assert_eq!(table.fraction(&w, PhaseCode(1), day(1, 3)), Decimal::new(5, 1));
        assert_eq!(table.fraction(&w, PhaseCode(1), day(1, 4)), Decimal::ZERO);
    }

    // =========================================================================
    // Test 2: Phases of a well are contiguous
    // =========================================================================
    #[test]
    fn test_phases_contiguous() {
        let schedule = Schedule::build(&source(vec![
            record("W", 1, Some(10)),
            record("W", 2, Some(7)),
            record("W", 3, Some(31)),
        ]))
        .unwrap();

        for pair in schedule.phases().windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(schedule.phases()[2].end, at(2024, 1, 3, 0));
    }

    // =========================================================================
    // Test 3: Next well continues where the previous well ended
    // =========================================================================
    #[test]
    fn test_next_well_follows_previous() {
        let schedule = Schedule::build(&source(vec![
            record("A", 1, Some(36)),
            record("B", 1, Some(12)),
        ]))
        .unwrap();

        let b = schedule.phase(&WellName::new("B"), PhaseCode(1)).unwrap();
        assert_eq!(b.start, at(2024, 1, 2, 12));
        assert_eq!(schedule.wells(), &[WellName::new("A"), WellName::new("B")]);
    }

    // =========================================================================
    // Test 4: Explicit well start overrides the sequence
    // =========================================================================
    #[test]
    fn test_explicit_well_start() {
        let mut src = source(vec![record("A", 1, Some(24)), record("B", 1, Some(24))]);
        src.well_starts.insert(WellName::new("B"), at(2024, 3, 1, 6));
        let schedule = Schedule::build(&src).unwrap();

        let b = schedule.phase(&WellName::new("B"), PhaseCode(1)).unwrap();
        assert_eq!(b.start, at(2024, 3, 1, 6));
        assert_eq!(schedule.campaign_range().end, day(3, 2));
    }

    // =========================================================================
    // Test 5: Missing duration yields a zero-length gap, not an error
    // =========================================================================
    #[test]
    fn test_missing_duration_is_zero_length() {
        let schedule = Schedule::build(&source(vec![
            record("W", 1, Some(24)),
            record("W", 2, None),
            record("W", 3, Some(24)),
        ]))
        .unwrap();

        let gap = schedule.phase(&WellName::new("W"), PhaseCode(2)).unwrap();
        assert!(gap.is_gap());
        assert_eq!(gap.start, gap.end);

        let table = schedule.day_fractions(None);
        assert!(table.entries().iter().all(|e| e.phase_code != PhaseCode(2)));
    }

    // =========================================================================
    // Test 6: Structural errors are fatal
    // =========================================================================
    #[test]
    fn test_structural_errors() {
        assert_eq!(Schedule::build(&source(vec![])).unwrap_err(), ScheduleError::Empty);

        let err = Schedule::build(&source(vec![
            record("A", 1, Some(1)),
            record("B", 1, Some(1)),
            record("A", 2, Some(1)),
        ]))
        .unwrap_err();
        assert!(matches!(err, ScheduleError::NonContiguousWell { row: 2, .. }));

        let err = Schedule::build(&source(vec![record("A", 1, Some(1)), record("A", 1, Some(1))]))
            .unwrap_err();
        assert!(matches!(err, ScheduleError::DuplicatePhase { row: 1, .. }));

        let err = Schedule::build(&source(vec![record("A", 1, Some(-4))])).unwrap_err();
        assert!(matches!(err, ScheduleError::NegativeDuration { .. }));

        let mut src = source(vec![record("A", 1, Some(1))]);
        src.start = None;
        assert!(matches!(
            Schedule::build(&src).unwrap_err(),
            ScheduleError::MissingStart { .. }
        ));
    }

    // =========================================================================
    // Test 7: Fractional hours round to the nearest second
    // =========================================================================
    #[test]
    fn test_instants_round_to_second() {
        let mut r = record("W", 1, None);
        // 1/3600 h + a sliver → 1 second
        r.planned_hours = Some(Decimal::new(2778, 7));
        let schedule = Schedule::build(&source(vec![r])).unwrap();
        let phase = &schedule.phases()[0];
        assert_eq!((phase.end - phase.start).num_seconds(), 1);
    }

    // =========================================================================
    // Test 8: Range override clamps the table
    // =========================================================================
    #[test]
    fn test_range_override_clamps_entries() {
        let schedule = Schedule::build(&source(vec![record("W", 1, Some(96))])).unwrap();
        let range = CampaignRange::new(day(1, 2), day(1, 3)).unwrap();
        let table = schedule.day_fractions(Some(range));

        let dates: Vec<NaiveDate> = table.entries().iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![day(1, 2), day(1, 3)]);
        assert!(CampaignRange::new(day(1, 3), day(1, 2)).is_err());
    }

    // =========================================================================
    // Test 9: Event filtering and active well
    // =========================================================================
    #[test]
    fn test_event_filter_and_active_well() {
        let mut move_in = record("A", 1, Some(12));
        move_in.event = Some(EventKey::new("MOVE"));
        let schedule = Schedule::build(&source(vec![
            move_in,
            record("A", 2, Some(12)),
            record("B", 1, Some(24)),
        ]))
        .unwrap();
        let table = schedule.day_fractions(None);
        let a = WellName::new("A");

        assert_eq!(table.well_fraction(&a, None, day(1, 1)), Decimal::ONE);
        assert_eq!(
            table.well_fraction(&a, Some(&EventKey::new("MOVE")), day(1, 1)),
            Decimal::new(5, 1)
        );
        assert_eq!(table.active_well(day(1, 1)), Some(&a));
        assert_eq!(table.active_well(day(1, 2)), Some(&WellName::new("B")));
        assert_eq!(table.active_well(day(6, 1)), Some(&a));
    }

    // =========================================================================
    // Test 10: Oversized durations are reported, not panicked on
    // =========================================================================
    #[test]
    fn test_oversized_duration_is_time_overflow() {
        for hours in [Decimal::MAX, Decimal::from_i128_with_scale(10_i128.pow(20), 0)] {
            let mut r = record("W", 1, None);
            r.planned_hours = Some(hours);
            let err = Schedule::build(&source(vec![record("W", 0, Some(1)), r])).unwrap_err();
            assert!(matches!(
                err,
                ScheduleError::TimeOverflow { phase: PhaseCode(1), .. }
            ));
        }
    }
}
