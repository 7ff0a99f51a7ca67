//! End-to-end charging run over a two-well campaign.

use chrono::{NaiveDate, NaiveDateTime};
use dccs_engine::{ChargingRun, EngineConfig, LineErrorKind, LumpSumPolicy, Schedule, reconcile};
use dccs_models::{
    AllocationLedger, Currency, EventKey, LineItem, LineKey, PhaseCode, PhaseRecord,
    ScheduleSource, WellName,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

fn ymd(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

fn at(m: u32, d: u32, h: u32) -> NaiveDateTime {
    ymd(m, d).and_hms_opt(h, 0, 0).unwrap()
}

fn q(n: i64) -> Decimal {
    Decimal::from(n)
}

fn record(
    well: &str,
    code: u32,
    event: &str,
    actual: Option<i64>,
    planned: Option<i64>,
) -> PhaseRecord {
    PhaseRecord {
        well: WellName::new(well),
        phase_code: PhaseCode(code),
        phase_label: format!("{} phase {}", well, code),
        event: Some(EventKey::new(event)),
        actual_hours: actual.map(Decimal::from),
        planned_hours: planned.map(Decimal::from),
        alternate_hours: None,
    }
}

/// NTP-01: phase 1 01-01 00:00 → 01-03 12:00, phase 5 → 01-06 00:00
/// NTP-02: follows on, phase 1 01-06 00:00 → 01-08 00:00
fn campaign() -> Schedule {
    Schedule::build(&ScheduleSource {
        start: Some(at(1, 1, 0)),
        well_starts: BTreeMap::new(),
        records: vec![
            record("NTP-01", 1, "DRILL", Some(60), None),
            record("NTP-01", 5, "COMP", None, Some(60)),
            record("NTP-02", 1, "DRILL", None, Some(48)),
        ],
    })
    .unwrap()
}

fn line(well: &str, event: Option<&str>, description: &str, mechanism: &str) -> LineItem {
    LineItem {
        key: LineKey {
            well: WellName::new(well),
            event: event.map(EventKey::new),
            contract: "OCS-7".to_string(),
            item: "1".to_string(),
            description: description.to_string(),
        },
        unit_price: q(1000),
        currency: Currency::USD,
        unit_of_measure: "day".to_string(),
        charging_mechanism: mechanism.to_string(),
        occurrence_cap: None,
        cost_group: Some("Rig".to_string()),
        vendor: None,
    }
}

fn quantities(ledger: &AllocationLedger, description: &str) -> BTreeMap<NaiveDate, Decimal> {
    ledger
        .iter()
        .find(|l| l.key().description == description)
        .map(|l| l.allocations.clone())
        .unwrap_or_default()
}

#[test]
fn partial_day_fractions_follow_the_walk() {
    let schedule = campaign();
    let table = schedule.day_fractions(None);
    let w = WellName::new("NTP-01");

    assert_eq!(table.fraction(&w, PhaseCode(1), ymd(1, 1)), q(1));
    assert_eq!(table.fraction(&w, PhaseCode(1), ymd(1, 2)), q(1));
    assert_eq!(table.fraction(&w, PhaseCode(1), ymd(1, 3)), Decimal::new(5, 1));
    assert_eq!(table.fraction(&w, PhaseCode(1), ymd(1, 4)), Decimal::ZERO);

    let next = schedule.phase(&WellName::new("NTP-02"), PhaseCode(1)).unwrap();
    assert_eq!(next.start, at(1, 6, 0));
    assert_eq!(table.active_well(ymd(1, 7)), Some(&WellName::new("NTP-02")));
}

#[test]
fn full_run_allocates_and_isolates_failures() {
    let lines = vec![
        line(
            "NTP-01",
            None,
            "Rig rate",
            "2 unit/day from 2024-01-01 to 2024-01-05 for maximum 5 occurrences",
        ),
        line("NTP-01", None, "Mobilisation", "10 unit/day on start phase 5"),
        line("NTP-01", None, "Casing crew", "1 unit/day for {'NTP-01': [1], 'NTP-09': [1]}"),
        line("NTP-01", Some("COMP"), "Completion fluids", "1 unit/day for {'NTP-01': [1, 5]}"),
        line("NTP-02", None, "Bits", "1 unit/day from start phase 1 to end phase 1"),
    ];

    let config = EngineConfig::default();
    let out = ChargingRun::execute(&campaign(), &lines, None, &config, ymd(1, 10)).unwrap();

    assert_eq!(
        quantities(&out.ledger, "Rig rate"),
        BTreeMap::from([(ymd(1, 1), q(2)), (ymd(1, 2), q(2)), (ymd(1, 3), q(1))])
    );
    // phase 5 starts 01-03 12:00
    assert_eq!(
        quantities(&out.ledger, "Mobilisation"),
        BTreeMap::from([(ymd(1, 3), q(10))])
    );
    // only COMP phases weigh in
    assert_eq!(
        quantities(&out.ledger, "Completion fluids"),
        BTreeMap::from([(ymd(1, 3), Decimal::new(5, 1)), (ymd(1, 4), q(1)), (ymd(1, 5), q(1))])
    );
    assert_eq!(
        quantities(&out.ledger, "Bits"),
        BTreeMap::from([(ymd(1, 6), q(1)), (ymd(1, 7), q(1))])
    );

    assert_eq!(out.report.errors.len(), 1);
    assert_eq!(out.report.errors[0].kind, LineErrorKind::ReferenceNotFound);
    assert_eq!(out.report.errors[0].line.description, "Casing crew");
    assert_eq!(out.report.lines_allocated, 4);
    assert_eq!(out.report.ledger_digest, out.ledger.digest());
}

#[test]
fn gap_phase_only_fails_lines_that_reference_it() {
    let schedule = Schedule::build(&ScheduleSource {
        start: Some(at(1, 1, 0)),
        well_starts: BTreeMap::new(),
        records: vec![
            record("W", 1, "DRILL", Some(24), None),
            record("W", 2, "DRILL", None, None),
            record("W", 3, "DRILL", Some(24), None),
        ],
    })
    .unwrap();
    let lines = vec![
        line("W", None, "uses gap", "1 unit/day on end phase 2"),
        line("W", None, "ignores gap", "1 unit/day from start phase 1 to end phase 3"),
    ];

    let config = EngineConfig::default();
    let out = ChargingRun::execute(&schedule, &lines, None, &config, ymd(1, 10)).unwrap();
    assert_eq!(out.report.errors.len(), 1);
    assert_eq!(out.report.errors[0].kind, LineErrorKind::ScheduleGap);
    assert_eq!(quantities(&out.ledger, "ignores gap").values().sum::<Decimal>(), q(2));
}

#[test]
fn lump_sum_policy_is_configurable() {
    let lines = vec![line("NTP-02", None, "Late delivery", "3 unit/day on 2024/01/02")];
    let config = EngineConfig::default();
    let strict = ChargingRun::execute(&campaign(), &lines, None, &config, ymd(1, 10)).unwrap();
    assert!(quantities(&strict.ledger, "Late delivery").is_empty());
    assert_eq!(strict.report.notices.len(), 1);

    let lenient = EngineConfig {
        lump_sum_policy: LumpSumPolicy::AllocateWithWarning,
        ..EngineConfig::default()
    };
    let out = ChargingRun::execute(&campaign(), &lines, None, &lenient, ymd(1, 10)).unwrap();
    assert_eq!(
        quantities(&out.ledger, "Late delivery"),
        BTreeMap::from([(ymd(1, 2), q(3))])
    );
}

#[test]
fn rerun_with_prior_ledger_preserves_manual_edits() {
    let lines = vec![line("NTP-01", None, "Rig rate", "1 unit/day from 2024-01-01 to 2024-01-05")];
    let config = EngineConfig::default();
    let first = ChargingRun::execute(&campaign(), &lines, None, &config, ymd(1, 4)).unwrap();

    let mut edited = first.ledger.clone();
    for l in edited.lines.values_mut() {
        l.allocations.insert(ymd(1, 1), q(4));
        l.allocations.insert(ymd(1, 2), q(4));
    }

    // today 01-04 → cutoff 01-02: only 01-01 is preserved
    let second =
        ChargingRun::execute(&campaign(), &lines, Some(&edited), &config, ymd(1, 4)).unwrap();
    let rig = quantities(&second.ledger, "Rig rate");
    assert_eq!(rig[&ymd(1, 1)], q(4));
    assert_eq!(rig[&ymd(1, 2)], q(1));
    assert_eq!(second.report.cutoff, ymd(1, 2));

    let again = reconcile(&edited, &second.ledger, ymd(1, 2));
    assert_eq!(again, second.ledger);
}
