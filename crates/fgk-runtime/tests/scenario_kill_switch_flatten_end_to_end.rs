//! End-to-end: kill-switch trip, forced flatten, and the same-day latch.

use std::collections::BTreeMap;

use fgk_audit::EventType;
use fgk_broker::PaperBroker;
use fgk_flatten::{FlattenExecutor, FlattenSpec, PlaceOutcome};
use fgk_risk::{RiskConfig, RiskManager, RiskState};
use fgk_runtime::handle_risk_update;
use fgk_schemas::{
    AccountSnapshot, BookTop, Offset, PositionToClose, SessionCalendar, Side,
};

// 2025-06-16 Mon 09:00 / 10:00 CST.
const DAY_START: f64 = 1_750_035_600.0;
const T1: f64 = 1_750_039_200.0;

fn setup() -> (RiskManager, FlattenExecutor) {
    let mut risk =
        RiskManager::new(RiskConfig::default(), SessionCalendar::china_futures()).unwrap();
    risk.on_day_start_0900(&AccountSnapshot::new(1_000_000.0, 0.0), "baseline", DAY_START)
        .unwrap();
    risk.pop_events();
    let executor = FlattenExecutor::new(Box::new(PaperBroker::new()));
    (risk, executor)
}

fn inputs() -> (Vec<PositionToClose>, BTreeMap<String, BookTop>, FlattenSpec) {
    let positions = vec![PositionToClose::new("AO", 1, 1, 0)];
    let mut books = BTreeMap::new();
    books.insert("AO".to_string(), BookTop::new(100.0, 101.0, 1.0));
    let spec = FlattenSpec {
        stage2_requotes: 0,
        stage3_max_cross_levels: 0,
    };
    (positions, books, spec)
}

#[test]
fn drawdown_trips_and_flattens_close_today_at_best_bid() {
    let (mut risk, mut executor) = setup();
    let (positions, books, spec) = inputs();

    // -3.1% from baseline.
    let result = handle_risk_update(
        &mut risk,
        &mut executor,
        &AccountSnapshot::new(969_000.0, 0.0),
        &positions,
        &books,
        &spec,
        T1,
    );

    let types: Vec<EventType> = result.events.iter().map(|e| e.event_type).collect();
    assert_eq!(types[0], EventType::AuditSnapshot);
    assert!(types.contains(&EventType::KillSwitchFired));
    assert!(types.contains(&EventType::ForceFlattenRequested));
    assert!(types.contains(&EventType::FlattenStarted));
    assert_eq!(*types.last().unwrap(), EventType::FlattenCompleted);

    // All events share the tick's correlation id.
    assert!(result
        .events
        .iter()
        .all(|e| e.correlation_id.as_deref() == Some(result.correlation_id.as_str())));

    // Exactly one AUDIT_SNAPSHOT, first.
    assert_eq!(
        types
            .iter()
            .filter(|t| **t == EventType::AuditSnapshot)
            .count(),
        1
    );

    assert_eq!(result.execution_records.len(), 1);
    let record = &result.execution_records[0];
    assert_eq!(record.intent.side, Side::Sell);
    assert_eq!(record.intent.offset, Offset::CloseToday);
    assert_eq!(record.intent.price, 100.0);
    assert_eq!(record.intent.qty, 1);
    assert!(matches!(record.outcome, PlaceOutcome::Ack { .. }));
    assert_eq!(risk.state(), RiskState::Triggered);
}

#[test]
fn second_call_same_day_is_latched() {
    let (mut risk, mut executor) = setup();
    let (positions, books, spec) = inputs();
    let snap = AccountSnapshot::new(969_000.0, 0.0);

    let first = handle_risk_update(
        &mut risk, &mut executor, &snap, &positions, &books, &spec, T1,
    );
    assert!(first.has_event(EventType::FlattenCompleted));

    let second = handle_risk_update(
        &mut risk,
        &mut executor,
        &snap,
        &positions,
        &books,
        &spec,
        T1 + 10.0,
    );
    let types: Vec<EventType> = second.events.iter().map(|e| e.event_type).collect();
    assert_eq!(types[0], EventType::AuditSnapshot);
    assert!(types.contains(&EventType::FlattenSkippedAlreadyInProgress));
    assert!(!types.contains(&EventType::KillSwitchFired));
    assert!(second.execution_records.is_empty());

    // Fresh correlation id per tick; identical snapshot hash for
    // identical inputs.
    assert_ne!(first.correlation_id, second.correlation_id);
    assert_eq!(first.snapshot_hash, second.snapshot_hash);
}

#[test]
fn no_trip_means_no_flatten_and_no_risk_events() {
    let (mut risk, mut executor) = setup();
    let (positions, books, spec) = inputs();

    let result = handle_risk_update(
        &mut risk,
        &mut executor,
        &AccountSnapshot::new(995_000.0, 0.0),
        &positions,
        &books,
        &spec,
        T1,
    );

    let types: Vec<EventType> = result.events.iter().map(|e| e.event_type).collect();
    assert_eq!(types, vec![EventType::AuditSnapshot]);
    assert!(result.execution_records.is_empty());
    assert_eq!(risk.state(), RiskState::Normal);
}

#[test]
fn snapshot_hash_ignores_input_ordering() {
    let (mut risk_a, mut exec_a) = setup();
    let (mut risk_b, mut exec_b) = setup();
    let (_, books, spec) = inputs();
    let snap = AccountSnapshot::new(995_000.0, 0.0);

    let p1 = PositionToClose::new("AO", 1, 1, 0);
    let p2 = PositionToClose::new("SA", -2, 1, 1);

    let a = handle_risk_update(
        &mut risk_a,
        &mut exec_a,
        &snap,
        &[p1.clone(), p2.clone()],
        &books,
        &spec,
        T1,
    );
    let b = handle_risk_update(&mut risk_b, &mut exec_b, &snap, &[p2, p1], &books, &spec, T1);
    assert_eq!(a.snapshot_hash, b.snapshot_hash);
}
