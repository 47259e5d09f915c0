//! The force-flatten latch: one run per trading day per shard.

use std::collections::BTreeMap;

use fgk_audit::EventType;
use fgk_broker::PaperBroker;
use fgk_flatten::{FlattenExecutor, FlattenSpec, PlaceOutcome};
use fgk_schemas::{BookTop, PositionToClose, SessionCalendar};

// 2025-06-16 Mon 10:00 CST.
const T0: f64 = 1_750_039_200.0;

fn one_position() -> Vec<PositionToClose> {
    vec![PositionToClose::new("AO", 1, 1, 0)]
}

fn one_book() -> BTreeMap<String, BookTop> {
    let mut books = BTreeMap::new();
    books.insert("AO".to_string(), BookTop::new(100.0, 101.0, 1.0));
    books
}

fn tight_spec() -> FlattenSpec {
    FlattenSpec {
        stage2_requotes: 0,
        stage3_max_cross_levels: 0,
    }
}

#[test]
fn second_run_same_day_is_skipped() {
    let mut exe = FlattenExecutor::new(Box::new(PaperBroker::new()));

    let (events, records) =
        exe.execute_all(&one_position(), &one_book(), &tight_spec(), "corr-1", T0);
    let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![EventType::FlattenStarted, EventType::FlattenCompleted]
    );
    assert_eq!(records.len(), 1);
    assert!(matches!(records[0].outcome, PlaceOutcome::Ack { .. }));
    assert_eq!(records[0].correlation_id, "corr-1");

    // One hour later, same trading day: latched.
    let (events2, records2) = exe.execute_all(
        &one_position(),
        &one_book(),
        &tight_spec(),
        "corr-2",
        T0 + 3600.0,
    );
    assert_eq!(
        events2.iter().map(|e| e.event_type).collect::<Vec<_>>(),
        vec![EventType::FlattenSkippedAlreadyInProgress]
    );
    assert!(records2.is_empty());
}

#[test]
fn next_trading_day_runs_again() {
    let mut exe = FlattenExecutor::new(Box::new(PaperBroker::new()));
    exe.execute_all(&one_position(), &one_book(), &tight_spec(), "corr-1", T0);

    // Same night 21:30 CST belongs to the NEXT trading day.
    let night = T0 + (11.0 * 3600.0) + (30.0 * 60.0);
    let cal = SessionCalendar::china_futures();
    assert_ne!(cal.trading_day_id(T0), cal.trading_day_id(night));

    let (events, records) =
        exe.execute_all(&one_position(), &one_book(), &tight_spec(), "corr-3", night);
    let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![EventType::FlattenStarted, EventType::FlattenCompleted]
    );
    assert_eq!(records.len(), 1);
}

#[test]
fn planner_ladder_executes_in_order() {
    let mut exe = FlattenExecutor::new(Box::new(PaperBroker::new()));
    let positions = vec![PositionToClose::new("AO", 5, 2, 3)];
    let spec = FlattenSpec {
        stage2_requotes: 2,
        stage3_max_cross_levels: 3,
    };

    let (_, records) = exe.execute_all(&positions, &one_book(), &spec, "corr-1", T0);
    assert_eq!(records.len(), 12);

    // Total quantity covered per rung equals |net_qty|.
    assert_eq!(records[0].intent.qty + records[1].intent.qty, 5);

    // Prices walk down for a SELL flatten.
    let prices: Vec<f64> = records.iter().map(|r| r.intent.price).collect();
    assert!(prices.windows(2).all(|w| w[1] <= w[0]));
}
