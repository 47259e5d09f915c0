//! Rejection budget and missing-book handling.

use std::collections::BTreeMap;

use fgk_audit::EventType;
use fgk_broker::RejectAllBroker;
use fgk_flatten::{FlattenExecutor, FlattenSpec, PlaceOutcome};
use fgk_schemas::{BookTop, PositionToClose, SessionCalendar};

const T0: f64 = 1_750_039_200.0;

#[test]
fn abort_after_too_many_rejections_and_emit_missing_book() {
    let mut exe = FlattenExecutor::with_limits(
        Box::new(RejectAllBroker::new()),
        SessionCalendar::china_futures(),
        1,
    );

    let positions = vec![
        // MISS first (no book) -> DATA_QUALITY_MISSING_BOOK
        PositionToClose::new("MISS", 1, 1, 0),
        // AO second (has book, gets rejected) -> abort at the budget
        PositionToClose::new("AO", 1, 1, 0),
    ];
    let mut books = BTreeMap::new();
    books.insert("AO".to_string(), BookTop::new(100.0, 101.0, 1.0));
    let spec = FlattenSpec {
        stage2_requotes: 0,
        stage3_max_cross_levels: 0,
    };

    let (events, records) = exe.execute_all(&positions, &books, &spec, "corr-1", T0);

    assert!(events.iter().any(|e| {
        e.event_type == EventType::DataQualityMissingBook && e.data["symbol"] == "MISS"
    }));
    assert!(events
        .iter()
        .any(|e| e.event_type == EventType::FlattenAbortedTooManyRejections));
    assert!(!events
        .iter()
        .any(|e| e.event_type == EventType::FlattenCompleted));

    assert_eq!(records.len(), 1);
    assert!(matches!(records[0].outcome, PlaceOutcome::Rejected { .. }));
}

#[test]
fn missing_book_skips_symbol_but_others_proceed() {
    let mut exe = FlattenExecutor::new(Box::new(fgk_broker::PaperBroker::new()));

    let positions = vec![
        PositionToClose::new("MISS", 2, 1, 1),
        PositionToClose::new("AO", 1, 1, 0),
    ];
    let mut books = BTreeMap::new();
    books.insert("AO".to_string(), BookTop::new(100.0, 101.0, 1.0));
    let spec = FlattenSpec {
        stage2_requotes: 0,
        stage3_max_cross_levels: 0,
    };

    let (events, records) = exe.execute_all(&positions, &books, &spec, "corr-1", T0);

    let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            EventType::DataQualityMissingBook,
            EventType::FlattenStarted,
            EventType::FlattenCompleted,
        ]
    );
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].intent.symbol, "AO");
}

#[test]
fn rejections_under_budget_complete_with_rejected_records() {
    let mut exe = FlattenExecutor::with_limits(
        Box::new(RejectAllBroker::new()),
        SessionCalendar::china_futures(),
        10,
    );

    let positions = vec![PositionToClose::new("AO", 1, 1, 0)];
    let mut books = BTreeMap::new();
    books.insert("AO".to_string(), BookTop::new(100.0, 101.0, 1.0));
    let spec = FlattenSpec {
        stage2_requotes: 1,
        stage3_max_cross_levels: 0,
    };

    let (events, records) = exe.execute_all(&positions, &books, &spec, "corr-1", T0);

    // 2 rungs, 2 rejections, budget is 10: completes with evidence.
    assert_eq!(records.len(), 2);
    assert!(events
        .iter()
        .any(|e| e.event_type == EventType::FlattenCompleted));
    assert!(records
        .iter()
        .all(|r| matches!(r.outcome, PlaceOutcome::Rejected { .. })));
}
