use std::collections::BTreeMap;

use serde_json::json;
use uuid::Uuid;

use fgk_audit::{EventType, KernelEvent};
use fgk_flatten::{ExecutionRecord, FlattenExecutor, FlattenSpec};
use fgk_risk::RiskManager;
use fgk_schemas::{snapshot_hash, AccountSnapshot, BookTop, PositionToClose};

/// Everything one risk tick produced, in emission order.
#[derive(Clone, Debug)]
pub struct TickResult {
    pub events: Vec<KernelEvent>,
    pub execution_records: Vec<ExecutionRecord>,
    pub correlation_id: String,
    pub snapshot_hash: String,
}

impl TickResult {
    pub fn has_event(&self, event_type: EventType) -> bool {
        self.events.iter().any(|e| e.event_type == event_type)
    }
}

/// The sole public entry point of the risk/flatten pipeline.
///
/// Event order within the tick is fixed: AUDIT_SNAPSHOT first, then risk
/// events as the state machine produced them, then flatten lifecycle
/// events and execution records in planner order. Every event carries the
/// tick's correlation id; the snapshot hash never covers it.
pub fn handle_risk_update(
    risk: &mut RiskManager,
    executor: &mut FlattenExecutor,
    snap: &AccountSnapshot,
    positions: &[PositionToClose],
    books: &BTreeMap<String, BookTop>,
    flatten_spec: &FlattenSpec,
    now_ts: f64,
) -> TickResult {
    let correlation_id = Uuid::new_v4().to_string();
    let hash = snapshot_hash(snap, positions, books);

    let mut events = vec![KernelEvent::new(
        EventType::AuditSnapshot,
        now_ts,
        json!({ "snapshot_hash": hash }),
    )
    .with_correlation(&correlation_id)];

    risk.update(snap, now_ts);
    let drained = risk.pop_events();
    let fired = drained
        .iter()
        .any(|e| e.event_type == EventType::KillSwitchFired);
    for event in drained {
        events.push(event.with_correlation(&correlation_id));
    }

    let mut execution_records = Vec::new();
    if fired || risk.is_flatten_authorized() {
        let (flatten_events, records) =
            executor.execute_all(positions, books, flatten_spec, &correlation_id, now_ts);
        events.extend(flatten_events);
        execution_records = records;
    }

    TickResult {
        events,
        execution_records,
        correlation_id,
        snapshot_hash: hash,
    }
}
