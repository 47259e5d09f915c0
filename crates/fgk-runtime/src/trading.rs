use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use fgk_audit::{EventType, KernelEvent};
use fgk_broker::Broker;
use fgk_compliance::ThrottleManager;
use fgk_flatten::{ExecutionRecord, PlaceOutcome};
use fgk_protection::{OrderCheckContext, ProtectionChain};
use fgk_risk::RiskManager;
use fgk_schemas::{
    snapshot_hash, AccountSnapshot, BookTop, Offset, OrderIntent, PositionToClose, Side,
};

use crate::TradeControls;

/// Desired signed net position for one symbol. Strategies output targets,
/// never orders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPosition {
    pub symbol: String,
    pub target_qty: i64,
}

impl TargetPosition {
    pub fn new<S: Into<String>>(symbol: S, target_qty: i64) -> Self {
        Self {
            symbol: symbol.into(),
            target_qty,
        }
    }
}

/// Target-position strategy contract for the trading path.
pub trait TargetStrategy {
    fn targets(&mut self, prices: &BTreeMap<String, f64>) -> Vec<TargetPosition>;
}

/// Diff targets against current net positions into crossing order
/// intents. Reductions close before any new exposure opens; a sign flip
/// produces a close intent and an open intent.
pub fn targets_to_order_intents(
    current_net_qty: &BTreeMap<String, i64>,
    targets: &[TargetPosition],
    books: &BTreeMap<String, BookTop>,
) -> Vec<OrderIntent> {
    let mut intents = Vec::new();

    for target in targets {
        let current = current_net_qty.get(&target.symbol).copied().unwrap_or(0);
        let delta = target.target_qty - current;
        if delta == 0 {
            continue;
        }
        let book = match books.get(&target.symbol) {
            Some(book) => book,
            None => continue,
        };

        let side = if delta > 0 { Side::Buy } else { Side::Sell };
        let price = match side {
            Side::Buy => book.best_ask,
            Side::Sell => book.best_bid,
        };

        // Portion of the delta that reduces the current position.
        let closing = if current > 0 && delta < 0 {
            current.min(-delta)
        } else if current < 0 && delta > 0 {
            (-current).min(delta)
        } else {
            0
        };
        let opening = delta.abs() - closing;

        if closing > 0 {
            intents.push(OrderIntent::new(
                target.symbol.clone(),
                side,
                Offset::Close,
                price,
                closing,
                "target_diff:reduce",
            ));
        }
        if opening > 0 {
            intents.push(OrderIntent::new(
                target.symbol.clone(),
                side,
                Offset::Open,
                price,
                opening,
                "target_diff:open",
            ));
        }
    }

    intents
}

/// Inputs of one trading tick.
pub struct TradingTickInput<'a> {
    pub snap: &'a AccountSnapshot,
    pub books: &'a BTreeMap<String, BookTop>,
    pub settle_prices: &'a BTreeMap<String, f64>,
    pub current_net_qty: &'a BTreeMap<String, i64>,
    pub account_id: &'a str,
    pub strategy_id: &'a str,
    /// Fraction of notional posted as margin for opening orders.
    pub open_margin_rate: f64,
    pub now_ts: f64,
}

#[derive(Clone, Debug)]
pub struct TradingTickResult {
    pub events: Vec<KernelEvent>,
    pub execution_records: Vec<ExecutionRecord>,
    pub targets: Vec<TargetPosition>,
    pub correlation_id: String,
    pub snapshot_hash: String,
    pub controls: TradeControls,
}

/// "Mode 2": strategy targets -> diff -> protection chain -> broker.
///
/// The kill switch dominates: when risk forbids new positions, opening
/// intents are dropped with a PROTECTION_REJECTED event rather than sent.
pub fn handle_trading_tick(
    strategy: &mut dyn TargetStrategy,
    risk: &mut RiskManager,
    chain: &mut ProtectionChain,
    throttle: &mut ThrottleManager,
    broker: &mut dyn Broker,
    controls: TradeControls,
    input: &TradingTickInput<'_>,
) -> TradingTickResult {
    let correlation_id = Uuid::new_v4().to_string();

    let positions: Vec<PositionToClose> = input
        .current_net_qty
        .iter()
        .filter(|(_, qty)| **qty != 0)
        .map(|(symbol, qty)| PositionToClose {
            symbol: symbol.clone(),
            net_qty: *qty,
            today_qty: 0,
            yesterday_qty: qty.abs(),
        })
        .collect();
    let hash = snapshot_hash(input.snap, &positions, input.books);

    let mut events = vec![KernelEvent::new(
        EventType::AuditSnapshot,
        input.now_ts,
        json!({ "snapshot_hash": hash, "mode": controls.mode }),
    )
    .with_correlation(&correlation_id)];

    risk.update(input.snap, input.now_ts);
    for event in risk.pop_events() {
        events.push(event.with_correlation(&correlation_id));
    }

    let prices: BTreeMap<String, f64> = input
        .books
        .iter()
        .map(|(symbol, book)| (symbol.clone(), book.mid()))
        .collect();
    let targets = strategy.targets(&prices);
    let intents = targets_to_order_intents(input.current_net_qty, &targets, input.books);

    let mut execution_records = Vec::new();
    for intent in intents {
        let is_opening = intent.offset == Offset::Open;
        if is_opening && !risk.is_new_position_allowed() {
            events.push(
                KernelEvent::new(
                    EventType::ProtectionRejected,
                    input.now_ts,
                    json!({
                        "symbol": intent.symbol,
                        "code": "RISK_STATE_FORBIDS_OPEN",
                        "state": risk.state().as_str(),
                    }),
                )
                .with_correlation(&correlation_id),
            );
            continue;
        }

        let decision =
            throttle.check_and_throttle(input.account_id, input.strategy_id, input.now_ts);

        let last_settle = input
            .settle_prices
            .get(&intent.symbol)
            .copied()
            .unwrap_or(0.0);
        let required_margin = if is_opening {
            intent.price * intent.qty as f64 * input.open_margin_rate
        } else {
            0.0
        };

        let ctx = OrderCheckContext {
            intent: &intent,
            last_settle,
            limit_pct: None,
            tick_size: None,
            reference_price: input.books.get(&intent.symbol).map(|b| b.mid()),
            avg_qty: None,
            depth: None,
            required_margin,
            allow_warning_margin: true,
            throttle: Some(&decision),
            expected_profit_loss: None,
        };
        let report = chain.check_order(&ctx);

        if !report.passed {
            events.push(
                KernelEvent::new(
                    EventType::ProtectionRejected,
                    input.now_ts,
                    json!({
                        "symbol": intent.symbol,
                        "code": report.reject_code(),
                        "results": report.results,
                    }),
                )
                .with_correlation(&correlation_id),
            );
            continue;
        }

        let mut routed = intent.clone();
        routed.price = report.final_price;
        let outcome = match broker.place_order(&routed) {
            Ok(ack) => PlaceOutcome::Ack {
                order_id: ack.order_id,
            },
            Err(rejected) => PlaceOutcome::Rejected {
                reason: rejected.reason,
            },
        };
        execution_records.push(ExecutionRecord {
            intent: routed,
            outcome,
            ts: input.now_ts,
            correlation_id: correlation_id.clone(),
        });
    }

    TradingTickResult {
        events,
        execution_records,
        targets,
        correlation_id,
        snapshot_hash: hash,
        controls,
    }
}
