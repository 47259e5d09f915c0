//! The chain short-circuits on first reject and records every result.

use fgk_compliance::{ThrottleDecision, ThrottleLevel};
use fgk_protection::{
    CostFirstGate, FatFingerGate, GateKind, GateOutcome, LimitPriceGate, LiquidityGate,
    MarginConfig, MarginMonitor, MarketDepth, OrderCheckContext, ProtectionChain,
};
use fgk_schemas::{Offset, OrderIntent, Side};

fn chain() -> ProtectionChain {
    ProtectionChain::new(
        LimitPriceGate::default(),
        MarginMonitor::new(MarginConfig::default()).unwrap(),
        LiquidityGate::default(),
        FatFingerGate::default(),
        CostFirstGate::default(),
    )
}

fn depth() -> MarketDepth {
    MarketDepth {
        bid_volume: 200,
        ask_volume: 200,
        total_bid_depth: 1000,
        total_ask_depth: 1000,
    }
}

fn buy_open(price: f64, qty: i64) -> OrderIntent {
    OrderIntent::new("rb2501", Side::Buy, Offset::Open, price, qty, "strategy")
}

fn ctx<'a>(intent: &'a OrderIntent, depth: &'a MarketDepth) -> OrderCheckContext<'a> {
    OrderCheckContext {
        intent,
        last_settle: 4000.0,
        limit_pct: Some(0.05),
        tick_size: Some(1.0),
        reference_price: Some(intent.price),
        avg_qty: Some(10.0),
        depth: Some(depth),
        required_margin: 10_000.0,
        allow_warning_margin: true,
        throttle: None,
        expected_profit_loss: None,
    }
}

#[test]
fn clean_order_passes_all_six_gates() {
    let mut chain = chain();
    chain.margin.update(1_000_000.0, 100_000.0, 0.0).unwrap();

    let intent = buy_open(4000.0, 5);
    let d = depth();
    let report = chain.check_order(&ctx(&intent, &d));

    assert!(report.passed);
    assert_eq!(report.results.len(), 6);
    assert!(!report.was_adjusted);
    assert_eq!(report.final_price, 4000.0);
    assert!(report.results.iter().all(|r| r.outcome.is_pass()));
}

#[test]
fn above_limit_up_rejects_first_and_short_circuits() {
    let mut chain = chain();
    chain.limit = LimitPriceGate::new(fgk_protection::LimitConfig {
        auto_adjust_price: false,
        ..Default::default()
    });
    chain.margin.update(1_000_000.0, 100_000.0, 0.0).unwrap();

    let intent = buy_open(4300.0, 5);
    let d = depth();
    let report = chain.check_order(&ctx(&intent, &d));

    assert!(!report.passed);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].gate, GateKind::LimitPrice);
    assert_eq!(report.reject_code(), Some("ABOVE_LIMIT_UP"));
}

#[test]
fn auto_adjust_rewrites_price_and_continues() {
    let mut chain = chain();
    chain.margin.update(1_000_000.0, 100_000.0, 0.0).unwrap();

    let intent = buy_open(4300.0, 5);
    let d = depth();
    let mut context = ctx(&intent, &d);
    context.reference_price = Some(4200.0);
    let report = chain.check_order(&context);

    assert!(report.passed);
    assert!(report.was_adjusted);
    assert_eq!(report.final_price, 4200.0);
    assert!(matches!(
        report.results[0].outcome,
        GateOutcome::Adjusted { new_price } if new_price == 4200.0
    ));
}

#[test]
fn margin_critical_blocks_opening_orders() {
    let mut chain = chain();
    chain.margin.update(1_000_000.0, 1_100_000.0, 0.0).unwrap();

    let intent = buy_open(4000.0, 5);
    let d = depth();
    let report = chain.check_order(&ctx(&intent, &d));

    assert!(!report.passed);
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.reject_code(), Some("MARGIN_REJECTED"));
}

#[test]
fn throttle_reject_blocks_before_cost() {
    let mut chain = chain();
    chain.margin.update(1_000_000.0, 100_000.0, 0.0).unwrap();

    let decision = ThrottleDecision {
        level: ThrottleLevel::Reject,
        code: "CANCEL_RATIO_EXCEEDED".to_string(),
        message: "cancel ratio above cap".to_string(),
        delay_ms: 0,
        military_rule: Some("M17".to_string()),
    };
    let intent = buy_open(4000.0, 5);
    let d = depth();
    let mut context = ctx(&intent, &d);
    context.throttle = Some(&decision);
    let report = chain.check_order(&context);

    assert!(!report.passed);
    assert_eq!(report.results.len(), 5);
    assert_eq!(report.reject_code(), Some("CANCEL_RATIO_EXCEEDED"));
    assert!(report
        .results
        .iter()
        .all(|r| r.gate != GateKind::Cost));
}

#[test]
fn fat_finger_catches_oversized_qty() {
    let mut chain = chain();
    chain.margin.update(10_000_000.0, 100_000.0, 0.0).unwrap();

    // 80 lots still fits the visible book but is 16x the account average.
    let intent = buy_open(4000.0, 80);
    let d = depth();
    let mut context = ctx(&intent, &d);
    context.avg_qty = Some(5.0);
    let report = chain.check_order(&context);

    assert!(!report.passed);
    assert_eq!(report.reject_code(), Some("QTY_MULTIPLE_EXCEEDED"));
}
