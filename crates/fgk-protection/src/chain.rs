use serde::{Deserialize, Serialize};
use serde_json::json;

use fgk_compliance::ThrottleDecision;
use fgk_schemas::{OrderIntent, Side};

use crate::{
    CostFirstGate, FatFingerGate, GateKind, GateOutcome, GateResult, LimitPriceGate, LiquidityGate,
    MarginMonitor, MarketDepth,
};

/// Everything one admission pass needs to know about the candidate order
/// and its market context. Optional references keep individual gates
/// honest: a gate without its data passes rather than guessing.
#[derive(Clone, Debug)]
pub struct OrderCheckContext<'a> {
    pub intent: &'a OrderIntent,
    pub last_settle: f64,
    pub limit_pct: Option<f64>,
    pub tick_size: Option<f64>,
    pub reference_price: Option<f64>,
    pub avg_qty: Option<f64>,
    pub depth: Option<&'a MarketDepth>,
    /// Margin the order would consume if it opens; zero for closes.
    pub required_margin: f64,
    pub allow_warning_margin: bool,
    /// The pending compliance decision for this account/strategy.
    pub throttle: Option<&'a ThrottleDecision>,
    pub expected_profit_loss: Option<(f64, f64)>,
}

/// Result of running the full chain for one candidate order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainReport {
    pub results: Vec<GateResult>,
    pub passed: bool,
    /// The price the order should be sent with (rewritten by the
    /// limit-price gate when auto-adjust fires).
    pub final_price: f64,
    pub was_adjusted: bool,
}

impl ChainReport {
    pub fn reject_code(&self) -> Option<&str> {
        self.results.iter().find_map(|r| match &r.outcome {
            GateOutcome::Reject { code, .. } => Some(code.as_str()),
            _ => None,
        })
    }
}

/// Ordered, short-circuit protection pipeline. Evaluation order is fixed:
/// limit price, margin, liquidity, fat finger, throttle, cost. The first
/// reject stops the chain; every produced result is kept for audit.
pub struct ProtectionChain {
    pub limit: LimitPriceGate,
    pub margin: MarginMonitor,
    pub liquidity: LiquidityGate,
    pub fat_finger: FatFingerGate,
    pub cost: CostFirstGate,
}

impl ProtectionChain {
    pub fn new(
        limit: LimitPriceGate,
        margin: MarginMonitor,
        liquidity: LiquidityGate,
        fat_finger: FatFingerGate,
        cost: CostFirstGate,
    ) -> Self {
        Self {
            limit,
            margin,
            liquidity,
            fat_finger,
            cost,
        }
    }

    pub fn check_order(&mut self, ctx: &OrderCheckContext<'_>) -> ChainReport {
        let mut results = Vec::with_capacity(6);
        let mut price = ctx.intent.price;
        let mut was_adjusted = false;

        // 1. Limit price (may rewrite the working price).
        let limit_result = self.limit.evaluate(
            price,
            ctx.last_settle,
            &ctx.intent.symbol,
            ctx.limit_pct,
            ctx.tick_size,
        );
        if let GateOutcome::Adjusted { new_price } = &limit_result.outcome {
            price = *new_price;
            was_adjusted = true;
        }
        let rejected = limit_result.outcome.is_reject();
        results.push(limit_result);
        if rejected {
            return ChainReport {
                results,
                passed: false,
                final_price: price,
                was_adjusted,
            };
        }

        // 2. Margin admission (opening margin only).
        let margin_result = self
            .margin
            .evaluate(ctx.required_margin, ctx.allow_warning_margin);
        let rejected = margin_result.outcome.is_reject();
        results.push(margin_result);
        if rejected {
            return ChainReport {
                results,
                passed: false,
                final_price: price,
                was_adjusted,
            };
        }

        // 3. Liquidity.
        let liq_result = self
            .liquidity
            .evaluate(ctx.intent.side, ctx.intent.qty, ctx.depth);
        let rejected = liq_result.outcome.is_reject();
        results.push(liq_result);
        if rejected {
            return ChainReport {
                results,
                passed: false,
                final_price: price,
                was_adjusted,
            };
        }

        // 4. Fat finger.
        let ff_result =
            self.fat_finger
                .evaluate(price, ctx.intent.qty, ctx.reference_price, ctx.avg_qty);
        let rejected = ff_result.outcome.is_reject();
        results.push(ff_result);
        if rejected {
            return ChainReport {
                results,
                passed: false,
                final_price: price,
                was_adjusted,
            };
        }

        // 5. Throttle (compliance decision adapted into a gate result).
        let throttle_result = match ctx.throttle {
            Some(decision) if decision.should_reject() || decision.should_delay() => {
                GateResult::new(
                    GateKind::Throttle,
                    GateOutcome::reject(decision.code.clone(), decision.message.clone()),
                    json!(decision),
                )
            }
            Some(decision) => {
                GateResult::new(GateKind::Throttle, GateOutcome::Pass, json!(decision))
            }
            None => GateResult::new(
                GateKind::Throttle,
                GateOutcome::Pass,
                json!({ "checked": false }),
            ),
        };
        let rejected = throttle_result.outcome.is_reject();
        results.push(throttle_result);
        if rejected {
            return ChainReport {
                results,
                passed: false,
                final_price: price,
                was_adjusted,
            };
        }

        // 6. Cost-first bound.
        let cost_result = self.cost.evaluate(
            &ctx.intent.symbol,
            price,
            ctx.intent.qty,
            ctx.intent.side == Side::Buy,
            ctx.intent.offset,
            ctx.tick_size
                .unwrap_or_else(|| self.limit.tick_size(&ctx.intent.symbol)),
            ctx.depth,
            ctx.expected_profit_loss,
        );
        let rejected = cost_result.outcome.is_reject();
        results.push(cost_result);

        ChainReport {
            passed: !rejected,
            results,
            final_price: price,
            was_adjusted,
        }
    }
}
