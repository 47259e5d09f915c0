use serde::{Deserialize, Serialize};
use serde_json::json;

use fgk_schemas::Side;

use crate::{GateKind, GateOutcome, GateResult, MarketDepth};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiquidityConfig {
    /// Minimum opposing top-of-book volume required to quote at all.
    pub min_top_volume: i64,
    /// Maximum fraction of the opposing top volume one order may take.
    pub max_book_share: f64,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            min_top_volume: 1,
            max_book_share: 0.5,
        }
    }
}

/// Rejects orders that would overwhelm the visible book. Without depth
/// data the gate passes; depth-blind rejection would block every venue
/// that does not publish volumes.
#[derive(Clone, Debug, Default)]
pub struct LiquidityGate {
    config: LiquidityConfig,
}

impl LiquidityGate {
    pub fn new(config: LiquidityConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, side: Side, qty: i64, depth: Option<&MarketDepth>) -> GateResult {
        let depth = match depth {
            Some(d) => d,
            None => {
                return GateResult::new(
                    GateKind::Liquidity,
                    GateOutcome::Pass,
                    json!({ "depth_available": false }),
                )
            }
        };

        let opposing = match side {
            Side::Buy => depth.ask_volume,
            Side::Sell => depth.bid_volume,
        };

        let outcome = if opposing < self.config.min_top_volume {
            GateOutcome::reject(
                "INSUFFICIENT_DEPTH",
                format!(
                    "opposing top volume {opposing} below minimum {}",
                    self.config.min_top_volume
                ),
            )
        } else if qty as f64 > self.config.max_book_share * opposing as f64 {
            GateOutcome::reject(
                "EXCESSIVE_BOOK_SHARE",
                format!(
                    "qty {qty} exceeds {:.0}% of opposing top volume {opposing}",
                    self.config.max_book_share * 100.0
                ),
            )
        } else {
            GateOutcome::Pass
        };

        GateResult::new(
            GateKind::Liquidity,
            outcome,
            json!({
                "depth_available": true,
                "opposing_volume": opposing,
                "qty": qty,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth() -> MarketDepth {
        MarketDepth {
            bid_volume: 100,
            ask_volume: 40,
            total_bid_depth: 500,
            total_ask_depth: 200,
        }
    }

    #[test]
    fn no_depth_passes() {
        let gate = LiquidityGate::default();
        assert!(gate.evaluate(Side::Buy, 1_000, None).outcome.is_pass());
    }

    #[test]
    fn oversized_order_rejected() {
        let gate = LiquidityGate::default();
        let result = gate.evaluate(Side::Buy, 30, Some(&depth()));
        assert!(result.outcome.is_reject());

        let ok = gate.evaluate(Side::Buy, 20, Some(&depth()));
        assert!(ok.outcome.is_pass());
    }

    #[test]
    fn empty_opposing_side_rejected() {
        let gate = LiquidityGate::default();
        let thin = MarketDepth {
            bid_volume: 0,
            ask_volume: 0,
            total_bid_depth: 0,
            total_ask_depth: 0,
        };
        let result = gate.evaluate(Side::Sell, 1, Some(&thin));
        assert!(result.outcome.is_reject());
    }
}
