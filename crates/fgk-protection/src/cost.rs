use serde::{Deserialize, Serialize};
use serde_json::json;

use fgk_schemas::Offset;

use crate::{GateKind, GateOutcome, GateResult};

/// Five-level book depth summary used by the cost and liquidity gates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketDepth {
    pub bid_volume: i64,
    pub ask_volume: i64,
    pub total_bid_depth: i64,
    pub total_ask_depth: i64,
}

/// Cost caps as fractions of notional, plus the risk/reward floor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostThresholds {
    pub max_fee_ratio: f64,
    pub max_slippage_ratio: f64,
    pub max_impact_ratio: f64,
    pub max_total_ratio: f64,
    pub min_rr_ratio: f64,
}

impl Default for CostThresholds {
    fn default() -> Self {
        Self {
            max_fee_ratio: 0.001,
            max_slippage_ratio: 0.002,
            max_impact_ratio: 0.005,
            max_total_ratio: 0.01,
            min_rr_ratio: 2.0,
        }
    }
}

/// Simplified exchange fee model: ratios of notional per offset. Close-
/// today is charged separately because Chinese exchanges price it apart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeeModel {
    pub open_ratio: f64,
    pub close_ratio: f64,
    pub close_today_ratio: f64,
}

impl Default for FeeModel {
    fn default() -> Self {
        Self {
            open_ratio: 0.0001,
            close_ratio: 0.0001,
            close_today_ratio: 0.0002,
        }
    }
}

/// Per-product contract multipliers (lots -> notional units).
const PRODUCT_MULTIPLIER: &[(&str, f64)] = &[
    ("if", 300.0),
    ("ih", 300.0),
    ("ic", 200.0),
    ("im", 200.0),
    ("au", 1000.0),
    ("ag", 15.0),
    ("cu", 5.0),
    ("al", 5.0),
    ("zn", 5.0),
    ("ni", 1.0),
    ("rb", 10.0),
    ("hc", 10.0),
    ("i", 100.0),
    ("j", 100.0),
    ("jm", 60.0),
    ("ru", 10.0),
    ("ma", 10.0),
    ("ta", 5.0),
    ("m", 10.0),
    ("y", 10.0),
    ("p", 10.0),
    ("c", 10.0),
    ("cf", 5.0),
    ("sr", 10.0),
    ("ao", 20.0),
    ("sa", 20.0),
];

const DEFAULT_MULTIPLIER: f64 = 10.0;

/// Full peri-trade cost estimate for one order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub notional: f64,
    pub fee: f64,
    pub slippage: f64,
    pub impact: f64,
    pub total_cost: f64,
    pub fee_ratio: f64,
    pub slippage_ratio: f64,
    pub impact_ratio: f64,
    pub total_ratio: f64,
    pub slippage_ticks: u32,
}

/// Cost-first admission gate: estimate fee + slippage + impact, then
/// refuse orders whose expected cost breaks the caps or whose expected
/// profit cannot cover cost at the configured risk/reward floor.
#[derive(Clone, Debug, Default)]
pub struct CostFirstGate {
    thresholds: CostThresholds,
    fees: FeeModel,
}

impl CostFirstGate {
    pub fn new(thresholds: CostThresholds, fees: FeeModel) -> Self {
        Self { thresholds, fees }
    }

    pub fn thresholds(&self) -> &CostThresholds {
        &self.thresholds
    }

    /// Tick-based slippage estimate scaled by order size against the
    /// opposing book: up to half the top level costs one tick, a full
    /// level two, two levels three, anything beyond four, plus a
    /// two-tick premium when the order exceeds the whole visible depth.
    pub fn estimate_slippage_ticks(&self, qty: i64, opposing_volume: i64, total_depth: i64) -> u32 {
        if opposing_volume <= 0 {
            return 2;
        }
        let volume_ratio = qty as f64 / opposing_volume as f64;
        let mut ticks = if volume_ratio <= 0.5 {
            1
        } else if volume_ratio <= 1.0 {
            2
        } else if volume_ratio <= 2.0 {
            3
        } else {
            4
        };
        if total_depth > 0 && qty > total_depth {
            ticks += 2;
        }
        ticks
    }

    /// Impact ratio of notional, banded by order size over total depth.
    /// Base is one basis point; conservative double with no depth data.
    pub fn estimate_impact_ratio(&self, qty: i64, depth: Option<&MarketDepth>) -> f64 {
        const BASE: f64 = 0.0001;
        let depth = match depth {
            Some(d) => d,
            None => return BASE * 2.0,
        };
        let mut total = depth.total_ask_depth + depth.total_bid_depth;
        if total == 0 {
            total = depth.ask_volume + depth.bid_volume;
        }
        if total <= 0 {
            return BASE * 3.0;
        }
        let depth_ratio = qty as f64 / total as f64;
        let scale = if depth_ratio <= 0.05 {
            0.5
        } else if depth_ratio <= 0.2 {
            1.0
        } else if depth_ratio <= 0.5 {
            2.0
        } else if depth_ratio <= 1.0 {
            5.0
        } else {
            10.0
        };
        BASE * scale
    }

    pub fn estimate_total_cost(
        &self,
        symbol: &str,
        price: f64,
        qty: i64,
        is_buy: bool,
        offset: Offset,
        tick_size: f64,
        depth: Option<&MarketDepth>,
    ) -> CostEstimate {
        let multiplier = multiplier_for(symbol);
        let notional = price * qty as f64 * multiplier;

        let fee_ratio_cfg = match offset {
            Offset::Open => self.fees.open_ratio,
            Offset::Close => self.fees.close_ratio,
            Offset::CloseToday => self.fees.close_today_ratio,
        };
        let fee = notional * fee_ratio_cfg;

        let (opposing, total) = match depth {
            Some(d) if is_buy => (d.ask_volume, d.total_ask_depth),
            Some(d) => (d.bid_volume, d.total_bid_depth),
            None => (0, 0),
        };
        let slippage_ticks = self.estimate_slippage_ticks(qty, opposing, total);
        let slippage = slippage_ticks as f64 * tick_size * qty as f64 * multiplier;

        let impact = notional * self.estimate_impact_ratio(qty, depth);

        let total_cost = fee + slippage + impact;
        let ratio = |cost: f64| if notional > 0.0 { cost / notional } else { 0.0 };

        CostEstimate {
            notional,
            fee,
            slippage,
            impact,
            total_cost,
            fee_ratio: ratio(fee),
            slippage_ratio: ratio(slippage),
            impact_ratio: ratio(impact),
            total_ratio: ratio(total_cost),
            slippage_ticks,
        }
    }

    /// Gate entry point for the protection chain.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &self,
        symbol: &str,
        price: f64,
        qty: i64,
        is_buy: bool,
        offset: Offset,
        tick_size: f64,
        depth: Option<&MarketDepth>,
        expected_profit_loss: Option<(f64, f64)>,
    ) -> GateResult {
        let est = self.estimate_total_cost(symbol, price, qty, is_buy, offset, tick_size, depth);
        let thr = &self.thresholds;

        let outcome = if est.fee_ratio > thr.max_fee_ratio {
            GateOutcome::reject(
                "FEE_EXCEEDED",
                format!("fee ratio {:.6} above cap {:.6}", est.fee_ratio, thr.max_fee_ratio),
            )
        } else if est.slippage_ratio > thr.max_slippage_ratio {
            GateOutcome::reject(
                "SLIPPAGE_EXCEEDED",
                format!(
                    "slippage ratio {:.6} above cap {:.6}",
                    est.slippage_ratio, thr.max_slippage_ratio
                ),
            )
        } else if est.impact_ratio > thr.max_impact_ratio {
            GateOutcome::reject(
                "IMPACT_EXCEEDED",
                format!(
                    "impact ratio {:.6} above cap {:.6}",
                    est.impact_ratio, thr.max_impact_ratio
                ),
            )
        } else if est.total_ratio > thr.max_total_ratio {
            GateOutcome::reject(
                "TOTAL_COST_EXCEEDED",
                format!(
                    "total cost ratio {:.6} above cap {:.6}",
                    est.total_ratio, thr.max_total_ratio
                ),
            )
        } else if let Some((profit, loss)) = expected_profit_loss {
            let denominator = loss + est.total_cost;
            let rr = if denominator > 0.0 {
                profit / denominator
            } else {
                f64::INFINITY
            };
            if rr < thr.min_rr_ratio {
                GateOutcome::reject(
                    "RR_RATIO_TOO_LOW",
                    format!("risk/reward {:.2} below floor {:.2}", rr, thr.min_rr_ratio),
                )
            } else {
                GateOutcome::Pass
            }
        } else {
            GateOutcome::Pass
        };

        GateResult::new(GateKind::Cost, outcome, json!(est))
    }
}

fn multiplier_for(symbol: &str) -> f64 {
    let product: String = symbol
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_lowercase();
    PRODUCT_MULTIPLIER
        .iter()
        .find(|(p, _)| *p == product)
        .map(|(_, m)| *m)
        .unwrap_or(DEFAULT_MULTIPLIER)
}
