use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{GateKind, GateOutcome, GateResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FatFingerConfig {
    /// Maximum relative deviation from the reference price.
    pub max_price_deviation_pct: f64,
    /// Maximum multiple of the account's average order quantity.
    pub max_qty_multiple: f64,
}

impl Default for FatFingerConfig {
    fn default() -> Self {
        Self {
            max_price_deviation_pct: 0.05,
            max_qty_multiple: 10.0,
        }
    }
}

/// Catches obviously mistyped orders before they reach the exchange.
#[derive(Clone, Debug, Default)]
pub struct FatFingerGate {
    config: FatFingerConfig,
}

impl FatFingerGate {
    pub fn new(config: FatFingerConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        price: f64,
        qty: i64,
        reference_price: Option<f64>,
        avg_qty: Option<f64>,
    ) -> GateResult {
        let mut deviation = None;
        if let Some(reference) = reference_price {
            if reference > 0.0 {
                let dev = (price - reference).abs() / reference;
                deviation = Some(dev);
                if dev > self.config.max_price_deviation_pct {
                    return GateResult::new(
                        GateKind::FatFinger,
                        GateOutcome::reject(
                            "PRICE_DEVIATION_EXCEEDED",
                            format!(
                                "price {price} deviates {:.2}% from reference {reference}, cap {:.2}%",
                                dev * 100.0,
                                self.config.max_price_deviation_pct * 100.0
                            ),
                        ),
                        json!({ "deviation": dev, "reference_price": reference }),
                    );
                }
            }
        }

        if let Some(avg) = avg_qty {
            if avg > 0.0 {
                let multiple = qty as f64 / avg;
                if multiple > self.config.max_qty_multiple {
                    return GateResult::new(
                        GateKind::FatFinger,
                        GateOutcome::reject(
                            "QTY_MULTIPLE_EXCEEDED",
                            format!(
                                "qty {qty} is {multiple:.1}x the average {avg:.1}, cap {:.1}x",
                                self.config.max_qty_multiple
                            ),
                        ),
                        json!({ "qty_multiple": multiple, "avg_qty": avg }),
                    );
                }
            }
        }

        GateResult::new(
            GateKind::FatFinger,
            GateOutcome::Pass,
            json!({ "deviation": deviation, "qty": qty }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wild_price_rejected() {
        let gate = FatFingerGate::default();
        let result = gate.evaluate(4400.0, 1, Some(4000.0), None);
        assert!(result.outcome.is_reject());
    }

    #[test]
    fn oversized_qty_rejected() {
        let gate = FatFingerGate::default();
        let result = gate.evaluate(4000.0, 500, Some(4000.0), Some(10.0));
        assert!(result.outcome.is_reject());
    }

    #[test]
    fn sane_order_passes_without_references() {
        let gate = FatFingerGate::default();
        assert!(gate.evaluate(4000.0, 5, None, None).outcome.is_pass());
    }
}
