use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{GateKind, GateOutcome, GateResult};

/// Daily price-limit state of one instrument.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LimitState {
    Normal,
    NearLimitUp,
    AtLimitUp,
    NearLimitDown,
    AtLimitDown,
}

impl LimitState {
    pub fn is_at_limit(&self) -> bool {
        matches!(self, LimitState::AtLimitUp | LimitState::AtLimitDown)
    }

    pub fn is_near_limit(&self) -> bool {
        matches!(self, LimitState::NearLimitUp | LimitState::NearLimitDown)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceValidationResult {
    Valid,
    AboveLimitUp,
    BelowLimitDown,
    InvalidPrice,
    InvalidSettle,
    AtLimit,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LimitConfig {
    pub default_limit_pct: f64,
    pub near_limit_threshold: f64,
    pub allow_limit_price_order: bool,
    pub auto_adjust_price: bool,
    pub default_tick_size: f64,
    pub price_tolerance: f64,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            default_limit_pct: 0.05,
            near_limit_threshold: 0.01,
            allow_limit_price_order: true,
            auto_adjust_price: true,
            default_tick_size: 1.0,
            price_tolerance: 1e-6,
        }
    }
}

/// Per-product daily limit percentages (exchange rules, 2025).
const PRODUCT_LIMIT_PCT: &[(&str, f64)] = &[
    // Index futures (CFFEX)
    ("if", 0.10),
    ("ih", 0.10),
    ("ic", 0.10),
    ("im", 0.10),
    // Treasury futures (CFFEX)
    ("t", 0.02),
    ("tf", 0.02),
    ("ts", 0.02),
    ("tl", 0.02),
    // Precious metals (SHFE)
    ("au", 0.06),
    ("ag", 0.06),
    // Base metals (SHFE)
    ("cu", 0.05),
    ("al", 0.05),
    ("zn", 0.05),
    ("pb", 0.05),
    ("ni", 0.05),
    ("sn", 0.05),
    ("ao", 0.05),
    // Ferrous (SHFE/DCE)
    ("rb", 0.04),
    ("hc", 0.04),
    ("ss", 0.04),
    ("i", 0.04),
    ("j", 0.04),
    ("jm", 0.04),
    // Energy & chemicals
    ("bu", 0.05),
    ("ru", 0.05),
    ("sp", 0.05),
    ("sc", 0.05),
    ("fu", 0.05),
    ("l", 0.05),
    ("v", 0.05),
    ("pp", 0.05),
    ("eg", 0.05),
    ("ma", 0.05),
    ("ta", 0.05),
    ("sa", 0.05),
    ("fg", 0.05),
    // Agricultural (DCE/CZCE)
    ("c", 0.04),
    ("cs", 0.04),
    ("a", 0.04),
    ("m", 0.04),
    ("y", 0.04),
    ("p", 0.04),
    ("jd", 0.04),
    ("lh", 0.04),
    ("cf", 0.04),
    ("sr", 0.04),
    ("oi", 0.04),
    ("ap", 0.04),
    // New energy (GFEX)
    ("lc", 0.05),
    ("si", 0.05),
];

/// Per-product minimum price increments (2025).
const PRODUCT_TICK_SIZE: &[(&str, f64)] = &[
    ("if", 0.2),
    ("ih", 0.2),
    ("ic", 0.2),
    ("im", 0.2),
    ("t", 0.005),
    ("tf", 0.005),
    ("ts", 0.005),
    ("tl", 0.01),
    ("au", 0.02),
    ("ag", 1.0),
    ("cu", 10.0),
    ("al", 5.0),
    ("zn", 5.0),
    ("pb", 5.0),
    ("ni", 10.0),
    ("sn", 10.0),
    ("ao", 1.0),
    ("rb", 1.0),
    ("hc", 1.0),
    ("ss", 5.0),
    ("i", 0.5),
    ("j", 0.5),
    ("jm", 0.5),
    ("bu", 1.0),
    ("ru", 5.0),
    ("sp", 2.0),
    ("sc", 0.1),
    ("fu", 1.0),
    ("l", 1.0),
    ("v", 1.0),
    ("pp", 1.0),
    ("eg", 1.0),
    ("ma", 1.0),
    ("ta", 2.0),
    ("sa", 1.0),
    ("fg", 1.0),
    ("c", 1.0),
    ("cs", 1.0),
    ("a", 1.0),
    ("m", 1.0),
    ("y", 2.0),
    ("p", 2.0),
    ("jd", 1.0),
    ("lh", 5.0),
    ("cf", 5.0),
    ("sr", 1.0),
    ("oi", 1.0),
    ("ap", 1.0),
    ("lc", 50.0),
    ("si", 5.0),
];

/// Computed daily limit prices for one instrument. Both limits are legal
/// quotes: the up-limit rounds down to the tick, the down-limit rounds up.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LimitPrices {
    pub symbol: String,
    pub limit_up: f64,
    pub limit_down: f64,
    pub last_settle: f64,
    pub limit_pct: f64,
    pub tick_size: f64,
}

/// Output of one order-price validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceValidation {
    pub result: PriceValidationResult,
    pub original_price: f64,
    pub adjusted_price: f64,
    pub limits: Option<LimitPrices>,
    pub message: String,
    pub was_adjusted: bool,
}

impl PriceValidation {
    pub fn is_valid(&self) -> bool {
        matches!(
            self.result,
            PriceValidationResult::Valid | PriceValidationResult::AtLimit
        )
    }
}

/// Daily price-band gate.
#[derive(Clone, Debug, Default)]
pub struct LimitPriceGate {
    config: LimitConfig,
}

impl LimitPriceGate {
    pub fn new(config: LimitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LimitConfig {
        &self.config
    }

    /// Limit percentage for a symbol; product-table driven.
    pub fn limit_pct(&self, symbol: &str) -> f64 {
        lookup(PRODUCT_LIMIT_PCT, symbol).unwrap_or(self.config.default_limit_pct)
    }

    /// Tick size for a symbol; product-table driven.
    pub fn tick_size(&self, symbol: &str) -> f64 {
        lookup(PRODUCT_TICK_SIZE, symbol).unwrap_or(self.config.default_tick_size)
    }

    pub fn calculate_limit_prices(
        &self,
        last_settle: f64,
        symbol: &str,
        limit_pct: Option<f64>,
        tick_size: Option<f64>,
    ) -> LimitPrices {
        let pct = limit_pct.unwrap_or_else(|| self.limit_pct(symbol));
        let tick = tick_size.unwrap_or_else(|| self.tick_size(symbol));

        let raw_up = last_settle * (1.0 + pct);
        let raw_down = last_settle * (1.0 - pct);
        let (limit_up, limit_down) = if tick > 0.0 {
            (round_down_to_tick(raw_up, tick), round_up_to_tick(raw_down, tick))
        } else {
            (raw_up, raw_down)
        };

        LimitPrices {
            symbol: symbol.to_string(),
            limit_up,
            limit_down,
            last_settle,
            limit_pct: pct,
            tick_size: tick,
        }
    }

    /// Limit-band state of the current price.
    pub fn detect_limit_state(
        &self,
        current_price: f64,
        last_settle: f64,
        symbol: &str,
        limit_pct: Option<f64>,
        tick_size: Option<f64>,
    ) -> LimitState {
        if current_price <= 0.0 || last_settle <= 0.0 {
            return LimitState::Normal;
        }
        let limits = self.calculate_limit_prices(last_settle, symbol, limit_pct, tick_size);
        let tol = self.config.price_tolerance;
        let near = self.config.near_limit_threshold * last_settle;

        if (current_price - limits.limit_up).abs() < tol {
            LimitState::AtLimitUp
        } else if (current_price - limits.limit_down).abs() < tol {
            LimitState::AtLimitDown
        } else if limits.limit_up - current_price < near {
            LimitState::NearLimitUp
        } else if current_price - limits.limit_down < near {
            LimitState::NearLimitDown
        } else {
            LimitState::Normal
        }
    }

    /// Validate an order price against the daily band. `auto_adjust` is
    /// dominant over `allow_limit_price_order`: an out-of-band price is
    /// rewritten to the limit and passes with `was_adjusted`.
    pub fn validate_order_price(
        &self,
        order_price: f64,
        last_settle: f64,
        symbol: &str,
        limit_pct: Option<f64>,
        tick_size: Option<f64>,
        auto_adjust: Option<bool>,
    ) -> PriceValidation {
        let should_adjust = auto_adjust.unwrap_or(self.config.auto_adjust_price);

        if order_price <= 0.0 {
            return PriceValidation {
                result: PriceValidationResult::InvalidPrice,
                original_price: order_price,
                adjusted_price: order_price,
                limits: None,
                message: format!("invalid order price: {order_price}"),
                was_adjusted: false,
            };
        }
        if last_settle <= 0.0 {
            return PriceValidation {
                result: PriceValidationResult::InvalidSettle,
                original_price: order_price,
                adjusted_price: order_price,
                limits: None,
                message: format!("invalid last settle: {last_settle}"),
                was_adjusted: false,
            };
        }

        let limits = self.calculate_limit_prices(last_settle, symbol, limit_pct, tick_size);
        let tol = self.config.price_tolerance;

        if order_price > limits.limit_up + tol {
            if should_adjust {
                return PriceValidation {
                    result: PriceValidationResult::Valid,
                    original_price: order_price,
                    adjusted_price: limits.limit_up,
                    message: format!(
                        "price {order_price} above limit-up {}, adjusted",
                        limits.limit_up
                    ),
                    limits: Some(limits),
                    was_adjusted: true,
                };
            }
            return PriceValidation {
                result: PriceValidationResult::AboveLimitUp,
                original_price: order_price,
                adjusted_price: order_price,
                message: format!("price {order_price} above limit-up {}", limits.limit_up),
                limits: Some(limits),
                was_adjusted: false,
            };
        }

        if order_price < limits.limit_down - tol {
            if should_adjust {
                return PriceValidation {
                    result: PriceValidationResult::Valid,
                    original_price: order_price,
                    adjusted_price: limits.limit_down,
                    message: format!(
                        "price {order_price} below limit-down {}, adjusted",
                        limits.limit_down
                    ),
                    limits: Some(limits),
                    was_adjusted: true,
                };
            }
            return PriceValidation {
                result: PriceValidationResult::BelowLimitDown,
                original_price: order_price,
                adjusted_price: order_price,
                message: format!("price {order_price} below limit-down {}", limits.limit_down),
                limits: Some(limits),
                was_adjusted: false,
            };
        }

        let at_limit = (order_price - limits.limit_up).abs() < tol
            || (order_price - limits.limit_down).abs() < tol;
        if at_limit {
            if !self.config.allow_limit_price_order {
                return PriceValidation {
                    result: PriceValidationResult::AtLimit,
                    original_price: order_price,
                    adjusted_price: order_price,
                    message: "limit-price orders are not allowed".to_string(),
                    limits: Some(limits),
                    was_adjusted: false,
                };
            }
            return PriceValidation {
                result: PriceValidationResult::AtLimit,
                original_price: order_price,
                adjusted_price: order_price,
                message: "order priced at the daily limit, allowed".to_string(),
                limits: Some(limits),
                was_adjusted: false,
            };
        }

        PriceValidation {
            result: PriceValidationResult::Valid,
            original_price: order_price,
            adjusted_price: order_price,
            limits: Some(limits),
            message: "price within the daily band".to_string(),
            was_adjusted: false,
        }
    }

    /// Gate entry point for the protection chain.
    pub fn evaluate(
        &self,
        order_price: f64,
        last_settle: f64,
        symbol: &str,
        limit_pct: Option<f64>,
        tick_size: Option<f64>,
    ) -> GateResult {
        let validation =
            self.validate_order_price(order_price, last_settle, symbol, limit_pct, tick_size, None);
        let outcome = match validation.result {
            PriceValidationResult::Valid if validation.was_adjusted => GateOutcome::Adjusted {
                new_price: validation.adjusted_price,
            },
            PriceValidationResult::Valid => GateOutcome::Pass,
            PriceValidationResult::AtLimit => {
                if self.config.allow_limit_price_order {
                    GateOutcome::Pass
                } else {
                    GateOutcome::reject("AT_LIMIT", validation.message.clone())
                }
            }
            PriceValidationResult::AboveLimitUp => {
                GateOutcome::reject("ABOVE_LIMIT_UP", validation.message.clone())
            }
            PriceValidationResult::BelowLimitDown => {
                GateOutcome::reject("BELOW_LIMIT_DOWN", validation.message.clone())
            }
            PriceValidationResult::InvalidPrice => {
                GateOutcome::reject("INVALID_PRICE", validation.message.clone())
            }
            PriceValidationResult::InvalidSettle => {
                GateOutcome::reject("INVALID_SETTLE", validation.message.clone())
            }
        };
        GateResult::new(GateKind::LimitPrice, outcome, json!(validation))
    }
}

/// Leading alphabetic product code of a contract symbol ("rb2501" -> "rb").
fn extract_product(symbol: &str) -> String {
    symbol
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn lookup(table: &[(&str, f64)], symbol: &str) -> Option<f64> {
    let product = extract_product(symbol);
    table
        .iter()
        .find(|(p, _)| *p == product)
        .map(|(_, v)| *v)
}

fn round_down_to_tick(price: f64, tick: f64) -> f64 {
    ((price / tick) + 1e-9).floor() * tick
}

fn round_up_to_tick(price: f64, tick: f64) -> f64 {
    ((price / tick) - 1e-9).ceil() * tick
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_prices_round_to_legal_quotes() {
        let gate = LimitPriceGate::default();
        // cu tick is 10: 4% of 71_235 doesn't land on a tick.
        let limits = gate.calculate_limit_prices(71_235.0, "cu2501", Some(0.04), None);
        assert_eq!(limits.limit_up, 74_080.0); // 74_084.4 rounded down
        assert_eq!(limits.limit_down, 68_390.0); // 68_385.6 rounded up
    }

    #[test]
    fn product_table_drives_pct_and_tick() {
        let gate = LimitPriceGate::default();
        assert_eq!(gate.limit_pct("rb2501"), 0.04);
        assert_eq!(gate.limit_pct("if2501"), 0.10);
        assert_eq!(gate.limit_pct("zz9999"), 0.05); // default
        assert_eq!(gate.tick_size("cu2501"), 10.0);
    }

    #[test]
    fn above_limit_rejected_or_adjusted() {
        let gate = LimitPriceGate::new(LimitConfig {
            auto_adjust_price: false,
            ..LimitConfig::default()
        });
        let v = gate.validate_order_price(4300.0, 4000.0, "rb2501", Some(0.05), None, None);
        assert_eq!(v.result, PriceValidationResult::AboveLimitUp);
        assert!(!v.is_valid());

        let v = gate.validate_order_price(4300.0, 4000.0, "rb2501", Some(0.05), None, Some(true));
        assert_eq!(v.result, PriceValidationResult::Valid);
        assert!(v.was_adjusted);
        assert_eq!(v.adjusted_price, 4200.0);
    }

    #[test]
    fn at_limit_allowed_by_config() {
        let gate = LimitPriceGate::default();
        let v = gate.validate_order_price(4200.0, 4000.0, "rb2501", Some(0.05), None, None);
        assert_eq!(v.result, PriceValidationResult::AtLimit);
        assert!(v.is_valid());
    }

    #[test]
    fn limit_state_detection() {
        let gate = LimitPriceGate::default();
        assert_eq!(
            gate.detect_limit_state(4200.0, 4000.0, "rb2501", Some(0.05), None),
            LimitState::AtLimitUp
        );
        assert_eq!(
            gate.detect_limit_state(4170.0, 4000.0, "rb2501", Some(0.05), None),
            LimitState::NearLimitUp
        );
        assert_eq!(
            gate.detect_limit_state(4000.0, 4000.0, "rb2501", Some(0.05), None),
            LimitState::Normal
        );
    }
}
