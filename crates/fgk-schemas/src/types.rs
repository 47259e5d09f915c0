use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Chinese futures offset flag. Exchanges settle close-today and
/// close-yesterday differently, so the distinction is carried end to end.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Offset {
    Open,
    Close,
    CloseToday,
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Offset::Open => write!(f, "OPEN"),
            Offset::Close => write!(f, "CLOSE"),
            Offset::CloseToday => write!(f, "CLOSE_TODAY"),
        }
    }
}

/// Immutable order intent. Quantity is always positive; direction is
/// carried by `side`, position effect by `offset`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    pub offset: Offset,
    pub price: f64,
    pub qty: i64,
    /// Free-form provenance tag (e.g. "force_flatten:prefer_close_today").
    pub reason: String,
}

impl OrderIntent {
    pub fn new<S: Into<String>, R: Into<String>>(
        symbol: S,
        side: Side,
        offset: Offset,
        price: f64,
        qty: i64,
        reason: R,
    ) -> Self {
        debug_assert!(qty > 0, "OrderIntent.qty must be > 0");
        debug_assert!(price > 0.0, "OrderIntent.price must be > 0");
        Self {
            symbol: symbol.into(),
            side,
            offset,
            price,
            qty,
            reason: reason.into(),
        }
    }

    /// Perimeter validation; returns the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.qty <= 0 {
            return Err(format!("qty must be > 0, got {}", self.qty));
        }
        if !(self.price > 0.0) {
            return Err(format!("price must be > 0, got {}", self.price));
        }
        Ok(())
    }
}

/// Top of book for one instrument.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookTop {
    pub best_bid: f64,
    pub best_ask: f64,
    pub tick: f64,
}

impl BookTop {
    pub fn new(best_bid: f64, best_ask: f64, tick: f64) -> Self {
        debug_assert!(tick > 0.0, "BookTop.tick must be > 0");
        debug_assert!(best_bid <= best_ask, "crossed book: bid > ask");
        Self {
            best_bid,
            best_ask,
            tick,
        }
    }

    pub fn mid(&self) -> f64 {
        (self.best_bid + self.best_ask) / 2.0
    }
}

/// Account equity + margin snapshot. Negative values are invalid and must
/// be rejected at the perimeter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub equity: f64,
    pub margin_used: f64,
}

impl AccountSnapshot {
    pub fn new(equity: f64, margin_used: f64) -> Self {
        Self { equity, margin_used }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.equity < 0.0 {
            return Err(format!("equity must be >= 0, got {}", self.equity));
        }
        if self.margin_used < 0.0 {
            return Err(format!("margin_used must be >= 0, got {}", self.margin_used));
        }
        Ok(())
    }

    pub fn margin_available(&self) -> f64 {
        (self.equity - self.margin_used).max(0.0)
    }

    /// Margin usage ratio. Infinite when equity is gone but margin is still
    /// committed; zero when both are zero.
    pub fn usage_ratio(&self) -> f64 {
        if self.equity <= 0.0 {
            if self.margin_used > 0.0 {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            self.margin_used / self.equity
        }
    }
}

/// A position the flatten pipeline may need to close.
/// Invariant: today_qty + yesterday_qty == net_qty.abs(), both >= 0.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionToClose {
    pub symbol: String,
    pub net_qty: i64,
    pub today_qty: i64,
    pub yesterday_qty: i64,
}

impl PositionToClose {
    pub fn new<S: Into<String>>(symbol: S, net_qty: i64, today_qty: i64, yesterday_qty: i64) -> Self {
        debug_assert!(today_qty >= 0 && yesterday_qty >= 0);
        debug_assert!(today_qty + yesterday_qty == net_qty.abs());
        Self {
            symbol: symbol.into(),
            net_qty,
            today_qty,
            yesterday_qty,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.today_qty < 0 || self.yesterday_qty < 0 {
            return Err("today_qty and yesterday_qty must be >= 0".to_string());
        }
        if self.today_qty + self.yesterday_qty != self.net_qty.abs() {
            return Err(format!(
                "today_qty({}) + yesterday_qty({}) != |net_qty|({})",
                self.today_qty,
                self.yesterday_qty,
                self.net_qty.abs()
            ));
        }
        Ok(())
    }
}
