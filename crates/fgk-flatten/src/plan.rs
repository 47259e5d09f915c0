use serde::{Deserialize, Serialize};

use fgk_schemas::{BookTop, Offset, OrderIntent, PositionToClose, Side};

/// Ladder shape for the three liquidation stages:
/// - stage 1: one quote at the touch
/// - stage 2: `stage2_requotes` requotes, each one tick further through
///   the book
/// - stage 3: up to `stage3_max_cross_levels` more aggressive crossings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenSpec {
    pub stage2_requotes: u32,
    pub stage3_max_cross_levels: u32,
}

impl Default for FlattenSpec {
    fn default() -> Self {
        Self {
            stage2_requotes: 12,
            stage3_max_cross_levels: 12,
        }
    }
}

impl FlattenSpec {
    /// Total number of ladder rungs.
    pub fn rungs(&self) -> u32 {
        1 + self.stage2_requotes + self.stage3_max_cross_levels
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("close_today_qty {close_today} cannot exceed |net_qty| {net_abs}")]
    CloseTodayExceedsNet { close_today: i64, net_abs: i64 },
}

/// Build the ordered intent sequence that flattens one position.
///
/// The executor consumes intents in emission order. At every ladder rung
/// the CLOSE_TODAY slice (up to the position's today quantity) comes
/// before the CLOSE remainder, per the exchange fee preference. SELL
/// ladders walk down from the best bid, BUY ladders walk up from the best
/// ask; every rung is one tick more aggressive than the previous.
pub fn build_flatten_intents(
    pos: &PositionToClose,
    book: &BookTop,
    spec: &FlattenSpec,
) -> Result<Vec<OrderIntent>, PlanError> {
    let net_abs = pos.net_qty.abs();
    if net_abs == 0 {
        return Ok(Vec::new());
    }
    if pos.today_qty > net_abs {
        return Err(PlanError::CloseTodayExceedsNet {
            close_today: pos.today_qty,
            net_abs,
        });
    }
    let close_today = pos.today_qty;
    let close_yesterday = net_abs - close_today;

    let side = if pos.net_qty > 0 { Side::Sell } else { Side::Buy };
    let start = match side {
        Side::Sell => book.best_bid,
        Side::Buy => book.best_ask,
    };
    let step = match side {
        Side::Sell => -book.tick,
        Side::Buy => book.tick,
    };

    let mut intents = Vec::with_capacity(spec.rungs() as usize * 2);
    for rung in 0..spec.rungs() {
        let price = start + step * rung as f64;
        if close_today > 0 {
            intents.push(OrderIntent::new(
                pos.symbol.clone(),
                side,
                Offset::CloseToday,
                price,
                close_today,
                "force_flatten:prefer_close_today",
            ));
        }
        if close_yesterday > 0 {
            intents.push(OrderIntent::new(
                pos.symbol.clone(),
                side,
                Offset::Close,
                price,
                close_yesterday,
                "force_flatten:fallback_close",
            ));
        }
    }
    Ok(intents)
}
