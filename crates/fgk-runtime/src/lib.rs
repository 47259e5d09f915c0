//! fgk-runtime
//!
//! The per-tick orchestration layer. [`handle_risk_update`] is the sole
//! entry point of the risk/flatten pipeline: it hashes the tick's inputs,
//! runs the kill-switch evaluation, and drives the force-flatten executor
//! when the switch has fired. [`handle_trading_tick`] is the optional
//! strategy path ("mode 2") that routes candidate orders through the
//! protection chain; it must run in paper mode under replay.
//!
//! No exception crosses this boundary: every outcome is a value in the
//! returned result.

mod controls;
mod orchestrator;
mod trading;

pub use controls::{TradeControls, TradeMode};
pub use orchestrator::{handle_risk_update, TickResult};
pub use trading::{
    handle_trading_tick, targets_to_order_intents, TargetPosition, TargetStrategy,
    TradingTickInput, TradingTickResult,
};
