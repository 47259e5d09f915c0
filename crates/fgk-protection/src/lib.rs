//! fgk-protection
//!
//! The synchronous pre-trade protection chain. Gates run in a fixed
//! order — limit price, margin, liquidity, fat finger, throttle, cost —
//! short-circuiting on the first reject while recording every result for
//! the audit stream. Each gate is an independent value with its own
//! `evaluate`; the chain only sequences them.

mod chain;
mod cost;
mod fat_finger;
mod limit;
mod liquidity;
mod margin;
mod types;

pub use chain::{ChainReport, OrderCheckContext, ProtectionChain};
pub use cost::{CostEstimate, CostFirstGate, CostThresholds, FeeModel, MarketDepth};
pub use fat_finger::{FatFingerConfig, FatFingerGate};
pub use limit::{
    LimitConfig, LimitPriceGate, LimitPrices, LimitState, PriceValidation, PriceValidationResult,
};
pub use liquidity::{LiquidityConfig, LiquidityGate};
pub use margin::{
    MarginAlert, MarginConfig, MarginConfigError, MarginLevel, MarginMonitor, MarginSnapshot,
    OpenCheck,
};
pub use types::{GateKind, GateOutcome, GateResult};
