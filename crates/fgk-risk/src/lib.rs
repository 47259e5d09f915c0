//! fgk-risk
//!
//! Kill-switch state machine for one trading-account shard:
//! - daily baseline equity captured at the 09:00 day-start call
//! - drawdown / margin / consecutive-loss trip conditions
//! - TRIGGERED -> COOLING -> RECOVERY -> NORMAL closed loop with
//!   progressive position-ratio restoration
//! - manual override / release paths for the operator
//!
//! Deterministic: every timestamp is injected, `tick` is a pure function
//! of (state, clock), and a terminal sub-state ticks to itself.

mod manager;
mod types;

pub use manager::RiskManager;
pub use types::{RiskConfig, RiskConfigError, RiskState, TriggerMetrics};
