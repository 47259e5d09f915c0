//! fgk-compliance
//!
//! Programmatic-trading compliance for the Chinese futures rules (2025
//! administrative measures): per-account rolling order windows, the
//! five-level throttle, HFT detection against regulator thresholds, and
//! the daily order counter. Every decision leaves an integrity-hashed
//! audit entry.

mod analyzer;
mod daily;
mod hft;
mod throttle;
mod types;
mod window;

pub use analyzer::{
    AnalyzerConfig, BehaviorProfile, BehaviorRiskLevel, PatternAnalyzer, PatternIndicator,
    TradingPattern,
};
pub use daily::DailyOrderCounter;
pub use hft::{HftDetectionResult, HftDetector};
pub use throttle::ThrottleManager;
pub use types::{
    AccountMetrics, OrderEvent, OrderEventType, ThrottleConfig, ThrottleDecision, ThrottleLevel,
    REG_DAILY_HFT_ORDERS, REG_HFT_ORDERS_PER_SEC, REG_WARNING_ORDERS_PER_5S,
};
pub use window::AccountWindow;
