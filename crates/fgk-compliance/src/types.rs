use serde::{Deserialize, Serialize};

/// Regulator thresholds from the 2025 programmatic-trading measures.
/// 50 order actions in 5 seconds is the warning line; 300 per second is
/// the HFT line; 20 000 per trading day is the daily HFT line.
pub const REG_WARNING_ORDERS_PER_5S: u32 = 50;
pub const REG_HFT_ORDERS_PER_SEC: u32 = 300;
pub const REG_DAILY_HFT_ORDERS: u32 = 20_000;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventType {
    Submit,
    Cancel,
    Amend,
    Fill,
}

impl OrderEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderEventType::Submit => "submit",
            OrderEventType::Cancel => "cancel",
            OrderEventType::Amend => "amend",
            OrderEventType::Fill => "fill",
        }
    }
}

/// One order action as seen by compliance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub account_id: String,
    pub strategy_id: String,
    pub order_id: String,
    pub event_type: OrderEventType,
    pub symbol: String,
    pub ts: f64,
    /// When the action landed in the audit store; drives the M3
    /// audit-latency cap.
    pub audit_recorded_ts: Option<f64>,
}

/// Throttle severity, ordered. Composite decisions take the maximum.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThrottleLevel {
    Allow,
    Warn,
    Delay,
    Reject,
    Block,
}

/// Outcome of one throttle check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThrottleDecision {
    pub level: ThrottleLevel,
    pub code: String,
    pub message: String,
    pub delay_ms: u64,
    pub military_rule: Option<String>,
}

impl ThrottleDecision {
    pub fn allow() -> Self {
        Self {
            level: ThrottleLevel::Allow,
            code: "OK".to_string(),
            message: "within compliance thresholds".to_string(),
            delay_ms: 0,
            military_rule: None,
        }
    }

    pub fn should_delay(&self) -> bool {
        self.level == ThrottleLevel::Delay && self.delay_ms > 0
    }

    pub fn should_reject(&self) -> bool {
        self.level >= ThrottleLevel::Reject
    }
}

/// Throttle thresholds. Defaults are the supervisory caps: cancel ratio
/// 50%, cancel rate 500/s, inter-order interval 100 ms, audit latency 1 s,
/// HFT at 300 actions/s, warning band at 80% of each cap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    pub window_seconds: f64,
    pub cancel_rate_window_seconds: f64,
    pub max_events: usize,
    pub max_cancel_ratio: f64,
    pub max_cancel_freq_per_sec: u32,
    pub min_order_interval_ms: f64,
    pub max_audit_delay_sec: f64,
    pub hft_threshold_per_sec: f64,
    pub warning_ratio: f64,
    pub enable_hft_detection: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            window_seconds: 5.0,
            cancel_rate_window_seconds: 1.0,
            max_events: 100_000,
            max_cancel_ratio: 0.50,
            max_cancel_freq_per_sec: 500,
            min_order_interval_ms: 100.0,
            max_audit_delay_sec: 1.0,
            hft_threshold_per_sec: REG_HFT_ORDERS_PER_SEC as f64,
            warning_ratio: 0.80,
            enable_hft_detection: true,
        }
    }
}

/// Window metrics computed on demand for one account.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountMetrics {
    pub total_events_in_window: usize,
    pub cancels_in_window: usize,
    pub cancel_ratio: f64,
    pub cancel_freq_per_sec: u32,
    pub avg_order_interval_ms: f64,
    pub last_interval_ms: Option<f64>,
    pub orders_per_sec: f64,
    pub max_audit_delay_sec: f64,
    pub is_hft: bool,
}
