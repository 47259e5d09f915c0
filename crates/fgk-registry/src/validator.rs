use serde::{Deserialize, Serialize};

/// Observed compliance metrics for one account, as collected by the
/// throttle layer over a reporting period.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceMetrics {
    pub account_id: String,
    pub cancel_ratio: f64,
    pub max_cancel_freq_per_sec: u32,
    pub min_order_interval_ms: f64,
    pub max_audit_delay_sec: f64,
    pub max_orders_per_sec: f64,
    pub daily_order_count: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationSeverity {
    Info,
    Warning,
    Violation,
    Critical,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViolationDetail {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub observed: f64,
    pub threshold: f64,
    pub message: String,
}

/// Outcome of validating an account's metrics before report submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub account_id: String,
    pub passed: bool,
    pub violations: Vec<ViolationDetail>,
}

/// Thresholds mirror the throttle caps; the validator is the offline
/// check run before a daily report goes out, not a trading-path gate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    pub max_cancel_ratio: f64,
    pub max_cancel_freq_per_sec: u32,
    pub min_order_interval_ms: f64,
    pub max_audit_delay_sec: f64,
    pub hft_threshold_per_sec: f64,
    pub daily_hft_threshold: u64,
    pub warning_ratio: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_cancel_ratio: 0.50,
            max_cancel_freq_per_sec: 500,
            min_order_interval_ms: 100.0,
            max_audit_delay_sec: 1.0,
            hft_threshold_per_sec: 300.0,
            daily_hft_threshold: 20_000,
            warning_ratio: 0.80,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ComplianceValidator {
    config: ValidatorConfig,
}

impl ComplianceValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, metrics: &ComplianceMetrics) -> ValidationResult {
        let cfg = &self.config;
        let mut violations = Vec::new();

        if metrics.cancel_ratio > cfg.max_cancel_ratio {
            violations.push(ViolationDetail {
                rule: "CANCEL_RATIO".to_string(),
                severity: ViolationSeverity::Violation,
                observed: metrics.cancel_ratio,
                threshold: cfg.max_cancel_ratio,
                message: format!(
                    "cancel ratio {:.2} above cap {:.2}",
                    metrics.cancel_ratio, cfg.max_cancel_ratio
                ),
            });
        } else if metrics.cancel_ratio > cfg.warning_ratio * cfg.max_cancel_ratio {
            violations.push(ViolationDetail {
                rule: "CANCEL_RATIO".to_string(),
                severity: ViolationSeverity::Warning,
                observed: metrics.cancel_ratio,
                threshold: cfg.max_cancel_ratio,
                message: "cancel ratio inside the warning band".to_string(),
            });
        }

        if metrics.max_cancel_freq_per_sec > cfg.max_cancel_freq_per_sec {
            violations.push(ViolationDetail {
                rule: "CANCEL_FREQUENCY".to_string(),
                severity: ViolationSeverity::Critical,
                observed: metrics.max_cancel_freq_per_sec as f64,
                threshold: cfg.max_cancel_freq_per_sec as f64,
                message: format!(
                    "peak cancel frequency {}/s above cap {}/s",
                    metrics.max_cancel_freq_per_sec, cfg.max_cancel_freq_per_sec
                ),
            });
        }

        if metrics.min_order_interval_ms > 0.0
            && metrics.min_order_interval_ms < cfg.min_order_interval_ms
        {
            violations.push(ViolationDetail {
                rule: "ORDER_INTERVAL".to_string(),
                severity: ViolationSeverity::Violation,
                observed: metrics.min_order_interval_ms,
                threshold: cfg.min_order_interval_ms,
                message: format!(
                    "minimum observed interval {:.1}ms below the {:.1}ms floor",
                    metrics.min_order_interval_ms, cfg.min_order_interval_ms
                ),
            });
        }

        if metrics.max_audit_delay_sec > cfg.max_audit_delay_sec {
            violations.push(ViolationDetail {
                rule: "AUDIT_DELAY".to_string(),
                severity: ViolationSeverity::Violation,
                observed: metrics.max_audit_delay_sec,
                threshold: cfg.max_audit_delay_sec,
                message: format!(
                    "audit latency {:.3}s above the {:.3}s cap",
                    metrics.max_audit_delay_sec, cfg.max_audit_delay_sec
                ),
            });
        }

        if metrics.max_orders_per_sec >= cfg.hft_threshold_per_sec {
            violations.push(ViolationDetail {
                rule: "HFT_RATE".to_string(),
                severity: ViolationSeverity::Warning,
                observed: metrics.max_orders_per_sec,
                threshold: cfg.hft_threshold_per_sec,
                message: "order rate crosses the high-frequency threshold".to_string(),
            });
        }

        if metrics.daily_order_count >= cfg.daily_hft_threshold {
            violations.push(ViolationDetail {
                rule: "DAILY_HFT".to_string(),
                severity: ViolationSeverity::Warning,
                observed: metrics.daily_order_count as f64,
                threshold: cfg.daily_hft_threshold as f64,
                message: "daily order count crosses the daily HFT threshold".to_string(),
            });
        }

        let passed = !violations
            .iter()
            .any(|v| v.severity >= ViolationSeverity::Violation);

        ValidationResult {
            account_id: metrics.account_id.clone(),
            passed,
            violations,
        }
    }
}
