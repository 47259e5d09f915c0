use std::collections::BTreeMap;

use serde_json::json;

use fgk_audit::AuditLog;

use crate::{
    AccountMetrics, AccountWindow, HftDetector, OrderEvent, ThrottleConfig, ThrottleDecision,
    ThrottleLevel,
};

/// The five-level compliance throttle. One instance per shard; owns its
/// windows, the HFT detector, and the audit log exclusively.
pub struct ThrottleManager {
    config: ThrottleConfig,
    windows: BTreeMap<String, AccountWindow>,
    hft: HftDetector,
    audit: AuditLog,
    check_count: u64,
    throttle_count: u64,
}

impl ThrottleManager {
    pub fn new(config: ThrottleConfig) -> Self {
        let hft = HftDetector::new(config.clone());
        Self {
            config,
            windows: BTreeMap::new(),
            hft,
            audit: AuditLog::new(),
            check_count: 0,
            throttle_count: 0,
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn hft_detector(&self) -> &HftDetector {
        &self.hft
    }

    pub fn clear_hft_flag(&mut self, account_id: &str) -> bool {
        self.hft.clear_hft_flag(account_id)
    }

    /// Record one order action into the rolling windows.
    pub fn record_order(&mut self, event: OrderEvent) {
        self.hft.record_order(event.clone());
        let window = self.windows.entry(event.account_id.clone()).or_default();
        window.record(event, &self.config);
    }

    /// Current metrics for an account, computed on demand.
    pub fn account_metrics(&mut self, account_id: &str, now: f64) -> AccountMetrics {
        self.windows
            .entry(account_id.to_string())
            .or_default()
            .metrics(now, &self.config)
    }

    /// Evaluate the throttle for a pending submit/cancel. Candidate
    /// violations are collected and the most severe wins; every decision
    /// writes an audit entry.
    pub fn check_and_throttle(
        &mut self,
        account_id: &str,
        strategy_id: &str,
        now: f64,
    ) -> ThrottleDecision {
        self.check_count += 1;
        let cfg = self.config.clone();
        let metrics = self.account_metrics(account_id, now);

        let mut candidates: Vec<ThrottleDecision> = Vec::new();

        if let Some(last_ms) = metrics.last_interval_ms {
            if last_ms < cfg.min_order_interval_ms {
                candidates.push(ThrottleDecision {
                    level: ThrottleLevel::Delay,
                    code: "ORDER_INTERVAL_TOO_SHORT".to_string(),
                    message: format!(
                        "order interval {:.1}ms below minimum {:.1}ms",
                        last_ms, cfg.min_order_interval_ms
                    ),
                    delay_ms: (cfg.min_order_interval_ms - last_ms).ceil() as u64,
                    military_rule: Some("M17".to_string()),
                });
            }
        }

        if metrics.cancel_freq_per_sec >= cfg.max_cancel_freq_per_sec {
            candidates.push(ThrottleDecision {
                level: ThrottleLevel::Reject,
                code: "CANCEL_FREQ_EXCEEDED".to_string(),
                message: format!(
                    "cancel frequency {}/s at or above cap {}/s",
                    metrics.cancel_freq_per_sec, cfg.max_cancel_freq_per_sec
                ),
                delay_ms: 0,
                military_rule: Some("M17".to_string()),
            });
        }

        if metrics.total_events_in_window > 0 && metrics.cancel_ratio >= cfg.max_cancel_ratio {
            candidates.push(ThrottleDecision {
                level: ThrottleLevel::Reject,
                code: "CANCEL_RATIO_EXCEEDED".to_string(),
                message: format!(
                    "cancel ratio {:.2} at or above cap {:.2}",
                    metrics.cancel_ratio, cfg.max_cancel_ratio
                ),
                delay_ms: 0,
                military_rule: Some("M17".to_string()),
            });
        }

        if metrics.max_audit_delay_sec > cfg.max_audit_delay_sec {
            candidates.push(ThrottleDecision {
                level: ThrottleLevel::Reject,
                code: "AUDIT_DELAY_EXCEEDED".to_string(),
                message: format!(
                    "audit latency {:.3}s above cap {:.3}s",
                    metrics.max_audit_delay_sec, cfg.max_audit_delay_sec
                ),
                delay_ms: 0,
                military_rule: Some("M3".to_string()),
            });
        }

        if cfg.enable_hft_detection {
            let hft = self.hft.detect(account_id, now);
            if hft.is_hft {
                self.audit.log(
                    now,
                    "HFT_DETECTED",
                    &format!("{account_id}/{strategy_id}"),
                    account_id,
                    "hft_detection",
                    "FLAGGED",
                    json!({
                        "orders_per_sec": hft.orders_per_sec,
                        "threshold": cfg.hft_threshold_per_sec,
                    }),
                    "M17",
                );
            }
            // A latched account is held at at-least-WARN until cleared.
            if hft.is_hft || self.hft.is_hft_account(account_id) {
                candidates.push(ThrottleDecision {
                    level: ThrottleLevel::Warn,
                    code: "HFT_FLAGGED".to_string(),
                    message: format!(
                        "account flagged high-frequency ({:.1} orders/s)",
                        hft.orders_per_sec
                    ),
                    delay_ms: 0,
                    military_rule: Some("M17".to_string()),
                });
            }
        }

        if candidates.is_empty() {
            let band = cfg.warning_ratio;
            let near_cancel_ratio = metrics.total_events_in_window > 0
                && metrics.cancel_ratio >= band * cfg.max_cancel_ratio;
            let near_cancel_freq =
                metrics.cancel_freq_per_sec as f64 >= band * cfg.max_cancel_freq_per_sec as f64;
            let near_rate = metrics.orders_per_sec >= band * cfg.hft_threshold_per_sec;
            if near_cancel_ratio || near_cancel_freq || near_rate {
                candidates.push(ThrottleDecision {
                    level: ThrottleLevel::Warn,
                    code: "APPROACHING_THRESHOLD".to_string(),
                    message: "order metrics within the warning band of a compliance cap"
                        .to_string(),
                    delay_ms: 0,
                    military_rule: Some("M17".to_string()),
                });
            }
        }

        // Most severe candidate wins; first match wins ties.
        let decision = candidates
            .into_iter()
            .reduce(|best, d| if d.level > best.level { d } else { best })
            .unwrap_or_else(ThrottleDecision::allow);

        if decision.level > ThrottleLevel::Allow {
            self.throttle_count += 1;
        }

        let (event_type, result) = match decision.level {
            ThrottleLevel::Allow => ("THROTTLE_CHECK", "ALLOW"),
            ThrottleLevel::Warn => ("COMPLIANCE_WARNING", "WARNING"),
            ThrottleLevel::Delay => ("THROTTLE_DELAY", "DELAYED"),
            ThrottleLevel::Reject => ("COMPLIANCE_VIOLATION", "VIOLATION"),
            ThrottleLevel::Block => ("COMPLIANCE_VIOLATION", "BLOCKED"),
        };
        self.audit.log(
            now,
            event_type,
            &format!("{account_id}/{strategy_id}"),
            &decision.code,
            "check_and_throttle",
            result,
            json!({
                "metrics": &metrics,
                "decision": &decision,
            }),
            decision.military_rule.as_deref().unwrap_or("M3"),
        );

        decision
    }

    /// Convenience wrapper used by the protection chain.
    pub fn can_submit(&mut self, account_id: &str, strategy_id: &str, now: f64) -> (bool, String) {
        let decision = self.check_and_throttle(account_id, strategy_id, now);
        (!decision.should_reject(), decision.message)
    }

    pub fn check_count(&self) -> u64 {
        self.check_count
    }

    pub fn throttle_count(&self) -> u64 {
        self.throttle_count
    }
}
