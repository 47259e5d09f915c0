use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{AccountWindow, OrderEvent, ThrottleConfig};

/// Result of one HFT detection pass for an account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HftDetectionResult {
    pub account_id: String,
    pub orders_per_sec: f64,
    pub cancel_ratio: f64,
    pub is_hft: bool,
    pub ts: f64,
}

/// Flags accounts whose order rate crosses the regulator HFT threshold.
/// The flag latches; only an explicit operator action clears it.
pub struct HftDetector {
    config: ThrottleConfig,
    windows: BTreeMap<String, AccountWindow>,
    hft_accounts: BTreeSet<String>,
    detection_count: u64,
    hft_detection_count: u64,
}

impl HftDetector {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            windows: BTreeMap::new(),
            hft_accounts: BTreeSet::new(),
            detection_count: 0,
            hft_detection_count: 0,
        }
    }

    pub fn record_order(&mut self, event: OrderEvent) {
        let window = self.windows.entry(event.account_id.clone()).or_default();
        window.record(event, &self.config);
    }

    pub fn detect(&mut self, account_id: &str, now: f64) -> HftDetectionResult {
        self.detection_count += 1;
        let metrics = self
            .windows
            .entry(account_id.to_string())
            .or_default()
            .metrics(now, &self.config);

        if metrics.is_hft {
            self.hft_detection_count += 1;
            self.hft_accounts.insert(account_id.to_string());
        }

        HftDetectionResult {
            account_id: account_id.to_string(),
            orders_per_sec: metrics.orders_per_sec,
            cancel_ratio: metrics.cancel_ratio,
            is_hft: metrics.is_hft,
            ts: now,
        }
    }

    pub fn is_hft_account(&self, account_id: &str) -> bool {
        self.hft_accounts.contains(account_id)
    }

    /// Operator action: clear a latched HFT flag.
    pub fn clear_hft_flag(&mut self, account_id: &str) -> bool {
        self.hft_accounts.remove(account_id)
    }

    pub fn hft_accounts(&self) -> &BTreeSet<String> {
        &self.hft_accounts
    }

    pub fn detection_count(&self) -> u64 {
        self.detection_count
    }

    pub fn hft_detection_count(&self) -> u64 {
        self.hft_detection_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OrderEventType;

    fn submit(account: &str, i: usize, ts: f64) -> OrderEvent {
        OrderEvent {
            account_id: account.to_string(),
            strategy_id: "strat_001".to_string(),
            order_id: format!("o-{i}"),
            event_type: OrderEventType::Submit,
            symbol: "rb2501".to_string(),
            ts,
            audit_recorded_ts: None,
        }
    }

    #[test]
    fn low_frequency_is_not_hft() {
        let mut det = HftDetector::new(ThrottleConfig::default());
        for i in 0..10 {
            det.record_order(submit("acc_001", i, 100.0));
        }
        let result = det.detect("acc_001", 100.0);
        assert!(!result.is_hft);
        assert!(result.orders_per_sec < 300.0);
    }

    #[test]
    fn crossing_threshold_latches_until_cleared() {
        let cfg = ThrottleConfig {
            hft_threshold_per_sec: 2.0,
            ..ThrottleConfig::default()
        };
        let mut det = HftDetector::new(cfg);
        for i in 0..20 {
            det.record_order(submit("acc_001", i, 100.0));
        }
        let result = det.detect("acc_001", 100.0);
        assert!(result.is_hft);
        assert!(det.is_hft_account("acc_001"));

        // The window drains, but the flag stays latched.
        let later = det.detect("acc_001", 200.0);
        assert!(!later.is_hft);
        assert!(det.is_hft_account("acc_001"));

        assert!(det.clear_hft_flag("acc_001"));
        assert!(!det.is_hft_account("acc_001"));
    }
}
