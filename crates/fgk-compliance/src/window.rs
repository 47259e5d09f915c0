use std::collections::VecDeque;

use crate::{AccountMetrics, OrderEvent, OrderEventType, ThrottleConfig};

/// Rolling order-event window for one account. Entries evict by age
/// (window_seconds) and by count (max_events); counters are integer so
/// float accumulation can never misstate a cancel count.
#[derive(Clone, Debug, Default)]
pub struct AccountWindow {
    events: VecDeque<OrderEvent>,
    last_order_ts: Option<f64>,
    total_submits: u64,
    total_cancels: u64,
    total_amends: u64,
}

impl AccountWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: OrderEvent, cfg: &ThrottleConfig) {
        self.evict(event.ts, cfg);
        match event.event_type {
            OrderEventType::Submit => self.total_submits += 1,
            OrderEventType::Cancel => self.total_cancels += 1,
            OrderEventType::Amend => self.total_amends += 1,
            OrderEventType::Fill => {}
        }
        self.last_order_ts = Some(event.ts);
        self.events.push_back(event);
        while self.events.len() > cfg.max_events {
            self.events.pop_front();
        }
    }

    pub fn last_order_ts(&self) -> Option<f64> {
        self.last_order_ts
    }

    pub fn totals(&self) -> (u64, u64, u64) {
        (self.total_submits, self.total_cancels, self.total_amends)
    }

    /// Metrics over the surviving window as of `now`.
    pub fn metrics(&mut self, now: f64, cfg: &ThrottleConfig) -> AccountMetrics {
        self.evict(now, cfg);

        let total = self.events.len();
        let cancels = self
            .events
            .iter()
            .filter(|e| e.event_type == OrderEventType::Cancel)
            .count();

        let cancel_ratio = if total > 0 {
            cancels as f64 / total as f64
        } else {
            0.0
        };

        let rate_floor = now - cfg.cancel_rate_window_seconds;
        let cancel_freq_per_sec = self
            .events
            .iter()
            .filter(|e| e.event_type == OrderEventType::Cancel && e.ts >= rate_floor)
            .count() as u32;

        let avg_order_interval_ms = if total >= 2 {
            let mut sum = 0.0;
            let mut prev = self.events[0].ts;
            for e in self.events.iter().skip(1) {
                sum += e.ts - prev;
                prev = e.ts;
            }
            sum / (total - 1) as f64 * 1000.0
        } else {
            0.0
        };

        let last_interval_ms = self.last_order_ts.map(|t| (now - t) * 1000.0);

        let orders_per_sec = if cfg.window_seconds > 0.0 {
            total as f64 / cfg.window_seconds
        } else {
            0.0
        };

        let max_audit_delay_sec = self
            .events
            .iter()
            .filter_map(|e| e.audit_recorded_ts.map(|rec| rec - e.ts))
            .fold(0.0, f64::max);

        AccountMetrics {
            total_events_in_window: total,
            cancels_in_window: cancels,
            cancel_ratio,
            cancel_freq_per_sec,
            avg_order_interval_ms,
            last_interval_ms,
            orders_per_sec,
            max_audit_delay_sec,
            is_hft: orders_per_sec >= cfg.hft_threshold_per_sec,
        }
    }

    fn evict(&mut self, now: f64, cfg: &ThrottleConfig) {
        let floor = now - cfg.window_seconds;
        while let Some(front) = self.events.front() {
            if front.ts < floor {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(event_type: OrderEventType, ts: f64) -> OrderEvent {
        OrderEvent {
            account_id: "acc_001".to_string(),
            strategy_id: "strat_001".to_string(),
            order_id: format!("o-{ts}"),
            event_type,
            symbol: "rb2501".to_string(),
            ts,
            audit_recorded_ts: None,
        }
    }

    #[test]
    fn cancel_ratio_counts_only_window_events() {
        let cfg = ThrottleConfig::default();
        let mut w = AccountWindow::new();
        w.record(ev(OrderEventType::Submit, 100.0), &cfg);
        w.record(ev(OrderEventType::Cancel, 100.1), &cfg);
        w.record(ev(OrderEventType::Submit, 100.2), &cfg);
        w.record(ev(OrderEventType::Cancel, 100.3), &cfg);

        let m = w.metrics(100.4, &cfg);
        assert_eq!(m.total_events_in_window, 4);
        assert_eq!(m.cancels_in_window, 2);
        assert_eq!(m.cancel_ratio, 0.5);
    }

    #[test]
    fn old_events_self_evict() {
        let cfg = ThrottleConfig::default();
        let mut w = AccountWindow::new();
        w.record(ev(OrderEventType::Submit, 100.0), &cfg);
        w.record(ev(OrderEventType::Submit, 101.0), &cfg);

        let m = w.metrics(107.0, &cfg);
        assert_eq!(m.total_events_in_window, 0);
        assert_eq!(m.cancel_ratio, 0.0);
        // last_interval still reflects the last seen order.
        assert_eq!(m.last_interval_ms, Some(6_000.0));
    }

    #[test]
    fn audit_delay_is_max_over_window() {
        let cfg = ThrottleConfig::default();
        let mut w = AccountWindow::new();
        let mut a = ev(OrderEventType::Submit, 100.0);
        a.audit_recorded_ts = Some(100.2);
        let mut b = ev(OrderEventType::Submit, 100.5);
        b.audit_recorded_ts = Some(102.0);
        w.record(a, &cfg);
        w.record(b, &cfg);

        let m = w.metrics(100.6, &cfg);
        assert!((m.max_audit_delay_sec - 1.5).abs() < 1e-9);
    }
}
