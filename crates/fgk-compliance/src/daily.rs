use std::collections::BTreeMap;

use fgk_schemas::SessionCalendar;

use crate::REG_DAILY_HFT_ORDERS;

/// Per-trading-day order-action counter against the 20 000/day regulator
/// threshold. Night-session actions count toward the next trading day.
pub struct DailyOrderCounter {
    calendar: SessionCalendar,
    threshold: u64,
    counts: BTreeMap<(String, u32), u64>,
}

impl DailyOrderCounter {
    pub fn new(calendar: SessionCalendar) -> Self {
        Self {
            calendar,
            threshold: REG_DAILY_HFT_ORDERS as u64,
            counts: BTreeMap::new(),
        }
    }

    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Count one order action; returns the running total for the day.
    pub fn record(&mut self, account_id: &str, ts: f64) -> u64 {
        let day = self.calendar.trading_day_id(ts);
        let count = self
            .counts
            .entry((account_id.to_string(), day))
            .or_insert(0);
        *count += 1;
        *count
    }

    pub fn count(&self, account_id: &str, ts: f64) -> u64 {
        let day = self.calendar.trading_day_id(ts);
        self.counts
            .get(&(account_id.to_string(), day))
            .copied()
            .unwrap_or(0)
    }

    /// True once the account crossed the daily HFT threshold.
    pub fn is_daily_hft(&self, account_id: &str, ts: f64) -> bool {
        self.count(account_id, ts) >= self.threshold
    }
}
