//! Trading-session calendar for Chinese futures exchanges.
//!
//! Deterministic, pure logic. No IO, no wall-clock.
//!
//! The "trading day" includes the preceding overnight session: a tick in
//! the night session (21:00 onwards, Asia/Shanghai) belongs to the *next*
//! calendar day's trading day, and Friday night rolls all the way to
//! Monday. Day-scoped latches (the force-flatten latch, daily order
//! counters) key on the id this calendar produces.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Weekday};
use chrono_tz::Asia::Shanghai;

/// Minutes since local midnight at which a timestamp starts counting
/// toward the next trading day. The night session opens at 21:00; the
/// 20:30 cutover also captures the pre-open auction window.
pub const NIGHT_SESSION_CUTOVER_MIN: u32 = 20 * 60 + 30;

/// Maps epoch timestamps to trading-day ids (`YYYYMMDD`).
///
/// Exchange holidays are injected at construction; the calendar itself only
/// knows the weekly cycle and the night-session cutover.
#[derive(Clone, Debug, Default)]
pub struct SessionCalendar {
    holidays: BTreeSet<u32>,
}

impl SessionCalendar {
    /// Calendar with no exchange holidays configured.
    pub fn china_futures() -> Self {
        Self::default()
    }

    /// Calendar with explicit exchange holidays (`YYYYMMDD` ids).
    pub fn with_holidays<I: IntoIterator<Item = u32>>(holidays: I) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    /// Trading-day id for a timestamp in epoch seconds.
    pub fn trading_day_id(&self, ts: f64) -> u32 {
        let secs = ts.floor() as i64;
        let utc = DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH);
        let local = utc.with_timezone(&Shanghai);

        let mut date = local.date_naive();
        let minute_of_day = local.hour() * 60 + local.minute();
        if minute_of_day >= NIGHT_SESSION_CUTOVER_MIN {
            date = next_day(date);
        }

        // Roll forward over weekends and configured holidays.
        while is_weekend(date) || self.holidays.contains(&day_id(date)) {
            date = next_day(date);
        }

        day_id(date)
    }

    /// True if the two timestamps fall in the same trading day.
    pub fn same_trading_day(&self, a: f64, b: f64) -> bool {
        self.trading_day_id(a) == self.trading_day_id(b)
    }
}

fn day_id(date: NaiveDate) -> u32 {
    (date.year() as u32) * 10_000 + date.month() * 100 + date.day()
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}
