use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use fgk_audit::{EventType, KernelEvent};
use fgk_broker::Broker;
use fgk_schemas::{BookTop, OrderIntent, PositionToClose, SessionCalendar};

use crate::{build_flatten_intents, FlattenSpec};

/// Outcome of one broker placement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlaceOutcome {
    Ack { order_id: String },
    Rejected { reason: String },
}

/// Evidence row for one placement attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub intent: OrderIntent,
    pub outcome: PlaceOutcome,
    pub ts: f64,
    pub correlation_id: String,
}

/// Executes flatten plans against the broker. Stateful across ticks only
/// for the per-trading-day latch and the cumulative batch counters.
pub struct FlattenExecutor {
    broker: Box<dyn Broker>,
    calendar: SessionCalendar,
    max_rejections: u32,
    last_run_day: Option<u32>,
}

impl FlattenExecutor {
    pub const DEFAULT_MAX_REJECTIONS: u32 = 10;

    pub fn new(broker: Box<dyn Broker>) -> Self {
        Self::with_limits(
            broker,
            SessionCalendar::china_futures(),
            Self::DEFAULT_MAX_REJECTIONS,
        )
    }

    pub fn with_limits(
        broker: Box<dyn Broker>,
        calendar: SessionCalendar,
        max_rejections: u32,
    ) -> Self {
        Self {
            broker,
            calendar,
            max_rejections,
            last_run_day: None,
        }
    }

    /// True if a flatten already ran in the trading day containing `ts`.
    pub fn has_run_today(&self, ts: f64) -> bool {
        self.last_run_day == Some(self.calendar.trading_day_id(ts))
    }

    /// Reset the day latch (test and operator use).
    pub fn reset_day_latch(&mut self) {
        self.last_run_day = None;
    }

    /// Execute one flatten batch over all positions.
    ///
    /// Event order: per-symbol data-quality events as positions are
    /// scanned, then FLATTEN_STARTED before the first placement, one
    /// ExecutionRecord per placement, and FLATTEN_COMPLETED or the abort
    /// event last. Runs at most once per trading day; repeated calls in
    /// the same day emit FLATTEN_SKIPPED_ALREADY_IN_PROGRESS and nothing
    /// else.
    pub fn execute_all(
        &mut self,
        positions: &[PositionToClose],
        books: &BTreeMap<String, BookTop>,
        spec: &FlattenSpec,
        correlation_id: &str,
        now_ts: f64,
    ) -> (Vec<KernelEvent>, Vec<ExecutionRecord>) {
        let mut events = Vec::new();
        let mut records = Vec::new();

        let day = self.calendar.trading_day_id(now_ts);
        if self.last_run_day == Some(day) {
            events.push(
                KernelEvent::new(
                    EventType::FlattenSkippedAlreadyInProgress,
                    now_ts,
                    json!({ "trading_day": day }),
                )
                .with_correlation(correlation_id),
            );
            return (events, records);
        }
        self.last_run_day = Some(day);

        let mut rejections: u32 = 0;
        let mut started = false;

        'positions: for pos in positions {
            let book = match books.get(&pos.symbol) {
                Some(book) => book,
                None => {
                    events.push(
                        KernelEvent::new(
                            EventType::DataQualityMissingBook,
                            now_ts,
                            json!({ "symbol": pos.symbol }),
                        )
                        .with_correlation(correlation_id),
                    );
                    continue;
                }
            };

            let intents = match build_flatten_intents(pos, book, spec) {
                Ok(intents) => intents,
                Err(err) => {
                    events.push(
                        KernelEvent::new(
                            EventType::DataQualityInconsistentPosition,
                            now_ts,
                            json!({ "symbol": pos.symbol, "error": err.to_string() }),
                        )
                        .with_correlation(correlation_id),
                    );
                    continue;
                }
            };

            for intent in &intents {
                if !started {
                    started = true;
                    events.push(
                        KernelEvent::new(
                            EventType::FlattenStarted,
                            now_ts,
                            json!({ "trading_day": day }),
                        )
                        .with_correlation(correlation_id),
                    );
                }

                let outcome = match self.broker.place_order(intent) {
                    Ok(ack) => PlaceOutcome::Ack {
                        order_id: ack.order_id,
                    },
                    Err(rejected) => {
                        rejections += 1;
                        PlaceOutcome::Rejected {
                            reason: rejected.reason,
                        }
                    }
                };

                records.push(ExecutionRecord {
                    intent: intent.clone(),
                    outcome,
                    ts: now_ts,
                    correlation_id: correlation_id.to_string(),
                });

                if rejections >= self.max_rejections {
                    events.push(
                        KernelEvent::new(
                            EventType::FlattenAbortedTooManyRejections,
                            now_ts,
                            json!({
                                "rejections": rejections,
                                "max_rejections": self.max_rejections,
                            }),
                        )
                        .with_correlation(correlation_id),
                    );
                    break 'positions;
                }
            }
        }

        let aborted = events
            .iter()
            .any(|e| e.event_type == EventType::FlattenAbortedTooManyRejections);
        if started && !aborted {
            events.push(
                KernelEvent::new(
                    EventType::FlattenCompleted,
                    now_ts,
                    json!({
                        "placements": records.len(),
                        "rejections": rejections,
                    }),
                )
                .with_correlation(correlation_id),
            );
        }

        (events, records)
    }
}
