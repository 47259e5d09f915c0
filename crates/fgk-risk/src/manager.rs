use serde_json::json;

use fgk_audit::{EventType, KernelEvent};
use fgk_schemas::{AccountSnapshot, SessionCalendar};

use crate::{RiskConfig, RiskConfigError, RiskState, TriggerMetrics};

/// Kill-switch state machine for one shard. Owns its event queue; the
/// orchestrator drains it with [`RiskManager::pop_events`] and stamps the
/// tick's correlation id onto each drained event.
pub struct RiskManager {
    config: RiskConfig,
    calendar: SessionCalendar,
    state: RiskState,
    state_entered_ts: f64,

    baseline_equity: Option<f64>,
    baseline_day: Option<u32>,

    triggered_ts: Option<f64>,
    cooling_start_ts: Option<f64>,
    recovery_step: usize,
    recovery_step_started_ts: f64,

    consecutive_losses: u32,
    position_loss_pct: f64,
    last_trigger_reasons: Vec<String>,

    events: Vec<KernelEvent>,
}

impl RiskManager {
    pub fn new(config: RiskConfig, calendar: SessionCalendar) -> Result<Self, RiskConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            calendar,
            state: RiskState::Normal,
            state_entered_ts: 0.0,
            baseline_equity: None,
            baseline_day: None,
            triggered_ts: None,
            cooling_start_ts: None,
            recovery_step: 0,
            recovery_step_started_ts: 0.0,
            consecutive_losses: 0,
            position_loss_pct: 0.0,
            last_trigger_reasons: Vec::new(),
            events: Vec::new(),
        })
    }

    pub fn state(&self) -> RiskState {
        self.state
    }

    pub fn baseline_equity(&self) -> Option<f64> {
        self.baseline_equity
    }

    /// Capture the daily baseline. Idempotent within one trading day; the
    /// first call of a new trading day re-baselines and resets day-scoped
    /// counters.
    pub fn on_day_start_0900(
        &mut self,
        snap: &AccountSnapshot,
        correlation_id: &str,
        now_ts: f64,
    ) -> Result<(), String> {
        snap.validate()?;

        let day = self.calendar.trading_day_id(now_ts);
        if self.baseline_day == Some(day) {
            return Ok(());
        }

        self.baseline_day = Some(day);
        self.baseline_equity = Some(snap.equity);
        self.consecutive_losses = 0;
        self.position_loss_pct = 0.0;

        self.events.push(
            KernelEvent::new(
                EventType::DayStarted,
                now_ts,
                json!({
                    "trading_day": day,
                    "baseline_equity": snap.equity,
                    "margin_used": snap.margin_used,
                }),
            )
            .with_correlation(correlation_id),
        );
        Ok(())
    }

    /// Feed one realized trade result; losses accumulate toward the
    /// consecutive-loss trip, any win resets the streak.
    pub fn record_trade_result(&mut self, pnl: f64) {
        if pnl < 0.0 {
            self.consecutive_losses = self.consecutive_losses.saturating_add(1);
        } else {
            self.consecutive_losses = 0;
        }
    }

    /// Feed the current worst open-position loss fraction.
    pub fn record_position_loss_pct(&mut self, pct: f64) {
        self.position_loss_pct = pct;
    }

    /// Advance timers, then evaluate trip conditions against the snapshot.
    pub fn update(&mut self, snap: &AccountSnapshot, now_ts: f64) {
        self.tick(now_ts);

        if self.state != RiskState::Normal {
            return;
        }

        let metrics = self.metrics_for(snap);
        let reasons = self.trigger_reasons(&metrics);
        if reasons.is_empty() {
            return;
        }

        self.last_trigger_reasons = reasons.clone();
        self.transition(
            RiskState::Triggered,
            &reasons.join("; "),
            json!({ "metrics": metrics }),
            now_ts,
        );
        self.triggered_ts = Some(now_ts);

        self.events.push(KernelEvent::new(
            EventType::KillSwitchFired,
            now_ts,
            json!({
                "reasons": reasons,
                "metrics": metrics,
            }),
        ));
        self.events.push(KernelEvent::new(
            EventType::ForceFlattenRequested,
            now_ts,
            json!({ "state": self.state.as_str() }),
        ));
    }

    /// Pure clock advancement. A state with no pending timer ticks to
    /// itself and emits nothing.
    pub fn tick(&mut self, now_ts: f64) -> RiskState {
        match self.state {
            RiskState::Triggered => {
                if let Some(triggered) = self.triggered_ts {
                    if now_ts - triggered >= self.config.cooling_start_seconds {
                        self.transition(
                            RiskState::Cooling,
                            "auto cooling after trigger timeout",
                            json!({ "triggered_duration": now_ts - triggered }),
                            now_ts,
                        );
                        self.cooling_start_ts = Some(now_ts);
                    }
                }
            }
            RiskState::Cooling => {
                if let Some(started) = self.cooling_start_ts {
                    if now_ts - started >= self.config.full_cooling_seconds {
                        self.transition(
                            RiskState::Recovery,
                            "cooling period completed",
                            json!({ "cooling_duration": now_ts - started }),
                            now_ts,
                        );
                        self.recovery_step = 0;
                        self.recovery_step_started_ts = now_ts;
                    }
                }
            }
            RiskState::Recovery => {
                self.advance_recovery(now_ts);
            }
            RiskState::Normal | RiskState::ManualOverride => {}
        }
        self.state
    }

    /// Operator takeover from any automatic state.
    pub fn manual_override(&mut self, reason: &str, now_ts: f64) -> bool {
        if self.state == RiskState::ManualOverride {
            return false;
        }
        let details = json!({ "previous_state": self.state.as_str() });
        self.transition(RiskState::ManualOverride, reason, details, now_ts);
        true
    }

    /// Operator release: back to NORMAL, or into COOLING for a supervised
    /// restart of the recovery loop.
    pub fn manual_release(&mut self, to_normal: bool, now_ts: f64) -> bool {
        if self.state != RiskState::ManualOverride {
            return false;
        }
        if to_normal {
            self.transition(
                RiskState::Normal,
                "manual release to normal",
                json!({ "target_state": "NORMAL" }),
                now_ts,
            );
            self.reset_trip_tracking();
        } else {
            self.transition(
                RiskState::Cooling,
                "manual release to cooling",
                json!({ "target_state": "COOLING" }),
                now_ts,
            );
            self.cooling_start_ts = Some(now_ts);
        }
        true
    }

    /// Fraction of nominal position limits currently allowed.
    pub fn allowed_position_ratio(&self) -> f64 {
        match self.state {
            RiskState::Normal => 1.0,
            RiskState::Recovery => self
                .config
                .recovery_steps
                .get(self.recovery_step)
                .copied()
                .unwrap_or(0.0),
            RiskState::Triggered | RiskState::Cooling | RiskState::ManualOverride => 0.0,
        }
    }

    pub fn is_new_position_allowed(&self) -> bool {
        matches!(self.state, RiskState::Normal | RiskState::Recovery)
    }

    /// True while the shard should still be force-flattening: the trip has
    /// fired and the account has not yet reached recovery.
    pub fn is_flatten_authorized(&self) -> bool {
        matches!(self.state, RiskState::Triggered | RiskState::Cooling)
    }

    /// Drain queued events in emission order.
    pub fn pop_events(&mut self) -> Vec<KernelEvent> {
        std::mem::take(&mut self.events)
    }

    fn metrics_for(&self, snap: &AccountSnapshot) -> TriggerMetrics {
        let daily_loss_pct = match self.baseline_equity {
            Some(baseline) if baseline > 0.0 => (baseline - snap.equity) / baseline,
            _ => 0.0,
        };
        TriggerMetrics {
            daily_loss_pct,
            position_loss_pct: self.position_loss_pct,
            margin_usage_pct: snap.usage_ratio(),
            consecutive_losses: self.consecutive_losses,
        }
    }

    fn trigger_reasons(&self, m: &TriggerMetrics) -> Vec<String> {
        let mut reasons = Vec::new();
        if m.daily_loss_pct > self.config.daily_loss_limit {
            reasons.push(format!(
                "daily_loss_pct({:.4}) > limit({:.4})",
                m.daily_loss_pct, self.config.daily_loss_limit
            ));
        }
        if m.position_loss_pct > self.config.position_loss_limit {
            reasons.push(format!(
                "position_loss_pct({:.4}) > limit({:.4})",
                m.position_loss_pct, self.config.position_loss_limit
            ));
        }
        if m.margin_usage_pct > self.config.margin_limit {
            reasons.push(format!(
                "margin_usage_pct({:.4}) > limit({:.4})",
                m.margin_usage_pct, self.config.margin_limit
            ));
        }
        if m.consecutive_losses >= self.config.consecutive_loss_limit {
            reasons.push(format!(
                "consecutive_losses({}) >= limit({})",
                m.consecutive_losses, self.config.consecutive_loss_limit
            ));
        }
        reasons
    }

    fn advance_recovery(&mut self, now_ts: f64) {
        if now_ts - self.recovery_step_started_ts < self.config.step_interval_seconds {
            return;
        }

        let next_step = self.recovery_step + 1;
        if next_step >= self.config.recovery_steps.len() {
            self.transition(
                RiskState::Normal,
                "recovery completed",
                json!({ "final_step": next_step }),
                now_ts,
            );
            self.reset_trip_tracking();
        } else {
            self.recovery_step = next_step;
            self.recovery_step_started_ts = now_ts;
        }
    }

    fn reset_trip_tracking(&mut self) {
        self.triggered_ts = None;
        self.cooling_start_ts = None;
        self.recovery_step = 0;
        self.last_trigger_reasons.clear();
    }

    fn transition(
        &mut self,
        to: RiskState,
        trigger_reason: &str,
        details: serde_json::Value,
        now_ts: f64,
    ) {
        debug_assert!(self.state != to, "self-loop transitions are invalid");
        let from = self.state;
        self.state = to;
        self.state_entered_ts = now_ts;

        self.events.push(KernelEvent::new(
            EventType::RiskStateChanged,
            now_ts,
            json!({
                "from_state": from.as_str(),
                "to_state": to.as_str(),
                "trigger_reason": trigger_reason,
                "details": details,
            }),
        ));
    }
}
