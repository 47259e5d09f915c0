use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{GateKind, GateOutcome, GateResult};

/// Margin usage tiers, ordered. Thresholds are config; ranks are fixed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarginLevel {
    Safe,
    Normal,
    Warning,
    Danger,
    Critical,
}

impl MarginLevel {
    pub fn rank(&self) -> u8 {
        match self {
            MarginLevel::Safe => 0,
            MarginLevel::Normal => 1,
            MarginLevel::Warning => 2,
            MarginLevel::Danger => 3,
            MarginLevel::Critical => 4,
        }
    }

    pub fn is_tradeable(&self) -> bool {
        matches!(
            self,
            MarginLevel::Safe | MarginLevel::Normal | MarginLevel::Warning
        )
    }

    pub fn requires_action(&self) -> bool {
        matches!(self, MarginLevel::Danger | MarginLevel::Critical)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MarginConfigError {
    #[error("margin tier thresholds must be strictly increasing in (0, ..]")]
    BadThresholds,
    #[error("min_available_margin must be >= 0")]
    NegativeMinAvailable,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarginConfig {
    pub safe_threshold: f64,
    pub warning_threshold: f64,
    pub danger_threshold: f64,
    pub critical_threshold: f64,
    pub min_available_margin: f64,
    pub alert_cooldown_seconds: f64,
    pub history_max_size: usize,
}

impl Default for MarginConfig {
    fn default() -> Self {
        Self {
            safe_threshold: 0.50,
            warning_threshold: 0.70,
            danger_threshold: 0.85,
            critical_threshold: 1.00,
            min_available_margin: 0.0,
            alert_cooldown_seconds: 300.0,
            history_max_size: 1000,
        }
    }
}

impl MarginConfig {
    pub fn validate(&self) -> Result<(), MarginConfigError> {
        let ordered = 0.0 < self.safe_threshold
            && self.safe_threshold < self.warning_threshold
            && self.warning_threshold < self.danger_threshold
            && self.danger_threshold < self.critical_threshold;
        if !ordered {
            return Err(MarginConfigError::BadThresholds);
        }
        if self.min_available_margin < 0.0 {
            return Err(MarginConfigError::NegativeMinAvailable);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarginSnapshot {
    pub ts: f64,
    pub equity: f64,
    pub margin_used: f64,
    pub margin_available: f64,
    pub usage_ratio: f64,
    pub level: MarginLevel,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarginAlert {
    pub ts: f64,
    pub level: MarginLevel,
    pub previous_level: MarginLevel,
    pub usage_ratio: f64,
    pub equity: f64,
    pub margin_used: f64,
    pub message: String,
    pub requires_action: bool,
}

/// Outcome of an opening-margin admission check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OpenCheck {
    pub can_open: bool,
    pub reason: String,
    pub current_level: MarginLevel,
    pub usage_ratio: f64,
    pub available_margin: f64,
    pub required_margin: f64,
    pub projected_ratio: f64,
}

/// Real-time margin usage monitor with tiered alerts.
pub struct MarginMonitor {
    config: MarginConfig,
    equity: f64,
    margin_used: f64,
    usage_ratio: f64,
    level: MarginLevel,
    last_update_ts: Option<f64>,
    last_alert_ts: Option<f64>,
    history: VecDeque<MarginSnapshot>,
    alerts: VecDeque<MarginAlert>,
}

impl MarginMonitor {
    pub fn new(config: MarginConfig) -> Result<Self, MarginConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            equity: 0.0,
            margin_used: 0.0,
            usage_ratio: 0.0,
            level: MarginLevel::Safe,
            last_update_ts: None,
            last_alert_ts: None,
            history: VecDeque::new(),
            alerts: VecDeque::new(),
        })
    }

    pub fn level(&self) -> MarginLevel {
        self.level
    }

    pub fn usage_ratio(&self) -> f64 {
        self.usage_ratio
    }

    pub fn margin_available(&self) -> f64 {
        (self.equity - self.margin_used).max(0.0)
    }

    pub fn alerts(&self) -> impl Iterator<Item = &MarginAlert> {
        self.alerts.iter()
    }

    pub fn history(&self) -> impl Iterator<Item = &MarginSnapshot> {
        self.history.iter()
    }

    /// Refresh the monitor from an account snapshot. Tier changes past the
    /// alert cooldown produce a [`MarginAlert`].
    pub fn update(&mut self, equity: f64, margin_used: f64, now_ts: f64) -> Result<MarginLevel, String> {
        if equity < 0.0 {
            return Err(format!("equity must be >= 0, got {equity}"));
        }
        if margin_used < 0.0 {
            return Err(format!("margin_used must be >= 0, got {margin_used}"));
        }

        let previous_level = self.level;
        self.equity = equity;
        self.margin_used = margin_used;
        self.usage_ratio = usage_ratio(equity, margin_used);
        self.level = self.level_for(self.usage_ratio);
        self.last_update_ts = Some(now_ts);

        self.history.push_back(MarginSnapshot {
            ts: now_ts,
            equity,
            margin_used,
            margin_available: self.margin_available(),
            usage_ratio: self.usage_ratio,
            level: self.level,
        });
        while self.history.len() > self.config.history_max_size {
            self.history.pop_front();
        }

        if self.should_alert(previous_level, now_ts) {
            let message = format!(
                "margin tier changed {:?} -> {:?}, usage {:.4}",
                previous_level, self.level, self.usage_ratio
            );
            self.alerts.push_back(MarginAlert {
                ts: now_ts,
                level: self.level,
                previous_level,
                usage_ratio: self.usage_ratio,
                equity,
                margin_used,
                message,
                requires_action: self.level.requires_action(),
            });
            while self.alerts.len() > 100 {
                self.alerts.pop_front();
            }
            self.last_alert_ts = Some(now_ts);
        }

        Ok(self.level)
    }

    /// Admission check for an opening order requiring `required_margin`.
    pub fn can_open(&self, required_margin: f64, allow_warning: bool) -> OpenCheck {
        let available = self.margin_available();
        let base = |can_open: bool, reason: String, projected: f64| OpenCheck {
            can_open,
            reason,
            current_level: self.level,
            usage_ratio: self.usage_ratio,
            available_margin: available,
            required_margin,
            projected_ratio: projected,
        };

        if required_margin < 0.0 {
            return base(
                false,
                format!("required margin must be >= 0, got {required_margin}"),
                self.usage_ratio,
            );
        }
        if self.level == MarginLevel::Critical {
            return base(
                false,
                "margin at critical tier, opening prohibited".to_string(),
                self.usage_ratio,
            );
        }
        if self.level == MarginLevel::Danger {
            return base(
                false,
                "margin at danger tier, opening prohibited".to_string(),
                self.usage_ratio,
            );
        }
        if self.level == MarginLevel::Warning && !allow_warning {
            return base(
                false,
                "margin at warning tier and warnings are not allowed".to_string(),
                self.usage_ratio,
            );
        }
        if required_margin > available {
            return base(
                false,
                format!("insufficient margin: need {required_margin:.2}, available {available:.2}"),
                self.usage_ratio,
            );
        }
        let remaining = available - required_margin;
        if remaining < self.config.min_available_margin {
            return base(
                false,
                format!(
                    "post-open available margin {remaining:.2} below minimum {:.2}",
                    self.config.min_available_margin
                ),
                self.usage_ratio,
            );
        }

        let projected = usage_ratio(self.equity, self.margin_used + required_margin);
        let projected_level = self.level_for(projected);
        if projected_level.requires_action() {
            return base(
                false,
                format!("opening would move margin to {projected_level:?} tier"),
                projected,
            );
        }

        base(true, "margin sufficient".to_string(), projected)
    }

    /// Gate entry point for the protection chain.
    pub fn evaluate(&self, required_margin: f64, allow_warning: bool) -> GateResult {
        let check = self.can_open(required_margin, allow_warning);
        let outcome = if check.can_open {
            GateOutcome::Pass
        } else {
            GateOutcome::reject("MARGIN_REJECTED", check.reason.clone())
        };
        GateResult::new(GateKind::Margin, outcome, json!(check))
    }

    fn level_for(&self, ratio: f64) -> MarginLevel {
        let c = &self.config;
        if ratio >= c.critical_threshold {
            MarginLevel::Critical
        } else if ratio >= c.danger_threshold {
            MarginLevel::Danger
        } else if ratio >= c.warning_threshold {
            MarginLevel::Warning
        } else if ratio >= c.safe_threshold {
            MarginLevel::Normal
        } else {
            MarginLevel::Safe
        }
    }

    fn should_alert(&self, previous_level: MarginLevel, now_ts: f64) -> bool {
        if previous_level == self.level {
            return false;
        }
        match self.last_alert_ts {
            Some(last) => now_ts - last >= self.config.alert_cooldown_seconds,
            None => true,
        }
    }
}

fn usage_ratio(equity: f64, margin_used: f64) -> f64 {
    if equity <= 0.0 {
        if margin_used > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    } else {
        margin_used / equity
    }
}
