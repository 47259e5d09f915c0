use serde::{Deserialize, Serialize};

/// Kill-switch states. Only the transitions in the table below are valid:
///
/// | From            | Event                         | To              |
/// |-----------------|-------------------------------|-----------------|
/// | NORMAL          | trigger conditions met        | TRIGGERED       |
/// | TRIGGERED       | >= cooling_start_seconds      | COOLING         |
/// | COOLING         | >= full_cooling_seconds       | RECOVERY        |
/// | RECOVERY        | all ratio steps consumed      | NORMAL          |
/// | any but MANUAL  | operator override             | MANUAL_OVERRIDE |
/// | MANUAL_OVERRIDE | release to normal             | NORMAL          |
/// | MANUAL_OVERRIDE | release to cooling            | COOLING         |
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskState {
    Normal,
    Triggered,
    Cooling,
    Recovery,
    ManualOverride,
}

impl RiskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskState::Normal => "NORMAL",
            RiskState::Triggered => "TRIGGERED",
            RiskState::Cooling => "COOLING",
            RiskState::Recovery => "RECOVERY",
            RiskState::ManualOverride => "MANUAL_OVERRIDE",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RiskConfigError {
    #[error("{0} must be > 0")]
    NonPositiveLimit(&'static str),
    #[error("recovery_steps must be non-empty and non-decreasing in (0, 1]")]
    BadRecoverySteps,
    #[error("cooling timers must be > 0")]
    BadTimers,
}

/// Trip thresholds and recovery policy. Defaults follow the supervisory
/// baseline: 3% daily loss, 5% position loss, 85% margin usage, 5
/// consecutive losses; 30 s to cooling, 5 min cooling, four recovery
/// steps of 60 s each.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub daily_loss_limit: f64,
    pub position_loss_limit: f64,
    pub margin_limit: f64,
    pub consecutive_loss_limit: u32,
    pub cooling_start_seconds: f64,
    pub full_cooling_seconds: f64,
    pub recovery_steps: Vec<f64>,
    pub step_interval_seconds: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            daily_loss_limit: 0.03,
            position_loss_limit: 0.05,
            margin_limit: 0.85,
            consecutive_loss_limit: 5,
            cooling_start_seconds: 30.0,
            full_cooling_seconds: 300.0,
            recovery_steps: vec![0.25, 0.5, 0.75, 1.0],
            step_interval_seconds: 60.0,
        }
    }
}

impl RiskConfig {
    /// Fail-fast validation for construction time.
    pub fn validate(&self) -> Result<(), RiskConfigError> {
        if self.daily_loss_limit <= 0.0 {
            return Err(RiskConfigError::NonPositiveLimit("daily_loss_limit"));
        }
        if self.position_loss_limit <= 0.0 {
            return Err(RiskConfigError::NonPositiveLimit("position_loss_limit"));
        }
        if self.margin_limit <= 0.0 {
            return Err(RiskConfigError::NonPositiveLimit("margin_limit"));
        }
        if self.consecutive_loss_limit == 0 {
            return Err(RiskConfigError::NonPositiveLimit("consecutive_loss_limit"));
        }
        if self.cooling_start_seconds <= 0.0
            || self.full_cooling_seconds <= 0.0
            || self.step_interval_seconds <= 0.0
        {
            return Err(RiskConfigError::BadTimers);
        }
        if self.recovery_steps.is_empty() {
            return Err(RiskConfigError::BadRecoverySteps);
        }
        let mut prev = 0.0;
        for &step in &self.recovery_steps {
            if step <= 0.0 || step > 1.0 || step < prev {
                return Err(RiskConfigError::BadRecoverySteps);
            }
            prev = step;
        }
        Ok(())
    }
}

/// Metrics the trip conditions evaluate against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerMetrics {
    pub daily_loss_pct: f64,
    pub position_loss_pct: f64,
    pub margin_usage_pct: f64,
    pub consecutive_losses: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(RiskConfig::default().validate().is_ok());
    }

    #[test]
    fn decreasing_recovery_steps_rejected() {
        let cfg = RiskConfig {
            recovery_steps: vec![0.5, 0.25],
            ..RiskConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
