use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use fgk_audit::AuditLog;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStage {
    Incubation,
    Development,
    Validation,
    Production,
    Degraded,
    Suspended,
    Retired,
}

impl LifecycleStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStage::Incubation => "INCUBATION",
            LifecycleStage::Development => "DEVELOPMENT",
            LifecycleStage::Validation => "VALIDATION",
            LifecycleStage::Production => "PRODUCTION",
            LifecycleStage::Degraded => "DEGRADED",
            LifecycleStage::Suspended => "SUSPENDED",
            LifecycleStage::Retired => "RETIRED",
        }
    }
}

/// Capital tiers, ordered by the share of capital they unlock.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationTier {
    Zero,
    Trial,
    Minimal,
    Normal,
    Enhanced,
    Maximum,
}

impl AllocationTier {
    pub fn index(&self) -> usize {
        match self {
            AllocationTier::Zero => 0,
            AllocationTier::Trial => 1,
            AllocationTier::Minimal => 2,
            AllocationTier::Normal => 3,
            AllocationTier::Enhanced => 4,
            AllocationTier::Maximum => 5,
        }
    }
}

/// Caps attached to one tier.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationConfig {
    pub tier: AllocationTier,
    pub max_capital_pct: f64,
    pub max_position_pct: f64,
    pub max_single_trade_pct: f64,
    pub leverage_limit: f64,
}

pub fn allocation_for(tier: AllocationTier) -> AllocationConfig {
    match tier {
        AllocationTier::Zero => AllocationConfig {
            tier,
            max_capital_pct: 0.0,
            max_position_pct: 0.0,
            max_single_trade_pct: 0.0,
            leverage_limit: 0.0,
        },
        AllocationTier::Trial => AllocationConfig {
            tier,
            max_capital_pct: 0.05,
            max_position_pct: 0.02,
            max_single_trade_pct: 0.01,
            leverage_limit: 1.0,
        },
        AllocationTier::Minimal => AllocationConfig {
            tier,
            max_capital_pct: 0.10,
            max_position_pct: 0.05,
            max_single_trade_pct: 0.02,
            leverage_limit: 1.5,
        },
        AllocationTier::Normal => AllocationConfig {
            tier,
            max_capital_pct: 0.20,
            max_position_pct: 0.10,
            max_single_trade_pct: 0.03,
            leverage_limit: 2.0,
        },
        AllocationTier::Enhanced => AllocationConfig {
            tier,
            max_capital_pct: 0.30,
            max_position_pct: 0.15,
            max_single_trade_pct: 0.05,
            leverage_limit: 2.5,
        },
        AllocationTier::Maximum => AllocationConfig {
            tier,
            max_capital_pct: 0.40,
            max_position_pct: 0.20,
            max_single_trade_pct: 0.08,
            leverage_limit: 3.0,
        },
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyPerformance {
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub trade_count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyState {
    pub strategy_id: String,
    pub strategy_name: String,
    pub strategy_type: String,
    pub stage: LifecycleStage,
    pub tier: AllocationTier,
    pub maturity: f64,
    pub performance: StrategyPerformance,
    pub promotion_count: u32,
    pub demotion_count: u32,
    pub notes: Vec<String>,
}

/// One stage/tier transition, pending or applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub strategy_id: String,
    pub from_stage: LifecycleStage,
    pub to_stage: LifecycleStage,
    pub from_tier: AllocationTier,
    pub to_tier: AllocationTier,
    pub reason: String,
    pub triggered_by: String,
    pub approved_by: Option<String>,
    pub ts: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub strategy_id: String,
    pub allowed: bool,
    pub config: AllocationConfig,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    pub auto_transition: bool,
    pub require_approval_for_production: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            auto_transition: true,
            require_approval_for_production: true,
        }
    }
}

const PROMOTION_MATURITY_THRESHOLD: f64 = 0.80;
const DEMOTION_SHARPE_THRESHOLD: f64 = 0.5;
const DEMOTION_DRAWDOWN_THRESHOLD: f64 = 0.15;
const SUSPENSION_DRAWDOWN_THRESHOLD: f64 = 0.25;
/// Tier jumps of this many steps or more require an operator signature.
const APPROVAL_TIER_STEPS: usize = 2;

/// Lifecycle state for every experimental strategy of one shard.
pub struct LifecycleManager {
    config: LifecycleConfig,
    strategies: BTreeMap<String, StrategyState>,
    pending: BTreeMap<String, TransitionEvent>,
    history: Vec<TransitionEvent>,
    audit: AuditLog,
    promotion_count: u32,
    demotion_count: u32,
}

impl LifecycleManager {
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            config,
            strategies: BTreeMap::new(),
            pending: BTreeMap::new(),
            history: Vec::new(),
            audit: AuditLog::new(),
            promotion_count: 0,
            demotion_count: 0,
        }
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn register_strategy(
        &mut self,
        strategy_id: &str,
        strategy_name: &str,
        strategy_type: &str,
    ) -> &StrategyState {
        self.strategies
            .entry(strategy_id.to_string())
            .or_insert_with(|| StrategyState {
                strategy_id: strategy_id.to_string(),
                strategy_name: strategy_name.to_string(),
                strategy_type: strategy_type.to_string(),
                stage: LifecycleStage::Incubation,
                tier: stage_to_tier(LifecycleStage::Incubation),
                maturity: 0.0,
                performance: StrategyPerformance::default(),
                promotion_count: 0,
                demotion_count: 0,
                notes: Vec::new(),
            })
    }

    pub fn get_strategy(&self, strategy_id: &str) -> Option<&StrategyState> {
        self.strategies.get(strategy_id)
    }

    pub fn pending_transitions(&self) -> Vec<&TransitionEvent> {
        self.pending.values().collect()
    }

    pub fn history(&self) -> &[TransitionEvent] {
        &self.history
    }

    /// Update maturity; may trigger an automatic transition or park a
    /// pending approval.
    pub fn update_maturity(
        &mut self,
        strategy_id: &str,
        maturity: f64,
        now_ts: f64,
    ) -> Option<TransitionEvent> {
        let state = self.strategies.get_mut(strategy_id)?;
        state.maturity = maturity.clamp(0.0, 1.0);
        if self.config.auto_transition {
            self.check_and_transition(strategy_id, "maturity_update", now_ts)
        } else {
            None
        }
    }

    /// Update performance; may trigger demotion or recovery.
    pub fn update_performance(
        &mut self,
        strategy_id: &str,
        performance: StrategyPerformance,
        now_ts: f64,
    ) -> Option<TransitionEvent> {
        let state = self.strategies.get_mut(strategy_id)?;
        state.performance = performance;
        if self.config.auto_transition {
            self.check_and_transition(strategy_id, "performance_update", now_ts)
        } else {
            None
        }
    }

    /// Apply a parked transition with the operator's signature.
    pub fn approve_transition(
        &mut self,
        strategy_id: &str,
        approver: &str,
        now_ts: f64,
    ) -> Option<TransitionEvent> {
        let pending = self.pending.remove(strategy_id)?;
        Some(self.execute_transition(
            strategy_id,
            pending.to_stage,
            pending.to_tier,
            &pending.reason,
            "manual_approved",
            Some(approver),
            now_ts,
        ))
    }

    /// Discard a parked transition.
    pub fn reject_transition(
        &mut self,
        strategy_id: &str,
        rejector: &str,
        reason: &str,
        now_ts: f64,
    ) -> bool {
        if let Some(pending) = self.pending.remove(strategy_id) {
            if let Some(state) = self.strategies.get_mut(strategy_id) {
                state
                    .notes
                    .push(format!("transition rejected by {rejector}: {reason}"));
            }
            self.audit.log(
                now_ts,
                "STRATEGY_TRANSITION_REJECTED",
                rejector,
                strategy_id,
                "reject_transition",
                "REJECTED",
                json!({ "pending": pending, "reason": reason }),
                "M18",
            );
            true
        } else {
            false
        }
    }

    /// Current allocation, including the fine-grained production upgrade
    /// driven by maturity and sharpe.
    pub fn get_allocation(&self, strategy_id: &str) -> AllocationResult {
        let state = match self.strategies.get(strategy_id) {
            Some(state) => state,
            None => {
                return AllocationResult {
                    strategy_id: strategy_id.to_string(),
                    allowed: false,
                    config: allocation_for(AllocationTier::Zero),
                    reason: "strategy not registered".to_string(),
                }
            }
        };

        let mut tier = state.tier;
        if state.stage == LifecycleStage::Production {
            if state.maturity >= 0.95 && state.performance.sharpe_ratio >= 2.0 {
                tier = AllocationTier::Maximum;
            } else if state.maturity >= 0.90 && state.performance.sharpe_ratio >= 1.5 {
                tier = AllocationTier::Enhanced;
            }
        }

        let config = allocation_for(tier);
        AllocationResult {
            strategy_id: strategy_id.to_string(),
            allowed: config.max_capital_pct > 0.0,
            config,
            reason: format!("stage {:?}, tier {:?}", state.stage, tier),
        }
    }

    pub fn promotion_count(&self) -> u32 {
        self.promotion_count
    }

    pub fn demotion_count(&self) -> u32 {
        self.demotion_count
    }

    fn check_and_transition(
        &mut self,
        strategy_id: &str,
        trigger: &str,
        now_ts: f64,
    ) -> Option<TransitionEvent> {
        let state = self.strategies.get(strategy_id)?.clone();
        let current = state.stage;
        let mut target = current;
        let mut reason = String::new();

        // Promotion ladder.
        if state.maturity >= PROMOTION_MATURITY_THRESHOLD {
            match current {
                LifecycleStage::Incubation => {
                    target = LifecycleStage::Development;
                    reason = format!("maturity {:.2} promotes out of incubation", state.maturity);
                }
                LifecycleStage::Development => {
                    target = LifecycleStage::Validation;
                    reason = format!("maturity {:.2} enters validation", state.maturity);
                }
                LifecycleStage::Validation => {
                    if can_enter_production(&state) {
                        target = LifecycleStage::Production;
                        reason = format!(
                            "maturity {:.2}, sharpe {:.2}, validated for production",
                            state.maturity, state.performance.sharpe_ratio
                        );
                    }
                }
                _ => {}
            }
        }

        // Demotion from live stages.
        if matches!(
            current,
            LifecycleStage::Production | LifecycleStage::Validation
        ) {
            let perf = &state.performance;
            if perf.max_drawdown >= SUSPENSION_DRAWDOWN_THRESHOLD {
                target = LifecycleStage::Suspended;
                reason = format!("max drawdown {:.2} forces suspension", perf.max_drawdown);
            } else if perf.max_drawdown >= DEMOTION_DRAWDOWN_THRESHOLD
                || perf.sharpe_ratio < DEMOTION_SHARPE_THRESHOLD
            {
                target = LifecycleStage::Degraded;
                reason = format!(
                    "performance slipped (sharpe {:.2}, drawdown {:.2})",
                    perf.sharpe_ratio, perf.max_drawdown
                );
            }
        }

        // Recovery out of the degraded stage.
        if current == LifecycleStage::Degraded {
            let perf = &state.performance;
            if perf.sharpe_ratio >= 1.0 && perf.max_drawdown < DEMOTION_DRAWDOWN_THRESHOLD {
                target = LifecycleStage::Validation;
                reason = format!("performance recovered (sharpe {:.2})", perf.sharpe_ratio);
            }
        }

        if target == current {
            return None;
        }

        let to_tier = stage_to_tier(target);
        let tier_jump = to_tier.index().abs_diff(state.tier.index());
        let needs_approval = tier_jump >= APPROVAL_TIER_STEPS
            || (target == LifecycleStage::Production && self.config.require_approval_for_production);

        if needs_approval {
            let event = TransitionEvent {
                strategy_id: strategy_id.to_string(),
                from_stage: current,
                to_stage: target,
                from_tier: state.tier,
                to_tier,
                reason: reason.clone(),
                triggered_by: format!("auto_pending:{trigger}"),
                approved_by: None,
                ts: now_ts,
            };
            self.pending.insert(strategy_id.to_string(), event.clone());
            self.audit.log(
                now_ts,
                "STRATEGY_TRANSITION_PENDING",
                trigger,
                strategy_id,
                "check_and_transition",
                "PENDING_APPROVAL",
                json!(&event),
                "M12",
            );
            return Some(event);
        }

        Some(self.execute_transition(strategy_id, target, to_tier, &reason, "auto", None, now_ts))
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_transition(
        &mut self,
        strategy_id: &str,
        to_stage: LifecycleStage,
        to_tier: AllocationTier,
        reason: &str,
        triggered_by: &str,
        approved_by: Option<&str>,
        now_ts: f64,
    ) -> TransitionEvent {
        let state = self
            .strategies
            .get_mut(strategy_id)
            .expect("transition target must be registered");

        let event = TransitionEvent {
            strategy_id: strategy_id.to_string(),
            from_stage: state.stage,
            to_stage,
            from_tier: state.tier,
            to_tier,
            reason: reason.to_string(),
            triggered_by: triggered_by.to_string(),
            approved_by: approved_by.map(str::to_string),
            ts: now_ts,
        };

        let was_promotion = is_promotion(state.stage, to_stage);
        let was_demotion = is_demotion(to_stage);
        state.stage = to_stage;
        state.tier = to_tier;
        if was_promotion {
            state.promotion_count += 1;
            self.promotion_count += 1;
        } else if was_demotion {
            state.demotion_count += 1;
            self.demotion_count += 1;
        }

        self.history.push(event.clone());
        self.audit.log(
            now_ts,
            "STRATEGY_TRANSITION",
            triggered_by,
            strategy_id,
            "execute_transition",
            "APPLIED",
            json!(&event),
            "M18",
        );
        event
    }
}

fn can_enter_production(state: &StrategyState) -> bool {
    let perf = &state.performance;
    state.maturity >= PROMOTION_MATURITY_THRESHOLD
        && perf.sharpe_ratio >= 1.0
        && perf.max_drawdown < DEMOTION_DRAWDOWN_THRESHOLD
        && perf.win_rate >= 0.45
}

pub(crate) fn stage_to_tier(stage: LifecycleStage) -> AllocationTier {
    match stage {
        LifecycleStage::Incubation | LifecycleStage::Development => AllocationTier::Zero,
        LifecycleStage::Validation => AllocationTier::Trial,
        LifecycleStage::Production => AllocationTier::Normal,
        LifecycleStage::Degraded => AllocationTier::Minimal,
        LifecycleStage::Suspended | LifecycleStage::Retired => AllocationTier::Zero,
    }
}

fn is_promotion(from: LifecycleStage, to: LifecycleStage) -> bool {
    stage_rank(to) > stage_rank(from)
        && !matches!(
            to,
            LifecycleStage::Degraded | LifecycleStage::Suspended | LifecycleStage::Retired
        )
}

fn is_demotion(to: LifecycleStage) -> bool {
    matches!(to, LifecycleStage::Degraded | LifecycleStage::Suspended)
}

fn stage_rank(stage: LifecycleStage) -> u8 {
    match stage {
        LifecycleStage::Incubation => 0,
        LifecycleStage::Development => 1,
        LifecycleStage::Validation => 2,
        LifecycleStage::Production => 3,
        LifecycleStage::Degraded => 4,
        LifecycleStage::Suspended => 5,
        LifecycleStage::Retired => 6,
    }
}
