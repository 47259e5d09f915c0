//! Lifecycle gate scenarios: the approval workflow and the automatic
//! promotion/demotion ladder.

use fgk_lifecycle::{
    AllocationTier, LifecycleConfig, LifecycleManager, LifecycleStage, StrategyPerformance,
};

fn manager() -> LifecycleManager {
    LifecycleManager::new(LifecycleConfig::default())
}

fn promote_to_validation(manager: &mut LifecycleManager, id: &str) {
    manager.register_strategy(id, "ppo strategy", "rl");
    // Incubation -> Development -> Validation ride the same maturity bar.
    manager.update_maturity(id, 0.85, 1_000.0).unwrap();
    manager.update_maturity(id, 0.85, 1_001.0).unwrap();
    assert_eq!(
        manager.get_strategy(id).unwrap().stage,
        LifecycleStage::Validation
    );
}

#[test]
fn production_entry_parks_pending_until_approved() {
    let mut manager = manager();
    promote_to_validation(&mut manager, "ppo_v1");

    manager
        .update_performance(
            "ppo_v1",
            StrategyPerformance {
                sharpe_ratio: 1.2,
                max_drawdown: 0.08,
                win_rate: 0.50,
                profit_factor: 1.6,
                trade_count: 400,
            },
            1_002.0,
        )
        .unwrap();

    // Maturity update proposes PRODUCTION but must not auto-apply.
    let event = manager.update_maturity("ppo_v1", 0.85, 1_003.0).unwrap();
    assert_eq!(event.to_stage, LifecycleStage::Production);
    assert_eq!(event.to_tier, AllocationTier::Normal);
    assert!(event.approved_by.is_none());

    let state = manager.get_strategy("ppo_v1").unwrap();
    assert_eq!(state.stage, LifecycleStage::Validation, "not applied yet");
    assert_eq!(manager.pending_transitions().len(), 1);

    // Approval applies the transition and records the approver.
    let applied = manager.approve_transition("ppo_v1", "ops", 1_004.0).unwrap();
    assert_eq!(applied.approved_by.as_deref(), Some("ops"));
    let state = manager.get_strategy("ppo_v1").unwrap();
    assert_eq!(state.stage, LifecycleStage::Production);
    assert_eq!(state.tier, AllocationTier::Normal);
    assert!(manager.pending_transitions().is_empty());

    let allocation = manager.get_allocation("ppo_v1");
    assert!(allocation.allowed);
    assert_eq!(allocation.config.max_capital_pct, 0.20);

    // Both the pending proposals (performance update, maturity update)
    // and every applied transition left audit entries.
    assert_eq!(
        manager.audit().entries_of_type("STRATEGY_TRANSITION_PENDING").len(),
        2
    );
    assert_eq!(manager.audit().entries_of_type("STRATEGY_TRANSITION").len(), 3);
}

#[test]
fn rejection_discards_pending_transition() {
    let mut manager = manager();
    promote_to_validation(&mut manager, "ppo_v1");
    manager
        .update_performance(
            "ppo_v1",
            StrategyPerformance {
                sharpe_ratio: 1.5,
                max_drawdown: 0.05,
                win_rate: 0.55,
                profit_factor: 1.8,
                trade_count: 500,
            },
            1_002.0,
        )
        .unwrap();
    manager.update_maturity("ppo_v1", 0.9, 1_003.0).unwrap();
    assert_eq!(manager.pending_transitions().len(), 1);

    assert!(manager.reject_transition("ppo_v1", "ops", "needs more validation", 1_004.0));
    assert!(manager.pending_transitions().is_empty());
    assert_eq!(
        manager.get_strategy("ppo_v1").unwrap().stage,
        LifecycleStage::Validation
    );
}

#[test]
fn drawdown_suspends_and_recovery_returns_to_validation() {
    let mut manager = manager();
    promote_to_validation(&mut manager, "ppo_v1");

    // Moderate slippage degrades.
    manager
        .update_performance(
            "ppo_v1",
            StrategyPerformance {
                sharpe_ratio: 0.4,
                max_drawdown: 0.10,
                win_rate: 0.45,
                profit_factor: 1.1,
                trade_count: 300,
            },
            1_002.0,
        )
        .unwrap();
    let state = manager.get_strategy("ppo_v1").unwrap();
    assert_eq!(state.stage, LifecycleStage::Degraded);
    assert_eq!(state.tier, AllocationTier::Minimal);
    assert_eq!(state.demotion_count, 1);

    // Recovery condition promotes back into validation.
    manager
        .update_performance(
            "ppo_v1",
            StrategyPerformance {
                sharpe_ratio: 1.3,
                max_drawdown: 0.08,
                win_rate: 0.52,
                profit_factor: 1.5,
                trade_count: 350,
            },
            1_003.0,
        )
        .unwrap();
    assert_eq!(
        manager.get_strategy("ppo_v1").unwrap().stage,
        LifecycleStage::Validation
    );
}

#[test]
fn severe_drawdown_suspends_to_zero_tier() {
    let mut manager = manager();
    promote_to_validation(&mut manager, "ppo_v1");

    manager
        .update_performance(
            "ppo_v1",
            StrategyPerformance {
                sharpe_ratio: 1.0,
                max_drawdown: 0.30,
                win_rate: 0.48,
                profit_factor: 1.2,
                trade_count: 200,
            },
            1_002.0,
        )
        .unwrap();

    let state = manager.get_strategy("ppo_v1").unwrap();
    assert_eq!(state.stage, LifecycleStage::Suspended);
    assert_eq!(state.tier, AllocationTier::Zero);
    assert!(!manager.get_allocation("ppo_v1").allowed);
}

#[test]
fn production_allocation_upgrades_with_maturity_and_sharpe() {
    let mut manager = manager();
    promote_to_validation(&mut manager, "ppo_v1");
    manager
        .update_performance(
            "ppo_v1",
            StrategyPerformance {
                sharpe_ratio: 2.1,
                max_drawdown: 0.05,
                win_rate: 0.58,
                profit_factor: 2.2,
                trade_count: 800,
            },
            1_002.0,
        )
        .unwrap();
    manager.update_maturity("ppo_v1", 0.96, 1_003.0).unwrap();
    manager.approve_transition("ppo_v1", "ops", 1_004.0).unwrap();

    let allocation = manager.get_allocation("ppo_v1");
    assert_eq!(allocation.config.tier, AllocationTier::Maximum);
    assert_eq!(allocation.config.max_capital_pct, 0.40);
}
