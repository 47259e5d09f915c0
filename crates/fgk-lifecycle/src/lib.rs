//! fgk-lifecycle
//!
//! The experimental-strategy gate: lifecycle stages mapped to capital
//! tiers, automatic promotion/demotion from maturity and performance,
//! an approval workflow for large tier jumps, and the five-dimension
//! maturity evaluator that feeds it. Immature strategies never reach
//! production capital.

mod lifecycle;
mod maturity;

pub use lifecycle::{
    AllocationConfig, AllocationResult, AllocationTier, LifecycleConfig, LifecycleManager,
    LifecycleStage, StrategyPerformance, StrategyState, TransitionEvent,
};
pub use maturity::{
    MaturityEvaluator, MaturityLevel, MaturityReport, MaturityScore, TrainingHistory,
};
