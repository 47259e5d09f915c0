//! fgk-replay
//!
//! Deterministic re-execution harness. A serialized payload reproduces a
//! tick exactly: same inputs produce the same snapshot hash and the same
//! event sequence up to the per-tick correlation id. Fault injection
//! covers missing books and a broker that rejects everything; the mode-2
//! path is always forced into paper, whatever the caller asked for.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use fgk_broker::{Broker, PaperBroker, RejectAllBroker};
use fgk_compliance::ThrottleManager;
use fgk_flatten::{FlattenExecutor, FlattenSpec};
use fgk_protection::ProtectionChain;
use fgk_risk::{RiskConfig, RiskConfigError, RiskManager};
use fgk_runtime::{
    handle_risk_update, handle_trading_tick, TargetStrategy, TickResult, TradeControls,
    TradingTickInput, TradingTickResult,
};
use fgk_schemas::{AccountSnapshot, BookTop, PositionToClose, SessionCalendar};

/// Fault injection knobs for replay.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Symbols whose books are removed before the tick runs.
    #[serde(default)]
    pub missing_book_symbols: BTreeSet<String>,
    /// Replace the broker with one that rejects every order.
    #[serde(default)]
    pub reject_all: bool,
}

impl FaultConfig {
    pub fn apply_to_books(&self, books: &BTreeMap<String, BookTop>) -> BTreeMap<String, BookTop> {
        books
            .iter()
            .filter(|(symbol, _)| !self.missing_book_symbols.contains(*symbol))
            .map(|(symbol, book)| (symbol.clone(), book.clone()))
            .collect()
    }

    pub fn broker(&self) -> Box<dyn Broker> {
        if self.reject_all {
            Box::new(RejectAllBroker::new())
        } else {
            Box::new(PaperBroker::new())
        }
    }
}

/// One serialized replay tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayPayload {
    #[serde(default)]
    pub risk_config: Option<RiskConfig>,
    /// Day-start snapshot captured before the tick under test.
    #[serde(default)]
    pub baseline: Option<AccountSnapshot>,
    pub snap: AccountSnapshot,
    #[serde(default)]
    pub positions: Vec<PositionToClose>,
    #[serde(default)]
    pub books: BTreeMap<String, BookTop>,
    #[serde(default)]
    pub flatten_spec: Option<FlattenSpec>,
    #[serde(default)]
    pub fault: FaultConfig,
    #[serde(default)]
    pub now_ts: f64,
    #[serde(default = "default_max_rejections")]
    pub max_rejections: u32,
}

fn default_max_rejections() -> u32 {
    FlattenExecutor::DEFAULT_MAX_REJECTIONS
}

/// Run a single replay tick with optional fault injection.
#[allow(clippy::too_many_arguments)]
pub fn run_replay_tick(
    risk: &mut RiskManager,
    snap: &AccountSnapshot,
    positions: &[PositionToClose],
    books: &BTreeMap<String, BookTop>,
    flatten_spec: &FlattenSpec,
    fault: &FaultConfig,
    now_ts: f64,
    max_rejections: u32,
) -> TickResult {
    let effective_books = fault.apply_to_books(books);
    let mut executor = FlattenExecutor::with_limits(
        fault.broker(),
        SessionCalendar::china_futures(),
        max_rejections,
    );

    handle_risk_update(
        risk,
        &mut executor,
        snap,
        positions,
        &effective_books,
        flatten_spec,
        now_ts,
    )
}

/// Construct the risk manager and run the payload end to end.
pub fn run_payload(payload: &ReplayPayload) -> Result<TickResult, ReplayError> {
    payload.snap.validate().map_err(ReplayError::BadSnapshot)?;
    for position in &payload.positions {
        position.validate().map_err(ReplayError::BadPosition)?;
    }

    let config = payload.risk_config.clone().unwrap_or_default();
    let mut risk = RiskManager::new(config, SessionCalendar::china_futures())?;

    if let Some(baseline) = &payload.baseline {
        risk.on_day_start_0900(baseline, "replay-baseline", payload.now_ts)
            .map_err(ReplayError::BadSnapshot)?;
        risk.pop_events();
    }

    let spec = payload.flatten_spec.clone().unwrap_or_default();
    Ok(run_replay_tick(
        &mut risk,
        &payload.snap,
        &payload.positions,
        &payload.books,
        &spec,
        &payload.fault,
        payload.now_ts,
        payload.max_rejections,
    ))
}

/// Mode-2 replay. The caller's controls are recorded but execution is
/// ALWAYS paper: replays must never place real orders.
#[allow(clippy::too_many_arguments)]
pub fn run_replay_tick_mode2(
    strategy: &mut dyn TargetStrategy,
    risk: &mut RiskManager,
    chain: &mut ProtectionChain,
    throttle: &mut ThrottleManager,
    requested: TradeControls,
    input: &TradingTickInput<'_>,
    fault: &FaultConfig,
) -> TradingTickResult {
    if !requested.is_paper() {
        tracing::warn!("replay requested live controls; forcing paper");
    }

    let effective_books = fault.apply_to_books(input.books);
    let mut broker = fault.broker();
    let effective_input = TradingTickInput {
        snap: input.snap,
        books: &effective_books,
        settle_prices: input.settle_prices,
        current_net_qty: input.current_net_qty,
        account_id: input.account_id,
        strategy_id: input.strategy_id,
        open_margin_rate: input.open_margin_rate,
        now_ts: input.now_ts,
    };

    handle_trading_tick(
        strategy,
        risk,
        chain,
        throttle,
        broker.as_mut(),
        TradeControls::paper(),
        &effective_input,
    )
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("invalid snapshot: {0}")]
    BadSnapshot(String),
    #[error("invalid position: {0}")]
    BadPosition(String),
    #[error(transparent)]
    BadRiskConfig(#[from] RiskConfigError),
}
