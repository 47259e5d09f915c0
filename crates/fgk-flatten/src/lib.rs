//! fgk-flatten
//!
//! Force-liquidation pipeline:
//! - [`build_flatten_intents`] — pure three-stage order-ladder planner with
//!   the regulatory close-today preference
//! - [`FlattenExecutor`] — idempotent (once per trading day) execution of a
//!   plan against the broker, with a rejection budget and data-quality
//!   events for missing books

mod executor;
mod plan;

pub use executor::{ExecutionRecord, FlattenExecutor, PlaceOutcome};
pub use plan::{build_flatten_intents, FlattenSpec, PlanError};
