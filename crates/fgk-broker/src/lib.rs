//! fgk-broker
//!
//! The broker adapter contract plus the deterministic in-process
//! implementations the kernel and its tests run against:
//! - [`PaperBroker`] accepts everything with stable ids ("paper-1", ...)
//! - [`RejectAllBroker`] rejects everything (fault injection)
//!
//! The kernel never interprets `order_id` beyond logging it. Transport
//! timeouts are the caller's policy; a timed-out call is reported as
//! `OrderRejected { reason: "timeout" }` and counts against the rejection
//! budget like any other rejection.

use serde::{Deserialize, Serialize};

use fgk_schemas::OrderIntent;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("order rejected: {reason}")]
pub struct OrderRejected {
    pub reason: String,
}

impl OrderRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::new("timeout")
    }
}

/// Submit-order contract. Implementations MAY retry at the transport level
/// before reporting a rejection; the kernel itself never retries.
pub trait Broker {
    fn place_order(&mut self, intent: &OrderIntent) -> Result<OrderAck, OrderRejected>;
}

/// Deterministic paper broker: accepts every order, ids derived from a
/// submission counter. No randomness, no timestamps.
#[derive(Debug, Default)]
pub struct PaperBroker {
    counter: u64,
    submissions: Vec<OrderIntent>,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submissions(&self) -> &[OrderIntent] {
        &self.submissions
    }

    pub fn ack_count(&self) -> u64 {
        self.counter
    }
}

impl Broker for PaperBroker {
    fn place_order(&mut self, intent: &OrderIntent) -> Result<OrderAck, OrderRejected> {
        self.counter += 1;
        self.submissions.push(intent.clone());
        Ok(OrderAck {
            order_id: format!("paper-{}", self.counter),
        })
    }
}

/// Broker that rejects every order. Used by replay fault injection and by
/// rejection-budget scenarios.
#[derive(Debug, Default)]
pub struct RejectAllBroker {
    attempts: u64,
}

impl RejectAllBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }
}

impl Broker for RejectAllBroker {
    fn place_order(&mut self, intent: &OrderIntent) -> Result<OrderAck, OrderRejected> {
        self.attempts += 1;
        Err(OrderRejected::new(format!(
            "fault-injection: reject_all for {}",
            intent.symbol
        )))
    }
}
