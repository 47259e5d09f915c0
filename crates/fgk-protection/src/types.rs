use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    LimitPrice,
    Margin,
    Liquidity,
    FatFinger,
    Throttle,
    Cost,
}

/// Tagged gate outcome. `Adjusted` is a pass with a rewritten price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateOutcome {
    Pass,
    Adjusted { new_price: f64 },
    Reject { code: String, message: String },
}

impl GateOutcome {
    pub fn reject(code: impl Into<String>, message: impl Into<String>) -> Self {
        GateOutcome::Reject {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        !self.is_reject()
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, GateOutcome::Reject { .. })
    }
}

/// One gate's structured result, kept for the audit stream whether the
/// order passed or not.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate: GateKind,
    pub outcome: GateOutcome,
    pub detail: Value,
}

impl GateResult {
    pub fn new(gate: GateKind, outcome: GateOutcome, detail: Value) -> Self {
        Self {
            gate,
            outcome,
            detail,
        }
    }
}
