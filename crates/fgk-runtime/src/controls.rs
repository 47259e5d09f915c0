use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeMode {
    Paper,
    Live,
}

/// Caller-supplied execution controls for the trading path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeControls {
    pub mode: TradeMode,
}

impl TradeControls {
    pub fn paper() -> Self {
        Self {
            mode: TradeMode::Paper,
        }
    }

    pub fn live() -> Self {
        Self {
            mode: TradeMode::Live,
        }
    }

    pub fn is_paper(&self) -> bool {
        self.mode == TradeMode::Paper
    }
}
