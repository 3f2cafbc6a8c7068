use serde_derive::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Serialize, Deserialize, Clone, PartialOrd, Eq, Ord, PartialEq, Copy, Debug, Display, Hash)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short, applied to P&L and lot arithmetic.
    pub fn sign(&self) -> i64 {
        match self {
            PositionSide::Long => 1,
            PositionSide::Short => -1,
        }
    }

    pub fn from_signed_lots(lots: i64) -> Option<Self> {
        if lots > 0 {
            Some(PositionSide::Long)
        } else if lots < 0 {
            Some(PositionSide::Short)
        } else {
            None
        }
    }
}

/// Which protective level a price has breached. The ledger only reports
/// these, it never closes the position itself.
#[derive(Serialize, Deserialize, Clone, PartialOrd, Eq, Ord, PartialEq, Copy, Debug, Display, Hash)]
pub enum ExitTrigger {
    StopLoss,
    TakeProfit,
}

/// The kind of mutation a committed trade applied to a position.
#[derive(Serialize, Deserialize, Clone, PartialOrd, Eq, Ord, PartialEq, Copy, Debug, Display, Hash)]
pub enum TradeAction {
    Open,
    Increase,
    Reduce,
    Close,
}
