use std::fmt;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_derive::{Deserialize, Serialize};
use crate::errors::LedgerError;
use crate::standardized_types::accounts::AccountId;
use crate::standardized_types::enums::{ExitTrigger, PositionSide};
use crate::standardized_types::new_types::{Figi, Lots, Price, Ticker, TradeId};

/// The state of a single instrument's holding. One per ticker, created on
/// the first non-zero target and removed when lots return to zero.
///
/// `reserved_margin` is the sum of per-tranche reservations: each addition
/// reserves at the rate supplied with that call, and earlier tranches are
/// never repriced. A partial reduction releases margin proportionally to
/// the closed lots.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Position {
    pub ticker: Ticker,
    pub figi: Figi,
    pub side: PositionSide,
    pub lots: Lots,
    pub entry_price: Price,
    pub reserved_margin: Price,
    pub stop_loss: Option<Price>,
    pub take_profit: Option<Price>,
    pub trade_id: TradeId,
    pub opened_at: String,
    pub accumulated_commission: Price,
}

/// Balance movements produced by closing part of a position. The ledger
/// folds these into the account under its exclusive lock.
pub(crate) struct ReductionLeg {
    pub realized_pnl: Price,
    pub released_margin: Price,
    pub closed_lots: Lots,
}

impl Position {
    pub fn new(
        ticker: Ticker,
        figi: Figi,
        side: PositionSide,
        lots: Lots,
        entry_price: Price,
        reserved_margin: Price,
        stop_loss: Option<Price>,
        take_profit: Option<Price>,
        trade_id: TradeId,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            ticker,
            figi,
            side,
            lots,
            entry_price,
            reserved_margin,
            stop_loss,
            take_profit,
            trade_id,
            opened_at: time.to_string(),
            accumulated_commission: dec!(0),
        }
    }

    pub fn signed_lots(&self) -> i64 {
        self.side.sign() * self.lots as i64
    }

    /// `(current_price - entry_price) * signed_lots`. Derived, never stored.
    pub fn unrealized_pnl(&self, current_price: Price) -> Price {
        (current_price - self.entry_price) * Decimal::from(self.signed_lots())
    }

    pub fn notional(&self, current_price: Price) -> Price {
        current_price * Decimal::from(self.lots)
    }

    /// Reports whether `current_price` has breached the stop-loss or
    /// take-profit level. Informational only.
    pub fn exit_trigger(&self, current_price: Price) -> Option<ExitTrigger> {
        match self.side {
            PositionSide::Long => {
                if let Some(stop) = self.stop_loss {
                    if current_price <= stop {
                        return Some(ExitTrigger::StopLoss);
                    }
                }
                if let Some(take) = self.take_profit {
                    if current_price >= take {
                        return Some(ExitTrigger::TakeProfit);
                    }
                }
            }
            PositionSide::Short => {
                if let Some(stop) = self.stop_loss {
                    if current_price >= stop {
                        return Some(ExitTrigger::StopLoss);
                    }
                }
                if let Some(take) = self.take_profit {
                    if current_price <= take {
                        return Some(ExitTrigger::TakeProfit);
                    }
                }
            }
        }
        None
    }

    /// Closes `quantity` lots at `market_price`. Books P&L for the closed
    /// portion and releases margin proportionally; the average entry price
    /// is only recomputed on additions, never here.
    pub(crate) fn reduce(
        &mut self,
        market_price: Price,
        quantity: Lots,
    ) -> Result<ReductionLeg, LedgerError> {
        if quantity == 0 || quantity > self.lots {
            return Err(LedgerError::InvalidPositionState(format!(
                "cannot close {} lots of {} held on {}",
                quantity, self.lots, self.ticker
            )));
        }
        let realized_pnl = (market_price - self.entry_price)
            * Decimal::from(quantity)
            * Decimal::from(self.side.sign());
        // Exact for a full close: quantity == lots divides out.
        let released_margin =
            self.reserved_margin * Decimal::from(quantity) / Decimal::from(self.lots);

        self.reserved_margin -= released_margin;
        self.lots -= quantity;

        Ok(ReductionLeg {
            realized_pnl,
            released_margin,
            closed_lots: quantity,
        })
    }

    /// Adds `quantity` lots filled at `market_price`, reserving
    /// `margin_reserved` for the new tranche. The entry price becomes the
    /// volume-weighted blend of the prior lots and the added lots.
    pub(crate) fn add(&mut self, market_price: Price, quantity: Lots, margin_reserved: Price) {
        let total = self.lots + quantity;
        self.entry_price = (self.entry_price * Decimal::from(self.lots)
            + market_price * Decimal::from(quantity))
            / Decimal::from(total);
        self.lots = total;
        self.reserved_margin += margin_reserved;
    }

    pub fn snapshot(&self, current_price: Option<Price>) -> PositionSnapshot {
        let price = current_price.unwrap_or(self.entry_price);
        PositionSnapshot {
            ticker: self.ticker.clone(),
            figi: self.figi.clone(),
            side: self.side,
            lots: self.lots,
            entry_price: self.entry_price,
            current_price: price,
            notional: self.notional(price),
            reserved_margin: self.reserved_margin,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            unrealized_pnl: self.unrealized_pnl(price),
        }
    }
}

/// Read-only projection of a position for dashboards and reports.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PositionSnapshot {
    pub ticker: Ticker,
    pub figi: Figi,
    pub side: PositionSide,
    pub lots: Lots,
    pub entry_price: Price,
    pub current_price: Price,
    pub notional: Price,
    pub reserved_margin: Price,
    pub stop_loss: Option<Price>,
    pub take_profit: Option<Price>,
    pub unrealized_pnl: Price,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PositionUpdateEvent {
    PositionOpened {
        ticker: Ticker,
        trade_id: TradeId,
        account_id: AccountId,
        side: PositionSide,
        lots: Lots,
        entry_price: Price,
        margin_reserved: Price,
        time: String,
    },
    PositionIncreased {
        ticker: Ticker,
        trade_id: TradeId,
        account_id: AccountId,
        side: PositionSide,
        total_lots: Lots,
        average_price: Price,
        margin_reserved: Price,
        time: String,
    },
    PositionReduced {
        ticker: Ticker,
        trade_id: TradeId,
        account_id: AccountId,
        side: PositionSide,
        remaining_lots: Lots,
        closed_lots: Lots,
        realized_pnl: Price,
        margin_released: Price,
        time: String,
    },
    PositionClosed {
        ticker: Ticker,
        trade_id: TradeId,
        account_id: AccountId,
        side: PositionSide,
        closed_lots: Lots,
        realized_pnl: Price,
        margin_released: Price,
        time: String,
    },
}

impl PositionUpdateEvent {
    pub fn ticker(&self) -> &Ticker {
        match self {
            PositionUpdateEvent::PositionOpened { ticker, .. } => ticker,
            PositionUpdateEvent::PositionIncreased { ticker, .. } => ticker,
            PositionUpdateEvent::PositionReduced { ticker, .. } => ticker,
            PositionUpdateEvent::PositionClosed { ticker, .. } => ticker,
        }
    }

    pub fn account_id(&self) -> &AccountId {
        match self {
            PositionUpdateEvent::PositionOpened { account_id, .. } => account_id,
            PositionUpdateEvent::PositionIncreased { account_id, .. } => account_id,
            PositionUpdateEvent::PositionReduced { account_id, .. } => account_id,
            PositionUpdateEvent::PositionClosed { account_id, .. } => account_id,
        }
    }
}

impl fmt::Display for PositionUpdateEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionUpdateEvent::PositionOpened { ticker, account_id, side, lots, entry_price, margin_reserved, .. } => {
                write!(f, "PositionOpened: {} {} {} lots @ {}, Account: {}, Margin Reserved: {}", side, ticker, lots, entry_price, account_id, margin_reserved)
            }
            PositionUpdateEvent::PositionIncreased { ticker, account_id, side, total_lots, average_price, margin_reserved, .. } => {
                write!(f, "PositionIncreased: {} {} now {} lots, Average Price: {}, Account: {}, Margin Reserved: {}", side, ticker, total_lots, average_price, account_id, margin_reserved)
            }
            PositionUpdateEvent::PositionReduced { ticker, account_id, side, remaining_lots, closed_lots, realized_pnl, margin_released, .. } => {
                write!(f, "PositionReduced: {} {} closed {} lots, {} remaining, Realized PnL: {}, Account: {}, Margin Released: {}", side, ticker, closed_lots, remaining_lots, realized_pnl, account_id, margin_released)
            }
            PositionUpdateEvent::PositionClosed { ticker, account_id, side, closed_lots, realized_pnl, margin_released, .. } => {
                write!(f, "PositionClosed: {} {} closed {} lots, Realized PnL: {}, Account: {}, Margin Released: {}", side, ticker, closed_lots, realized_pnl, account_id, margin_released)
            }
        }
    }
}
