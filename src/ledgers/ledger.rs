use std::collections::HashMap;
use std::fs::create_dir_all;
use std::path::Path;
use chrono::Utc;
use csv::Writer;
use log::{info, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_derive::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;
use crate::errors::LedgerError;
use crate::ledgers::margin::{calculate_required_margin, can_open_position};
use crate::standardized_types::accounts::{Account, AccountSnapshot};
use crate::standardized_types::enums::{ExitTrigger, PositionSide, TradeAction};
use crate::standardized_types::new_types::{Figi, Lots, Price, SignedLots, Ticker, TradeId};
use crate::standardized_types::position::{Position, PositionSnapshot, PositionUpdateEvent};

/// One committed leg of a position update, kept for reporting and export.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TradeRecord {
    pub trade_id: TradeId,
    pub ticker: Ticker,
    pub figi: Figi,
    pub action: TradeAction,
    pub side: PositionSide,
    pub lots: Lots,
    pub price: Price,
    pub realized_pnl: Price,
    pub commission: Price,
    pub margin_reserved: Price,
    pub margin_released: Price,
    pub timestamp: String,
}

/// The persisted shape of a ledger: account balance fields plus the open
/// position map and trade history. How this gets to disk is the caller's
/// concern, the ledger only imports and exports it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LedgerState {
    pub total_balance: Price,
    pub initial_balance: Price,
    pub used_margin: Price,
    pub realized_pnl: Price,
    pub total_commission: Price,
    pub positions: HashMap<Ticker, Position>,
    pub symbol_realized_pnl: HashMap<Ticker, Price>,
    pub history: Vec<TradeRecord>,
}

impl LedgerState {
    fn new(initial_balance: Price) -> Self {
        Self {
            total_balance: initial_balance,
            initial_balance,
            used_margin: dec!(0),
            realized_pnl: dec!(0),
            total_commission: dec!(0),
            positions: HashMap::new(),
            symbol_realized_pnl: HashMap::new(),
            history: Vec::new(),
        }
    }
}

/// Result of a committed `update_position` call: the events that occurred
/// plus the account and position as they stand after the commit.
#[derive(Clone, Debug)]
pub struct PositionUpdate {
    pub events: Vec<PositionUpdateEvent>,
    pub account: AccountSnapshot,
    pub position: Option<PositionSnapshot>,
}

/// Read-only sufficiency report for dashboards: balances plus every open
/// position marked against a supplied price map.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AccountSummary {
    pub account: AccountSnapshot,
    pub unrealized_pnl: Price,
    pub total_value: Price,
    pub positions: Vec<PositionSnapshot>,
}

/// Margin account ledger for one virtual trading account.
///
/// Owns the balance fields and the ticker -> position map behind a single
/// `RwLock`: every mutating call runs its reduction leg, sufficiency check
/// and addition leg under one write guard, so no caller ever observes a
/// state where the reduction has applied but the addition has not. There
/// are no await points while the guard is held; margin rates must be
/// fetched by the caller before invoking the ledger.
pub struct Ledger {
    pub account: Account,
    commission_rate: Price,
    state: RwLock<LedgerState>,
}

impl Ledger {
    pub fn new(account: Account, initial_balance: Price, commission_rate: Price) -> Self {
        info!(
            "Ledger created: {}, initial balance {}, commission rate {}",
            account, initial_balance, commission_rate
        );
        Self {
            account,
            commission_rate,
            state: RwLock::new(LedgerState::new(initial_balance)),
        }
    }

    /// Restores a ledger from a previously exported state.
    pub fn from_state(account: Account, commission_rate: Price, state: LedgerState) -> Self {
        Self {
            account,
            commission_rate,
            state: RwLock::new(state),
        }
    }

    /// Clones the persisted shape of the ledger for an external store.
    pub async fn export_state(&self) -> LedgerState {
        self.state.read().await.clone()
    }

    fn generate_id(&self, side: PositionSide) -> TradeId {
        let guid = Uuid::new_v4();
        format!("{}-{}", side, guid.as_simple())
    }

    fn commission_for(&self, price: Price, lots: Lots) -> Price {
        price * Decimal::from(lots) * self.commission_rate
    }

    fn snapshot_of(&self, state: &LedgerState) -> AccountSnapshot {
        AccountSnapshot {
            account_id: self.account.account_id.clone(),
            currency: self.account.currency,
            total_balance: state.total_balance,
            initial_balance: state.initial_balance,
            used_margin: state.used_margin,
            free_balance: state.total_balance - state.used_margin,
            realized_pnl: state.realized_pnl,
            total_commission: state.total_commission,
            open_positions: state.positions.len(),
        }
    }

    /// Transitions the position on `ticker` from its current signed lot
    /// count to `target_lots` (positive = long, negative = short, zero =
    /// flat) at `current_price`, reserving added lots at `margin_per_lot`.
    ///
    /// Decomposed into at most a reduction leg then an addition leg, both
    /// simulated on working copies and committed only if the whole
    /// sequence is affordable. A direction flip is a full close of the old
    /// side followed by an open from zero: two independent realized P&L
    /// computations, one fresh margin reservation.
    ///
    /// A call with `target_lots` equal to the held signed lots is a no-op
    /// beyond refreshing the protective levels and skips the margin check.
    pub async fn update_position(
        &self,
        ticker: Ticker,
        figi: Figi,
        target_lots: SignedLots,
        current_price: Price,
        margin_per_lot: Price,
        stop_loss: Option<Price>,
        take_profit: Option<Price>,
    ) -> Result<PositionUpdate, LedgerError> {
        if margin_per_lot <= dec!(0) {
            warn!(
                "{}: rejected margin rate {} for {}",
                self.account, margin_per_lot, ticker
            );
            return Err(LedgerError::InvalidMarginRate(margin_per_lot));
        }

        let mut state = self.state.write().await;
        let current_signed = state
            .positions
            .get(&ticker)
            .map(|p| p.signed_lots())
            .unwrap_or(0);

        if current_signed == 0 && target_lots == 0 {
            return Err(LedgerError::InvalidPositionState(format!(
                "close requested but no open position for {}",
                ticker
            )));
        }

        if target_lots == current_signed {
            if let Some(position) = state.positions.get_mut(&ticker) {
                position.stop_loss = stop_loss;
                position.take_profit = take_profit;
            }
            let account = self.snapshot_of(&state);
            let position = state
                .positions
                .get(&ticker)
                .map(|p| p.snapshot(Some(current_price)));
            return Ok(PositionUpdate {
                events: vec![],
                account,
                position,
            });
        }

        // Everything below mutates working copies only; a rejected addition
        // must not leave a partial reduction behind.
        let mut working = state.positions.get(&ticker).cloned();
        let mut total_balance = state.total_balance;
        let mut used_margin = state.used_margin;
        let mut realized_pnl = state.realized_pnl;
        let mut total_commission = state.total_commission;
        let mut symbol_realized = dec!(0);
        let mut events = vec![];
        let mut trades = vec![];
        let time = Utc::now();

        // Reduction leg: close whatever of the current exposure the target
        // no longer covers.
        let mut reduced_to_zero = false;
        if let Some(position) = working.as_mut() {
            let target_abs = target_lots.unsigned_abs();
            let closed_lots: Lots =
                if target_lots == 0 || target_lots.signum() != position.side.sign() {
                    position.lots
                } else if target_abs < position.lots {
                    position.lots - target_abs
                } else {
                    0
                };

            if closed_lots > 0 {
                let leg = position.reduce(current_price, closed_lots)?;
                let commission = self.commission_for(current_price, closed_lots);
                position.accumulated_commission += commission;

                total_balance += leg.released_margin + leg.realized_pnl - commission;
                used_margin -= leg.released_margin;
                realized_pnl += leg.realized_pnl;
                total_commission += commission;
                symbol_realized += leg.realized_pnl;

                let fully_closed = position.lots == 0;
                trades.push(TradeRecord {
                    trade_id: position.trade_id.clone(),
                    ticker: ticker.clone(),
                    figi: figi.clone(),
                    action: if fully_closed {
                        TradeAction::Close
                    } else {
                        TradeAction::Reduce
                    },
                    side: position.side,
                    lots: leg.closed_lots,
                    price: current_price,
                    realized_pnl: leg.realized_pnl,
                    commission,
                    margin_reserved: dec!(0),
                    margin_released: leg.released_margin,
                    timestamp: time.to_string(),
                });
                events.push(if fully_closed {
                    PositionUpdateEvent::PositionClosed {
                        ticker: ticker.clone(),
                        trade_id: position.trade_id.clone(),
                        account_id: self.account.account_id.clone(),
                        side: position.side,
                        closed_lots: leg.closed_lots,
                        realized_pnl: leg.realized_pnl,
                        margin_released: leg.released_margin,
                        time: time.to_string(),
                    }
                } else {
                    PositionUpdateEvent::PositionReduced {
                        ticker: ticker.clone(),
                        trade_id: position.trade_id.clone(),
                        account_id: self.account.account_id.clone(),
                        side: position.side,
                        remaining_lots: position.lots,
                        closed_lots: leg.closed_lots,
                        realized_pnl: leg.realized_pnl,
                        margin_released: leg.released_margin,
                        time: time.to_string(),
                    }
                });
                reduced_to_zero = fully_closed;
            }
            // A surviving position takes the levels supplied with this call,
            // the same as the no-op and addition paths.
            if position.lots > 0 {
                position.stop_loss = stop_loss;
                position.take_profit = take_profit;
            }
        }
        if reduced_to_zero {
            working = None;
        }

        // Addition leg: whatever magnitude the target requires beyond the
        // remaining same-direction exposure.
        let remaining_signed = working.as_ref().map(|p| p.signed_lots()).unwrap_or(0);
        let added = (target_lots - remaining_signed).unsigned_abs();
        if added > 0 {
            // added > 0 implies a non-zero target, so the side is defined
            let side = match PositionSide::from_signed_lots(target_lots) {
                Some(side) => side,
                None => {
                    return Err(LedgerError::InvalidPositionState(format!(
                        "unreachable addition leg for flat target on {}",
                        ticker
                    )))
                }
            };
            let required_margin = calculate_required_margin(margin_per_lot, added as i64);
            let free_balance = total_balance - used_margin;
            if !can_open_position(free_balance, required_margin) {
                warn!(
                    "{}: insufficient margin for {} x{}: required {}, available {}",
                    self.account, ticker, target_lots, required_margin, free_balance
                );
                return Err(LedgerError::InsufficientMargin {
                    required: required_margin,
                    available: free_balance,
                });
            }
            let commission = self.commission_for(current_price, added);
            total_balance -= required_margin + commission;
            used_margin += required_margin;
            total_commission += commission;

            match working.take() {
                Some(mut position) => {
                    position.add(current_price, added, required_margin);
                    position.accumulated_commission += commission;
                    position.stop_loss = stop_loss;
                    position.take_profit = take_profit;
                    trades.push(TradeRecord {
                        trade_id: position.trade_id.clone(),
                        ticker: ticker.clone(),
                        figi: figi.clone(),
                        action: TradeAction::Increase,
                        side,
                        lots: added,
                        price: current_price,
                        realized_pnl: dec!(0),
                        commission,
                        margin_reserved: required_margin,
                        margin_released: dec!(0),
                        timestamp: time.to_string(),
                    });
                    events.push(PositionUpdateEvent::PositionIncreased {
                        ticker: ticker.clone(),
                        trade_id: position.trade_id.clone(),
                        account_id: self.account.account_id.clone(),
                        side,
                        total_lots: position.lots,
                        average_price: position.entry_price,
                        margin_reserved: required_margin,
                        time: time.to_string(),
                    });
                    working = Some(position);
                }
                None => {
                    let trade_id = self.generate_id(side);
                    let mut position = Position::new(
                        ticker.clone(),
                        figi.clone(),
                        side,
                        added,
                        current_price,
                        required_margin,
                        stop_loss,
                        take_profit,
                        trade_id.clone(),
                        time,
                    );
                    position.accumulated_commission = commission;
                    trades.push(TradeRecord {
                        trade_id: trade_id.clone(),
                        ticker: ticker.clone(),
                        figi: figi.clone(),
                        action: TradeAction::Open,
                        side,
                        lots: added,
                        price: current_price,
                        realized_pnl: dec!(0),
                        commission,
                        margin_reserved: required_margin,
                        margin_released: dec!(0),
                        timestamp: time.to_string(),
                    });
                    events.push(PositionUpdateEvent::PositionOpened {
                        ticker: ticker.clone(),
                        trade_id,
                        account_id: self.account.account_id.clone(),
                        side,
                        lots: added,
                        entry_price: current_price,
                        margin_reserved: required_margin,
                        time: time.to_string(),
                    });
                    working = Some(position);
                }
            }
        }

        // Commit: both legs were affordable, write the working copies back.
        state.total_balance = total_balance;
        state.used_margin = used_margin;
        state.realized_pnl = realized_pnl;
        state.total_commission = total_commission;
        if symbol_realized != dec!(0) {
            *state
                .symbol_realized_pnl
                .entry(ticker.clone())
                .or_insert(dec!(0)) += symbol_realized;
        }
        match working {
            Some(position) => {
                state.positions.insert(ticker.clone(), position);
            }
            None => {
                state.positions.remove(&ticker);
            }
        }
        state.history.extend(trades);

        for event in &events {
            info!("{}: {}", self.account, event);
        }

        let account = self.snapshot_of(&state);
        let position = state
            .positions
            .get(&ticker)
            .map(|p| p.snapshot(Some(current_price)));
        Ok(PositionUpdate {
            events,
            account,
            position,
        })
    }

    /// Balance fields only, without marking positions to market.
    pub async fn snapshot(&self) -> AccountSnapshot {
        let state = self.state.read().await;
        self.snapshot_of(&state)
    }

    /// Read-only sufficiency report: balances plus every open position with
    /// unrealized P&L computed against `current_prices`. Positions missing
    /// from the map are marked at their entry price. Never mutates.
    pub async fn check_margin_sufficiency(
        &self,
        current_prices: &HashMap<Ticker, Price>,
    ) -> AccountSummary {
        let state = self.state.read().await;
        let mut unrealized_pnl = dec!(0);
        let mut positions: Vec<PositionSnapshot> = state
            .positions
            .values()
            .map(|position| {
                let snapshot = position.snapshot(current_prices.get(&position.ticker).copied());
                unrealized_pnl += snapshot.unrealized_pnl;
                snapshot
            })
            .collect();
        positions.sort_by(|a, b| a.ticker.cmp(&b.ticker));

        AccountSummary {
            account: self.snapshot_of(&state),
            unrealized_pnl,
            total_value: state.total_balance + unrealized_pnl,
            positions,
        }
    }

    /// Reports whether `current_price` breaches the stop-loss or
    /// take-profit of the open position on `ticker`. The ledger never acts
    /// on the answer.
    pub async fn check_exit_triggers(
        &self,
        ticker: &Ticker,
        current_price: Price,
    ) -> Option<ExitTrigger> {
        let state = self.state.read().await;
        state
            .positions
            .get(ticker)
            .and_then(|position| position.exit_trigger(current_price))
    }

    pub async fn position_snapshot(
        &self,
        ticker: &Ticker,
        current_price: Option<Price>,
    ) -> Option<PositionSnapshot> {
        let state = self.state.read().await;
        state
            .positions
            .get(ticker)
            .map(|position| position.snapshot(current_price))
    }

    /// Signed lot count held on `ticker`, zero when flat.
    pub async fn position_size(&self, ticker: &Ticker) -> SignedLots {
        let state = self.state.read().await;
        state
            .positions
            .get(ticker)
            .map(|p| p.signed_lots())
            .unwrap_or(0)
    }

    pub async fn is_long(&self, ticker: &Ticker) -> bool {
        let state = self.state.read().await;
        state
            .positions
            .get(ticker)
            .map(|p| p.side == PositionSide::Long)
            .unwrap_or(false)
    }

    pub async fn is_short(&self, ticker: &Ticker) -> bool {
        let state = self.state.read().await;
        state
            .positions
            .get(ticker)
            .map(|p| p.side == PositionSide::Short)
            .unwrap_or(false)
    }

    pub async fn is_flat(&self, ticker: &Ticker) -> bool {
        let state = self.state.read().await;
        !state.positions.contains_key(ticker)
    }

    /// Cumulative realized P&L booked on `ticker` across all its trades.
    pub async fn realized_pnl_for(&self, ticker: &Ticker) -> Price {
        let state = self.state.read().await;
        state
            .symbol_realized_pnl
            .get(ticker)
            .copied()
            .unwrap_or(dec!(0))
    }

    pub async fn trade_history(&self) -> Vec<TradeRecord> {
        self.state.read().await.history.clone()
    }

    /// Writes the full trade history to a timestamped CSV file in `folder`.
    pub async fn export_trades_to_csv(&self, folder: &str) -> Result<(), LedgerError> {
        if let Err(e) = create_dir_all(folder) {
            return Err(LedgerError::ExportError(format!(
                "failed to create directory {}: {}",
                folder, e
            )));
        }

        let date = Utc::now().format("%Y%m%d_%H%M").to_string();
        let file_name = format!("{}/{}_trades_{}.csv", folder, self.account.account_id, date);
        let file_path = Path::new(&file_name);

        let mut wtr = Writer::from_path(file_path).map_err(|e| {
            LedgerError::ExportError(format!(
                "failed to create CSV writer for {}: {}",
                file_path.display(),
                e
            ))
        })?;

        let state = self.state.read().await;
        for record in &state.history {
            wtr.serialize(record).map_err(|e| {
                LedgerError::ExportError(format!(
                    "failed to write trade record to {}: {}",
                    file_path.display(),
                    e
                ))
            })?;
        }
        wtr.flush().map_err(|e| {
            LedgerError::ExportError(format!(
                "failed to flush CSV writer for {}: {}",
                file_path.display(),
                e
            ))
        })?;
        info!("exported trade history to {}", file_path.display());
        Ok(())
    }
}
