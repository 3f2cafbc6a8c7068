use std::collections::HashMap;
use std::sync::Arc;
use dashmap::DashMap;
use log::info;
use crate::errors::LedgerError;
use crate::ledgers::ledger::{AccountSummary, Ledger, PositionUpdate};
use crate::standardized_types::accounts::Account;
use crate::standardized_types::new_types::{Figi, Price, SignedLots, Ticker};

/// Registry of ledgers for the accounts a caller is running side by side.
/// Constructed explicitly and passed around as a handle; there is no
/// process-wide singleton, so tests can hold several services at once.
/// Positions on different accounts are fully independent, no cross-account
/// locking exists.
pub struct LedgerService {
    ledgers: DashMap<Account, Arc<Ledger>>,
}

impl LedgerService {
    pub fn new() -> Self {
        LedgerService {
            ledgers: DashMap::new(),
        }
    }

    /// Creates and registers a ledger for `account`, replacing any previous
    /// registration.
    pub fn register(
        &self,
        account: Account,
        initial_balance: Price,
        commission_rate: Price,
    ) -> Arc<Ledger> {
        let ledger = Arc::new(Ledger::new(account.clone(), initial_balance, commission_rate));
        info!("LedgerService: registered account {}", account);
        self.ledgers.insert(account, ledger.clone());
        ledger
    }

    pub fn ledger(&self, account: &Account) -> Option<Arc<Ledger>> {
        self.ledgers.get(account).map(|entry| entry.value().clone())
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.ledgers
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub async fn update_position(
        &self,
        account: &Account,
        ticker: Ticker,
        figi: Figi,
        target_lots: SignedLots,
        current_price: Price,
        margin_per_lot: Price,
        stop_loss: Option<Price>,
        take_profit: Option<Price>,
    ) -> Result<PositionUpdate, LedgerError> {
        let ledger = self
            .ledger(account)
            .ok_or_else(|| LedgerError::AccountNotFound(account.account_id.clone()))?;
        ledger
            .update_position(
                ticker,
                figi,
                target_lots,
                current_price,
                margin_per_lot,
                stop_loss,
                take_profit,
            )
            .await
    }

    pub async fn check_margin_sufficiency(
        &self,
        account: &Account,
        current_prices: &HashMap<Ticker, Price>,
    ) -> Result<AccountSummary, LedgerError> {
        let ledger = self
            .ledger(account)
            .ok_or_else(|| LedgerError::AccountNotFound(account.account_id.clone()))?;
        Ok(ledger.check_margin_sufficiency(current_prices).await)
    }
}

impl Default for LedgerService {
    fn default() -> Self {
        Self::new()
    }
}
