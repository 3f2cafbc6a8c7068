use std::fmt;
use serde_derive::{Deserialize, Serialize};
use strum_macros::Display;
use crate::standardized_types::new_types::Price;

pub type AccountId = String;

#[derive(Serialize, Deserialize, Clone, PartialOrd, Eq, Ord, PartialEq, Copy, Debug, Display, Hash)]
pub enum Currency {
    USD,
    EUR,
    RUB,
}

#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Hash)]
pub struct Account {
    pub account_id: AccountId,
    pub currency: Currency,
}

impl Account {
    pub fn new(account_id: AccountId, currency: Currency) -> Self {
        Account {
            account_id,
            currency,
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.account_id, self.currency)
    }
}

/// Point-in-time copy of the account balance fields. `free_balance` is
/// derived at capture time, it is never stored by the ledger.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct AccountSnapshot {
    pub account_id: AccountId,
    pub currency: Currency,
    pub total_balance: Price,
    pub initial_balance: Price,
    pub used_margin: Price,
    pub free_balance: Price,
    pub realized_pnl: Price,
    pub total_commission: Price,
    pub open_positions: usize,
}

/// Margin attributes of a brokerage account as reported by an external
/// margin rate provider. The ledger treats every field as an opaque,
/// possibly stale figure.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct MarginAttributes {
    pub liquid_portfolio: Price,
    pub starting_margin: Price,
    pub minimal_margin: Price,
    pub funds_sufficiency_level: Price,
    pub amount_of_missing_funds: Price,
}
