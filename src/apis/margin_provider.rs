use async_trait::async_trait;
use dashmap::DashMap;
use crate::errors::LedgerError;
use crate::standardized_types::accounts::{AccountId, MarginAttributes};
use crate::standardized_types::new_types::{Figi, Price};

/// Narrow seam to whatever service knows the margin required per lot. The
/// ledger never calls this itself: callers fetch a rate first and pass it
/// into `update_position`, so the figure may be stale between calls but is
/// applied consistently within one call.
#[async_trait]
pub trait MarginRateProvider: Send + Sync {
    /// Margin required to hold one lot of the instrument, long or short.
    async fn margin_per_lot(&self, figi: &Figi, is_long: bool) -> Result<Price, LedgerError>;

    /// Account-level margin attributes as the brokerage reports them.
    async fn margin_attributes(
        &self,
        account_id: &AccountId,
    ) -> Result<MarginAttributes, LedgerError>;
}

/// Pass-through to a provider keyed by instrument and side.
pub async fn get_futures_margin(
    provider: &dyn MarginRateProvider,
    figi: &Figi,
    is_long: bool,
) -> Result<Price, LedgerError> {
    provider.margin_per_lot(figi, is_long).await
}

/// Per-instrument long/short margin rates, mirroring the buy/sell split
/// brokerages quote for futures.
#[derive(Clone, Debug, PartialEq)]
pub struct FuturesMarginRates {
    pub initial_margin_on_buy: Price,
    pub initial_margin_on_sell: Price,
}

/// In-memory provider for simulation and tests. Rates are set explicitly
/// and returned verbatim.
pub struct MarginRateTable {
    rates: DashMap<Figi, FuturesMarginRates>,
    attributes: DashMap<AccountId, MarginAttributes>,
}

impl MarginRateTable {
    pub fn new() -> Self {
        Self {
            rates: DashMap::new(),
            attributes: DashMap::new(),
        }
    }

    pub fn set_rates(&self, figi: Figi, rates: FuturesMarginRates) {
        self.rates.insert(figi, rates);
    }

    pub fn set_attributes(&self, account_id: AccountId, attributes: MarginAttributes) {
        self.attributes.insert(account_id, attributes);
    }
}

impl Default for MarginRateTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarginRateProvider for MarginRateTable {
    async fn margin_per_lot(&self, figi: &Figi, is_long: bool) -> Result<Price, LedgerError> {
        match self.rates.get(figi) {
            Some(rates) => Ok(if is_long {
                rates.initial_margin_on_buy
            } else {
                rates.initial_margin_on_sell
            }),
            None => Err(LedgerError::ProviderError(format!(
                "no margin rates for instrument: {}",
                figi
            ))),
        }
    }

    async fn margin_attributes(
        &self,
        account_id: &AccountId,
    ) -> Result<MarginAttributes, LedgerError> {
        match self.attributes.get(account_id) {
            Some(attributes) => Ok(attributes.clone()),
            None => Err(LedgerError::ProviderError(format!(
                "no margin attributes for account: {}",
                account_id
            ))),
        }
    }
}
