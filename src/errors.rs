use thiserror::Error;
use crate::standardized_types::accounts::AccountId;
use crate::standardized_types::new_types::Price;

/// Failure taxonomy for ledger operations. Every error leaves the account
/// and position map exactly as they were before the call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// The margin required to open or increase a position exceeds the free
    /// balance. Recoverable, the caller should reduce size or abort.
    #[error("insufficient margin: required {required}, available {available}")]
    InsufficientMargin { required: Price, available: Price },

    /// The caller requested a reduction larger than the held lots, or a
    /// close on a ticker with no open position. Programmer error.
    #[error("invalid position state: {0}")]
    InvalidPositionState(String),

    /// A non-positive margin-per-lot figure was supplied.
    #[error("invalid margin rate per lot: {0}")]
    InvalidMarginRate(Price),

    /// No ledger is registered for the account.
    #[error("no ledger registered for account: {0}")]
    AccountNotFound(AccountId),

    /// The external margin rate provider failed or has no data for the
    /// requested instrument.
    #[error("margin rate provider error: {0}")]
    ProviderError(String),

    /// Trade history export could not be written.
    #[error("export error: {0}")]
    ExportError(String),
}
