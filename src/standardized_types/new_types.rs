use rust_decimal::Decimal;

pub type Price = Decimal;
/// Signed lot count as requested by callers, positive = long, negative = short.
pub type SignedLots = i64;
/// Non-negative lot magnitude held by an open position.
pub type Lots = u64;

pub type Ticker = String;
pub type Figi = String;
pub type TradeId = String;
