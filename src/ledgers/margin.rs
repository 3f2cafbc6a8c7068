use rust_decimal::Decimal;
use crate::standardized_types::new_types::Price;

/// True iff `required_margin` fits inside `free_balance`. This is the same
/// comparison `update_position` applies at commit time, so a caller that
/// pre-flights a trade here will not be told "yes" and then rejected for
/// the identical figures.
pub fn can_open_position(free_balance: Price, required_margin: Price) -> bool {
    required_margin <= free_balance
}

/// `margin_per_lot * |lots|`. Pure arithmetic, no state.
pub fn calculate_required_margin(margin_per_lot: Price, lots: i64) -> Price {
    margin_per_lot * Decimal::from(lots.unsigned_abs())
}
