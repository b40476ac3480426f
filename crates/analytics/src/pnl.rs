use crate::error::AnalyticsError;
use core_types::PositionSide;
use rust_decimal::Decimal;

/// Price move in the position's favour, per unit.
fn favourable_move(side: PositionSide, entry_price: Decimal, price: Decimal) -> Decimal {
    match side {
        PositionSide::Long => price - entry_price,
        PositionSide::Short => entry_price - price,
    }
}

/// P&L realized by exiting `quantity` at `exit_price`, net of `commission`.
///
/// Long: `(exit - entry) * qty - commission`.
/// Short: `(entry - exit) * qty - commission`.
pub fn calculate_realized_pnl(
    entry_price: Decimal,
    exit_price: Decimal,
    quantity: Decimal,
    side: PositionSide,
    commission: Decimal,
) -> Decimal {
    favourable_move(side, entry_price, exit_price) * quantity - commission
}

/// Mark-to-market P&L of an open position at `current_price`. No fees.
pub fn calculate_unrealized_pnl(
    entry_price: Decimal,
    current_price: Decimal,
    quantity: Decimal,
    side: PositionSide,
) -> Decimal {
    favourable_move(side, entry_price, current_price) * quantity
}

/// `calculate_unrealized_pnl` for amounts taken from caller input; `None`
/// when the result leaves the decimal range.
pub fn checked_unrealized_pnl(
    entry_price: Decimal,
    current_price: Decimal,
    quantity: Decimal,
    side: PositionSide,
) -> Option<Decimal> {
    let per_unit = match side {
        PositionSide::Long => current_price.checked_sub(entry_price)?,
        PositionSide::Short => entry_price.checked_sub(current_price)?,
    };
    per_unit.checked_mul(quantity)
}

/// Return on the entry price, in percent, signed by the position's direction.
pub fn calculate_pnl_percentage(
    entry_price: Decimal,
    exit_price: Decimal,
    side: PositionSide,
) -> Result<Decimal, AnalyticsError> {
    if entry_price.is_zero() {
        return Err(AnalyticsError::DivisionByZero("pnl_percentage".to_string()));
    }
    Ok(favourable_move(side, entry_price, exit_price) / entry_price * Decimal::ONE_HUNDRED)
}
