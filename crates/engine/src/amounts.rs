//! Checked arithmetic for amounts derived from caller input. An overflow is
//! reported with its operands instead of panicking.

use ledger::LedgerError;
use rust_decimal::Decimal;

pub(crate) fn add(operation: &'static str, lhs: Decimal, rhs: Decimal) -> Result<Decimal, LedgerError> {
    lhs.checked_add(rhs).ok_or(LedgerError::Overflow { operation, lhs, rhs })
}

pub(crate) fn sub(operation: &'static str, lhs: Decimal, rhs: Decimal) -> Result<Decimal, LedgerError> {
    lhs.checked_sub(rhs).ok_or(LedgerError::Overflow { operation, lhs, rhs })
}

pub(crate) fn mul(operation: &'static str, lhs: Decimal, rhs: Decimal) -> Result<Decimal, LedgerError> {
    lhs.checked_mul(rhs).ok_or(LedgerError::Overflow { operation, lhs, rhs })
}

/// Also fails on a zero divisor.
pub(crate) fn div(operation: &'static str, lhs: Decimal, rhs: Decimal) -> Result<Decimal, LedgerError> {
    lhs.checked_div(rhs).ok_or(LedgerError::Overflow { operation, lhs, rhs })
}
