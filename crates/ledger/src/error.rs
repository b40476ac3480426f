use core_types::{AccountId, CoreError, OrderId, OrderStatus, PositionId, TradeId};
use risk::RiskError;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Coarse classification of a `LedgerError`, for callers deciding whether to
/// retry, fix their input, or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    InsufficientFunds,
    InvalidState,
    Duplicate,
    /// Lock timeout. Safe to retry the whole operation from scratch.
    Conflict,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Account {0} is inactive")]
    AccountInactive(AccountId),

    #[error("Instrument {0} is unknown or not tradeable")]
    InstrumentNotTradeable(String),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Trade not found: {0}")]
    TradeNotFound(TradeId),

    #[error("Position not found: {0}")]
    PositionNotFound(PositionId),

    #[error("Invalid quantity {quantity}: {reason}")]
    InvalidQuantity { quantity: Decimal, reason: String },

    #[error("Invalid price {price:?}: {reason}")]
    InvalidPrice { price: Option<Decimal>, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Decimal overflow computing {operation} from {lhs} and {rhs}")]
    Overflow { operation: &'static str, lhs: Decimal, rhs: Decimal },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("Order {order_id} cannot be cancelled in status {status}")]
    OrderNotCancelable { order_id: OrderId, status: OrderStatus },

    #[error("Order {order_id} is not open (status {status})")]
    OrderNotOpen { order_id: OrderId, status: OrderStatus },

    #[error("Fill of {requested} on order {order_id} exceeds remaining quantity {remaining}")]
    OverFill { order_id: OrderId, requested: Decimal, remaining: Decimal },

    #[error("Trade {0} is already settled")]
    AlreadySettled(TradeId),

    #[error("An open order with client id '{client_order_id}' already exists for account {account_id}")]
    DuplicateOrder { account_id: AccountId, client_order_id: String },

    #[error("Timed out waiting for the lock on {resource} {id}; retry the operation")]
    Conflict { resource: &'static str, id: Uuid },
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::AccountNotFound(_)
            | LedgerError::OrderNotFound(_)
            | LedgerError::TradeNotFound(_)
            | LedgerError::PositionNotFound(_)
            | LedgerError::InstrumentNotTradeable(_) => ErrorKind::NotFound,
            LedgerError::InvalidQuantity { .. }
            | LedgerError::InvalidPrice { .. }
            | LedgerError::InvalidInput(_)
            | LedgerError::Overflow { .. } => ErrorKind::InvalidInput,
            LedgerError::InsufficientBalance { .. } => ErrorKind::InsufficientFunds,
            LedgerError::AccountInactive(_)
            | LedgerError::OrderNotCancelable { .. }
            | LedgerError::OrderNotOpen { .. }
            | LedgerError::OverFill { .. }
            | LedgerError::AlreadySettled(_) => ErrorKind::InvalidState,
            LedgerError::DuplicateOrder { .. } => ErrorKind::Duplicate,
            LedgerError::Conflict { .. } => ErrorKind::Conflict,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

impl From<RiskError> for LedgerError {
    fn from(err: RiskError) -> Self {
        match err {
            RiskError::InsufficientBalance { required, available } => {
                LedgerError::InsufficientBalance { required, available }
            }
            RiskError::NoReferencePrice(symbol) => LedgerError::InvalidPrice {
                price: None,
                reason: format!("no reference price available for {symbol}"),
            },
            RiskError::InvalidReferencePrice(price) => LedgerError::InvalidPrice {
                price: Some(price),
                reason: "reference price must be positive".to_string(),
            },
            RiskError::MarginOverflow { quantity, price } => LedgerError::Overflow {
                operation: "required margin",
                lhs: quantity,
                rhs: price,
            },
        }
    }
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        LedgerError::InvalidInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn only_conflicts_are_retryable() {
        let conflict = LedgerError::Conflict { resource: "account", id: Uuid::nil() };
        assert!(conflict.is_retryable());
        assert_eq!(conflict.kind(), ErrorKind::Conflict);

        let settled = LedgerError::AlreadySettled(Uuid::nil());
        assert!(!settled.is_retryable());
        assert_eq!(settled.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn risk_shortfall_keeps_operands() {
        let err: LedgerError = RiskError::InsufficientBalance { required: dec!(10), available: dec!(4) }.into();
        assert_eq!(err, LedgerError::InsufficientBalance { required: dec!(10), available: dec!(4) });
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    }

    #[test]
    fn margin_overflow_keeps_operands() {
        let err: LedgerError = RiskError::MarginOverflow { quantity: dec!(2), price: Decimal::MAX }.into();
        assert_eq!(
            err,
            LedgerError::Overflow { operation: "required margin", lhs: dec!(2), rhs: Decimal::MAX }
        );
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn missing_reference_price_is_invalid_input() {
        let err: LedgerError = RiskError::NoReferencePrice("ACME".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
