use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("No reference price for {0}: no last trade and no price on the order")]
    NoReferencePrice(String),

    #[error("The provided reference price ({0}) is zero or negative.")]
    InvalidReferencePrice(Decimal),

    #[error("Margin for {quantity} at {price} exceeds the decimal range")]
    MarginOverflow { quantity: Decimal, price: Decimal },
}
