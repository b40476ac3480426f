//! # Bourse Risk
//!
//! The margin and risk validator consulted by the order manager before an order
//! is accepted, and by the settlement processor for account-level margin checks.
//!
//! ## Public API
//!
//! - `MarginValidator`: The trait the ledger depends on.
//! - `SimpleMarginValidator`: Notional times the instrument's margin ratio.
//! - `MarginRequirements`: Account-level margin summary.
//! - `RiskError`: The specific error types that can be returned from this crate.

pub mod error;
pub mod margin;

pub use error::RiskError;
pub use margin::{MarginRequirements, SimpleMarginValidator};

use core_types::{Account, Instrument, Position};
use rust_decimal::Decimal;

/// Computes collateral for prospective orders and open positions.
pub trait MarginValidator: Send + Sync {
    /// Price used to value an order: the last traded price when one exists,
    /// otherwise the price submitted with the order.
    fn reference_price(
        &self,
        symbol: &str,
        last_price: Option<Decimal>,
        submitted_price: Option<Decimal>,
    ) -> Result<Decimal, RiskError>;

    /// Collateral to hold for `quantity` of `instrument` valued at `reference_price`.
    fn required_margin(
        &self,
        instrument: &Instrument,
        quantity: Decimal,
        reference_price: Decimal,
    ) -> Result<Decimal, RiskError>;

    /// Fails when the account cannot hold `required` more margin.
    fn check_order(&self, account: &Account, required: Decimal) -> Result<(), RiskError>;

    /// Summarises the margin held against every open position of `account`.
    /// Each position is paired with its instrument's margin ratio.
    fn margin_requirements(&self, account: &Account, positions: &[(Position, Decimal)]) -> MarginRequirements;
}
