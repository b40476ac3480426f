//! # Bourse Core Types
//!
//! The Layer 0 vocabulary of the workspace: the entities held by the ledger
//! (accounts, instruments, orders, trades, positions, position history and
//! transactions) and the enums describing their states.
//!
//! This crate performs no I/O and has no knowledge of locking or persistence.

pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{
    AccountType, CorporateActionType, InstrumentType, OrderSide, OrderStatus, OrderType,
    PositionSide, SettlementStatus, TimeInForce, TransactionType,
};
pub use error::CoreError;
pub use structs::{
    Account, AccountId, Instrument, Order, OrderId, Position, PositionHistory, PositionId, Trade,
    TradeId, Transaction, TransactionId,
};
