//! # Bourse Ledger Store
//!
//! The authoritative state of accounts, orders, trades, positions, position
//! history and transactions, plus the two read-only collaborators the core
//! consults: the instrument catalog and the reference price source.
//!
//! ## Architectural Principles
//!
//! - **Row locks:** every mutable row sits behind its own `tokio::sync::Mutex`.
//!   Waits are bounded by the configured timeout; expiry surfaces as
//!   `LedgerError::Conflict` and is never retried here.
//! - **Lock order:** account, then order, then trade, then position. Table
//!   locks are only held long enough to clone a row handle, never across a
//!   row-lock wait.
//! - **Append-only logs:** position history and transactions are never
//!   mutated once written.

pub mod catalog;
pub mod error;
pub mod prices;
pub mod store;

pub use catalog::{InstrumentCatalog, InstrumentRegistry};
pub use error::{ErrorKind, LedgerError};
pub use prices::{PriceBook, PriceSource};
pub use store::{LedgerStore, PositionEntry, PositionKey, Row, RowGuard};
