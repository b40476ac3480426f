//! # Bourse Analytics
//!
//! Pure calculations over positions and their history. Nothing in this crate
//! holds state or performs I/O.
//!
//! ## Public API
//!
//! - `calculate_realized_pnl`, `calculate_unrealized_pnl`, `calculate_pnl_percentage`:
//!   the signed P&L formulas shared by the ledger and by reporting.
//! - `checked_unrealized_pnl`: the same formula without panicking on overflow.
//! - `sharpe_ratio`, `max_drawdown`, `win_rate_pct`: building blocks of the report.
//! - `AnalyticsEngine`: derives a `PerformanceReport` from closed positions and an equity curve.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod engine;
pub mod error;
pub mod metrics;
pub mod pnl;
pub mod report;

// Re-export the key components to create a clean, public-facing API.
pub use engine::AnalyticsEngine;
pub use error::AnalyticsError;
pub use metrics::{max_drawdown, sharpe_ratio, win_rate_pct, Drawdown};
pub use pnl::{calculate_pnl_percentage, calculate_realized_pnl, calculate_unrealized_pnl, checked_unrealized_pnl};
pub use report::PerformanceReport;
