//! # Bourse Engine
//!
//! The accounting core. `TradingCore` is the only owner of the ledger store;
//! every mutation of accounts, orders, trades and positions goes through one
//! of its operations.
//!
//! ## Components
//!
//! - **Order Manager** (`orders`): validation, margin holds, cancellation.
//! - **Trade Execution Engine** (`execution`): records fills against orders.
//! - **Position Manager** (`positions`): weighted-average entry, close, marking.
//! - **Settlement Processor** (`settlement`): exactly-once cash movement,
//!   end-of-day batches and reconciliation.
//! - **Corporate Action Processor** (`corporate`): splits and dividends.
//!
//! Fills and settlement are deliberately separate steps. A filled trade stays
//! `pending` and moves no cash until it is settled.

pub mod accounts;
mod amounts;
pub mod corporate;
pub mod execution;
pub mod orders;
pub mod positions;
pub mod settlement;

pub use analytics::{calculate_pnl_percentage, calculate_realized_pnl, calculate_unrealized_pnl};
pub use corporate::CorporateActionOutcome;
pub use ledger::{ErrorKind, LedgerError};
pub use orders::OrderRequest;
pub use settlement::{BatchSettlement, Reconciliation};

use configuration::Config;
use events::{AuditSink, EventsError, LedgerEvent, TracingAuditSink};
use ledger::{InstrumentCatalog, LedgerStore, PriceSource};
use risk::{MarginValidator, SimpleMarginValidator};
use rust_decimal::Decimal;
use std::sync::Arc;

/// The accounting core.
pub struct TradingCore {
    store: LedgerStore,
    catalog: Arc<dyn InstrumentCatalog>,
    prices: Arc<dyn PriceSource>,
    margin: Arc<dyn MarginValidator>,
    audit: Arc<dyn AuditSink>,
    commission_rate: Decimal,
    reconciliation_tolerance: Decimal,
}

impl TradingCore {
    /// Creates a core with an empty ledger.
    pub fn new(
        config: &Config,
        catalog: Arc<dyn InstrumentCatalog>,
        prices: Arc<dyn PriceSource>,
        margin: Arc<dyn MarginValidator>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        tracing::info!(
            commission_rate = %config.fees.commission_rate,
            lock_timeout_ms = config.locking.timeout_ms,
            "trading core initialised"
        );
        Self {
            store: LedgerStore::new(config.locking.timeout()),
            catalog,
            prices,
            margin,
            audit,
            commission_rate: config.fees.commission_rate,
            reconciliation_tolerance: config.settlement.reconciliation_tolerance,
        }
    }

    /// A core using the simple margin model and logging its audit trail.
    pub fn with_defaults(
        config: &Config,
        catalog: Arc<dyn InstrumentCatalog>,
        prices: Arc<dyn PriceSource>,
    ) -> Self {
        Self::new(
            config,
            catalog,
            prices,
            Arc::new(SimpleMarginValidator::new()),
            Arc::new(TracingAuditSink),
        )
    }

    /// Hands a committed change to the audit sink. An event that cannot be
    /// built is logged and dropped; the operation itself has already succeeded.
    fn publish(&self, event: Result<LedgerEvent, EventsError>) {
        match event {
            Ok(event) => self.audit.record(event),
            Err(err) => tracing::warn!(error = %err, "dropping audit event"),
        }
    }
}
