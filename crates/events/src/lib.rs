//! # Bourse Events
//!
//! This crate defines the audit trail of the ledger: one `LedgerEvent` per
//! state-changing operation, carrying before/after snapshots of the entity it
//! touched, and the `AuditSink` abstraction that receives them.
//!
//! Sinks are fire-and-forget. Nothing in the ledger's consistency depends on
//! an event being delivered.

// Declare the modules that make up this crate.
pub mod error;
pub mod messages;
pub mod sink;

// Re-export the core types to provide a clean public API.
pub use error::EventsError;
pub use messages::{LedgerEvent, LedgerEventKind};
pub use sink::{AuditSink, MemoryAuditSink, TracingAuditSink};
