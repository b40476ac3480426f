//! # Bourse Database Crate
//!
//! PostgreSQL adapter for the parts of the system that outlive a process,
//! currently the audit trail.
//!
//! ## Architectural Principles
//!
//! - **Adapter:** This crate encapsulates all database-specific logic. The
//!   core never depends on it; it only sees the `AuditSink` trait.
//! - **Fire-and-forget:** Audit writes happen on a background task and never
//!   block or fail a ledger operation.
//! - **Asynchronous & Pooled:** All operations are asynchronous, and it uses a
//!   connection pool (`PgPool`) for concurrent database access.
//!
//! ## Public API
//!
//! - `connect`: Establishes the connection pool from the `[database]` settings.
//! - `run_migrations`: Applies the embedded migrations.
//! - `DbRepository`: Holds the pool and provides the data access methods.
//! - `PgAuditSink`: The `AuditSink` that persists events to `audit_events`.
//! - `DbError`: The specific error types that can be returned from this crate.

pub mod connection;
pub mod error;
pub mod repository;
pub mod sink;

pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use repository::DbRepository;
pub use sink::PgAuditSink;
