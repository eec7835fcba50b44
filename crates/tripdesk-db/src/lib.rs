//! # tripdesk-db: Persistence Layer for TripDesk
//!
//! SQLite-backed implementations of the collaborator traits in
//! `tripdesk_core::ports`, plus in-memory equivalents.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        TripDesk Data Flow                               │
//! │                                                                         │
//! │  QuoteDesk::approve_quote(...)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tripdesk-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌────────────┐  │   │
//! │  │   │   Database    │    │   Repositories     │  │ Migrations │  │   │
//! │  │   │   (pool.rs)   │    │                    │  │ (embedded) │  │   │
//! │  │   │               │    │ quotes / bookings  │  │            │  │   │
//! │  │   │ SqlitePool    │◄───│ wallets            │  │ 001_init   │  │   │
//! │  │   │ WAL, FKs on   │    │ audit_log          │  │            │  │   │
//! │  │   │               │    │ receipt_sequences  │  │            │  │   │
//! │  │   └───────────────┘    └────────────────────┘  └────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (or :memory: in tests)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tripdesk_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("tripdesk.db")).await?;
//! let quotes: Arc<dyn Repository<Quote>> = Arc::new(db.quotes());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::audit::SqliteAuditLog;
pub use repository::booking::SqliteBookingRepository;
pub use repository::memory::{InMemoryAuditLog, InMemoryReceiptSequence, InMemoryRepository};
pub use repository::quote::SqliteQuoteRepository;
pub use repository::sequence::SqliteReceiptSequence;
pub use repository::wallet::SqliteWalletRepository;
