//! # Repository Module
//!
//! Storage implementations of the `tripdesk_core::ports` traits.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  QuoteDesk (engine)                                                    │
//! │       │  Arc<dyn Repository<Quote>>                                    │
//! │       ▼                                                                 │
//! │  ┌───────────────────────────┐      ┌───────────────────────────┐      │
//! │  │ SqliteQuoteRepository     │  or  │ InMemoryRepository<Quote> │      │
//! │  │ ├── get(id)               │      │ (tests)                   │      │
//! │  │ ├── save(quote, expected) │      └───────────────────────────┘      │
//! │  │ └── query(predicate)      │                                         │
//! │  └─────────────┬─────────────┘                                         │
//! │                │  UPDATE ... WHERE id = ? AND record_version = ?       │
//! │                ▼                                                        │
//! │  SQLite: payload (JSON) + indexed scalar columns                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Implementations
//!
//! - [`quote::SqliteQuoteRepository`], [`booking::SqliteBookingRepository`],
//!   [`wallet::SqliteWalletRepository`] - compare-and-swap record stores
//! - [`audit::SqliteAuditLog`] - append-only audit sink
//! - [`sequence::SqliteReceiptSequence`] - per-company receipt counter
//! - [`memory`] - in-memory equivalents of all of the above

pub mod audit;
pub mod booking;
pub mod memory;
pub mod quote;
pub mod sequence;
pub mod wallet;

mod document;
