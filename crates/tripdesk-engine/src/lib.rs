//! # tripdesk-engine: Application Service for TripDesk
//!
//! Runs the quote and booking workflows end to end: the pure rules in
//! `tripdesk-core`, persisted through `tripdesk-db`, with every change
//! audited and announced.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  caller (HTTP handler, CLI, seed binary)                               │
//! │       │  Actor + command                                                │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 tripdesk-engine (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │  EngineConfig ──► DeskSettings ──► QuoteDesk                   │   │
//! │  │  (TOML + env)                        │                          │   │
//! │  │                                      ├── Repository<Quote>      │   │
//! │  │  init_tracing                        ├── Repository<Booking>    │   │
//! │  │  (tracing-subscriber)                ├── Repository<AgentWallet>│   │
//! │  │                                      ├── PaymentVerifier        │   │
//! │  │                                      ├── AuditSink              │   │
//! │  │                                      ├── ReceiptSequence        │   │
//! │  │                                      └── Notifier               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tripdesk-db (SQLite) or in-memory stores                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tripdesk_engine::{
//!     init_tracing, Collaborators, DeskSettings, EngineConfig, ManualPaymentVerifier, QuoteDesk,
//! };
//!
//! let config = EngineConfig::load(None)?;
//! init_tracing(&config.logging)?;
//! let db = Database::new(config.database_config()?).await?;
//! let desk = QuoteDesk::new(
//!     Collaborators::sqlite(&db, config.rate_table()?, Arc::new(ManualPaymentVerifier)),
//!     DeskSettings::from_config(&config),
//! );
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod desk;
pub mod error;
pub mod notifier;
pub mod telemetry;
pub mod verifier;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::EngineConfig;
pub use desk::{Collaborators, DeskSettings, PaymentReceipt, QuoteDesk, RecordRef};
pub use error::{ConfigError, ConfigResult};
pub use notifier::TracingNotifier;
pub use telemetry::init_tracing;
pub use verifier::ManualPaymentVerifier;
