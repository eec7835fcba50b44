//! # Collaborator Traits
//!
//! Narrow interfaces the rules call into. Implementations live outside this
//! crate: SQLite and in-memory stores in `tripdesk-db`, a tracing notifier in
//! `tripdesk-engine`, [`crate::currency::RateTable`] for rates.
//!
//! ```text
//! ┌──────────────┐     ┌─────────────────────────────────────────────────┐
//! │  QuoteDesk   │────►│ Repository<Quote | Booking | AgentWallet>       │
//! │  (engine)    │────►│ PaymentVerifier   (gateway check, bool)         │
//! │              │────►│ Notifier          (fire-and-forget)             │
//! │              │────►│ AuditSink         (write-once)                  │
//! │              │────►│ ReceiptSequence   (per-company counter)         │
//! └──────────────┘     └─────────────────────────────────────────────────┘
//! ```
//!
//! All async traits are object safe and `Send + Sync + Debug` so they can be
//! held as `Arc<dyn Trait>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::audit::AuditLogEntry;
use crate::error::CoreResult;
use crate::money::Money;
use crate::types::{Booking, Quote};
use crate::wallet::AgentWallet;

// =============================================================================
// Versioned Records
// =============================================================================

/// A record saved with optimistic concurrency.
///
/// `record_version` is 0 until the first save and goes up by one on every
/// successful save.
pub trait Versioned: Clone + Send + Sync + 'static {
    const ENTITY: &'static str;

    fn key(&self) -> &str;
    fn record_version(&self) -> u64;
    fn set_record_version(&mut self, version: u64);
}

impl Versioned for Quote {
    const ENTITY: &'static str = "Quote";

    fn key(&self) -> &str {
        &self.id
    }

    fn record_version(&self) -> u64 {
        self.record_version
    }

    fn set_record_version(&mut self, version: u64) {
        self.record_version = version;
    }
}

impl Versioned for Booking {
    const ENTITY: &'static str = "Booking";

    fn key(&self) -> &str {
        &self.id
    }

    fn record_version(&self) -> u64 {
        self.record_version
    }

    fn set_record_version(&mut self, version: u64) {
        self.record_version = version;
    }
}

/// Wallets are keyed by agent.
impl Versioned for AgentWallet {
    const ENTITY: &'static str = "AgentWallet";

    fn key(&self) -> &str {
        &self.agent_id
    }

    fn record_version(&self) -> u64 {
        self.record_version
    }

    fn set_record_version(&mut self, version: u64) {
        self.record_version = version;
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Compare-and-swap store for one record type.
#[async_trait]
pub trait Repository<T: Versioned>: Send + Sync + Debug {
    /// Loads a record by key.
    async fn get(&self, id: &str) -> CoreResult<Option<T>>;

    /// Saves `entity` if the stored record is still at `expected_version`
    /// (0 for an insert). Returns the record as stored, with its new
    /// `record_version`.
    ///
    /// # Errors
    ///
    /// `ConcurrentModification` if the stored version differs. Nothing is
    /// written in that case.
    async fn save(&self, entity: T, expected_version: u64) -> CoreResult<T>;

    /// All records matching `predicate`.
    async fn query(&self, predicate: &(dyn for<'a> Fn(&'a T) -> bool + Send + Sync)) -> CoreResult<Vec<T>>;
}

// =============================================================================
// External Services
// =============================================================================

/// Confirms a payment with the gateway before it reaches the ledger.
#[async_trait]
pub trait PaymentVerifier: Send + Sync + Debug {
    async fn verify(&self, payment_id: &str, expected_amount: Money, currency: &str)
        -> CoreResult<bool>;
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_ids: Vec<String>,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
}

/// Delivers notifications. Fire-and-forget: failures never roll back the
/// operation that triggered them.
#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    async fn notify(&self, notification: Notification);
}

/// Stores audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync + Debug {
    async fn record(&self, entry: AuditLogEntry) -> CoreResult<()>;
}

/// Per-company monotonically increasing counter for receipt numbers.
#[async_trait]
pub trait ReceiptSequence: Send + Sync + Debug {
    async fn next(&self, company_id: &str) -> CoreResult<u64>;
}
