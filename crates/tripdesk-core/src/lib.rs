//! # tripdesk-core: Pure Domain Rules for TripDesk
//!
//! This crate is the **heart** of TripDesk. It holds the quote/booking rules
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        TripDesk Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              tripdesk-engine (QuoteDesk service)                │   │
//! │  │    authorize ──► load ──► apply rule ──► save ──► audit/notify  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tripdesk-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  pricing  │  │ visibility│  │ lifecycle │  │  booking  │  │   │
//! │  │   │ breakdown │  │  privacy  │  │  quote    │  │  ledger   │  │   │
//! │  │   │ currency  │  │   wall    │  │  states   │  │  states   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │ operator  │  │   authz   │  │  wallet   │  │   ports   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  tripdesk-db (Persistence Layer)                │   │
//! │  │        SQLite repositories, audit sink, receipt sequences       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Quote, Booking, Message, Role, ...)
//! - [`money`] - Decimal money and percentages
//! - [`currency`] - Rate lookup and conversion
//! - [`pricing`] - Itinerary cost roll-up into a [`pricing::PricingBreakdown`]
//! - [`visibility`] - Role-scoped display names and prices
//! - [`lifecycle`] - Quote state machine and revisions
//! - [`booking`] - Quote-to-booking conversion, booking states, payment ledger
//! - [`operator`] - Operator accept/decline sub-state machine
//! - [`authz`] - Role × action permission table
//! - [`wallet`] - Agent prepaid wallet
//! - [`audit`] - Audit log entry types
//! - [`ports`] - Collaborator traits (repositories, verifier, notifier, ...)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use rust_decimal_macros::dec;
//! use tripdesk_core::currency::RateTable;
//! use tripdesk_core::money::{Money, Percent};
//! use tripdesk_core::pricing::{compute_breakdown, AgentMarkup, PricingRules};
//! use tripdesk_core::types::{ItineraryItem, Service, ServiceType};
//!
//! let itinerary = vec![ItineraryItem {
//!     day: 1,
//!     title: "Arrival".into(),
//!     description: String::new(),
//!     services: vec![Service::new(ServiceType::Hotel, "Sea View", Money::from_major(100), "USD")],
//!     inclusions: vec![],
//! }];
//! let rules = PricingRules {
//!     company_markup_percent: Percent::from_whole(10),
//!     agent_markup: AgentMarkup::Flat(Money::from_major(20)),
//!     gst_percent: Percent::from_whole(18),
//! };
//!
//! let breakdown = compute_breakdown(&itinerary, &rules, 2, "USD", &RateTable::new()).unwrap();
//! assert_eq!(breakdown.final_price.amount(), dec!(153.4));
//! assert_eq!(breakdown.sale_price, Money::from_major(154));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod authz;
pub mod booking;
pub mod currency;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod operator;
pub mod ports;
pub mod pricing;
pub mod types;
pub mod validation;
pub mod visibility;
pub mod wallet;

#[cfg(test)]
mod fixtures;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tripdesk_core::Money` instead of
// `use tripdesk_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Percent};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default share of the booking total due as advance.
pub const DEFAULT_ADVANCE_PERCENT: u32 = 30;

/// Company id used for receipt numbering when none is configured.
pub const DEFAULT_COMPANY_ID: &str = "TD";

/// Maximum length of a chat message.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Maximum length of a rejection, decline or cancellation reason.
pub const MAX_REASON_LENGTH: usize = 1000;

/// Maximum length of a quote title or client name.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Upper bound on party size for a single quote.
pub const MAX_PAX_COUNT: u32 = 500;

/// Largest amount, in whole currency units, accepted for a cost, markup,
/// payment or quote total.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Largest markup or tax percentage accepted.
pub const MAX_PERCENT: u32 = 1_000;
