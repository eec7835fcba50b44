//! # Domain Types
//!
//! Core domain types used throughout TripDesk.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Quote       │   │    Booking      │   │  PaymentEntry   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │──►│  quote_id (FK)  │──►│  id (payment)   │       │
//! │  │  unique_ref_no  │   │  status         │   │  amount         │       │
//! │  │  version        │   │  total_amount   │   │  receipt_number │       │
//! │  │  itinerary      │   │  payments       │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ ItineraryItem   │   │    Message      │   │     Role        │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  day            │   │  sender_role    │   │  ADMIN, STAFF   │       │
//! │  │  services       │   │  content        │   │  AGENT          │       │
//! │  │  inclusions     │   │  is_system      │   │  OPERATOR, ...  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every quote has:
//! - `id`: UUID v4, different for every revision
//! - `unique_ref_no`: human-readable (`QT-20250301-7F3A9C`), shared by the
//!   whole revision chain
//!
//! ## Two Version Numbers
//! - `version`: lineage number (1, 2, 3...) bumped only by a revision
//! - `record_version`: optimistic concurrency stamp bumped by every save

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::money::Money;
use crate::operator::OperatorAssignment;
use crate::pricing::PricingRules;

// =============================================================================
// Role & Actor
// =============================================================================

/// Platform role. Role is the sole input to the visibility rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Staff,
    Agent,
    Operator,
    HotelPartner,
    /// Unauthenticated public viewer of a shared quote.
    Client,
}

impl Role {
    /// All roles, in table order.
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Staff,
        Role::Agent,
        Role::Operator,
        Role::HotelPartner,
        Role::Client,
    ];

    /// Canonical upper-case name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Staff => "STAFF",
            Role::Agent => "AGENT",
            Role::Operator => "OPERATOR",
            Role::HotelPartner => "HOTEL_PARTNER",
            Role::Client => "CLIENT",
        }
    }

    /// Admin and staff see everything.
    #[inline]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Role::Admin | Role::Staff)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parsing: an unknown role string is an error, never a default.
impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "STAFF" => Ok(Role::Staff),
            "AGENT" => Ok(Role::Agent),
            "OPERATOR" => Ok(Role::Operator),
            "HOTEL_PARTNER" => Ok(Role::HotelPartner),
            "CLIENT" => Ok(Role::Client),
            other => Err(ValidationError::InvalidFormat {
                field: "role".to_string(),
                reason: format!("unknown role '{}'", other),
            }),
        }
    }
}

/// The user performing (or viewing) an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub user_id: String,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Actor {
            user_id: user_id.into(),
            name: name.into(),
            role,
        }
    }

    /// The anonymous viewer of a shared quote link.
    pub fn public_client() -> Self {
        Actor::new("", "Client", Role::Client)
    }
}

// =============================================================================
// Quote Status
// =============================================================================

/// Quote lifecycle status.
///
/// ```text
/// DRAFT ──► SUBMITTED ──► APPROVED (locked) ──► BOOKED
///   ▲           │              │
///   └─reject────┘              │
///   │           │              │
///   └───────────┴──────────────┴──► CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    #[default]
    Draft,
    Submitted,
    Approved,
    Booked,
    Cancelled,
}

impl QuoteStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "DRAFT",
            QuoteStatus::Submitted => "SUBMITTED",
            QuoteStatus::Approved => "APPROVED",
            QuoteStatus::Booked => "BOOKED",
            QuoteStatus::Cancelled => "CANCELLED",
        }
    }

    /// Terminal states accept no further lifecycle transitions.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, QuoteStatus::Booked | QuoteStatus::Cancelled)
    }

    /// Enforces the quote state machine.
    pub const fn can_transition_to(&self, target: QuoteStatus) -> bool {
        matches!(
            (self, target),
            (QuoteStatus::Draft, QuoteStatus::Submitted)
                | (QuoteStatus::Submitted, QuoteStatus::Approved)
                | (QuoteStatus::Submitted, QuoteStatus::Draft)
                | (QuoteStatus::Approved, QuoteStatus::Booked)
                | (QuoteStatus::Draft, QuoteStatus::Cancelled)
                | (QuoteStatus::Submitted, QuoteStatus::Cancelled)
                | (QuoteStatus::Approved, QuoteStatus::Cancelled)
        )
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Itinerary
// =============================================================================

/// Kind of supplier service on an itinerary day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    Hotel,
    Activity,
    Transfer,
    Flight,
    Meal,
    Guide,
    Other,
}

/// A supplier service priced in its own currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Service {
    pub service_type: ServiceType,
    pub name: String,
    pub cost: Money,
    /// ISO-4217 code of `cost`.
    pub currency: String,
    /// Reference only: shown on the itinerary, excluded from totals.
    #[serde(default)]
    pub is_ref: bool,
}

impl Service {
    pub fn new(
        service_type: ServiceType,
        name: impl Into<String>,
        cost: Money,
        currency: impl Into<String>,
    ) -> Self {
        Service {
            service_type,
            name: name.into(),
            cost,
            currency: currency.into(),
            is_ref: false,
        }
    }

    /// Marks the service as reference only.
    pub fn reference_only(mut self) -> Self {
        self.is_ref = true;
        self
    }
}

/// One day of the trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItineraryItem {
    pub day: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub inclusions: Vec<String>,
}

// =============================================================================
// Message
// =============================================================================

/// A chat message on a quote or booking. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_role: Role,
    pub content: String,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_system: bool,
}

impl Message {
    /// A message typed by a user.
    pub fn user(actor: &Actor, content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            sender_id: actor.user_id.clone(),
            sender_name: actor.name.clone(),
            sender_role: actor.role,
            content: content.into(),
            timestamp: at,
            is_system: false,
        }
    }

    /// A system note describing a transition the actor triggered.
    pub fn system(actor: &Actor, content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Message {
            is_system: true,
            ..Message::user(actor, content, at)
        }
    }
}

// =============================================================================
// Quote
// =============================================================================

/// A priced travel proposal. See the module docs for the two version numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Quote {
    pub id: String,
    pub unique_ref_no: String,
    pub version: u32,
    pub previous_version_id: Option<String>,
    pub is_locked: bool,
    pub status: QuoteStatus,
    pub title: String,
    pub agent_id: String,
    pub client_name: String,
    pub currency: String,
    pub pax_count: u32,
    pub itinerary: Vec<ItineraryItem>,
    pub pricing_rules: PricingRules,
    /// Aggregated net cost in quote currency.
    pub cost: Money,
    /// B2B price: what the agent pays the platform.
    pub price: Money,
    /// B2B price plus the agent's markup: what the agent's client pays.
    pub selling_price: Money,
    pub operator: OperatorAssignment,
    pub messages: Vec<Message>,
    pub created_by: String,
    pub approved_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub record_version: u64,
}

impl Quote {
    /// Sale price: selling price rounded up to the whole currency unit.
    #[inline]
    pub fn sale_price(&self) -> Money {
        self.selling_price.ceil_whole()
    }

    /// Builds the next revision of a locked quote.
    ///
    /// Every field is listed explicitly so adding a field to `Quote` forces
    /// a decision here. The parent is not modified.
    ///
    /// ```text
    /// parent (v2, locked) ──► revision (v3, DRAFT, unlocked)
    ///   id: q-2                 id: <new uuid>
    ///   unique_ref_no: QT-1     unique_ref_no: QT-1
    ///                           previous_version_id: q-2
    /// ```
    pub fn revision_of(parent: &Quote, actor: &Actor, at: DateTime<Utc>) -> Quote {
        Quote {
            id: Uuid::new_v4().to_string(),
            unique_ref_no: parent.unique_ref_no.clone(),
            version: parent.version + 1,
            previous_version_id: Some(parent.id.clone()),
            is_locked: false,
            status: QuoteStatus::Draft,
            title: parent.title.clone(),
            agent_id: parent.agent_id.clone(),
            client_name: parent.client_name.clone(),
            currency: parent.currency.clone(),
            pax_count: parent.pax_count,
            itinerary: parent.itinerary.clone(),
            pricing_rules: parent.pricing_rules.clone(),
            cost: parent.cost,
            price: parent.price,
            selling_price: parent.selling_price,
            operator: parent.operator.carried_into_revision(),
            messages: vec![Message::system(
                actor,
                format!(
                    "Revision v{} created from v{}",
                    parent.version + 1,
                    parent.version
                ),
                at,
            )],
            created_by: actor.user_id.clone(),
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            created_at: at,
            updated_at: at,
            record_version: 0,
        }
    }
}

// =============================================================================
// Booking Status
// =============================================================================

/// Booking execution status.
///
/// ```text
/// REQUESTED ──► CONFIRMED ──► IN_PROGRESS ──► COMPLETED
///     │             │  ▲
///     │             ▼  │ (request declined)
///     │   CANCELLATION_REQUESTED ──► CANCELLED
///     │
///     └──► REJECTED            (staff may also cancel REQUESTED/CONFIRMED)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    #[default]
    Requested,
    Confirmed,
    InProgress,
    Completed,
    CancellationRequested,
    Cancelled,
    Rejected,
}

impl BookingStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Requested => "REQUESTED",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::CancellationRequested => "CANCELLATION_REQUESTED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Rejected => "REJECTED",
        }
    }

    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Rejected
        )
    }

    /// Enforces the booking state machine.
    pub const fn can_transition_to(&self, target: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, target),
            (Requested, Confirmed)
                | (Requested, Rejected)
                | (Requested, Cancelled)
                | (Requested, CancellationRequested)
                | (Confirmed, InProgress)
                | (Confirmed, Cancelled)
                | (Confirmed, CancellationRequested)
                | (InProgress, Completed)
                | (CancellationRequested, Cancelled)
                | (CancellationRequested, Requested)
                | (CancellationRequested, Confirmed)
        )
    }

    /// Statuses in which payments may be recorded.
    #[inline]
    pub const fn accepts_payments(&self) -> bool {
        matches!(
            self,
            BookingStatus::Requested
                | BookingStatus::Confirmed
                | BookingStatus::InProgress
                | BookingStatus::Completed
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Advance,
    Partial,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMode {
    BankTransfer,
    Card,
    Upi,
    Cash,
    /// Deducted from the agent's prepaid wallet.
    Wallet,
}

/// One entry of the append-only payment ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentEntry {
    /// Payment id; unique within a booking.
    pub id: String,
    pub amount: Money,
    pub payment_type: PaymentType,
    pub mode: PaymentMode,
    pub reference: Option<String>,
    pub receipt_number: String,
    pub recorded_by: String,
    #[ts(as = "String")]
    pub recorded_at: DateTime<Utc>,
}

/// The excess of a payment beyond the booking total, kept for reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreditNote {
    pub payment_id: String,
    pub amount: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Booking
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Traveler {
    pub name: String,
    pub age: Option<u32>,
    pub id_document: Option<String>,
}

impl Traveler {
    pub fn named(name: impl Into<String>) -> Self {
        Traveler {
            name: name.into(),
            age: None,
            id_document: None,
        }
    }
}

/// The operative record once a quote is booked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Booking {
    pub id: String,
    pub quote_id: String,
    pub unique_ref_no: String,
    pub quote_version: u32,
    pub agent_id: String,
    pub currency: String,
    pub pax_count: u32,
    pub travelers: Vec<Traveler>,
    pub status: BookingStatus,
    /// Status to restore if a pending cancellation request is declined.
    #[serde(default)]
    pub cancellation_requested_from: Option<BookingStatus>,
    pub total_amount: Money,
    pub advance_amount: Money,
    /// Derived from `payments`, capped at `total_amount`.
    pub paid_amount: Money,
    /// Derived from `payments`, never negative.
    pub balance_amount: Money,
    /// Net cost snapshot from the quote (privacy wall input).
    pub net_cost: Money,
    /// B2B price snapshot from the quote.
    pub b2b_price: Money,
    pub payments: Vec<PaymentEntry>,
    pub credit_notes: Vec<CreditNote>,
    pub operator: OperatorAssignment,
    pub messages: Vec<Message>,
    /// Non-fatal findings such as a traveler/pax mismatch.
    pub warnings: Vec<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub record_version: u64,
}

// =============================================================================
// Unit Tests
// =============================================================================
