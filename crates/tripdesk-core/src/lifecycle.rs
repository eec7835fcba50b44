//! # Quote Lifecycle
//!
//! State machine for quotes, edits and revisions.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_draft ──► DRAFT ──submit──► SUBMITTED ──approve──► APPROVED     │
//! │                    ▲  │                │                    (locked)    │
//! │                    │  │ update_quote   │                       │        │
//! │                    │  └─(DRAFT only)   │                       │        │
//! │                    └─────reject────────┘            convert ───┤        │
//! │                                                                ▼        │
//! │       cancel: DRAFT / SUBMITTED / APPROVED ──► CANCELLED     BOOKED     │
//! │                                                                         │
//! │  create_revision(locked) ──► new DRAFT, version + 1, same unique_ref_no │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function here mutates the record it is given (or returns a new one)
//! and appends a system message. Persistence, audit and notification are the
//! caller's job. On error the record is left untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::authz::{authorize, authorize_owner, Action};
use crate::currency::CurrencyRateProvider;
use crate::error::{CoreError, CoreResult};
use crate::operator::OperatorAssignment;
use crate::pricing::{compute_breakdown, PricingBreakdown, PricingRules};
use crate::types::{Actor, ItineraryItem, Message, Quote, QuoteStatus};
use crate::validation::{validate_message_content, validate_reason, validate_title};

// =============================================================================
// Inputs
// =============================================================================

/// Everything needed to open a new quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuoteDraft {
    pub title: String,
    pub agent_id: String,
    pub client_name: String,
    pub currency: String,
    pub pax_count: u32,
    pub itinerary: Vec<ItineraryItem>,
    pub pricing_rules: PricingRules,
}

/// A direct edit of a draft. `None` leaves the field as it is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuoteEdit {
    pub title: Option<String>,
    pub client_name: Option<String>,
    pub currency: Option<String>,
    pub pax_count: Option<u32>,
    pub itinerary: Option<Vec<ItineraryItem>>,
    pub pricing_rules: Option<PricingRules>,
}

/// Human reference number shared by a whole revision chain.
///
/// Format: `QT-YYYYMMDD-XXXXXX` (six upper-case hex characters).
pub fn new_reference_number(at: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(6)
        .collect();
    format!("QT-{}-{}", at.format("%Y%m%d"), suffix.to_uppercase())
}

/// Copies breakdown figures onto the quote's price columns.
pub fn apply_breakdown(quote: &mut Quote, breakdown: &PricingBreakdown) {
    quote.cost = breakdown.net_cost;
    quote.price = breakdown.b2b_price;
    quote.selling_price = breakdown.final_price;
}

fn transition(
    quote: &mut Quote,
    target: QuoteStatus,
    action: &str,
    note: String,
    actor: &Actor,
    at: DateTime<Utc>,
) -> CoreResult<()> {
    if !quote.status.can_transition_to(target) {
        return Err(CoreError::invalid_transition(
            "Quote", &quote.id, quote.status, action,
        ));
    }
    quote.status = target;
    quote.messages.push(Message::system(actor, note, at));
    quote.updated_at = at;
    Ok(())
}

// =============================================================================
// Operations
// =============================================================================

/// Opens a new DRAFT quote at version 1 with a fresh reference number.
pub fn create_draft(
    draft: QuoteDraft,
    actor: &Actor,
    rates: &dyn CurrencyRateProvider,
    at: DateTime<Utc>,
) -> CoreResult<Quote> {
    authorize_owner(actor, Action::CreateQuote, &draft.agent_id)?;
    let title = validate_title("title", &draft.title)?;
    let client_name = validate_title("client_name", &draft.client_name)?;

    let breakdown = compute_breakdown(
        &draft.itinerary,
        &draft.pricing_rules,
        draft.pax_count,
        &draft.currency,
        rates,
    )?;

    let mut quote = Quote {
        id: Uuid::new_v4().to_string(),
        unique_ref_no: new_reference_number(at),
        version: 1,
        previous_version_id: None,
        is_locked: false,
        status: QuoteStatus::Draft,
        title,
        agent_id: draft.agent_id,
        client_name,
        currency: draft.currency,
        pax_count: draft.pax_count,
        itinerary: draft.itinerary,
        pricing_rules: draft.pricing_rules,
        cost: breakdown.net_cost,
        price: breakdown.b2b_price,
        selling_price: breakdown.final_price,
        operator: OperatorAssignment::default(),
        messages: Vec::new(),
        created_by: actor.user_id.clone(),
        approved_by: None,
        approved_at: None,
        rejection_reason: None,
        created_at: at,
        updated_at: at,
        record_version: 0,
    };
    quote
        .messages
        .push(Message::system(actor, "Quote created", at));
    Ok(quote)
}

/// Direct edit of a DRAFT quote. Pricing is recomputed from the result.
///
/// ## Errors
/// - `LockedQuoteMutation` if the quote is locked (revise it instead)
/// - `InvalidStateTransition` if the quote is not a draft
pub fn update_quote(
    quote: &mut Quote,
    edit: QuoteEdit,
    actor: &Actor,
    rates: &dyn CurrencyRateProvider,
    at: DateTime<Utc>,
) -> CoreResult<PricingBreakdown> {
    authorize_owner(actor, Action::EditQuote, &quote.agent_id)?;
    if quote.is_locked {
        return Err(CoreError::LockedQuoteMutation {
            quote_id: quote.id.clone(),
        });
    }
    if quote.status != QuoteStatus::Draft {
        return Err(CoreError::invalid_transition(
            "Quote", &quote.id, quote.status, "edit",
        ));
    }

    let title = edit
        .title
        .as_deref()
        .map(|t| validate_title("title", t))
        .transpose()?;
    let client_name = edit
        .client_name
        .as_deref()
        .map(|c| validate_title("client_name", c))
        .transpose()?;
    let currency = edit.currency.unwrap_or_else(|| quote.currency.clone());
    let pax_count = edit.pax_count.unwrap_or(quote.pax_count);
    let itinerary = edit.itinerary.unwrap_or_else(|| quote.itinerary.clone());
    let pricing_rules = edit
        .pricing_rules
        .unwrap_or_else(|| quote.pricing_rules.clone());

    let breakdown = compute_breakdown(&itinerary, &pricing_rules, pax_count, &currency, rates)?;

    if let Some(title) = title {
        quote.title = title;
    }
    if let Some(client_name) = client_name {
        quote.client_name = client_name;
    }
    quote.currency = currency;
    quote.pax_count = pax_count;
    quote.itinerary = itinerary;
    quote.pricing_rules = pricing_rules;
    apply_breakdown(quote, &breakdown);
    quote.updated_at = at;
    Ok(breakdown)
}

/// DRAFT → SUBMITTED.
pub fn submit(quote: &mut Quote, actor: &Actor, at: DateTime<Utc>) -> CoreResult<()> {
    authorize_owner(actor, Action::SubmitQuote, &quote.agent_id)?;
    let note = format!("Quote v{} submitted for approval", quote.version);
    transition(quote, QuoteStatus::Submitted, "submit", note, actor, at)?;
    quote.rejection_reason = None;
    Ok(())
}

/// SUBMITTED → APPROVED. Locks the quote: the itinerary at this moment is
/// the contractual version.
pub fn approve(quote: &mut Quote, actor: &Actor, at: DateTime<Utc>) -> CoreResult<()> {
    authorize(actor, Action::ApproveQuote)?;
    let note = format!("Quote v{} approved", quote.version);
    transition(quote, QuoteStatus::Approved, "approve", note, actor, at)?;
    quote.is_locked = true;
    quote.approved_by = Some(actor.user_id.clone());
    quote.approved_at = Some(at);
    Ok(())
}

/// SUBMITTED → DRAFT with a mandatory reason.
pub fn reject(quote: &mut Quote, reason: &str, actor: &Actor, at: DateTime<Utc>) -> CoreResult<()> {
    authorize(actor, Action::RejectQuote)?;
    if !quote.status.can_transition_to(QuoteStatus::Draft) {
        return Err(CoreError::invalid_transition(
            "Quote", &quote.id, quote.status, "reject",
        ));
    }
    let reason = validate_reason("rejection reason", reason)?;
    transition(
        quote,
        QuoteStatus::Draft,
        "reject",
        format!("Quote rejected: {}", reason),
        actor,
        at,
    )?;
    quote.rejection_reason = Some(reason);
    Ok(())
}

/// DRAFT / SUBMITTED / APPROVED → CANCELLED.
pub fn cancel(
    quote: &mut Quote,
    reason: Option<&str>,
    actor: &Actor,
    at: DateTime<Utc>,
) -> CoreResult<()> {
    authorize(actor, Action::CancelQuote)?;
    let note = match reason {
        Some(reason) => format!(
            "Quote cancelled: {}",
            validate_reason("cancellation reason", reason)?
        ),
        None => "Quote cancelled".to_string(),
    };
    transition(quote, QuoteStatus::Cancelled, "cancel", note, actor, at)
}

/// APPROVED → BOOKED. Called by the booking converter only.
pub(crate) fn mark_booked(
    quote: &mut Quote,
    booking_id: &str,
    actor: &Actor,
    at: DateTime<Utc>,
) -> CoreResult<()> {
    transition(
        quote,
        QuoteStatus::Booked,
        "convert to booking",
        format!("Converted to booking {}", booking_id),
        actor,
        at,
    )
}

/// Creates the next revision of a locked quote. The parent is not touched.
///
/// ## Errors
/// - `RevisionNotAllowed` if the quote is still editable
/// - `InvalidStateTransition` if the quote was cancelled
pub fn create_revision(parent: &Quote, actor: &Actor, at: DateTime<Utc>) -> CoreResult<Quote> {
    authorize(actor, Action::CreateRevision)?;
    if !parent.is_locked {
        return Err(CoreError::RevisionNotAllowed {
            quote_id: parent.id.clone(),
        });
    }
    if parent.status == QuoteStatus::Cancelled {
        return Err(CoreError::invalid_transition(
            "Quote",
            &parent.id,
            parent.status,
            "create revision",
        ));
    }
    Ok(Quote::revision_of(parent, actor, at))
}

/// Appends a chat message. Allowed in every state, locked or not.
pub fn post_message(
    quote: &mut Quote,
    content: &str,
    actor: &Actor,
    at: DateTime<Utc>,
) -> CoreResult<Message> {
    authorize_owner(actor, Action::PostMessage, &quote.agent_id)?;
    let content = validate_message_content(content)?;
    let message = Message::user(actor, content, at);
    quote.messages.push(message.clone());
    quote.updated_at = at;
    Ok(message)
}

/// Orders the quotes of one lineage by version.
pub fn revision_history(mut lineage: Vec<Quote>, unique_ref_no: &str) -> Vec<Quote> {
    lineage.retain(|q| q.unique_ref_no == unique_ref_no);
    lineage.sort_by_key(|q| q.version);
    lineage
}

// =============================================================================
// Unit Tests
// =============================================================================
