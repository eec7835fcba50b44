//! # Booking
//!
//! Quote-to-booking conversion, the booking execution state machine and the
//! payment ledger.
//!
//! ## Conversion
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Quote (APPROVED, locked)            Booking (REQUESTED)                │
//! │  ────────────────────────            ───────────────────                │
//! │  selling_price 153.40   ──ceil──►    total_amount    154                │
//! │                                      advance_amount  ceil(154 × 30%) 47 │
//! │                                      paid_amount     0                  │
//! │                                      balance_amount  154                │
//! │  operator assignment    ──copy──►    operator assignment                │
//! │  status ──► BOOKED (one-way)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Payment Ledger
//! `payments` is append-only. `paid_amount`, `balance_amount` and
//! `credit_notes` are always folded from it:
//!
//! ```text
//! total 1000:  pay 300 ──► paid 300  balance 700
//!              pay 800 ──► paid 1000 balance 0    credit note 100
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::authz::{authorize, authorize_assigned_operator, authorize_owner, Action};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::lifecycle::mark_booked;
use crate::money::{Money, Percent};
use crate::types::{
    Actor, Booking, BookingStatus, CreditNote, Message, PaymentEntry, PaymentMode, PaymentType,
    Quote, QuoteStatus, Traveler,
};
use crate::validation::{
    validate_identifier, validate_message_content, validate_payment_amount, validate_reason,
};

/// Pax/traveler mismatch warning, if any.
fn traveler_warning(pax_count: u32, travelers: usize) -> Option<String> {
    if travelers as u64 == u64::from(pax_count) {
        None
    } else {
        Some(format!(
            "Traveler count {} does not match pax count {}",
            travelers, pax_count
        ))
    }
}

// =============================================================================
// Conversion
// =============================================================================

/// Converts an APPROVED quote into a REQUESTED booking and marks the quote
/// BOOKED.
///
/// A traveler list that does not match the quote's pax count is recorded as
/// a warning on the booking, not rejected.
pub fn from_quote(
    quote: &mut Quote,
    travelers: Vec<Traveler>,
    advance_percent: Percent,
    actor: &Actor,
    at: DateTime<Utc>,
) -> CoreResult<Booking> {
    authorize_owner(actor, Action::ConvertToBooking, &quote.agent_id)?;
    if quote.status != QuoteStatus::Approved {
        return Err(CoreError::invalid_transition(
            "Quote",
            &quote.id,
            quote.status,
            "convert to booking",
        ));
    }
    if advance_percent.is_negative() || advance_percent > Percent::from_whole(100) {
        return Err(ValidationError::OutOfRange {
            field: "advance_percent".to_string(),
            min: 0,
            max: 100,
        }
        .into());
    }

    let total_amount = quote.sale_price();
    let advance_amount = advance_percent.of(total_amount).ceil_whole();
    let warnings: Vec<String> = traveler_warning(quote.pax_count, travelers.len())
        .into_iter()
        .collect();

    let booking_id = Uuid::new_v4().to_string();
    mark_booked(quote, &booking_id, actor, at)?;

    Ok(Booking {
        id: booking_id,
        quote_id: quote.id.clone(),
        unique_ref_no: quote.unique_ref_no.clone(),
        quote_version: quote.version,
        agent_id: quote.agent_id.clone(),
        currency: quote.currency.clone(),
        pax_count: quote.pax_count,
        travelers,
        status: BookingStatus::Requested,
        cancellation_requested_from: None,
        total_amount,
        advance_amount,
        paid_amount: Money::zero(),
        balance_amount: total_amount,
        net_cost: quote.cost,
        b2b_price: quote.price,
        payments: Vec::new(),
        credit_notes: Vec::new(),
        operator: quote.operator.clone(),
        messages: vec![Message::system(
            actor,
            format!("Booking requested from quote {} v{}", quote.unique_ref_no, quote.version),
            at,
        )],
        warnings,
        created_by: actor.user_id.clone(),
        created_at: at,
        updated_at: at,
        record_version: 0,
    })
}

// =============================================================================
// Booking State Machine
// =============================================================================

fn transition(
    booking: &mut Booking,
    target: BookingStatus,
    action: &str,
    note: String,
    actor: &Actor,
    at: DateTime<Utc>,
) -> CoreResult<()> {
    if !booking.status.can_transition_to(target) {
        return Err(CoreError::invalid_transition(
            "Booking",
            &booking.id,
            booking.status,
            action,
        ));
    }
    booking.status = target;
    booking.messages.push(Message::system(actor, note, at));
    booking.updated_at = at;
    Ok(())
}

/// REQUESTED → CONFIRMED.
pub fn confirm(booking: &mut Booking, actor: &Actor, at: DateTime<Utc>) -> CoreResult<()> {
    authorize(actor, Action::ConfirmBooking)?;
    if booking.status != BookingStatus::Requested {
        return Err(CoreError::invalid_transition(
            "Booking", &booking.id, booking.status, "confirm",
        ));
    }
    transition(booking, BookingStatus::Confirmed, "confirm", "Booking confirmed".into(), actor, at)
}

/// REQUESTED → REJECTED.
pub fn reject(booking: &mut Booking, reason: &str, actor: &Actor, at: DateTime<Utc>) -> CoreResult<()> {
    authorize(actor, Action::RejectBooking)?;
    let reason = validate_reason("rejection reason", reason)?;
    transition(
        booking,
        BookingStatus::Rejected,
        "reject",
        format!("Booking rejected: {}", reason),
        actor,
        at,
    )
}

/// REQUESTED / CONFIRMED → CANCELLATION_REQUESTED. Raised by the agent.
pub fn request_cancellation(
    booking: &mut Booking,
    reason: &str,
    actor: &Actor,
    at: DateTime<Utc>,
) -> CoreResult<()> {
    authorize_owner(actor, Action::RequestBookingCancellation, &booking.agent_id)?;
    let reason = validate_reason("cancellation reason", reason)?;
    let from = booking.status;
    transition(
        booking,
        BookingStatus::CancellationRequested,
        "request cancellation",
        format!("Cancellation requested: {}", reason),
        actor,
        at,
    )?;
    booking.cancellation_requested_from = Some(from);
    Ok(())
}

/// CANCELLATION_REQUESTED → CANCELLED when approved. A declined request
/// puts the booking back where it was, so a REQUESTED booking is never
/// confirmed by a decline.
pub fn resolve_cancellation(
    booking: &mut Booking,
    approve: bool,
    actor: &Actor,
    at: DateTime<Utc>,
) -> CoreResult<()> {
    authorize(actor, Action::ResolveCancellation)?;
    if booking.status != BookingStatus::CancellationRequested {
        return Err(CoreError::invalid_transition(
            "Booking",
            &booking.id,
            booking.status,
            "resolve cancellation",
        ));
    }
    let (target, verb, note) = if approve {
        (BookingStatus::Cancelled, "approve cancellation", "Cancellation approved")
    } else {
        let restored = booking
            .cancellation_requested_from
            .unwrap_or(BookingStatus::Confirmed);
        (restored, "decline cancellation", "Cancellation request declined")
    };
    transition(booking, target, verb, note.into(), actor, at)?;
    booking.cancellation_requested_from = None;
    Ok(())
}

/// Direct staff cancellation of a REQUESTED or CONFIRMED booking.
pub fn cancel(booking: &mut Booking, reason: &str, actor: &Actor, at: DateTime<Utc>) -> CoreResult<()> {
    authorize(actor, Action::CancelBooking)?;
    if !matches!(booking.status, BookingStatus::Requested | BookingStatus::Confirmed) {
        return Err(CoreError::invalid_transition(
            "Booking", &booking.id, booking.status, "cancel",
        ));
    }
    let reason = validate_reason("cancellation reason", reason)?;
    transition(
        booking,
        BookingStatus::Cancelled,
        "cancel",
        format!("Booking cancelled: {}", reason),
        actor,
        at,
    )
}

/// CONFIRMED → IN_PROGRESS. Only the assigned operator, only once accepted.
pub fn start_trip(booking: &mut Booking, actor: &Actor, at: DateTime<Utc>) -> CoreResult<()> {
    authorize_assigned_operator(actor, Action::StartTrip, &booking.operator)?;
    if booking.status == BookingStatus::Confirmed && !booking.operator.is_accepted() {
        return Err(CoreError::invalid_transition(
            "Booking",
            &booking.id,
            format!("{} with operator {}", booking.status, booking.operator.status),
            "start trip",
        ));
    }
    if booking.status != BookingStatus::Confirmed {
        return Err(CoreError::invalid_transition(
            "Booking", &booking.id, booking.status, "start trip",
        ));
    }
    transition(booking, BookingStatus::InProgress, "start trip", "Trip started".into(), actor, at)
}

/// IN_PROGRESS → COMPLETED. The assigned operator or staff.
pub fn complete_trip(booking: &mut Booking, actor: &Actor, at: DateTime<Utc>) -> CoreResult<()> {
    authorize_assigned_operator(actor, Action::CompleteTrip, &booking.operator)?;
    transition(
        booking,
        BookingStatus::Completed,
        "complete trip",
        "Trip completed".into(),
        actor,
        at,
    )
}

/// Appends a chat message to the booking thread. Allowed in every status.
pub fn post_message(
    booking: &mut Booking,
    content: &str,
    actor: &Actor,
    at: DateTime<Utc>,
) -> CoreResult<Message> {
    authorize_owner(actor, Action::PostMessage, &booking.agent_id)?;
    let content = validate_message_content(content)?;
    let message = Message::user(actor, content, at);
    booking.messages.push(message.clone());
    booking.updated_at = at;
    Ok(message)
}

// =============================================================================
// Payment Ledger
// =============================================================================

/// A payment as submitted by the caller, before a receipt is issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewPayment {
    pub id: String,
    pub amount: Money,
    pub payment_type: PaymentType,
    pub mode: PaymentMode,
    pub reference: Option<String>,
}

/// Figures folded from a payment ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerTotals {
    pub paid: Money,
    pub balance: Money,
    pub credit_notes: Vec<CreditNote>,
}

/// Folds a ledger against a booking total.
///
/// Paid caps at `total`, balance floors at zero, and every payment that
/// pushes the running sum past `total` yields a credit note for its excess.
pub fn fold_payments(total: Money, payments: &[PaymentEntry]) -> LedgerTotals {
    let mut running = Money::zero();
    let mut credit_notes = Vec::new();

    for payment in payments {
        let before_excess = (running - total).floor_at_zero();
        running += payment.amount;
        let after_excess = (running - total).floor_at_zero();
        let excess = after_excess - before_excess;
        if excess.is_positive() {
            credit_notes.push(CreditNote {
                payment_id: payment.id.clone(),
                amount: excess,
                created_at: payment.recorded_at,
            });
        }
    }

    LedgerTotals {
        paid: if running > total { total } else { running },
        balance: (total - running).floor_at_zero(),
        credit_notes,
    }
}

/// Receipt number for a company sequence value.
///
/// ```rust
/// use tripdesk_core::booking::receipt_number;
///
/// assert_eq!(receipt_number("TD", 42), "RCPT-TD-000042");
/// ```
pub fn receipt_number(company_id: &str, sequence: u64) -> String {
    format!("RCPT-{}-{:06}", company_id, sequence)
}

/// Checks a payment against the booking without changing anything.
///
/// Run before the payment is verified or a wallet is debited so a replayed
/// payment id never reaches either.
pub fn validate_payment(booking: &Booking, payment: &NewPayment, actor: &Actor) -> CoreResult<()> {
    authorize(actor, Action::RecordPayment)?;
    validate_identifier("payment_id", &payment.id)?;
    validate_payment_amount(payment.amount)?;

    if !booking.status.accepts_payments() {
        return Err(CoreError::invalid_transition(
            "Booking",
            &booking.id,
            booking.status,
            "record payment",
        ));
    }
    if booking.payments.iter().any(|p| p.id == payment.id) {
        return Err(ValidationError::Duplicate {
            field: "payment_id".to_string(),
            value: payment.id.clone(),
        }
        .into());
    }
    Ok(())
}

/// Appends a verified payment and refolds the ledger.
///
/// Returns the appended entry and the credit note it produced, if any.
pub fn record_payment(
    booking: &mut Booking,
    payment: NewPayment,
    receipt_number: String,
    actor: &Actor,
    at: DateTime<Utc>,
) -> CoreResult<(PaymentEntry, Option<CreditNote>)> {
    validate_payment(booking, &payment, actor)?;

    let entry = PaymentEntry {
        id: payment.id,
        amount: payment.amount,
        payment_type: payment.payment_type,
        mode: payment.mode,
        reference: payment.reference,
        receipt_number,
        recorded_by: actor.user_id.clone(),
        recorded_at: at,
    };
    booking.payments.push(entry.clone());

    let totals = fold_payments(booking.total_amount, &booking.payments);
    let credit_note = totals
        .credit_notes
        .iter()
        .find(|note| note.payment_id == entry.id)
        .cloned();
    booking.paid_amount = totals.paid;
    booking.balance_amount = totals.balance;
    booking.credit_notes = totals.credit_notes;

    let note = match &credit_note {
        Some(credit) => format!(
            "Payment {} of {} {} recorded ({}); credit note {}",
            entry.id, entry.amount, booking.currency, entry.receipt_number, credit.amount
        ),
        None => format!(
            "Payment {} of {} {} recorded ({})",
            entry.id, entry.amount, booking.currency, entry.receipt_number
        ),
    };
    booking.messages.push(Message::system(actor, note, at));
    booking.updated_at = at;

    Ok((entry, credit_note))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{agent, approved_quote, sample_quote, staff};
    use crate::operator::{accept, assign, AssignmentRequest};
    use crate::types::Role;
    use rust_decimal_macros::dec;

    fn operator() -> Actor {
        Actor::new("op-1", "Kiran", Role::Operator)
    }

    fn booked() -> Booking {
        let mut quote = approved_quote();
        from_quote(
            &mut quote,
            vec![Traveler::named("A"), Traveler::named("B")],
            Percent::from_whole(30),
            &agent(),
            Utc::now(),
        )
        .unwrap()
    }

    fn with_total(total: i64) -> Booking {
        let mut booking = booked();
        booking.total_amount = Money::from_major(total);
        booking.balance_amount = Money::from_major(total);
        booking
    }

    fn payment(id: &str, amount: i64) -> NewPayment {
        NewPayment {
            id: id.to_string(),
            amount: Money::from_major(amount),
            payment_type: PaymentType::Partial,
            mode: PaymentMode::BankTransfer,
            reference: None,
        }
    }

    fn pay(booking: &mut Booking, id: &str, amount: i64) -> CoreResult<Option<CreditNote>> {
        let seq = booking.payments.len() as u64 + 1;
        record_payment(booking, payment(id, amount), receipt_number("TD", seq), &staff(), Utc::now())
            .map(|(_, credit)| credit)
    }

    #[test]
    fn test_conversion() {
        let mut quote = approved_quote();
        let booking = from_quote(
            &mut quote,
            vec![Traveler::named("A"), Traveler::named("B")],
            Percent::from_whole(30),
            &agent(),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(quote.status, QuoteStatus::Booked);
        assert_eq!(booking.status, BookingStatus::Requested);
        assert_eq!(booking.quote_id, quote.id);
        assert_eq!(booking.total_amount, Money::from_major(154));
        assert_eq!(booking.advance_amount, Money::from_major(47));
        assert_eq!(booking.balance_amount, booking.total_amount);
        assert!(booking.paid_amount.is_zero());
        assert!(booking.warnings.is_empty());
    }

    #[test]
    fn test_conversion_requires_approved() {
        let mut quote = sample_quote();
        let err = from_quote(&mut quote, vec![], Percent::from_whole(30), &agent(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));
        assert_eq!(quote.status, QuoteStatus::Draft);
    }

    #[test]
    fn test_traveler_mismatch_is_a_warning() {
        let mut quote = approved_quote();
        let booking = from_quote(
            &mut quote,
            vec![Traveler::named("A")],
            Percent::from_whole(30),
            &agent(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(booking.warnings.len(), 1);
    }

    #[test]
    fn test_booking_copies_operator() {
        let mut quote = approved_quote();
        assign(
            &mut quote,
            AssignmentRequest {
                operator_id: "op-1".to_string(),
                operator_price: Some(Money::from_major(90)),
                net_cost_visible_to_operator: true,
            },
            &staff(),
            Utc::now(),
        )
        .unwrap();
        let booking = from_quote(&mut quote, vec![], Percent::from_whole(30), &agent(), Utc::now())
            .unwrap();
        assert_eq!(booking.operator, quote.operator);
    }

    #[test]
    fn test_overpayment_creates_credit_note() {
        let mut booking = with_total(1000);
        assert!(pay(&mut booking, "pay-1", 300).unwrap().is_none());
        let credit = pay(&mut booking, "pay-2", 800).unwrap().unwrap();

        assert_eq!(booking.paid_amount, Money::from_major(1000));
        assert_eq!(booking.balance_amount, Money::zero());
        assert_eq!(credit.amount, Money::from_major(100));
        assert_eq!(credit.payment_id, "pay-2");
        assert_eq!(booking.credit_notes.len(), 1);
    }

    #[test]
    fn test_duplicate_payment_applied_once() {
        let mut booking = with_total(1000);
        pay(&mut booking, "pay-1", 300).unwrap();

        let err = pay(&mut booking, "pay-1", 300).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::Duplicate { .. })
        ));
        assert_eq!(booking.payments.len(), 1);
        assert_eq!(booking.paid_amount, Money::from_major(300));
        assert_eq!(booking.balance_amount, Money::from_major(700));
    }

    #[test]
    fn test_balance_invariant_over_sequence() {
        let mut booking = with_total(500);
        for (i, amount) in [120, 80, 0, 250, 75, 60].iter().enumerate() {
            let _ = pay(&mut booking, &format!("pay-{}", i), *amount);
            let sum: Money = booking.payments.iter().map(|p| p.amount).sum();
            let credit: Money = booking.credit_notes.iter().map(|c| c.amount).sum();

            assert!(!booking.balance_amount.is_negative());
            assert!(booking.paid_amount <= booking.total_amount);
            assert_eq!(booking.paid_amount + credit, sum);
            assert_eq!(
                booking.balance_amount,
                (booking.total_amount - sum).floor_at_zero()
            );
        }
        assert_eq!(booking.payments.len(), 5);
    }

    #[test]
    fn test_payment_rules() {
        let mut booking = with_total(1000);
        let err = pay(&mut booking, "pay-0", -5).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let err = record_payment(
            &mut booking,
            payment("pay-1", 10),
            receipt_number("TD", 1),
            &agent(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));

        cancel(&mut booking, "Client withdrew", &staff(), Utc::now()).unwrap();
        let err = pay(&mut booking, "pay-2", 10).unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_fractional_fold() {
        let total = Money::new(dec!(99.5));
        let entries: Vec<PaymentEntry> = [dec!(50.25), dec!(50.25)]
            .iter()
            .enumerate()
            .map(|(i, amount)| PaymentEntry {
                id: format!("p{}", i),
                amount: Money::new(*amount),
                payment_type: PaymentType::Partial,
                mode: PaymentMode::Card,
                reference: None,
                receipt_number: receipt_number("TD", i as u64),
                recorded_by: "staff-1".to_string(),
                recorded_at: Utc::now(),
            })
            .collect();
        let totals = fold_payments(total, &entries);
        assert_eq!(totals.paid, total);
        assert_eq!(totals.credit_notes[0].amount, Money::new(dec!(1.0)));
    }

    #[test]
    fn test_execution_flow() {
        let mut booking = booked();
        booking.operator.operator_id = Some("op-1".to_string());
        booking.operator.status = crate::operator::OperatorStatus::Assigned;

        confirm(&mut booking, &staff(), Utc::now()).unwrap();

        let err = start_trip(&mut booking, &operator(), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));

        accept(&mut booking, &operator(), Utc::now()).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);

        start_trip(&mut booking, &operator(), Utc::now()).unwrap();
        complete_trip(&mut booking, &operator(), Utc::now()).unwrap();
        assert_eq!(booking.status, BookingStatus::Completed);
    }

    #[test]
    fn test_cancellation_request_flow() {
        let mut booking = booked();
        confirm(&mut booking, &staff(), Utc::now()).unwrap();

        request_cancellation(&mut booking, "Flight cancelled", &agent(), Utc::now()).unwrap();
        assert_eq!(booking.status, BookingStatus::CancellationRequested);

        resolve_cancellation(&mut booking, false, &staff(), Utc::now()).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);

        request_cancellation(&mut booking, "Still cancelled", &agent(), Utc::now()).unwrap();
        resolve_cancellation(&mut booking, true, &staff(), Utc::now()).unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert!(booking.cancellation_requested_from.is_none());
    }

    #[test]
    fn test_declined_request_keeps_unconfirmed_booking_unconfirmed() {
        let mut booking = booked();
        assert_eq!(booking.status, BookingStatus::Requested);

        request_cancellation(&mut booking, "Dates changed", &agent(), Utc::now()).unwrap();
        assert_eq!(
            booking.cancellation_requested_from,
            Some(BookingStatus::Requested)
        );

        resolve_cancellation(&mut booking, false, &staff(), Utc::now()).unwrap();
        assert_eq!(booking.status, BookingStatus::Requested);
        assert!(booking.cancellation_requested_from.is_none());

        // staff still have to confirm it themselves
        confirm(&mut booking, &staff(), Utc::now()).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_agent_cannot_confirm_or_cancel_directly() {
        let mut booking = booked();
        let err = confirm(&mut booking, &agent(), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));
        let err = cancel(&mut booking, "no", &agent(), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));
    }

    #[test]
    fn test_reject_only_from_requested() {
        let mut booking = booked();
        confirm(&mut booking, &staff(), Utc::now()).unwrap();
        let err = reject(&mut booking, "No availability", &staff(), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_post_message_on_booking() {
        let mut booking = booked();
        confirm(&mut booking, &staff(), Utc::now()).unwrap();
        let before = booking.messages.len();

        let msg = post_message(&mut booking, "Pickup at 9am", &agent(), Utc::now()).unwrap();
        assert!(!msg.is_system);
        assert_eq!(booking.messages.len(), before + 1);

        let err = post_message(&mut booking, "   ", &agent(), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        let outsider = Actor::new("agent-2", "Meera", Role::Agent);
        assert!(post_message(&mut booking, "hi", &outsider, Utc::now()).is_err());
    }
}
