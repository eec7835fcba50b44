//! # Quote Desk
//!
//! The service layer. Every mutating operation follows the same pipeline:
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐   ┌───────┐   ┌────────┐
//! │ load     │──►│ core rule    │──►│ save (CAS on │──►│ audit │──►│ notify │
//! │ record   │   │ (pure, authz)│   │ record_ver.) │   │       │   │        │
//! └──────────┘   └──────────────┘   └──────────────┘   └───────┘   └────────┘
//!                       │ Err               │ conflict
//!                       ▼                   ▼
//!                 nothing stored     nothing stored, caller reloads
//! ```
//!
//! Every write against an existing record takes the `record_version` the
//! caller last read (from the record or its view). A stale version is
//! refused with `ConcurrentModification` before any rule runs.
//!
//! A failed audit write fails the operation even though the record is
//! already saved; notifications never fail anything.
//!
//! ## Example
//! ```rust,ignore
//! // back-office desk: every payment is keyed in by staff
//! let desk = QuoteDesk::new(
//!     Collaborators::sqlite(&db, rates, Arc::new(ManualPaymentVerifier)),
//!     DeskSettings::from_config(&config),
//! );
//! let quote = desk.create_quote(draft, &agent).await?;
//! desk.submit_quote(&quote.id, quote.record_version, &agent).await?;
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tripdesk_core::audit::{AuditAction, AuditLogEntry, EntityType};
use tripdesk_core::authz::{authorize, authorize_view, Action};
use tripdesk_core::booking::{self as booking_rules, NewPayment};
use tripdesk_core::currency::{CurrencyRateProvider, RateTable};
use tripdesk_core::lifecycle::{self, QuoteDraft, QuoteEdit};
use tripdesk_core::operator::{self, AssignmentRequest, DriverDetails, OperatorAssignment};
use tripdesk_core::ports::{
    AuditSink, Notification, Notifier, PaymentVerifier, ReceiptSequence, Repository, Versioned,
};
use tripdesk_core::pricing::PricingBreakdown;
use tripdesk_core::visibility::{self, BookingView, QuoteView};
use tripdesk_core::wallet::{AgentWallet, WalletTransaction};
use tripdesk_core::{
    Actor, Booking, CoreError, CoreResult, CreditNote, Message, Money, PaymentEntry, PaymentMode,
    Percent, Quote, Role, Traveler, ValidationError, DEFAULT_ADVANCE_PERCENT, DEFAULT_COMPANY_ID,
};
use tripdesk_db::{
    Database, InMemoryAuditLog, InMemoryReceiptSequence, InMemoryRepository,
};

use crate::config::EngineConfig;
use crate::notifier::TracingNotifier;

// =============================================================================
// Wiring
// =============================================================================

/// The ports a desk talks to.
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub quotes: Arc<dyn Repository<Quote>>,
    pub bookings: Arc<dyn Repository<Booking>>,
    pub wallets: Arc<dyn Repository<AgentWallet>>,
    pub rates: Arc<dyn CurrencyRateProvider>,
    pub payments: Arc<dyn PaymentVerifier>,
    pub notifier: Arc<dyn Notifier>,
    pub audit: Arc<dyn AuditSink>,
    pub receipts: Arc<dyn ReceiptSequence>,
}

impl Collaborators {
    /// SQLite-backed stores with log notifications.
    ///
    /// There is no default verifier: whoever wires the desk decides which
    /// payments count as verified.
    pub fn sqlite(db: &Database, rates: RateTable, payments: Arc<dyn PaymentVerifier>) -> Self {
        Collaborators {
            quotes: Arc::new(db.quotes()),
            bookings: Arc::new(db.bookings()),
            wallets: Arc::new(db.wallets()),
            rates: Arc::new(rates),
            payments,
            notifier: Arc::new(TracingNotifier::new()),
            audit: Arc::new(db.audit_log()),
            receipts: Arc::new(db.receipt_sequences()),
        }
    }

    /// Throwaway in-memory stores.
    pub fn in_memory(rates: RateTable, payments: Arc<dyn PaymentVerifier>) -> Self {
        Collaborators {
            quotes: Arc::new(InMemoryRepository::<Quote>::new()),
            bookings: Arc::new(InMemoryRepository::<Booking>::new()),
            wallets: Arc::new(InMemoryRepository::<AgentWallet>::new()),
            rates: Arc::new(rates),
            payments,
            notifier: Arc::new(TracingNotifier::new()),
            audit: Arc::new(InMemoryAuditLog::new()),
            receipts: Arc::new(InMemoryReceiptSequence::new()),
        }
    }
}

/// Business settings the desk needs from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DeskSettings {
    pub company_id: String,
    pub advance_percent: Percent,
    pub notifications_enabled: bool,
    pub staff_recipients: Vec<String>,
    pub link_base_url: Option<String>,
}

impl DeskSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        DeskSettings {
            company_id: config.company.id.clone(),
            advance_percent: config.advance_percent(),
            notifications_enabled: config.notifications.enabled,
            staff_recipients: config.notifications.staff_recipients.clone(),
            link_base_url: config.notifications.link_base_url.clone(),
        }
    }
}

impl Default for DeskSettings {
    fn default() -> Self {
        DeskSettings {
            company_id: DEFAULT_COMPANY_ID.to_string(),
            advance_percent: Percent::from_whole(DEFAULT_ADVANCE_PERCENT),
            notifications_enabled: true,
            staff_recipients: vec!["staff".to_string()],
            link_base_url: None,
        }
    }
}

/// Which record an operator action targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRef {
    Quote(String),
    Booking(String),
}

/// Outcome of [`QuoteDesk::record_payment`].
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub entry: PaymentEntry,
    pub credit_note: Option<CreditNote>,
    /// Present when the payment was drawn from the agent's wallet.
    pub wallet_transaction: Option<WalletTransaction>,
    pub booking: Booking,
}

// =============================================================================
// Desk
// =============================================================================

#[derive(Debug, Clone)]
pub struct QuoteDesk {
    c: Collaborators,
    settings: DeskSettings,
}

impl QuoteDesk {
    pub fn new(collaborators: Collaborators, settings: DeskSettings) -> Self {
        QuoteDesk {
            c: collaborators,
            settings,
        }
    }

    pub fn settings(&self) -> &DeskSettings {
        &self.settings
    }

    // -------------------------------------------------------------------------
    // Quotes
    // -------------------------------------------------------------------------

    pub async fn create_quote(&self, draft: QuoteDraft, actor: &Actor) -> CoreResult<Quote> {
        let at = Utc::now();
        let quote = lifecycle::create_draft(draft, actor, self.c.rates.as_ref(), at)?;
        let quote = self.c.quotes.save(quote, 0).await?;
        self.audit(
            EntityType::Quote,
            &quote.id,
            AuditAction::Created,
            None,
            Some(&quote),
            actor,
            at,
        )
        .await?;

        info!(
            quote_id = %quote.id,
            reference = %quote.unique_ref_no,
            agent = %quote.agent_id,
            price = %visibility::display_price(&quote),
            "Quote created"
        );
        Ok(quote)
    }

    /// Edits a draft and returns the recomputed breakdown.
    pub async fn update_quote(
        &self,
        quote_id: &str,
        expected_version: u64,
        edit: QuoteEdit,
        actor: &Actor,
    ) -> CoreResult<(Quote, PricingBreakdown)> {
        let rates = self.c.rates.clone();
        self.mutate(
            self.c.quotes.as_ref(),
            EntityType::Quote,
            quote_id,
            Some(expected_version),
            AuditAction::Updated,
            actor,
            move |q: &mut Quote, at| lifecycle::update_quote(q, edit, actor, rates.as_ref(), at),
        )
        .await
    }

    pub async fn submit_quote(
        &self,
        quote_id: &str,
        expected_version: u64,
        actor: &Actor,
    ) -> CoreResult<Quote> {
        let (quote, ()) = self
            .mutate(
                self.c.quotes.as_ref(),
                EntityType::Quote,
                quote_id,
                Some(expected_version),
                AuditAction::Submitted,
                actor,
                |q: &mut Quote, at| lifecycle::submit(q, actor, at),
            )
            .await?;

        self.notify(
            actor,
            self.staff(),
            "Quote submitted",
            format!(
                "{} v{} ({}) is waiting for review",
                quote.unique_ref_no, quote.version, quote.title
            ),
            quote_link(&quote.id),
        )
        .await;
        Ok(quote)
    }

    pub async fn approve_quote(
        &self,
        quote_id: &str,
        expected_version: u64,
        actor: &Actor,
    ) -> CoreResult<Quote> {
        let (quote, ()) = self
            .mutate(
                self.c.quotes.as_ref(),
                EntityType::Quote,
                quote_id,
                Some(expected_version),
                AuditAction::Approved,
                actor,
                |q: &mut Quote, at| lifecycle::approve(q, actor, at),
            )
            .await?;

        info!(
            quote_id = %quote.id,
            reference = %quote.unique_ref_no,
            version = quote.version,
            price = %visibility::display_price(&quote),
            "Quote approved"
        );
        self.notify(
            actor,
            vec![quote.agent_id.clone()],
            "Quote approved",
            format!("{} v{} is approved and locked", quote.unique_ref_no, quote.version),
            quote_link(&quote.id),
        )
        .await;
        Ok(quote)
    }

    pub async fn reject_quote(
        &self,
        quote_id: &str,
        expected_version: u64,
        reason: &str,
        actor: &Actor,
    ) -> CoreResult<Quote> {
        let (quote, ()) = self
            .mutate(
                self.c.quotes.as_ref(),
                EntityType::Quote,
                quote_id,
                Some(expected_version),
                AuditAction::Rejected,
                actor,
                |q: &mut Quote, at| lifecycle::reject(q, reason, actor, at),
            )
            .await?;

        self.notify(
            actor,
            vec![quote.agent_id.clone()],
            "Quote returned",
            format!("{} v{} was sent back: {}", quote.unique_ref_no, quote.version, reason.trim()),
            quote_link(&quote.id),
        )
        .await;
        Ok(quote)
    }

    pub async fn cancel_quote(
        &self,
        quote_id: &str,
        expected_version: u64,
        reason: Option<&str>,
        actor: &Actor,
    ) -> CoreResult<Quote> {
        let (quote, ()) = self
            .mutate(
                self.c.quotes.as_ref(),
                EntityType::Quote,
                quote_id,
                Some(expected_version),
                AuditAction::Cancelled,
                actor,
                |q: &mut Quote, at| lifecycle::cancel(q, reason, actor, at),
            )
            .await?;

        self.notify(
            actor,
            vec![quote.agent_id.clone()],
            "Quote cancelled",
            format!("{} v{} was cancelled", quote.unique_ref_no, quote.version),
            quote_link(&quote.id),
        )
        .await;
        Ok(quote)
    }

    /// Creates the next version of a locked quote.
    ///
    /// Only the latest version of a lineage may be revised, so the chain
    /// stays linear.
    pub async fn create_revision(&self, quote_id: &str, actor: &Actor) -> CoreResult<Quote> {
        let at = Utc::now();
        let parent = self.load(self.c.quotes.as_ref(), quote_id).await?;
        let revision = lifecycle::create_revision(&parent, actor, at)?;

        let reference = parent.unique_ref_no.clone();
        let latest = self
            .c
            .quotes
            .query(&|q: &Quote| q.unique_ref_no == reference)
            .await?
            .into_iter()
            .map(|q| q.version)
            .max()
            .unwrap_or(parent.version);
        if latest > parent.version {
            return Err(CoreError::invalid_transition(
                "Quote",
                &parent.id,
                format!("superseded by v{}", latest),
                "create revision",
            ));
        }

        let revision = self.c.quotes.save(revision, 0).await?;
        self.audit(
            EntityType::Quote,
            &revision.id,
            AuditAction::RevisionCreated,
            None,
            Some(&revision),
            actor,
            at,
        )
        .await?;

        info!(
            quote_id = %revision.id,
            reference = %revision.unique_ref_no,
            version = revision.version,
            parent = %parent.id,
            "Revision created"
        );
        self.notify(
            actor,
            vec![revision.agent_id.clone()],
            "New quote revision",
            format!("{} v{} opened for editing", revision.unique_ref_no, revision.version),
            quote_link(&revision.id),
        )
        .await;
        Ok(revision)
    }

    pub async fn post_quote_message(
        &self,
        quote_id: &str,
        expected_version: u64,
        content: &str,
        actor: &Actor,
    ) -> CoreResult<Message> {
        let (quote, message) = self
            .mutate(
                self.c.quotes.as_ref(),
                EntityType::Quote,
                quote_id,
                Some(expected_version),
                AuditAction::MessagePosted,
                actor,
                |q: &mut Quote, at| {
                    authorize_view(actor, &q.agent_id, &q.operator)?;
                    lifecycle::post_message(q, content, actor, at)
                },
            )
            .await?;

        self.notify(
            actor,
            thread_recipients(&quote.agent_id, &quote.operator, self.staff()),
            "New message",
            format!("New message on {} v{}", quote.unique_ref_no, quote.version),
            quote_link(&quote.id),
        )
        .await;
        Ok(message)
    }

    /// The quote as `viewer` may see it.
    pub async fn quote_view(&self, quote_id: &str, viewer: &Actor) -> CoreResult<QuoteView> {
        let quote = self.load(self.c.quotes.as_ref(), quote_id).await?;
        authorize_view(viewer, &quote.agent_id, &quote.operator)?;
        Ok(visibility::quote_view(viewer, &quote))
    }

    /// Every version of a lineage `viewer` may see, oldest first.
    pub async fn revision_history(
        &self,
        unique_ref_no: &str,
        viewer: &Actor,
    ) -> CoreResult<Vec<QuoteView>> {
        let lineage = self
            .c
            .quotes
            .query(&|q: &Quote| q.unique_ref_no == unique_ref_no)
            .await?;

        Ok(lifecycle::revision_history(lineage, unique_ref_no)
            .iter()
            .filter(|q| authorize_view(viewer, &q.agent_id, &q.operator).is_ok())
            .map(|q| visibility::quote_view(viewer, q))
            .collect())
    }

    /// Unredacted record for back-office tooling.
    pub async fn quote(&self, quote_id: &str) -> CoreResult<Quote> {
        self.load(self.c.quotes.as_ref(), quote_id).await
    }

    // -------------------------------------------------------------------------
    // Bookings
    // -------------------------------------------------------------------------

    /// Turns an APPROVED quote into a REQUESTED booking.
    ///
    /// The quote is saved first; its compare-and-swap makes a second
    /// conversion of the same quote fail before any booking is written.
    pub async fn convert_to_booking(
        &self,
        quote_id: &str,
        expected_version: u64,
        travelers: Vec<Traveler>,
        actor: &Actor,
    ) -> CoreResult<Booking> {
        let advance = self.settings.advance_percent;
        let (quote, booking) = self
            .mutate(
                self.c.quotes.as_ref(),
                EntityType::Quote,
                quote_id,
                Some(expected_version),
                AuditAction::ConvertedToBooking,
                actor,
                move |q: &mut Quote, at| booking_rules::from_quote(q, travelers, advance, actor, at),
            )
            .await?;

        let booking = self.c.bookings.save(booking, 0).await?;
        self.audit(
            EntityType::Booking,
            &booking.id,
            AuditAction::Created,
            None,
            Some(&booking),
            actor,
            booking.created_at,
        )
        .await?;

        for warning in &booking.warnings {
            warn!(booking_id = %booking.id, warning = %warning, "Booking created with warning");
        }
        info!(
            booking_id = %booking.id,
            quote_id = %quote.id,
            total = %booking.total_amount,
            advance = %booking.advance_amount,
            "Quote converted to booking"
        );

        self.notify(
            actor,
            self.staff(),
            "Booking requested",
            format!(
                "{} v{} was booked for {} travelers",
                quote.unique_ref_no,
                quote.version,
                booking.travelers.len()
            ),
            booking_link(&booking.id),
        )
        .await;
        Ok(booking)
    }

    pub async fn confirm_booking(
        &self,
        booking_id: &str,
        expected_version: u64,
        actor: &Actor,
    ) -> CoreResult<Booking> {
        let booking = self
            .booking_transition(
                booking_id,
                expected_version,
                AuditAction::StatusChanged,
                actor,
                |b, at| booking_rules::confirm(b, actor, at),
            )
            .await?;
        self.notify_agent(actor, &booking, "Booking confirmed", "is confirmed")
            .await;
        Ok(booking)
    }

    pub async fn reject_booking(
        &self,
        booking_id: &str,
        expected_version: u64,
        reason: &str,
        actor: &Actor,
    ) -> CoreResult<Booking> {
        let booking = self
            .booking_transition(
                booking_id,
                expected_version,
                AuditAction::Rejected,
                actor,
                |b, at| booking_rules::reject(b, reason, actor, at),
            )
            .await?;
        self.notify_agent(actor, &booking, "Booking rejected", "was rejected")
            .await;
        Ok(booking)
    }

    pub async fn request_cancellation(
        &self,
        booking_id: &str,
        expected_version: u64,
        reason: &str,
        actor: &Actor,
    ) -> CoreResult<Booking> {
        let booking = self
            .booking_transition(
                booking_id,
                expected_version,
                AuditAction::StatusChanged,
                actor,
                |b, at| booking_rules::request_cancellation(b, reason, actor, at),
            )
            .await?;
        self.notify(
            actor,
            self.staff(),
            "Cancellation requested",
            format!("Cancellation requested for {}: {}", booking.unique_ref_no, reason.trim()),
            booking_link(&booking.id),
        )
        .await;
        Ok(booking)
    }

    /// Approves (CANCELLED) or declines a pending request. A declined request
    /// returns the booking to the status it had when the request was raised.
    pub async fn resolve_cancellation(
        &self,
        booking_id: &str,
        expected_version: u64,
        approve: bool,
        actor: &Actor,
    ) -> CoreResult<Booking> {
        let action = if approve {
            AuditAction::Cancelled
        } else {
            AuditAction::StatusChanged
        };
        let booking = self
            .booking_transition(
                booking_id,
                expected_version,
                action,
                actor,
                |b, at| booking_rules::resolve_cancellation(b, approve, actor, at),
            )
            .await?;

        let (title, outcome) = if approve {
            ("Cancellation approved", "was cancelled".to_string())
        } else {
            ("Cancellation declined", format!("stays {}", booking.status))
        };
        self.notify_agent(actor, &booking, title, &outcome).await;
        Ok(booking)
    }

    pub async fn cancel_booking(
        &self,
        booking_id: &str,
        expected_version: u64,
        reason: &str,
        actor: &Actor,
    ) -> CoreResult<Booking> {
        let booking = self
            .booking_transition(
                booking_id,
                expected_version,
                AuditAction::Cancelled,
                actor,
                |b, at| booking_rules::cancel(b, reason, actor, at),
            )
            .await?;
        self.notify_agent(actor, &booking, "Booking cancelled", "was cancelled")
            .await;
        Ok(booking)
    }

    pub async fn start_trip(
        &self,
        booking_id: &str,
        expected_version: u64,
        actor: &Actor,
    ) -> CoreResult<Booking> {
        self.booking_transition(
            booking_id,
            expected_version,
            AuditAction::StatusChanged,
            actor,
            |b, at| booking_rules::start_trip(b, actor, at),
        )
        .await
    }

    pub async fn complete_trip(
        &self,
        booking_id: &str,
        expected_version: u64,
        actor: &Actor,
    ) -> CoreResult<Booking> {
        let booking = self
            .booking_transition(
                booking_id,
                expected_version,
                AuditAction::StatusChanged,
                actor,
                |b, at| booking_rules::complete_trip(b, actor, at),
            )
            .await?;
        self.notify_agent(actor, &booking, "Trip completed", "is completed")
            .await;
        Ok(booking)
    }

    pub async fn post_booking_message(
        &self,
        booking_id: &str,
        expected_version: u64,
        content: &str,
        actor: &Actor,
    ) -> CoreResult<Message> {
        let (booking, message) = self
            .mutate(
                self.c.bookings.as_ref(),
                EntityType::Booking,
                booking_id,
                Some(expected_version),
                AuditAction::MessagePosted,
                actor,
                |b: &mut Booking, at| {
                    authorize_view(actor, &b.agent_id, &b.operator)?;
                    booking_rules::post_message(b, content, actor, at)
                },
            )
            .await?;

        self.notify(
            actor,
            thread_recipients(&booking.agent_id, &booking.operator, self.staff()),
            "New message",
            format!("New message on booking {}", booking.unique_ref_no),
            booking_link(&booking.id),
        )
        .await;
        Ok(message)
    }

    pub async fn booking_view(&self, booking_id: &str, viewer: &Actor) -> CoreResult<BookingView> {
        let booking = self.load(self.c.bookings.as_ref(), booking_id).await?;
        authorize_view(viewer, &booking.agent_id, &booking.operator)?;
        Ok(visibility::booking_view(viewer, &booking))
    }

    /// Unredacted record for back-office tooling.
    pub async fn booking(&self, booking_id: &str) -> CoreResult<Booking> {
        self.load(self.c.bookings.as_ref(), booking_id).await
    }

    // -------------------------------------------------------------------------
    // Payments
    // -------------------------------------------------------------------------

    /// Verifies and appends a payment, issuing the next receipt number.
    ///
    /// ```text
    /// validate ─► verify ─► [wallet debit] ─► receipt no. ─► ledger ─► save
    ///                             ▲                                     │
    ///                             └──────── reversal credit ◄── fails ──┘
    /// ```
    pub async fn record_payment(
        &self,
        booking_id: &str,
        expected_version: u64,
        payment: NewPayment,
        actor: &Actor,
    ) -> CoreResult<PaymentReceipt> {
        let before = self.load(self.c.bookings.as_ref(), booking_id).await?;
        ensure_current(&before, expected_version)?;
        booking_rules::validate_payment(&before, &payment, actor)?;

        let verified = self
            .c
            .payments
            .verify(&payment.id, payment.amount, &before.currency)
            .await?;
        if !verified {
            warn!(booking_id = %before.id, payment_id = %payment.id, "Payment verification failed");
            return Err(CoreError::PaymentVerificationFailed {
                payment_id: payment.id,
            });
        }

        let wallet_transaction = if payment.mode == PaymentMode::Wallet {
            Some(self.debit_wallet(&before, &payment, actor).await?)
        } else {
            None
        };

        let outcome = self
            .append_payment(&before, payment.clone(), actor)
            .await;
        let (booking, entry, credit_note) = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                if wallet_transaction.is_some() {
                    self.reverse_wallet_debit(&before.agent_id, &payment, actor)
                        .await;
                }
                return Err(err);
            }
        };

        info!(
            booking_id = %booking.id,
            payment_id = %entry.id,
            receipt = %entry.receipt_number,
            amount = %entry.amount,
            paid = %booking.paid_amount,
            balance = %booking.balance_amount,
            "Payment recorded"
        );
        if let Some(note) = &credit_note {
            warn!(
                booking_id = %booking.id,
                payment_id = %note.payment_id,
                excess = %note.amount,
                "Payment exceeds booking total, credit note issued"
            );
        }

        self.notify(
            actor,
            vec![booking.agent_id.clone()],
            "Payment received",
            format!(
                "Receipt {} for {} {} on {}",
                entry.receipt_number, entry.amount, booking.currency, booking.unique_ref_no
            ),
            booking_link(&booking.id),
        )
        .await;

        Ok(PaymentReceipt {
            entry,
            credit_note,
            wallet_transaction,
            booking,
        })
    }

    async fn append_payment(
        &self,
        before: &Booking,
        payment: NewPayment,
        actor: &Actor,
    ) -> CoreResult<(Booking, PaymentEntry, Option<CreditNote>)> {
        let at = Utc::now();
        let sequence = self.c.receipts.next(&self.settings.company_id).await?;
        let receipt = booking_rules::receipt_number(&self.settings.company_id, sequence);

        let mut after = before.clone();
        let (entry, credit_note) =
            booking_rules::record_payment(&mut after, payment, receipt, actor, at)?;
        let booking = self.c.bookings.save(after, before.record_version).await?;
        self.audit(
            EntityType::Booking,
            &booking.id,
            AuditAction::PaymentRecorded,
            Some(before),
            Some(&booking),
            actor,
            at,
        )
        .await?;
        Ok((booking, entry, credit_note))
    }

    async fn debit_wallet(
        &self,
        booking: &Booking,
        payment: &NewPayment,
        actor: &Actor,
    ) -> CoreResult<WalletTransaction> {
        let (_, transaction) = self
            .mutate(
                self.c.wallets.as_ref(),
                EntityType::Wallet,
                &booking.agent_id,
                None,
                AuditAction::WalletDebited,
                actor,
                |w: &mut AgentWallet, at| {
                    if w.currency != booking.currency {
                        return Err(ValidationError::InvalidFormat {
                            field: "wallet currency".to_string(),
                            reason: format!(
                                "wallet holds {} but booking is in {}",
                                w.currency, booking.currency
                            ),
                        }
                        .into());
                    }
                    w.debit(payment.amount, &payment.id, at)
                },
            )
            .await?;
        Ok(transaction)
    }

    async fn reverse_wallet_debit(&self, agent_id: &str, payment: &NewPayment, actor: &Actor) {
        let reference = format!("reversal:{}", payment.id);
        let reversal = self
            .mutate(
                self.c.wallets.as_ref(),
                EntityType::Wallet,
                agent_id,
                None,
                AuditAction::WalletCredited,
                actor,
                |w: &mut AgentWallet, at| w.credit(payment.amount, &reference, at),
            )
            .await;
        if let Err(err) = reversal {
            error!(
                agent_id = %agent_id,
                payment_id = %payment.id,
                amount = %payment.amount,
                error = %err,
                "Wallet debit could not be reversed"
            );
        }
    }

    // -------------------------------------------------------------------------
    // Operators
    // -------------------------------------------------------------------------

    pub async fn assign_operator(
        &self,
        target: RecordRef,
        expected_version: u64,
        request: AssignmentRequest,
        actor: &Actor,
    ) -> CoreResult<OperatorAssignment> {
        let operator_id = request.operator_id.clone();
        let assignment = self
            .operator_action(
                &target,
                expected_version,
                AuditAction::OperatorAssigned,
                actor,
                move |a, at| a.assign(request, actor, at),
            )
            .await?;

        self.notify(
            actor,
            vec![operator_id],
            "New assignment",
            "You have a new job waiting for your response".to_string(),
            target.link(),
        )
        .await;
        Ok(assignment)
    }

    pub async fn accept_assignment(
        &self,
        target: RecordRef,
        expected_version: u64,
        actor: &Actor,
    ) -> CoreResult<OperatorAssignment> {
        let assignment = self
            .operator_action(
                &target,
                expected_version,
                AuditAction::OperatorAccepted,
                actor,
                |a, at| a.accept(actor, at),
            )
            .await?;
        self.notify(
            actor,
            self.staff(),
            "Assignment accepted",
            format!("{} accepted the assignment", actor.name),
            target.link(),
        )
        .await;
        Ok(assignment)
    }

    pub async fn decline_assignment(
        &self,
        target: RecordRef,
        expected_version: u64,
        reason: &str,
        actor: &Actor,
    ) -> CoreResult<OperatorAssignment> {
        let assignment = self
            .operator_action(
                &target,
                expected_version,
                AuditAction::OperatorDeclined,
                actor,
                |a, at| a.decline(reason, actor, at),
            )
            .await?;
        self.notify(
            actor,
            self.staff(),
            "Assignment declined",
            format!("{} declined: {}", actor.name, reason.trim()),
            target.link(),
        )
        .await;
        Ok(assignment)
    }

    pub async fn set_driver_details(
        &self,
        target: RecordRef,
        expected_version: u64,
        details: DriverDetails,
        actor: &Actor,
    ) -> CoreResult<OperatorAssignment> {
        self.operator_action(
            &target,
            expected_version,
            AuditAction::DriverDetailsSet,
            actor,
            move |a, at| a.driver(details, actor, at),
        )
        .await
    }

    async fn operator_action<F>(
        &self,
        target: &RecordRef,
        expected_version: u64,
        action: AuditAction,
        actor: &Actor,
        apply: F,
    ) -> CoreResult<OperatorAssignment>
    where
        F: FnOnce(Assignable<'_>, DateTime<Utc>) -> CoreResult<()> + Send,
    {
        match target {
            RecordRef::Quote(id) => {
                let (quote, ()) = self
                    .mutate(
                        self.c.quotes.as_ref(),
                        EntityType::Quote,
                        id,
                        Some(expected_version),
                        action,
                        actor,
                        |q: &mut Quote, at| apply(Assignable::Quote(q), at),
                    )
                    .await?;
                Ok(quote.operator)
            }
            RecordRef::Booking(id) => {
                let (booking, ()) = self
                    .mutate(
                        self.c.bookings.as_ref(),
                        EntityType::Booking,
                        id,
                        Some(expected_version),
                        action,
                        actor,
                        |b: &mut Booking, at| apply(Assignable::Booking(b), at),
                    )
                    .await?;
                Ok(booking.operator)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Wallets
    // -------------------------------------------------------------------------

    pub async fn open_wallet(
        &self,
        agent_id: &str,
        currency: &str,
        credit_limit: Money,
        actor: &Actor,
    ) -> CoreResult<AgentWallet> {
        authorize(actor, Action::CreditWallet)?;
        let at = Utc::now();
        if self.c.wallets.get(agent_id).await?.is_some() {
            return Err(ValidationError::Duplicate {
                field: "wallet".to_string(),
                value: agent_id.to_string(),
            }
            .into());
        }

        let wallet = AgentWallet::open(agent_id, currency, credit_limit, at)?;
        let wallet = self.c.wallets.save(wallet, 0).await?;
        self.audit(
            EntityType::Wallet,
            agent_id,
            AuditAction::Created,
            None,
            Some(&wallet),
            actor,
            at,
        )
        .await?;
        info!(agent_id = %agent_id, currency = %wallet.currency, "Wallet opened");
        Ok(wallet)
    }

    /// Top-up by the back office.
    pub async fn credit_wallet(
        &self,
        agent_id: &str,
        expected_version: u64,
        amount: Money,
        reference: &str,
        actor: &Actor,
    ) -> CoreResult<WalletTransaction> {
        authorize(actor, Action::CreditWallet)?;
        let (wallet, transaction) = self
            .mutate(
                self.c.wallets.as_ref(),
                EntityType::Wallet,
                agent_id,
                Some(expected_version),
                AuditAction::WalletCredited,
                actor,
                |w: &mut AgentWallet, at| w.credit(amount, reference, at),
            )
            .await?;

        self.notify(
            actor,
            vec![wallet.agent_id.clone()],
            "Wallet topped up",
            format!(
                "{} {} added, balance {} {}",
                amount, wallet.currency, wallet.balance, wallet.currency
            ),
            None,
        )
        .await;
        Ok(transaction)
    }

    /// Agents read their own wallet; the back office reads any.
    pub async fn wallet(&self, agent_id: &str, viewer: &Actor) -> CoreResult<AgentWallet> {
        let allowed = match viewer.role {
            Role::Admin | Role::Staff => true,
            Role::Agent => viewer.user_id == agent_id,
            _ => false,
        };
        if !allowed {
            return Err(CoreError::unauthorized(viewer.role, "view wallet"));
        }
        self.load(self.c.wallets.as_ref(), agent_id).await
    }

    // -------------------------------------------------------------------------
    // Pipeline
    // -------------------------------------------------------------------------

    async fn load<T: Versioned>(&self, repo: &dyn Repository<T>, id: &str) -> CoreResult<T> {
        repo.get(id)
            .await?
            .ok_or_else(|| CoreError::not_found(T::ENTITY, id))
    }

    /// Load, apply, compare-and-swap save, audit.
    ///
    /// `expected_version` is what the caller read. `None` is reserved for
    /// follow-up writes the desk makes on its own behalf, such as the wallet
    /// leg of a payment, which CAS against the version just loaded.
    #[allow(clippy::too_many_arguments)]
    async fn mutate<T, R, F>(
        &self,
        repo: &dyn Repository<T>,
        entity_type: EntityType,
        id: &str,
        expected_version: Option<u64>,
        action: AuditAction,
        actor: &Actor,
        apply: F,
    ) -> CoreResult<(T, R)>
    where
        T: Versioned + Serialize,
        R: Send,
        F: FnOnce(&mut T, DateTime<Utc>) -> CoreResult<R> + Send,
    {
        let at = Utc::now();
        let before = self.load(repo, id).await?;
        if let Some(expected) = expected_version {
            ensure_current(&before, expected)?;
        }
        let mut after = before.clone();
        let outcome = apply(&mut after, at)?;

        let saved = repo.save(after, before.record_version()).await?;
        self.audit(entity_type, id, action, Some(&before), Some(&saved), actor, at)
            .await?;

        debug!(
            entity = T::ENTITY,
            id = %id,
            action = %action,
            record_version = saved.record_version(),
            actor = %actor.user_id,
            "Record updated"
        );
        Ok((saved, outcome))
    }

    async fn booking_transition<F>(
        &self,
        booking_id: &str,
        expected_version: u64,
        action: AuditAction,
        actor: &Actor,
        apply: F,
    ) -> CoreResult<Booking>
    where
        F: FnOnce(&mut Booking, DateTime<Utc>) -> CoreResult<()> + Send,
    {
        let (booking, ()) = self
            .mutate(
                self.c.bookings.as_ref(),
                EntityType::Booking,
                booking_id,
                Some(expected_version),
                action,
                actor,
                apply,
            )
            .await?;
        info!(booking_id = %booking.id, status = %booking.status, "Booking status changed");
        Ok(booking)
    }

    #[allow(clippy::too_many_arguments)]
    async fn audit<T: Serialize>(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        action: AuditAction,
        before: Option<&T>,
        after: Option<&T>,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let entry = AuditLogEntry::snapshot(entity_type, entity_id, action, before, after, actor, at)?;
        self.c.audit.record(entry).await.map_err(|err| {
            error!(
                entity_type = %entity_type,
                entity_id = %entity_id,
                action = %action,
                error = %err,
                "Audit write failed"
            );
            err
        })
    }

    // -------------------------------------------------------------------------
    // Notifications
    // -------------------------------------------------------------------------

    fn staff(&self) -> Vec<String> {
        self.settings.staff_recipients.clone()
    }

    /// Sends to `recipients` minus the actor. Never fails.
    async fn notify(
        &self,
        actor: &Actor,
        recipients: Vec<String>,
        title: &str,
        body: String,
        path: Option<String>,
    ) {
        if !self.settings.notifications_enabled {
            return;
        }
        let recipient_ids: Vec<String> = recipients
            .into_iter()
            .filter(|id| !id.is_empty() && *id != actor.user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if recipient_ids.is_empty() {
            return;
        }

        let link = path.map(|path| match &self.settings.link_base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), path),
            None => path,
        });
        self.c
            .notifier
            .notify(Notification {
                recipient_ids,
                title: title.to_string(),
                body,
                link,
            })
            .await;
    }

    async fn notify_agent(&self, actor: &Actor, booking: &Booking, title: &str, outcome: &str) {
        self.notify(
            actor,
            vec![booking.agent_id.clone()],
            title,
            format!("Booking {} {}", booking.unique_ref_no, outcome),
            booking_link(&booking.id),
        )
        .await;
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Either kind of record an operator works on.
enum Assignable<'a> {
    Quote(&'a mut Quote),
    Booking(&'a mut Booking),
}

impl Assignable<'_> {
    fn assign(self, request: AssignmentRequest, actor: &Actor, at: DateTime<Utc>) -> CoreResult<()> {
        match self {
            Assignable::Quote(q) => operator::assign(q, request, actor, at),
            Assignable::Booking(b) => operator::assign(b, request, actor, at),
        }
    }

    fn accept(self, actor: &Actor, at: DateTime<Utc>) -> CoreResult<()> {
        match self {
            Assignable::Quote(q) => operator::accept(q, actor, at),
            Assignable::Booking(b) => operator::accept(b, actor, at),
        }
    }

    fn decline(self, reason: &str, actor: &Actor, at: DateTime<Utc>) -> CoreResult<()> {
        match self {
            Assignable::Quote(q) => operator::decline(q, reason, actor, at),
            Assignable::Booking(b) => operator::decline(b, reason, actor, at),
        }
    }

    fn driver(self, details: DriverDetails, actor: &Actor, at: DateTime<Utc>) -> CoreResult<()> {
        match self {
            Assignable::Quote(q) => operator::set_driver_details(q, details, actor, at),
            Assignable::Booking(b) => operator::set_driver_details(b, details, actor, at),
        }
    }
}

impl RecordRef {
    fn link(&self) -> Option<String> {
        match self {
            RecordRef::Quote(id) => quote_link(id),
            RecordRef::Booking(id) => booking_link(id),
        }
    }
}

fn quote_link(id: &str) -> Option<String> {
    Some(format!("/quotes/{}", id))
}

fn booking_link(id: &str) -> Option<String> {
    Some(format!("/bookings/{}", id))
}

/// Refuses a write based on an older read of `record`.
fn ensure_current<T: Versioned>(record: &T, expected_version: u64) -> CoreResult<()> {
    let actual = record.record_version();
    if actual == expected_version {
        return Ok(());
    }
    debug!(
        entity = T::ENTITY,
        id = %record.key(),
        expected = expected_version,
        actual,
        "Stale write refused"
    );
    Err(CoreError::ConcurrentModification {
        entity: T::ENTITY,
        id: record.key().to_string(),
        expected: expected_version,
        actual,
    })
}

/// Everyone following a chat thread.
fn thread_recipients(agent_id: &str, operator: &OperatorAssignment, staff: Vec<String>) -> Vec<String> {
    let mut recipients = staff;
    recipients.push(agent_id.to_string());
    if let Some(operator_id) = &operator.operator_id {
        recipients.push(operator_id.clone());
    }
    recipients
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::ManualPaymentVerifier;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use tokio::sync::RwLock;
    use tripdesk_core::operator::OperatorStatus;
    use tripdesk_core::pricing::{AgentMarkup, PricingRules};
    use tripdesk_core::visibility::ResolvedPrice;
    use tripdesk_core::{
        BookingStatus, ItineraryItem, PaymentType, QuoteStatus, Service, ServiceType,
    };

    #[derive(Debug, Default)]
    struct RecordingNotifier {
        sent: RwLock<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: Notification) {
            self.sent.write().await.push(notification);
        }
    }

    #[derive(Debug)]
    struct RejectingVerifier;

    #[async_trait]
    impl PaymentVerifier for RejectingVerifier {
        async fn verify(&self, _payment_id: &str, _amount: Money, _currency: &str) -> CoreResult<bool> {
            Ok(false)
        }
    }

    /// Approves only the payment ids a gateway has settled.
    #[derive(Debug)]
    struct SettledVerifier {
        settled: Vec<&'static str>,
    }

    #[async_trait]
    impl PaymentVerifier for SettledVerifier {
        async fn verify(&self, payment_id: &str, _amount: Money, _currency: &str) -> CoreResult<bool> {
            Ok(self.settled.contains(&payment_id))
        }
    }

    struct Harness {
        desk: QuoteDesk,
        quotes: Arc<InMemoryRepository<Quote>>,
        audit: Arc<InMemoryAuditLog>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness_with(settings: DeskSettings, payments: Arc<dyn PaymentVerifier>) -> Harness {
        let quotes = Arc::new(InMemoryRepository::<Quote>::new());
        let audit = Arc::new(InMemoryAuditLog::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let mut collaborators = Collaborators::in_memory(RateTable::new(), payments);
        collaborators.quotes = quotes.clone();
        collaborators.audit = audit.clone();
        collaborators.notifier = notifier.clone();
        Harness {
            desk: QuoteDesk::new(collaborators, settings),
            quotes,
            audit,
            notifier,
        }
    }

    fn harness() -> Harness {
        harness_with(DeskSettings::default(), Arc::new(ManualPaymentVerifier))
    }

    fn agent() -> Actor {
        Actor::new("agent-1", "Ravi Travels", Role::Agent)
    }

    fn other_agent() -> Actor {
        Actor::new("agent-2", "Coastline Tours", Role::Agent)
    }

    fn staff() -> Actor {
        Actor::new("staff-1", "Asha", Role::Staff)
    }

    fn operator_user() -> Actor {
        Actor::new("op-1", "Munnar Cabs", Role::Operator)
    }

    /// One service costing `cost` USD, no markups and no GST.
    fn flat_draft(cost: Money) -> QuoteDraft {
        QuoteDraft {
            title: "Munnar Tea Trail".to_string(),
            agent_id: "agent-1".to_string(),
            client_name: "Menon Family".to_string(),
            currency: "USD".to_string(),
            pax_count: 2,
            itinerary: vec![ItineraryItem {
                day: 1,
                title: "Tea estates".to_string(),
                description: "Private car and guide".to_string(),
                services: vec![Service::new(ServiceType::Transfer, "Private car", cost, "USD")],
                inclusions: Vec::new(),
            }],
            pricing_rules: PricingRules {
                company_markup_percent: Percent::from_whole(0),
                agent_markup: AgentMarkup::Flat(Money::zero()),
                gst_percent: Percent::from_whole(0),
            },
        }
    }

    fn payment(id: &str, amount: Money, mode: PaymentMode) -> NewPayment {
        NewPayment {
            id: id.to_string(),
            amount,
            payment_type: PaymentType::Partial,
            mode,
            reference: None,
        }
    }

    fn travelers() -> Vec<Traveler> {
        vec![Traveler::named("K. Menon"), Traveler::named("L. Menon")]
    }

    async fn approved(h: &Harness, cost: Money) -> Quote {
        let quote = h.desk.create_quote(flat_draft(cost), &agent()).await.unwrap();
        let quote = h
            .desk
            .submit_quote(&quote.id, quote.record_version, &agent())
            .await
            .unwrap();
        h.desk
            .approve_quote(&quote.id, quote.record_version, &staff())
            .await
            .unwrap()
    }

    async fn booked(h: &Harness, cost: Money) -> Booking {
        let quote = approved(h, cost).await;
        h.desk
            .convert_to_booking(&quote.id, quote.record_version, travelers(), &agent())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_quote_lifecycle_is_audited_and_notified() {
        let h = harness();
        let quote = h
            .desk
            .create_quote(flat_draft(Money::from_major(500)), &agent())
            .await
            .unwrap();
        assert_eq!(quote.record_version, 1);

        let submitted = h.desk.submit_quote(&quote.id, 1, &agent()).await.unwrap();
        assert_eq!(submitted.status, QuoteStatus::Submitted);
        assert_eq!(submitted.record_version, 2);

        let approved = h.desk.approve_quote(&quote.id, 2, &staff()).await.unwrap();
        assert!(approved.is_locked);

        let actions: Vec<AuditAction> = h.audit.entries().await.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![AuditAction::Created, AuditAction::Submitted, AuditAction::Approved]
        );

        let sent = h.notifier.sent.read().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].recipient_ids, vec!["staff".to_string()]);
        assert_eq!(sent[1].recipient_ids, vec!["agent-1".to_string()]);
        assert_eq!(sent[1].link.as_deref(), Some(format!("/quotes/{}", quote.id).as_str()));
    }

    #[tokio::test]
    async fn test_double_submit_leaves_no_trace() {
        let h = harness();
        let quote = h
            .desk
            .create_quote(flat_draft(Money::from_major(500)), &agent())
            .await
            .unwrap();
        h.desk.submit_quote(&quote.id, 1, &agent()).await.unwrap();

        let err = h.desk.submit_quote(&quote.id, 2, &agent()).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));
        assert_eq!(h.audit.entries().await.len(), 2);
        assert_eq!(h.desk.quote(&quote.id).await.unwrap().record_version, 2);
    }

    #[tokio::test]
    async fn test_stale_writer_loses_after_desk_update() {
        let h = harness();
        let quote = h
            .desk
            .create_quote(flat_draft(Money::from_major(500)), &agent())
            .await
            .unwrap();

        let edit = QuoteEdit {
            title: Some("Munnar and Thekkady".to_string()),
            ..QuoteEdit::default()
        };
        let (updated, _) = h.desk.update_quote(&quote.id, 1, edit, &agent()).await.unwrap();
        assert_eq!(updated.record_version, 2);

        let err = h.quotes.save(quote, 1).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::ConcurrentModification {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert_eq!(h.desk.quote(&updated.id).await.unwrap().title, "Munnar and Thekkady");
    }

    #[tokio::test]
    async fn test_two_editors_from_same_read_only_first_wins() {
        let h = harness();
        let quote = h
            .desk
            .create_quote(flat_draft(Money::from_major(500)), &agent())
            .await
            .unwrap();
        let read_by_both = h.desk.quote_view(&quote.id, &agent()).await.unwrap().record_version;
        assert_eq!(read_by_both, 1);

        let first = QuoteEdit {
            title: Some("Munnar and Thekkady".to_string()),
            pax_count: Some(3),
            ..QuoteEdit::default()
        };
        h.desk
            .update_quote(&quote.id, read_by_both, first, &agent())
            .await
            .unwrap();

        let second = QuoteEdit {
            title: Some("Munnar only".to_string()),
            pax_count: Some(2),
            ..QuoteEdit::default()
        };
        let err = h
            .desk
            .update_quote(&quote.id, read_by_both, second, &agent())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::ConcurrentModification {
                expected: 1,
                actual: 2,
                ..
            }
        ));

        let stored = h.desk.quote(&quote.id).await.unwrap();
        assert_eq!(stored.title, "Munnar and Thekkady");
        assert_eq!(stored.pax_count, 3);
        assert_eq!(stored.record_version, 2);
        assert_eq!(h.audit.entries().await.len(), 2);

        // a stale status change is refused the same way
        let err = h
            .desk
            .submit_quote(&quote.id, read_by_both, &agent())
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(h.desk.quote(&quote.id).await.unwrap().status, QuoteStatus::Draft);
    }

    #[tokio::test]
    async fn test_locked_quote_is_revised_not_edited() {
        let h = harness();
        let v1 = approved(&h, Money::from_major(500)).await;

        let err = h
            .desk
            .update_quote(&v1.id, v1.record_version, QuoteEdit::default(), &agent())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::LockedQuoteMutation { .. }));

        let v2 = h.desk.create_revision(&v1.id, &staff()).await.unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(v2.previous_version_id.as_deref(), Some(v1.id.as_str()));
        assert_eq!(v2.status, QuoteStatus::Draft);

        let v2 = h.desk.submit_quote(&v2.id, v2.record_version, &agent()).await.unwrap();
        h.desk
            .approve_quote(&v2.id, v2.record_version, &staff())
            .await
            .unwrap();
        let err = h.desk.create_revision(&v1.id, &staff()).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));

        let history = h
            .desk
            .revision_history(&v1.unique_ref_no, &agent())
            .await
            .unwrap();
        let versions: Vec<u32> = history.iter().map(|v| v.version).collect();
        assert_eq!(versions, vec![1, 2]);

        assert!(h
            .desk
            .revision_history(&v1.unique_ref_no, &other_agent())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_conversion_happens_once() {
        let h = harness();
        let quote = approved(&h, Money::from_major(1000)).await;

        let booking = h
            .desk
            .convert_to_booking(&quote.id, quote.record_version, vec![Traveler::named("K. Menon")], &agent())
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Requested);
        assert_eq!(booking.total_amount, Money::from_major(1000));
        assert_eq!(booking.advance_amount, Money::from_major(300));
        assert_eq!(booking.warnings.len(), 1);
        let stored = h.desk.quote(&quote.id).await.unwrap();
        assert_eq!(stored.status, QuoteStatus::Booked);

        let err = h
            .desk
            .convert_to_booking(&quote.id, stored.record_version, travelers(), &agent())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn test_overpayment_issues_credit_note() {
        let h = harness();
        let booking = booked(&h, Money::from_major(1000)).await;

        let first = h
            .desk
            .record_payment(
                &booking.id,
                booking.record_version,
                payment("p-1", Money::from_major(300), PaymentMode::BankTransfer),
                &staff(),
            )
            .await
            .unwrap();
        assert_eq!(first.entry.receipt_number, "RCPT-TD-000001");
        assert_eq!(first.booking.balance_amount, Money::from_major(700));
        assert!(first.credit_note.is_none());

        let second = h
            .desk
            .record_payment(
                &booking.id,
                first.booking.record_version,
                payment("p-2", Money::from_major(800), PaymentMode::BankTransfer),
                &staff(),
            )
            .await
            .unwrap();
        assert_eq!(second.entry.receipt_number, "RCPT-TD-000002");
        assert_eq!(second.booking.paid_amount, Money::from_major(1000));
        assert_eq!(second.booking.balance_amount, Money::zero());
        assert_eq!(
            second.credit_note.map(|n| n.amount),
            Some(Money::from_major(100))
        );
        assert_eq!(second.booking.payments.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_verification_records_nothing() {
        let h = harness_with(DeskSettings::default(), Arc::new(RejectingVerifier));
        let booking = booked(&h, Money::from_major(1000)).await;
        let audited = h.audit.entries().await.len();

        let err = h
            .desk
            .record_payment(
                &booking.id,
                booking.record_version,
                payment("p-1", Money::from_major(300), PaymentMode::Card),
                &staff(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::PaymentVerificationFailed { .. }));

        let stored = h.desk.booking(&booking.id).await.unwrap();
        assert!(stored.payments.is_empty());
        assert_eq!(stored.record_version, booking.record_version);
        assert_eq!(h.audit.entries().await.len(), audited);
    }

    #[tokio::test]
    async fn test_wired_verifier_decides_card_payments() {
        let verifier = SettledVerifier {
            settled: vec!["card-settled"],
        };
        let h = harness_with(DeskSettings::default(), Arc::new(verifier));
        let booking = booked(&h, Money::from_major(1000)).await;

        let err = h
            .desk
            .record_payment(
                &booking.id,
                booking.record_version,
                payment("card-unknown", Money::from_major(300), PaymentMode::Card),
                &staff(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::PaymentVerificationFailed { .. }));

        let receipt = h
            .desk
            .record_payment(
                &booking.id,
                booking.record_version,
                payment("card-settled", Money::from_major(300), PaymentMode::Card),
                &staff(),
            )
            .await
            .unwrap();
        assert_eq!(receipt.booking.payments.len(), 1);
        assert_eq!(receipt.entry.receipt_number, "RCPT-TD-000001");
    }

    #[tokio::test]
    async fn test_wallet_payment_debits_agent() {
        let h = harness();
        let booking = booked(&h, Money::from_major(1000)).await;
        let wallet = h
            .desk
            .open_wallet("agent-1", "USD", Money::zero(), &staff())
            .await
            .unwrap();
        h.desk
            .credit_wallet(
                "agent-1",
                wallet.record_version,
                Money::from_major(400),
                "topup-1",
                &staff(),
            )
            .await
            .unwrap();

        let err = h
            .desk
            .record_payment(
                &booking.id,
                booking.record_version,
                payment("p-1", Money::from_major(500), PaymentMode::Wallet),
                &staff(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientFunds { .. }));
        assert!(h.desk.booking(&booking.id).await.unwrap().payments.is_empty());

        let receipt = h
            .desk
            .record_payment(
                &booking.id,
                booking.record_version,
                payment("p-2", Money::from_major(300), PaymentMode::Wallet),
                &staff(),
            )
            .await
            .unwrap();
        let transaction = receipt.wallet_transaction.unwrap();
        assert_eq!(transaction.reference, "p-2");
        assert_eq!(transaction.balance_after, Money::from_major(100));

        let wallet = h.desk.wallet("agent-1", &agent()).await.unwrap();
        assert_eq!(wallet.balance, Money::from_major(100));
        assert!(h.desk.wallet("agent-1", &other_agent()).await.is_err());

        // a duplicate payment id is refused before the wallet is touched
        let err = h
            .desk
            .record_payment(
                &booking.id,
                receipt.booking.record_version,
                payment("p-2", Money::from_major(50), PaymentMode::Wallet),
                &staff(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::Duplicate { .. })));
        let wallet = h.desk.wallet("agent-1", &staff()).await.unwrap();
        assert_eq!(wallet.balance, Money::from_major(100));
    }

    #[tokio::test]
    async fn test_booking_cancellation_round_trip() {
        let h = harness();
        let booking = booked(&h, Money::from_major(1000)).await;
        let confirmed = h.desk.confirm_booking(&booking.id, 1, &staff()).await.unwrap();

        let requested = h
            .desk
            .request_cancellation(&booking.id, confirmed.record_version, "Flights moved", &agent())
            .await
            .unwrap();
        assert_eq!(requested.status, BookingStatus::CancellationRequested);

        let declined = h
            .desk
            .resolve_cancellation(&booking.id, requested.record_version, false, &staff())
            .await
            .unwrap();
        assert_eq!(declined.status, BookingStatus::Confirmed);

        let err = h
            .desk
            .cancel_booking(&booking.id, declined.record_version, "No", &agent())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));

        let cancelled = h
            .desk
            .cancel_booking(&booking.id, declined.record_version, "Client withdrew", &staff())
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_declined_cancellation_of_unconfirmed_booking() {
        let h = harness();
        let booking = booked(&h, Money::from_major(1000)).await;

        let requested = h
            .desk
            .request_cancellation(&booking.id, booking.record_version, "Dates changed", &agent())
            .await
            .unwrap();
        let declined = h
            .desk
            .resolve_cancellation(&booking.id, requested.record_version, false, &staff())
            .await
            .unwrap();
        assert_eq!(declined.status, BookingStatus::Requested);

        let sent = h.notifier.sent.read().await;
        assert!(sent.last().unwrap().body.ends_with("stays REQUESTED"));
    }

    #[tokio::test]
    async fn test_operator_flow_and_redacted_views() {
        let h = harness();
        let booking = booked(&h, Money::from_major(1000)).await;
        h.desk.confirm_booking(&booking.id, 1, &staff()).await.unwrap();

        let target = RecordRef::Booking(booking.id.clone());
        let request = AssignmentRequest {
            operator_id: "op-1".to_string(),
            operator_price: Some(Money::new(dec!(750))),
            net_cost_visible_to_operator: false,
        };
        h.desk
            .assign_operator(target.clone(), 2, request, &staff())
            .await
            .unwrap();

        let stranger = Actor::new("op-2", "Other Cabs", Role::Operator);
        assert!(h.desk.booking_view(&booking.id, &stranger).await.is_err());
        assert!(h
            .desk
            .accept_assignment(target.clone(), 3, &stranger)
            .await
            .is_err());

        let seen = h.desk.booking_view(&booking.id, &operator_user()).await.unwrap();
        let accepted = h
            .desk
            .accept_assignment(target.clone(), seen.record_version, &operator_user())
            .await
            .unwrap();
        assert_eq!(accepted.status, OperatorStatus::Accepted);

        let details = DriverDetails {
            name: "Suresh".to_string(),
            phone: "+91 98460 00000".to_string(),
            vehicle: "Innova".to_string(),
            vehicle_number: "KL-07-AB-1234".to_string(),
        };
        let with_driver = h
            .desk
            .set_driver_details(target, 4, details, &operator_user())
            .await
            .unwrap();
        assert!(with_driver.driver_details.is_some());

        h.desk
            .post_booking_message(&booking.id, 5, "Pickup at 7am", &agent())
            .await
            .unwrap();

        let view = h
            .desk
            .booking_view(&booking.id, &operator_user())
            .await
            .unwrap();
        assert_eq!(view.record_version, 6);
        assert_eq!(
            view.price,
            ResolvedPrice::Amount {
                amount: Money::new(dec!(750))
            }
        );
        assert!(view.paid_amount.is_none());
        assert!(view
            .messages
            .iter()
            .filter(|m| !m.is_system)
            .all(|m| !m.sender.contains("Ravi")));

        let started = h
            .desk
            .start_trip(&booking.id, view.record_version, &operator_user())
            .await
            .unwrap();
        let done = h
            .desk
            .complete_trip(&booking.id, started.record_version, &operator_user())
            .await
            .unwrap();
        assert_eq!(done.status, BookingStatus::Completed);
    }

    #[tokio::test]
    async fn test_other_agents_cannot_read_or_post() {
        let h = harness();
        let quote = h
            .desk
            .create_quote(flat_draft(Money::from_major(500)), &agent())
            .await
            .unwrap();

        assert!(h.desk.quote_view(&quote.id, &other_agent()).await.is_err());
        let err = h
            .desk
            .post_quote_message(&quote.id, 1, "hello", &other_agent())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));

        let view = h.desk.quote_view(&quote.id, &staff()).await.unwrap();
        assert!(matches!(view.price, ResolvedPrice::Full { .. }));
    }

    #[tokio::test]
    async fn test_disabled_notifications_and_link_base() {
        let settings = DeskSettings {
            notifications_enabled: false,
            ..DeskSettings::default()
        };
        let h = harness_with(settings, Arc::new(ManualPaymentVerifier));
        approved(&h, Money::from_major(500)).await;
        assert!(h.notifier.sent.read().await.is_empty());

        let settings = DeskSettings {
            link_base_url: Some("https://desk.example.com/".to_string()),
            ..DeskSettings::default()
        };
        let h = harness_with(settings, Arc::new(ManualPaymentVerifier));
        let quote = approved(&h, Money::from_major(500)).await;
        h.desk
            .post_quote_message(&quote.id, quote.record_version, "Please check day 1", &staff())
            .await
            .unwrap();

        let sent = h.notifier.sent.read().await;
        let last = sent.last().unwrap();
        assert_eq!(
            last.link.as_deref(),
            Some(format!("https://desk.example.com/quotes/{}", quote.id).as_str())
        );
        // the staff author is not notified of their own message
        assert_eq!(last.recipient_ids, vec!["agent-1".to_string(), "staff".to_string()]);
    }
}
