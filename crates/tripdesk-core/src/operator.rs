//! # Operator Assignment Workflow
//!
//! An accept/decline sub-state machine attached to a quote or a booking.
//!
//! ```text
//! UNASSIGNED ──assign──► ASSIGNED ──accept──► ACCEPTED
//!                          ▲   │
//!          assign (replace)│   └──decline(reason)──► DECLINED
//!                          └─────────── assign ◄───────┘
//! ```
//!
//! ACCEPTED does not move the booking's execution status by itself; it only
//! unlocks `start_trip` and driver details.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::authz::{authorize, authorize_assigned_operator, Action};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Actor, Booking, Message, Quote, QuoteStatus};
use crate::validation::{validate_identifier, validate_non_negative, validate_reason};

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorStatus {
    #[default]
    Unassigned,
    Assigned,
    Accepted,
    Declined,
}

impl OperatorStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OperatorStatus::Unassigned => "UNASSIGNED",
            OperatorStatus::Assigned => "ASSIGNED",
            OperatorStatus::Accepted => "ACCEPTED",
            OperatorStatus::Declined => "DECLINED",
        }
    }

    pub const fn can_transition_to(&self, target: OperatorStatus) -> bool {
        matches!(
            (self, target),
            (OperatorStatus::Unassigned, OperatorStatus::Assigned)
                | (OperatorStatus::Assigned, OperatorStatus::Assigned)
                | (OperatorStatus::Declined, OperatorStatus::Assigned)
                | (OperatorStatus::Assigned, OperatorStatus::Accepted)
                | (OperatorStatus::Assigned, OperatorStatus::Declined)
        )
    }
}

impl fmt::Display for OperatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Driver and vehicle for a confirmed trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DriverDetails {
    pub name: String,
    pub phone: String,
    pub vehicle: String,
    pub vehicle_number: String,
}

/// Operator sub-state embedded in quotes and bookings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OperatorAssignment {
    pub operator_id: Option<String>,
    pub status: OperatorStatus,
    /// Price agreed with the operator; shown to the operator in place of cost.
    pub operator_price: Option<Money>,
    pub net_cost_visible_to_operator: bool,
    /// Active decline reason. Cleared on re-assignment.
    pub decline_reason: Option<String>,
    pub driver_details: Option<DriverDetails>,
    #[ts(as = "Option<String>")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub responded_at: Option<DateTime<Utc>>,
}

impl OperatorAssignment {
    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        self.operator_id.as_deref() == Some(user_id)
    }

    #[inline]
    pub fn is_accepted(&self) -> bool {
        self.status == OperatorStatus::Accepted
    }

    /// The assignment a new quote revision starts with. An operator who is
    /// still on the job (ASSIGNED or ACCEPTED) keeps the same terms and is
    /// asked again; one who declined is not re-assigned.
    pub fn carried_into_revision(&self) -> OperatorAssignment {
        let on_the_job = matches!(
            self.status,
            OperatorStatus::Assigned | OperatorStatus::Accepted
        );
        match &self.operator_id {
            Some(operator_id) if on_the_job => OperatorAssignment {
                operator_id: Some(operator_id.clone()),
                status: OperatorStatus::Assigned,
                operator_price: self.operator_price,
                net_cost_visible_to_operator: self.net_cost_visible_to_operator,
                decline_reason: None,
                driver_details: None,
                assigned_at: self.assigned_at,
                responded_at: None,
            },
            _ => OperatorAssignment {
                net_cost_visible_to_operator: self.net_cost_visible_to_operator,
                ..OperatorAssignment::default()
            },
        }
    }
}

// =============================================================================
// Assignable Records
// =============================================================================

/// A record that carries an operator assignment.
pub trait OperatorAssignable {
    const ENTITY: &'static str;

    fn record_id(&self) -> &str;
    fn assignment(&self) -> &OperatorAssignment;
    fn assignment_mut(&mut self) -> &mut OperatorAssignment;
    fn push_message(&mut self, message: Message);
    fn touch(&mut self, at: DateTime<Utc>);
    /// Whether the record is still open to operator changes.
    fn accepts_assignment(&self) -> bool;
    fn status_label(&self) -> String;
}

impl OperatorAssignable for Quote {
    const ENTITY: &'static str = "Quote";

    fn record_id(&self) -> &str {
        &self.id
    }

    fn assignment(&self) -> &OperatorAssignment {
        &self.operator
    }

    fn assignment_mut(&mut self) -> &mut OperatorAssignment {
        &mut self.operator
    }

    fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    fn accepts_assignment(&self) -> bool {
        self.status != QuoteStatus::Cancelled
    }

    fn status_label(&self) -> String {
        self.status.to_string()
    }
}

impl OperatorAssignable for Booking {
    const ENTITY: &'static str = "Booking";

    fn record_id(&self) -> &str {
        &self.id
    }

    fn assignment(&self) -> &OperatorAssignment {
        &self.operator
    }

    fn assignment_mut(&mut self) -> &mut OperatorAssignment {
        &mut self.operator
    }

    fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    fn accepts_assignment(&self) -> bool {
        !self.status.is_terminal()
    }

    fn status_label(&self) -> String {
        self.status.to_string()
    }
}

// =============================================================================
// Workflow
// =============================================================================

/// Terms of an operator assignment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AssignmentRequest {
    pub operator_id: String,
    pub operator_price: Option<Money>,
    pub net_cost_visible_to_operator: bool,
}

fn require_status<T: OperatorAssignable>(
    target: &T,
    next: OperatorStatus,
    action: &str,
) -> CoreResult<()> {
    let current = target.assignment().status;
    if !current.can_transition_to(next) {
        return Err(CoreError::invalid_transition(
            T::ENTITY,
            target.record_id(),
            format!("operator {}", current),
            action,
        ));
    }
    Ok(())
}

/// Assigns (or re-assigns) an operator. Staff and admin only.
pub fn assign<T: OperatorAssignable>(
    target: &mut T,
    request: AssignmentRequest,
    actor: &Actor,
    at: DateTime<Utc>,
) -> CoreResult<()> {
    authorize(actor, Action::AssignOperator)?;
    validate_identifier("operator_id", &request.operator_id)?;
    if let Some(price) = request.operator_price {
        validate_non_negative("operator_price", price)?;
    }

    if !target.accepts_assignment() {
        return Err(CoreError::invalid_transition(
            T::ENTITY,
            target.record_id(),
            target.status_label(),
            "assign operator",
        ));
    }
    require_status(target, OperatorStatus::Assigned, "assign operator")?;

    let assignment = target.assignment_mut();
    assignment.operator_id = Some(request.operator_id.clone());
    assignment.status = OperatorStatus::Assigned;
    assignment.operator_price = request.operator_price;
    assignment.net_cost_visible_to_operator = request.net_cost_visible_to_operator;
    assignment.decline_reason = None;
    assignment.driver_details = None;
    assignment.assigned_at = Some(at);
    assignment.responded_at = None;

    target.push_message(Message::system(
        actor,
        format!("Operator {} assigned", request.operator_id),
        at,
    ));
    target.touch(at);
    Ok(())
}

/// The assigned operator accepts the job.
pub fn accept<T: OperatorAssignable>(
    target: &mut T,
    actor: &Actor,
    at: DateTime<Utc>,
) -> CoreResult<()> {
    authorize_assigned_operator(actor, Action::RespondToAssignment, target.assignment())?;
    require_status(target, OperatorStatus::Accepted, "accept assignment")?;

    let assignment = target.assignment_mut();
    assignment.status = OperatorStatus::Accepted;
    assignment.responded_at = Some(at);

    target.push_message(Message::system(actor, "Operator accepted the assignment", at));
    target.touch(at);
    Ok(())
}

/// The assigned operator declines the job. A reason is mandatory.
pub fn decline<T: OperatorAssignable>(
    target: &mut T,
    reason: &str,
    actor: &Actor,
    at: DateTime<Utc>,
) -> CoreResult<()> {
    authorize_assigned_operator(actor, Action::RespondToAssignment, target.assignment())?;
    require_status(target, OperatorStatus::Declined, "decline assignment")?;
    let reason = validate_reason("decline reason", reason)?;

    let assignment = target.assignment_mut();
    assignment.status = OperatorStatus::Declined;
    assignment.decline_reason = Some(reason.clone());
    assignment.responded_at = Some(at);

    target.push_message(Message::system(
        actor,
        format!("Operator declined the assignment: {}", reason),
        at,
    ));
    target.touch(at);
    Ok(())
}

/// Records driver and vehicle once the operator has accepted.
pub fn set_driver_details<T: OperatorAssignable>(
    target: &mut T,
    details: DriverDetails,
    actor: &Actor,
    at: DateTime<Utc>,
) -> CoreResult<()> {
    authorize_assigned_operator(actor, Action::SetDriverDetails, target.assignment())?;
    if !target.assignment().is_accepted() {
        return Err(CoreError::invalid_transition(
            T::ENTITY,
            target.record_id(),
            format!("operator {}", target.assignment().status),
            "set driver details",
        ));
    }
    if details.name.trim().is_empty() {
        return Err(ValidationError::required("driver name").into());
    }
    if details.phone.trim().is_empty() {
        return Err(ValidationError::required("driver phone").into());
    }

    target.assignment_mut().driver_details = Some(details);
    target.push_message(Message::system(actor, "Driver details updated", at));
    target.touch(at);
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
