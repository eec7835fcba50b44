//! # Authorization
//!
//! Role × action permission table.
//!
//! ```text
//! ┌──────────────────────────────┬───────┬───────┬───────┬──────────┬─────────┬────────┐
//! │ action                       │ ADMIN │ STAFF │ AGENT │ OPERATOR │ HOTEL_P │ CLIENT │
//! ├──────────────────────────────┼───────┼───────┼───────┼──────────┼─────────┼────────┤
//! │ draft/edit/submit/convert    │   ✓   │   ✓   │  own  │          │         │        │
//! │ request booking cancellation │   ✓   │   ✓   │  own  │          │         │        │
//! │ approve/reject/revise/cancel │   ✓   │   ✓   │       │          │         │        │
//! │ assign operator, payments    │   ✓   │   ✓   │       │          │         │        │
//! │ booking confirm/reject/cancel│   ✓   │   ✓   │       │          │         │        │
//! │ accept/decline, driver, start│       │       │       │ assigned │         │        │
//! │ complete trip                │   ✓   │   ✓   │       │ assigned │         │        │
//! │ post message                 │   ✓   │   ✓   │   ✓   │    ✓     │    ✓    │        │
//! └──────────────────────────────┴───────┴───────┴───────┴──────────┴─────────┴────────┘
//! ```
//!
//! Ownership ("own", "assigned") is checked by [`authorize_owner`] and
//! [`authorize_assigned_operator`] on top of the role check.

use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::operator::OperatorAssignment;
use crate::types::{Actor, Role};

/// A mutating action guarded by the permission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateQuote,
    EditQuote,
    SubmitQuote,
    ApproveQuote,
    RejectQuote,
    CreateRevision,
    CancelQuote,
    ConvertToBooking,
    AssignOperator,
    RespondToAssignment,
    SetDriverDetails,
    ConfirmBooking,
    RejectBooking,
    CancelBooking,
    RequestBookingCancellation,
    ResolveCancellation,
    StartTrip,
    CompleteTrip,
    RecordPayment,
    CreditWallet,
    PostMessage,
}

impl Action {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Action::CreateQuote => "create quote",
            Action::EditQuote => "edit quote",
            Action::SubmitQuote => "submit quote",
            Action::ApproveQuote => "approve quote",
            Action::RejectQuote => "reject quote",
            Action::CreateRevision => "create revision",
            Action::CancelQuote => "cancel quote",
            Action::ConvertToBooking => "convert quote to booking",
            Action::AssignOperator => "assign operator",
            Action::RespondToAssignment => "respond to assignment",
            Action::SetDriverDetails => "set driver details",
            Action::ConfirmBooking => "confirm booking",
            Action::RejectBooking => "reject booking",
            Action::CancelBooking => "cancel booking",
            Action::RequestBookingCancellation => "request booking cancellation",
            Action::ResolveCancellation => "resolve cancellation request",
            Action::StartTrip => "start trip",
            Action::CompleteTrip => "complete trip",
            Action::RecordPayment => "record payment",
            Action::CreditWallet => "credit wallet",
            Action::PostMessage => "post message",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true if `role` may perform `action` at all.
pub const fn is_allowed(role: Role, action: Action) -> bool {
    use Action::*;
    match role {
        Role::Admin | Role::Staff => !matches!(
            action,
            RespondToAssignment | SetDriverDetails | StartTrip
        ),
        Role::Agent => matches!(
            action,
            CreateQuote
                | EditQuote
                | SubmitQuote
                | ConvertToBooking
                | RequestBookingCancellation
                | PostMessage
        ),
        Role::Operator => matches!(
            action,
            RespondToAssignment | SetDriverDetails | StartTrip | CompleteTrip | PostMessage
        ),
        Role::HotelPartner => matches!(action, PostMessage),
        Role::Client => false,
    }
}

/// Role check only.
pub fn authorize(actor: &Actor, action: Action) -> CoreResult<()> {
    if is_allowed(actor.role, action) {
        Ok(())
    } else {
        Err(CoreError::unauthorized(actor.role, action.as_str()))
    }
}

/// Role check plus ownership: agents may only act on their own records.
pub fn authorize_owner(actor: &Actor, action: Action, owner_agent_id: &str) -> CoreResult<()> {
    authorize(actor, action)?;
    if actor.role == Role::Agent && actor.user_id != owner_agent_id {
        return Err(CoreError::unauthorized(
            actor.role,
            format!("{} owned by another agent", action),
        ));
    }
    Ok(())
}

/// Role check plus assignment: operators may only act on their own jobs.
pub fn authorize_assigned_operator(
    actor: &Actor,
    action: Action,
    assignment: &OperatorAssignment,
) -> CoreResult<()> {
    authorize(actor, action)?;
    if actor.role == Role::Operator && !assignment.is_assigned_to(&actor.user_id) {
        return Err(CoreError::unauthorized(
            actor.role,
            format!("{} for an assignment held by another operator", action),
        ));
    }
    Ok(())
}

/// Read access to a quote or booking.
///
/// Staff and admin read everything, agents their own records, operators and
/// hotel partners the records assigned to them. Clients read through a shared
/// link, so the role alone is enough.
pub fn authorize_view(
    actor: &Actor,
    owner_agent_id: &str,
    assignment: &OperatorAssignment,
) -> CoreResult<()> {
    let allowed = match actor.role {
        Role::Admin | Role::Staff | Role::Client => true,
        Role::Agent => actor.user_id == owner_agent_id,
        Role::Operator | Role::HotelPartner => assignment.is_assigned_to(&actor.user_id),
    };
    if allowed {
        Ok(())
    } else {
        Err(CoreError::unauthorized(actor.role, "view record"))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::OperatorStatus;

    #[test]
    fn test_client_and_hotel_partner_cannot_mutate() {
        for action in [
            Action::CreateQuote,
            Action::ApproveQuote,
            Action::RecordPayment,
            Action::RespondToAssignment,
        ] {
            assert!(!is_allowed(Role::Client, action));
            assert!(!is_allowed(Role::HotelPartner, action));
        }
        assert!(!is_allowed(Role::Client, Action::PostMessage));
    }

    #[test]
    fn test_staff_only_actions() {
        for action in [Action::ApproveQuote, Action::AssignOperator, Action::RecordPayment] {
            assert!(is_allowed(Role::Staff, action));
            assert!(is_allowed(Role::Admin, action));
            assert!(!is_allowed(Role::Agent, action));
            assert!(!is_allowed(Role::Operator, action));
        }
    }

    #[test]
    fn test_agent_ownership() {
        let agent = Actor::new("agent-1", "Ravi", Role::Agent);
        assert!(authorize_owner(&agent, Action::SubmitQuote, "agent-1").is_ok());
        let err = authorize_owner(&agent, Action::SubmitQuote, "agent-2").unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));

        let staff = Actor::new("staff-1", "Asha", Role::Staff);
        assert!(authorize_owner(&staff, Action::SubmitQuote, "agent-2").is_ok());
    }

    #[test]
    fn test_assigned_operator_only() {
        let assignment = OperatorAssignment {
            operator_id: Some("op-1".to_string()),
            status: OperatorStatus::Assigned,
            ..OperatorAssignment::default()
        };
        let op1 = Actor::new("op-1", "Kiran", Role::Operator);
        let op2 = Actor::new("op-2", "Mehul", Role::Operator);

        assert!(authorize_assigned_operator(&op1, Action::RespondToAssignment, &assignment).is_ok());
        assert!(authorize_assigned_operator(&op2, Action::RespondToAssignment, &assignment).is_err());
    }

    #[test]
    fn test_view_access() {
        let assignment = OperatorAssignment {
            operator_id: Some("op-1".to_string()),
            status: OperatorStatus::Assigned,
            ..OperatorAssignment::default()
        };
        let owner = Actor::new("agent-1", "Ravi", Role::Agent);
        let other = Actor::new("agent-2", "Meera", Role::Agent);
        let op = Actor::new("op-1", "Kiran", Role::Operator);
        let stranger = Actor::new("op-9", "Dev", Role::Operator);

        assert!(authorize_view(&owner, "agent-1", &assignment).is_ok());
        assert!(authorize_view(&other, "agent-1", &assignment).is_err());
        assert!(authorize_view(&op, "agent-1", &assignment).is_ok());
        assert!(authorize_view(&stranger, "agent-1", &assignment).is_err());
        assert!(authorize_view(&Actor::public_client(), "agent-1", &assignment).is_ok());
    }
}
