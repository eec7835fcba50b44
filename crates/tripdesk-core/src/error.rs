//! # Error Types
//!
//! Domain-specific error types for tripdesk-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tripdesk-core errors (this file)                                      │
//! │  ├── CoreError        - Rule violations and collaborator failures      │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tripdesk-db errors (separate crate)                                   │
//! │  └── DbError          - Database failures, converted into CoreError    │
//! │                                                                         │
//! │  tripdesk-engine errors                                                │
//! │  └── ConfigError      - Configuration loading failures                 │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ← DbError                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant is recoverable and returned to the caller. Nothing in this
//! crate logs a violation and carries on.

use thiserror::Error;

use crate::money::Money;
use crate::types::Role;

// =============================================================================
// Core Error
// =============================================================================

/// Domain rule violations and collaborator failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A state machine was asked for a transition it does not allow.
    ///
    /// ## When This Occurs
    /// - Approving a DRAFT quote
    /// - Submitting a quote that is already SUBMITTED
    /// - Starting a trip whose operator has not accepted
    #[error("{entity} {id} is {current}, cannot {action}")]
    InvalidStateTransition {
        entity: &'static str,
        id: String,
        current: String,
        action: String,
    },

    /// Direct edit of a locked quote. Locked quotes change only by revision.
    #[error("Quote {quote_id} is locked; create a revision to change it")]
    LockedQuoteMutation { quote_id: String },

    /// Revision requested on a quote that is still editable.
    #[error("Quote {quote_id} is not locked; edit it directly instead of revising")]
    RevisionNotAllowed { quote_id: String },

    /// Optimistic concurrency check failed on write.
    ///
    /// ## User Workflow
    /// ```text
    /// Agent reads quote (record_version 3)    Staff reads quote (record_version 3)
    ///      │                                       │
    ///      ▼                                       ▼
    /// save(expected 3) → OK, now 4            save(expected 3)
    ///                                              │
    ///                                              ▼
    ///                              ConcurrentModification { expected: 3, actual: 4 }
    ///                                              │
    ///                                              ▼
    ///                                   UI reloads and retries
    /// ```
    #[error("{entity} {id} was modified concurrently (expected version {expected}, found {actual})")]
    ConcurrentModification {
        entity: &'static str,
        id: String,
        expected: u64,
        actual: u64,
    },

    /// The actor's role lacks rights for the requested action.
    #[error("{role} is not allowed to {action}")]
    Unauthorized { role: Role, action: String },

    /// The payment verifier rejected the payment.
    #[error("Payment {payment_id} could not be verified")]
    PaymentVerificationFailed { payment_id: String },

    /// Wallet deduction exceeds balance plus credit limit.
    #[error("Insufficient funds in wallet of {agent_id}: requested {requested}, available {available}")]
    InsufficientFunds {
        agent_id: String,
        requested: Money,
        available: Money,
    },

    /// Entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The rate provider has no rate for the currency pair.
    #[error("No exchange rate from {from} to {to}")]
    RateUnavailable { from: String, to: String },

    /// A collaborator (repository, sink, sequence) failed.
    #[error("Storage failure: {0}")]
    Storage(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidStateTransition error.
    pub fn invalid_transition(
        entity: &'static str,
        id: impl Into<String>,
        current: impl ToString,
        action: impl Into<String>,
    ) -> Self {
        CoreError::InvalidStateTransition {
            entity,
            id: id.into(),
            current: current.to_string(),
            action: action.into(),
        }
    }

    /// Creates a NotFound error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates an Unauthorized error.
    pub fn unauthorized(role: Role, action: impl Into<String>) -> Self {
        CoreError::Unauthorized {
            role,
            action: action.into(),
        }
    }

    /// Returns true for errors the caller should resolve by reloading.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::ConcurrentModification { .. })
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before any rule runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., currency code, role name).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., replayed payment id).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// Creates a Required error.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
