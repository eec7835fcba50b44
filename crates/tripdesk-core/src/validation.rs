//! # Validation Module
//!
//! Input validation utilities for TripDesk.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Client (TypeScript)                                          │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Domain rules (Rust)                                          │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: field-level validation                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  └── UNIQUE constraints                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tripdesk_core::validation::{validate_currency_code, validate_pax_count};
//!
//! validate_currency_code("USD").unwrap();
//! assert!(validate_pax_count(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::{Money, Percent};
use crate::{
    MAX_AMOUNT, MAX_MESSAGE_LENGTH, MAX_PAX_COUNT, MAX_PERCENT, MAX_REASON_LENGTH,
    MAX_TITLE_LENGTH,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an ISO-4217 currency code.
///
/// ## Rules
/// - Exactly three ASCII uppercase letters
///
/// ## Example
/// ```rust
/// use tripdesk_core::validation::validate_currency_code;
///
/// assert!(validate_currency_code("INR").is_ok());
/// assert!(validate_currency_code("usd").is_err());
/// assert!(validate_currency_code("EURO").is_err());
/// ```
pub fn validate_currency_code(code: &str) -> ValidationResult<()> {
    if code.trim().is_empty() {
        return Err(ValidationError::required("currency"));
    }

    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be a three-letter ISO code such as USD".to_string(),
        });
    }

    Ok(())
}

/// Validates a required, length-limited text field and returns it trimmed.
fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Validates a quote title or client name.
pub fn validate_title(field: &str, value: &str) -> ValidationResult<String> {
    validate_text(field, value, MAX_TITLE_LENGTH)
}

/// Validates chat message content.
///
/// ## Example
/// ```rust
/// use tripdesk_core::validation::validate_message_content;
///
/// assert_eq!(validate_message_content("  hello ").unwrap(), "hello");
/// assert!(validate_message_content("   ").is_err());
/// ```
pub fn validate_message_content(content: &str) -> ValidationResult<String> {
    validate_text("message", content, MAX_MESSAGE_LENGTH)
}

/// Validates a rejection, decline or cancellation reason.
pub fn validate_reason(field: &str, reason: &str) -> ValidationResult<String> {
    validate_text(field, reason, MAX_REASON_LENGTH)
}

/// Validates an identifier supplied by a caller (payment id, operator id).
pub fn validate_identifier(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::required(field));
    }

    if id.len() > 100 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 100,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the party size of a quote.
///
/// ## Rules
/// - At least one traveler
/// - At most MAX_PAX_COUNT
pub fn validate_pax_count(pax: u32) -> ValidationResult<()> {
    if pax == 0 {
        return Err(ValidationError::MustBePositive {
            field: "pax_count".to_string(),
        });
    }

    if pax > MAX_PAX_COUNT {
        return Err(ValidationError::OutOfRange {
            field: "pax_count".to_string(),
            min: 1,
            max: i64::from(MAX_PAX_COUNT),
        });
    }

    Ok(())
}

/// Rejects amounts above MAX_AMOUNT.
pub fn validate_amount_bound(field: &str, amount: Money) -> ValidationResult<()> {
    if amount > Money::from_major(MAX_AMOUNT) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT,
        });
    }

    Ok(())
}

/// Validates a cost or flat amount that may be zero but never negative.
///
/// ## Rules
/// - Not negative
/// - At most MAX_AMOUNT
pub fn validate_non_negative(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    validate_amount_bound(field, amount)
}

/// Validates a markup or tax percentage.
///
/// ## Rules
/// - Not negative
/// - At most MAX_PERCENT
pub fn validate_percent(field: &str, pct: Percent) -> ValidationResult<()> {
    if pct.is_negative() {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    if pct > Percent::from_whole(MAX_PERCENT) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::from(MAX_PERCENT),
        });
    }

    Ok(())
}

/// Validates a payment amount.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Cannot pay zero or negative amounts
/// - At most MAX_AMOUNT
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }

    validate_amount_bound("payment amount", amount)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_currency_code() {
        assert!(validate_currency_code("USD").is_ok());
        assert!(validate_currency_code("").is_err());
        assert!(validate_currency_code("US").is_err());
        assert!(validate_currency_code("U$D").is_err());
    }

    #[test]
    fn test_validate_text_fields() {
        assert_eq!(validate_title("title", " Goa Getaway ").unwrap(), "Goa Getaway");
        assert!(validate_title("title", "").is_err());
        assert!(validate_title("title", &"A".repeat(300)).is_err());
        assert!(validate_reason("reason", "Price too high").is_ok());
        assert!(validate_message_content(&"x".repeat(MAX_MESSAGE_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_pax_count() {
        assert!(validate_pax_count(1).is_ok());
        assert!(validate_pax_count(0).is_err());
        assert!(validate_pax_count(MAX_PAX_COUNT + 1).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_non_negative("cost", Money::zero()).is_ok());
        assert!(validate_non_negative("cost", Money::new(dec!(-1))).is_err());
        assert!(validate_percent("gst", Percent::new(dec!(-0.5))).is_err());
        assert!(validate_payment_amount(Money::zero()).is_err());
        assert!(validate_payment_amount(Money::from_minor(1)).is_ok());
    }

    #[test]
    fn test_amounts_and_percentages_are_bounded() {
        let ceiling = Money::from_major(MAX_AMOUNT);
        assert!(validate_non_negative("cost", ceiling).is_ok());
        assert!(matches!(
            validate_non_negative("cost", Money::new(Decimal::MAX)),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(validate_payment_amount(ceiling + Money::from_minor(1)).is_err());

        assert!(validate_percent("gst", Percent::from_whole(MAX_PERCENT)).is_ok());
        assert!(matches!(
            validate_percent("gst", Percent::new(Decimal::MAX)),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("payment_id", "pay-1").is_ok());
        assert!(validate_identifier("payment_id", "  ").is_err());
    }
}
