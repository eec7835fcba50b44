//! # Currency Conversion
//!
//! Pure conversion against a current-rate snapshot. There are no historical
//! rates: a quote is always priced at the rates the provider holds now.
//!
//! ```text
//! Service.cost (EUR) ──► CurrencyConverter ──► cost in quote currency (USD)
//!                              │
//!                              ▼
//!                  CurrencyRateProvider::rate("EUR", "USD")
//!                              │
//!                   None ──► CoreError::RateUnavailable
//! ```
//!
//! A missing rate is always an error. It is never treated as 1.0.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt::Debug;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::MAX_AMOUNT;

// =============================================================================
// Rate Provider
// =============================================================================

/// Source of exchange rates.
///
/// `rate(from, to)` returns how many units of `to` one unit of `from` buys.
pub trait CurrencyRateProvider: Send + Sync + Debug {
    fn rate(&self, from: &str, to: &str) -> Option<Decimal>;
}

/// In-memory rate snapshot.
///
/// Looks up the direct pair first, then the inverse of the reverse pair.
/// Same-currency lookups always return one.
///
/// ## Example
/// ```rust
/// use rust_decimal_macros::dec;
/// use tripdesk_core::currency::{CurrencyRateProvider, RateTable};
///
/// let rates = RateTable::new().with_rate("USD", "INR", dec!(83)).unwrap();
/// assert_eq!(rates.rate("USD", "INR"), Some(dec!(83)));
/// assert!(rates.rate("INR", "USD").is_some());
/// assert_eq!(rates.rate("EUR", "INR"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: HashMap<(String, String), Decimal>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rate for a pair. Rates must be strictly positive.
    pub fn set_rate(&mut self, from: &str, to: &str, rate: Decimal) -> Result<(), ValidationError> {
        if rate <= Decimal::ZERO {
            return Err(ValidationError::MustBePositive {
                field: format!("rate {}->{}", from, to),
            });
        }
        self.rates
            .insert((from.to_uppercase(), to.to_uppercase()), rate);
        Ok(())
    }

    /// Builder form of [`RateTable::set_rate`].
    pub fn with_rate(mut self, from: &str, to: &str, rate: Decimal) -> Result<Self, ValidationError> {
        self.set_rate(from, to, rate)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl CurrencyRateProvider for RateTable {
    fn rate(&self, from: &str, to: &str) -> Option<Decimal> {
        let from = from.to_uppercase();
        let to = to.to_uppercase();

        if from == to {
            return Some(Decimal::ONE);
        }

        if let Some(rate) = self.rates.get(&(from.clone(), to.clone())) {
            return Some(*rate);
        }

        self.rates
            .get(&(to, from))
            .and_then(|inverse| Decimal::ONE.checked_div(*inverse))
    }
}

// =============================================================================
// Converter
// =============================================================================

/// Converts money between currencies using a rate provider.
#[derive(Debug, Clone, Copy)]
pub struct CurrencyConverter<'a> {
    rates: &'a dyn CurrencyRateProvider,
}

impl<'a> CurrencyConverter<'a> {
    pub fn new(rates: &'a dyn CurrencyRateProvider) -> Self {
        CurrencyConverter { rates }
    }

    /// Converts `amount` from `from` into `to` at full precision.
    pub fn convert(&self, amount: Money, from: &str, to: &str) -> CoreResult<Money> {
        if from.eq_ignore_ascii_case(to) {
            return Ok(amount);
        }

        let rate = self
            .rates
            .rate(from, to)
            .ok_or_else(|| CoreError::RateUnavailable {
                from: from.to_string(),
                to: to.to_string(),
            })?;

        amount.checked_convert_at(rate).ok_or_else(|| {
            ValidationError::OutOfRange {
                field: format!("{} amount converted to {}", from, to),
                min: 0,
                max: MAX_AMOUNT,
            }
            .into()
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rates() -> RateTable {
        RateTable::new()
            .with_rate("EUR", "USD", dec!(1.10))
            .unwrap()
            .with_rate("USD", "INR", dec!(80))
            .unwrap()
    }

    #[test]
    fn test_direct_and_inverse_lookup() {
        let table = rates();
        assert_eq!(table.rate("EUR", "USD"), Some(dec!(1.10)));
        assert_eq!(table.rate("inr", "usd"), Some(dec!(0.0125)));
        assert_eq!(table.rate("USD", "USD"), Some(Decimal::ONE));
    }

    #[test]
    fn test_convert_keeps_precision() {
        let table = rates();
        let converter = CurrencyConverter::new(&table);
        let usd = converter
            .convert(Money::from_major(100), "EUR", "USD")
            .unwrap();
        assert_eq!(usd.amount(), dec!(110.00));
    }

    #[test]
    fn test_missing_rate_is_an_error() {
        let table = rates();
        let converter = CurrencyConverter::new(&table);
        let err = converter
            .convert(Money::from_major(100), "GBP", "USD")
            .unwrap_err();
        assert!(matches!(err, CoreError::RateUnavailable { .. }));
    }

    #[test]
    fn test_rejects_non_positive_rates() {
        assert!(RateTable::new().with_rate("USD", "INR", dec!(0)).is_err());
        assert!(RateTable::new().with_rate("USD", "INR", dec!(-1)).is_err());
    }
}
