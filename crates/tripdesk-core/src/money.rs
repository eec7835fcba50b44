//! # Money Module
//!
//! Provides the `Money` and `Percent` types for handling monetary values.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  In a multi-currency quote:                                             │
//! │    100 EUR × 1.0873 + 18% GST on markup                                 │
//! │    Rounding every step to cents drifts the total by a cent or two      │
//! │                                                                         │
//! │  OUR SOLUTION: Base-10 Decimal, round ONCE                              │
//! │    Every intermediate keeps full precision                              │
//! │    The sale price is rounded UP at the very end                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use rust_decimal::Decimal;
//! use tripdesk_core::money::{Money, Percent};
//!
//! let net = Money::from_major(100);
//! let markup = Percent::from_whole(10).of(net);
//! assert_eq!(markup, Money::from_major(10));
//!
//! let total = net + markup;
//! assert_eq!(total.amount(), Decimal::from(110));
//! ```

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in a quote or booking currency.
///
/// ## Design Decisions
/// - **Decimal (signed)**: exact base-10 arithmetic, negatives allowed for
///   intermediate differences
/// - **No currency inside**: the owning record (quote, booking, wallet)
///   carries the currency code; mixing currencies goes through
///   [`crate::currency::CurrencyConverter`]
/// - **Serialized as a string** so JSON consumers never see a float
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Service.cost ──► convert ──► net_cost ──► markups ──► gst ──► final   │
/// │                                                                  │      │
/// │                                               ceil ◄─────────────┘      │
/// │                                                 │                       │
/// │                                      Booking.total_amount               │
/// │                                                 │                       │
/// │                        PaymentEntry.amount ──► paid / balance / credit  │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export)]
pub struct Money(#[ts(type = "string")] Decimal);

impl Money {
    /// Wraps a decimal amount.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Creates a whole-unit amount (e.g. 100 USD).
    ///
    /// ## Example
    /// ```rust
    /// use tripdesk_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(150).to_string(), "150.00");
    /// ```
    #[inline]
    pub fn from_major(units: i64) -> Self {
        Money(Decimal::from(units))
    }

    /// Creates an amount from minor units (cents, paise).
    ///
    /// ## Example
    /// ```rust
    /// use tripdesk_core::money::Money;
    ///
    /// assert_eq!(Money::from_minor(15340).to_string(), "153.40");
    /// ```
    #[inline]
    pub fn from_minor(minor: i64) -> Self {
        Money(Decimal::new(minor, 2))
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    /// Returns the underlying decimal amount.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Rounds UP to the next whole currency unit.
    ///
    /// This is the only rounding applied to a price: the final sale price
    /// and the booking advance. Rounding up means the platform never
    /// under-charges because of accumulated fractions.
    ///
    /// ## Example
    /// ```rust
    /// use tripdesk_core::money::Money;
    ///
    /// assert_eq!(Money::from_minor(15340).ceil_whole(), Money::from_major(154));
    /// assert_eq!(Money::from_major(300).ceil_whole(), Money::from_major(300));
    /// ```
    #[inline]
    pub fn ceil_whole(&self) -> Self {
        Money(self.0.ceil())
    }

    /// Rounds to two decimal places for display (half away from zero).
    #[inline]
    fn round_for_display(&self) -> Self {
        Money(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Multiplies by an exchange rate. Full precision is kept.
    #[inline]
    pub fn convert_at(&self, rate: Decimal) -> Self {
        Money(self.0 * rate)
    }

    /// `convert_at` that returns `None` instead of overflowing.
    #[inline]
    pub fn checked_convert_at(&self, rate: Decimal) -> Option<Self> {
        self.0.checked_mul(rate).map(Money)
    }

    /// Addition that returns `None` instead of overflowing.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Divides evenly by a head count. Full precision is kept.
    ///
    /// Callers guarantee `count >= 1`; a zero count returns the amount
    /// unchanged rather than panicking.
    pub fn split(&self, count: u32) -> Self {
        if count == 0 {
            return *self;
        }
        Money(self.0 / Decimal::from(count))
    }

    /// Returns zero if the amount is negative.
    #[inline]
    pub fn floor_at_zero(&self) -> Self {
        if self.is_negative() {
            Money::zero()
        } else {
            *self
        }
    }
}

// =============================================================================
// Percent Type
// =============================================================================

/// A percentage such as a markup or tax rate (`18` means 18%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct Percent(#[ts(type = "string")] Decimal);

impl Percent {
    /// Wraps a decimal percentage.
    #[inline]
    pub const fn new(value: Decimal) -> Self {
        Percent(value)
    }

    /// Creates a whole-number percentage.
    #[inline]
    pub fn from_whole(value: u32) -> Self {
        Percent(Decimal::from(value))
    }

    /// Zero percent.
    #[inline]
    pub const fn zero() -> Self {
        Percent(Decimal::ZERO)
    }

    /// Returns the percentage value (18 for 18%).
    #[inline]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    /// Checks if the percentage is negative.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Applies the percentage to an amount without rounding.
    ///
    /// ## Example
    /// ```rust
    /// use tripdesk_core::money::{Money, Percent};
    ///
    /// let gst = Percent::from_whole(18).of(Money::from_major(130));
    /// assert_eq!(gst, Money::from_minor(2340));
    /// ```
    #[inline]
    pub fn of(&self, amount: Money) -> Money {
        Money(amount.0 * self.0 / Decimal::ONE_HUNDRED)
    }

    /// `of` that returns `None` instead of overflowing.
    #[inline]
    pub fn checked_of(&self, amount: Money) -> Option<Money> {
        amount
            .0
            .checked_mul(self.0)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .map(Money)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows two decimal places without a currency symbol.
///
/// ## Note
/// The owning record knows the currency. Localized formatting belongs to
/// the rendering layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.round_for_display().0)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Money(amount)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
