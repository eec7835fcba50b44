//! # Pricing Engine
//!
//! Rolls itinerary service costs up into a [`PricingBreakdown`].
//!
//! ## Price Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  services (any currency, is_ref = false)                                │
//! │       │ convert to quote currency, sum                                  │
//! │       ▼                                                                 │
//! │  net_cost ──────────────────────────── what suppliers charge            │
//! │       + company_markup_value  (net × company%)                          │
//! │       + gst on (net + company)                                          │
//! │       = b2b_price ──────────────────── what the agent pays              │
//! │                                                                         │
//! │  net_cost + company_markup_value + agent_markup_value                   │
//! │       + gst_amount (on all three)                                       │
//! │       = final_price ───────────────── what the agent's client pays      │
//! │       ceil ──► sale_price                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The breakdown is derived data: it is recomputed whenever the itinerary or
//! the rules change and is never the source of truth. Only `sale_price` is
//! rounded.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::currency::{CurrencyConverter, CurrencyRateProvider};
use crate::error::{CoreResult, ValidationError};
use crate::money::{Money, Percent};
use crate::types::{ItineraryItem, ServiceType};
use crate::validation::{
    validate_amount_bound, validate_currency_code, validate_non_negative, validate_pax_count,
    validate_percent,
};
use crate::MAX_AMOUNT;

// =============================================================================
// Rules
// =============================================================================

/// How the agent marks up the B2B price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentMarkup {
    /// Percentage of net cost.
    Percent(Percent),
    /// Flat amount already in quote currency. Never re-converted.
    Flat(Money),
}

impl Default for AgentMarkup {
    fn default() -> Self {
        AgentMarkup::Flat(Money::zero())
    }
}

/// Markup and tax inputs the breakdown is computed from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricingRules {
    pub company_markup_percent: Percent,
    pub agent_markup: AgentMarkup,
    pub gst_percent: Percent,
}

impl PricingRules {
    pub fn validate(&self) -> CoreResult<()> {
        validate_percent("company_markup_percent", self.company_markup_percent)?;
        validate_percent("gst_percent", self.gst_percent)?;
        match self.agent_markup {
            AgentMarkup::Percent(pct) => validate_percent("agent_markup", pct)?,
            AgentMarkup::Flat(amount) => validate_non_negative("agent_markup", amount)?,
        }
        Ok(())
    }
}

// =============================================================================
// Breakdown
// =============================================================================

/// A reference-only service: shown on the itinerary, not charged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExcludedReference {
    pub day: u32,
    pub service_type: ServiceType,
    pub name: String,
    pub cost: Money,
    pub currency: String,
}

/// Result of a pricing run, all figures in `currency`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricingBreakdown {
    pub currency: String,
    pub pax_count: u32,
    pub net_cost: Money,
    pub company_markup_value: Money,
    pub agent_markup_value: Money,
    pub gst_amount: Money,
    pub b2b_price: Money,
    pub final_price: Money,
    pub per_person_price: Money,
    pub sale_price: Money,
    pub excluded_references: Vec<ExcludedReference>,
}

/// Computes the price breakdown of an itinerary.
///
/// ## Errors
/// - `ValidationError` for pax 0, a bad currency code, negative or
///   out-of-range costs and rule values, or a total above `MAX_AMOUNT`
/// - `RateUnavailable` if a service currency has no rate to the quote
///   currency
pub fn compute_breakdown(
    itinerary: &[ItineraryItem],
    rules: &PricingRules,
    pax_count: u32,
    quote_currency: &str,
    rates: &dyn CurrencyRateProvider,
) -> CoreResult<PricingBreakdown> {
    validate_pax_count(pax_count)?;
    validate_currency_code(quote_currency)?;
    rules.validate()?;

    let converter = CurrencyConverter::new(rates);
    let mut net_cost = Money::zero();
    let mut excluded_references = Vec::new();

    for item in itinerary {
        for service in &item.services {
            validate_non_negative("service cost", service.cost)?;

            if service.is_ref {
                excluded_references.push(ExcludedReference {
                    day: item.day,
                    service_type: service.service_type,
                    name: service.name.clone(),
                    cost: service.cost,
                    currency: service.currency.clone(),
                });
                continue;
            }

            let cost = converter.convert(service.cost, &service.currency, quote_currency)?;
            net_cost = net_cost.checked_add(cost).ok_or_else(overflow)?;
        }
    }

    let company_markup_value = rules
        .company_markup_percent
        .checked_of(net_cost)
        .ok_or_else(overflow)?;
    let agent_markup_value = match rules.agent_markup {
        AgentMarkup::Percent(pct) => pct.checked_of(net_cost).ok_or_else(overflow)?,
        AgentMarkup::Flat(amount) => amount,
    };

    let b2b_base = net_cost
        .checked_add(company_markup_value)
        .ok_or_else(overflow)?;
    let b2b_price = rules
        .gst_percent
        .checked_of(b2b_base)
        .and_then(|gst| b2b_base.checked_add(gst))
        .ok_or_else(overflow)?;

    let taxable = b2b_base.checked_add(agent_markup_value).ok_or_else(overflow)?;
    let gst_amount = rules.gst_percent.checked_of(taxable).ok_or_else(overflow)?;
    let final_price = taxable.checked_add(gst_amount).ok_or_else(overflow)?;
    validate_amount_bound("final price", final_price)?;

    Ok(PricingBreakdown {
        currency: quote_currency.to_string(),
        pax_count,
        net_cost,
        company_markup_value,
        agent_markup_value,
        gst_amount,
        b2b_price,
        final_price,
        per_person_price: final_price.split(pax_count),
        sale_price: final_price.ceil_whole(),
        excluded_references,
    })
}

fn overflow() -> ValidationError {
    ValidationError::OutOfRange {
        field: "price".to_string(),
        min: 0,
        max: MAX_AMOUNT,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::RateTable;
    use crate::error::CoreError;
    use crate::types::Service;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn day(services: Vec<Service>) -> ItineraryItem {
        ItineraryItem {
            day: 1,
            title: "Day 1".to_string(),
            description: String::new(),
            services,
            inclusions: vec![],
        }
    }

    fn scenario_rules() -> PricingRules {
        PricingRules {
            company_markup_percent: Percent::from_whole(10),
            agent_markup: AgentMarkup::Flat(Money::from_major(20)),
            gst_percent: Percent::from_whole(18),
        }
    }

    #[test]
    fn test_hotel_with_flat_agent_markup() {
        let itinerary = vec![day(vec![Service::new(
            ServiceType::Hotel,
            "Beach Resort",
            Money::from_major(100),
            "USD",
        )])];

        let b = compute_breakdown(&itinerary, &scenario_rules(), 2, "USD", &RateTable::new())
            .unwrap();

        assert_eq!(b.net_cost.amount(), dec!(100));
        assert_eq!(b.company_markup_value.amount(), dec!(10));
        assert_eq!(b.agent_markup_value.amount(), dec!(20));
        assert_eq!(b.gst_amount.amount(), dec!(23.4));
        assert_eq!(b.final_price.amount(), dec!(153.4));
        assert_eq!(b.per_person_price.amount(), dec!(76.7));
        assert_eq!(b.b2b_price.amount(), dec!(129.8));
        assert_eq!(b.sale_price, Money::from_major(154));
    }

    #[test]
    fn test_final_price_is_exact_sum() {
        let rates = RateTable::new().with_rate("EUR", "USD", dec!(1.0873)).unwrap();
        let itinerary = vec![day(vec![
            Service::new(ServiceType::Hotel, "Hotel", Money::new(dec!(333.33)), "EUR"),
            Service::new(ServiceType::Activity, "Tour", Money::new(dec!(41.17)), "USD"),
        ])];
        let rules = PricingRules {
            company_markup_percent: Percent::new(dec!(7.5)),
            agent_markup: AgentMarkup::Percent(Percent::new(dec!(12.25))),
            gst_percent: Percent::from_whole(5),
        };

        let b = compute_breakdown(&itinerary, &rules, 3, "USD", &rates).unwrap();

        assert_eq!(
            b.final_price,
            b.net_cost + b.company_markup_value + b.agent_markup_value + b.gst_amount
        );
        let back = b.per_person_price.amount() * Decimal::from(3);
        assert!((back - b.final_price.amount()).abs() < dec!(0.01));
        assert!(b.sale_price >= b.final_price);
        assert!(b.sale_price.amount() - b.final_price.amount() < Decimal::ONE);
    }

    #[test]
    fn test_reference_services_are_itemized_not_charged() {
        let itinerary = vec![day(vec![
            Service::new(ServiceType::Hotel, "Hotel", Money::from_major(100), "USD"),
            Service::new(ServiceType::Flight, "Own flight", Money::from_major(400), "USD")
                .reference_only(),
        ])];

        let b = compute_breakdown(&itinerary, &PricingRules::default(), 1, "USD", &RateTable::new())
            .unwrap();

        assert_eq!(b.net_cost, Money::from_major(100));
        assert_eq!(b.excluded_references.len(), 1);
        assert_eq!(b.excluded_references[0].name, "Own flight");
    }

    #[test]
    fn test_reference_service_needs_no_rate() {
        let itinerary = vec![day(vec![Service::new(
            ServiceType::Flight,
            "Own flight",
            Money::from_major(400),
            "GBP",
        )
        .reference_only()])];

        let b = compute_breakdown(&itinerary, &PricingRules::default(), 1, "USD", &RateTable::new())
            .unwrap();
        assert!(b.net_cost.is_zero());
    }

    #[test]
    fn test_flat_markup_is_not_converted() {
        let rates = RateTable::new().with_rate("EUR", "INR", dec!(90)).unwrap();
        let itinerary = vec![day(vec![Service::new(
            ServiceType::Hotel,
            "Hotel",
            Money::from_major(10),
            "EUR",
        )])];
        let rules = PricingRules {
            agent_markup: AgentMarkup::Flat(Money::from_major(500)),
            ..PricingRules::default()
        };

        let b = compute_breakdown(&itinerary, &rules, 1, "INR", &rates).unwrap();
        assert_eq!(b.net_cost, Money::from_major(900));
        assert_eq!(b.agent_markup_value, Money::from_major(500));
        assert_eq!(b.final_price, Money::from_major(1400));
    }

    #[test]
    fn test_invalid_inputs() {
        let itinerary = vec![day(vec![Service::new(
            ServiceType::Hotel,
            "Hotel",
            Money::from_major(100),
            "USD",
        )])];
        let none = RateTable::new();

        let err = compute_breakdown(&itinerary, &scenario_rules(), 0, "USD", &none).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let bad_rules = PricingRules {
            gst_percent: Percent::new(dec!(-1)),
            ..scenario_rules()
        };
        let err = compute_breakdown(&itinerary, &bad_rules, 2, "USD", &none).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let negative = vec![day(vec![Service::new(
            ServiceType::Hotel,
            "Refund",
            Money::new(dec!(-5)),
            "USD",
        )])];
        let err = compute_breakdown(&negative, &scenario_rules(), 2, "USD", &none).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let err = compute_breakdown(&itinerary, &scenario_rules(), 2, "EUR", &none).unwrap_err();
        assert!(matches!(err, CoreError::RateUnavailable { .. }));
    }

    #[derive(Debug)]
    struct RunawayRate;

    impl CurrencyRateProvider for RunawayRate {
        fn rate(&self, _from: &str, _to: &str) -> Option<Decimal> {
            Some(Decimal::MAX)
        }
    }

    #[test]
    fn test_huge_inputs_are_refused_not_panicking() {
        let rules = PricingRules {
            company_markup_percent: Percent::from_whole(10),
            ..PricingRules::default()
        };

        let at_max = vec![day(vec![Service::new(
            ServiceType::Hotel,
            "Palace",
            Money::new(Decimal::MAX),
            "USD",
        )])];
        let err = compute_breakdown(&at_max, &rules, 2, "USD", &RateTable::new()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { .. })
        ));

        let converted = vec![day(vec![Service::new(
            ServiceType::Hotel,
            "Palace",
            Money::from_major(1_000),
            "EUR",
        )])];
        let err = compute_breakdown(&converted, &rules, 2, "USD", &RunawayRate).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { .. })
        ));

        // each line within bounds, but the marked-up total is not
        let ceiling = Money::from_major(crate::MAX_AMOUNT);
        let many = vec![day(vec![
            Service::new(ServiceType::Hotel, "Palace", ceiling, "USD"),
            Service::new(ServiceType::Hotel, "Palace annex", ceiling, "USD"),
        ])];
        let err = compute_breakdown(&many, &rules, 2, "USD", &RateTable::new()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OutOfRange { field, .. }) if field == "final price"
        ));
    }
}
