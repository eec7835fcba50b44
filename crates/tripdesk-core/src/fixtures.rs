//! Shared builders for unit tests.

use chrono::Utc;

use crate::currency::RateTable;
use crate::lifecycle::{approve, create_draft, submit, QuoteDraft};
use crate::money::{Money, Percent};
use crate::pricing::{AgentMarkup, PricingRules};
use crate::types::{Actor, ItineraryItem, Quote, Role, Service, ServiceType};

pub fn agent() -> Actor {
    Actor::new("agent-1", "Ravi Travels", Role::Agent)
}

pub fn staff() -> Actor {
    Actor::new("staff-1", "Asha", Role::Staff)
}

/// 100 USD hotel, company 10%, agent flat 20, GST 18%, two travelers.
pub fn sample_draft() -> QuoteDraft {
    QuoteDraft {
        title: "Goa Getaway".to_string(),
        agent_id: "agent-1".to_string(),
        client_name: "Mehta Family".to_string(),
        currency: "USD".to_string(),
        pax_count: 2,
        itinerary: vec![ItineraryItem {
            day: 1,
            title: "Arrival".to_string(),
            description: "Check in and beach evening".to_string(),
            services: vec![Service::new(
                ServiceType::Hotel,
                "Sea View Resort",
                Money::from_major(100),
                "USD",
            )],
            inclusions: vec!["Breakfast".to_string()],
        }],
        pricing_rules: PricingRules {
            company_markup_percent: Percent::from_whole(10),
            agent_markup: AgentMarkup::Flat(Money::from_major(20)),
            gst_percent: Percent::from_whole(18),
        },
    }
}

pub fn sample_quote() -> Quote {
    create_draft(sample_draft(), &agent(), &RateTable::new(), Utc::now()).unwrap()
}

pub fn approved_quote() -> Quote {
    let mut quote = sample_quote();
    submit(&mut quote, &agent(), Utc::now()).unwrap();
    approve(&mut quote, &staff(), Utc::now()).unwrap();
    quote
}
