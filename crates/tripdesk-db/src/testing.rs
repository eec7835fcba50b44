//! Record builders for storage tests.

use chrono::Utc;
use rust_decimal_macros::dec;
use tripdesk_core::booking::from_quote;
use tripdesk_core::currency::RateTable;
use tripdesk_core::lifecycle::{approve, create_draft, submit, QuoteDraft};
use tripdesk_core::pricing::{AgentMarkup, PricingRules};
use tripdesk_core::{
    Actor, Booking, ItineraryItem, Money, Percent, Quote, Role, Service, ServiceType, Traveler,
};

pub fn agent() -> Actor {
    Actor::new("agent-1", "Ravi Travels", Role::Agent)
}

pub fn staff() -> Actor {
    Actor::new("staff-1", "Asha", Role::Staff)
}

pub fn draft_quote() -> Quote {
    let draft = QuoteDraft {
        title: "Kerala Backwaters".to_string(),
        agent_id: "agent-1".to_string(),
        client_name: "Iyer Family".to_string(),
        currency: "USD".to_string(),
        pax_count: 2,
        itinerary: vec![ItineraryItem {
            day: 1,
            title: "Houseboat".to_string(),
            description: "Overnight cruise from Alleppey".to_string(),
            services: vec![Service::new(
                ServiceType::Hotel,
                "Lake Palace Houseboat",
                Money::new(dec!(240.50)),
                "USD",
            )],
            inclusions: vec!["All meals".to_string()],
        }],
        pricing_rules: PricingRules {
            company_markup_percent: Percent::from_whole(10),
            agent_markup: AgentMarkup::Flat(Money::from_major(20)),
            gst_percent: Percent::from_whole(5),
        },
    };
    create_draft(draft, &agent(), &RateTable::new(), Utc::now()).unwrap()
}

pub fn approved_quote() -> Quote {
    let mut quote = draft_quote();
    submit(&mut quote, &agent(), Utc::now()).unwrap();
    approve(&mut quote, &staff(), Utc::now()).unwrap();
    quote
}

/// Converts `quote` (which must be APPROVED) into a booking.
pub fn booking_for(quote: &mut Quote) -> Booking {
    from_quote(
        quote,
        vec![Traveler::named("A. Iyer"), Traveler::named("B. Iyer")],
        Percent::from_whole(30),
        &agent(),
        Utc::now(),
    )
    .unwrap()
}
