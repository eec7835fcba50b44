//! # Visibility Resolver
//!
//! The privacy wall: one table decides which name and which price figure a
//! viewer may see. Every rendered name or price goes through this module.
//!
//! ## Names
//! ```text
//! ┌───────────────┬──────────────┬──────────────┬──────────────────┬──────────┐
//! │ viewer \ from │ AGENT        │ OPERATOR /   │ STAFF / ADMIN    │ CLIENT   │
//! │               │              │ HOTEL_PARTNER│                  │          │
//! ├───────────────┼──────────────┼──────────────┼──────────────────┼──────────┤
//! │ STAFF / ADMIN │ name (ROLE)  │ name (ROLE)  │ name (ROLE)      │name(ROLE)│
//! │ AGENT         │ "Agent"      │ "Operator"   │ "Staff: name"    │ "Client" │
//! │ OPERATOR /    │ "Colleague"  │ "Operator"   │ "Staff: name"    │ "Client" │
//! │ HOTEL_PARTNER │              │              │                  │          │
//! │ CLIENT        │ name         │ "Operator"   │ "Support"        │ "Client" │
//! └───────────────┴──────────────┴──────────────┴──────────────────┴──────────┘
//!  own messages: "You"          system messages: "System"
//! ```
//!
//! ## Prices
//! ```text
//! STAFF / ADMIN   full figures (cost, price, selling price)
//! AGENT, CLIENT   selling price
//! OPERATOR        operator_price ──► cost if net_cost_visible ──► Hidden
//! HOTEL_PARTNER   operator_price ──► Hidden
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::operator::{OperatorAssignment, OperatorStatus};
use crate::types::{
    Actor, Booking, BookingStatus, ItineraryItem, Message, Quote, QuoteStatus, Role, ServiceType,
};

// =============================================================================
// Name Table
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Party {
    Internal,
    Agent,
    Supply,
    Client,
}

impl Party {
    const fn of(role: Role) -> Party {
        match role {
            Role::Admin | Role::Staff => Party::Internal,
            Role::Agent => Party::Agent,
            Role::Operator | Role::HotelPartner => Party::Supply,
            Role::Client => Party::Client,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameRule {
    Real,
    RealWithRole,
    StaffPrefixed,
    Alias(&'static str),
}

const fn name_rule(viewer: Party, sender: Party) -> NameRule {
    match (viewer, sender) {
        (Party::Internal, _) => NameRule::RealWithRole,

        (Party::Agent, Party::Agent) => NameRule::Alias("Agent"),
        (Party::Agent, Party::Supply) => NameRule::Alias("Operator"),
        (Party::Agent, Party::Internal) => NameRule::StaffPrefixed,

        (Party::Supply, Party::Agent) => NameRule::Alias("Colleague"),
        (Party::Supply, Party::Supply) => NameRule::Alias("Operator"),
        (Party::Supply, Party::Internal) => NameRule::StaffPrefixed,

        (Party::Client, Party::Agent) => NameRule::Real,
        (Party::Client, Party::Supply) => NameRule::Alias("Operator"),
        (Party::Client, Party::Internal) => NameRule::Alias("Support"),

        (_, Party::Client) => NameRule::Alias("Client"),
    }
}

/// The sender label `viewer` may see for `message`.
pub fn resolve_display_name(viewer: &Actor, message: &Message) -> String {
    if message.is_system {
        return "System".to_string();
    }
    if !viewer.user_id.is_empty() && message.sender_id == viewer.user_id {
        return "You".to_string();
    }

    match name_rule(Party::of(viewer.role), Party::of(message.sender_role)) {
        NameRule::Real => message.sender_name.clone(),
        NameRule::RealWithRole => format!("{} ({})", message.sender_name, message.sender_role),
        NameRule::StaffPrefixed => format!("Staff: {}", message.sender_name),
        NameRule::Alias(alias) => alias.to_string(),
    }
}

// =============================================================================
// Prices
// =============================================================================

/// A record with the three price figures and an operator assignment.
pub trait PricedRecord {
    fn cost(&self) -> Money;
    fn price(&self) -> Money;
    fn selling_price(&self) -> Money;
    fn operator_assignment(&self) -> &OperatorAssignment;
}

impl PricedRecord for Quote {
    fn cost(&self) -> Money {
        self.cost
    }

    fn price(&self) -> Money {
        self.price
    }

    fn selling_price(&self) -> Money {
        self.selling_price
    }

    fn operator_assignment(&self) -> &OperatorAssignment {
        &self.operator
    }
}

/// A booking's selling price is its (rounded) total.
impl PricedRecord for Booking {
    fn cost(&self) -> Money {
        self.net_cost
    }

    fn price(&self) -> Money {
        self.b2b_price
    }

    fn selling_price(&self) -> Money {
        self.total_amount
    }

    fn operator_assignment(&self) -> &OperatorAssignment {
        &self.operator
    }
}

/// Price figure(s) a viewer may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolvedPrice {
    Amount { amount: Money },
    Full {
        cost: Money,
        price: Money,
        selling_price: Money,
    },
    Hidden,
}

/// The price figure(s) `viewer_role` may see on `record`.
pub fn resolve_price<R: PricedRecord + ?Sized>(viewer_role: Role, record: &R) -> ResolvedPrice {
    let assignment = record.operator_assignment();
    match viewer_role {
        Role::Admin | Role::Staff => ResolvedPrice::Full {
            cost: record.cost(),
            price: record.price(),
            selling_price: record.selling_price(),
        },
        Role::Agent | Role::Client => ResolvedPrice::Amount {
            amount: record.selling_price(),
        },
        Role::Operator => match assignment.operator_price {
            Some(amount) => ResolvedPrice::Amount { amount },
            None if assignment.net_cost_visible_to_operator => ResolvedPrice::Amount {
                amount: record.cost(),
            },
            None => ResolvedPrice::Hidden,
        },
        Role::HotelPartner => match assignment.operator_price {
            Some(amount) => ResolvedPrice::Amount { amount },
            None => ResolvedPrice::Hidden,
        },
    }
}

/// Generic figure where no viewer is involved: the first non-zero of
/// selling price, price, cost.
pub fn display_price<R: PricedRecord + ?Sized>(record: &R) -> Money {
    [record.selling_price(), record.price()]
        .into_iter()
        .find(|m| !m.is_zero())
        .unwrap_or_else(|| record.cost())
}

/// Whether the viewer may see supplier costs (including per-service costs).
pub fn can_see_cost<R: PricedRecord + ?Sized>(viewer_role: Role, record: &R) -> bool {
    match viewer_role {
        Role::Admin | Role::Staff => true,
        Role::Operator => {
            let assignment = record.operator_assignment();
            assignment.operator_price.is_none() && assignment.net_cost_visible_to_operator
        }
        Role::Agent | Role::HotelPartner | Role::Client => false,
    }
}

// =============================================================================
// Redacted Views
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MessageView {
    pub id: String,
    pub sender: String,
    pub content: String,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    pub is_system: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ServiceView {
    pub service_type: ServiceType,
    pub name: String,
    pub is_ref: bool,
    /// Present only for viewers allowed to see supplier costs.
    pub cost: Option<Money>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItineraryDayView {
    pub day: u32,
    pub title: String,
    pub description: String,
    pub services: Vec<ServiceView>,
    pub inclusions: Vec<String>,
}

/// A quote as a specific viewer may see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuoteView {
    pub id: String,
    pub unique_ref_no: String,
    pub version: u32,
    pub status: QuoteStatus,
    pub is_locked: bool,
    pub title: String,
    pub currency: String,
    pub pax_count: u32,
    pub itinerary: Vec<ItineraryDayView>,
    pub price: ResolvedPrice,
    pub operator_status: OperatorStatus,
    pub messages: Vec<MessageView>,
    /// Pass back with the next write against this record.
    pub record_version: u64,
}

/// A booking as a specific viewer may see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BookingView {
    pub id: String,
    pub unique_ref_no: String,
    pub status: BookingStatus,
    pub currency: String,
    pub pax_count: u32,
    pub price: ResolvedPrice,
    /// Payment figures are shown to the agent's side and the back office.
    pub paid_amount: Option<Money>,
    pub balance_amount: Option<Money>,
    pub operator_status: OperatorStatus,
    pub messages: Vec<MessageView>,
    /// Pass back with the next write against this record.
    pub record_version: u64,
}

/// Renders a message list for a viewer, preserving insertion order.
pub fn render_messages(viewer: &Actor, messages: &[Message]) -> Vec<MessageView> {
    messages
        .iter()
        .map(|m| MessageView {
            id: m.id.clone(),
            sender: resolve_display_name(viewer, m),
            content: m.content.clone(),
            timestamp: m.timestamp,
            is_system: m.is_system,
        })
        .collect()
}

fn render_itinerary(itinerary: &[ItineraryItem], show_cost: bool) -> Vec<ItineraryDayView> {
    itinerary
        .iter()
        .map(|item| ItineraryDayView {
            day: item.day,
            title: item.title.clone(),
            description: item.description.clone(),
            services: item
                .services
                .iter()
                .map(|s| ServiceView {
                    service_type: s.service_type,
                    name: s.name.clone(),
                    is_ref: s.is_ref,
                    cost: show_cost.then_some(s.cost),
                    currency: show_cost.then(|| s.currency.clone()),
                })
                .collect(),
            inclusions: item.inclusions.clone(),
        })
        .collect()
}

pub fn quote_view(viewer: &Actor, quote: &Quote) -> QuoteView {
    QuoteView {
        id: quote.id.clone(),
        unique_ref_no: quote.unique_ref_no.clone(),
        version: quote.version,
        status: quote.status,
        is_locked: quote.is_locked,
        title: quote.title.clone(),
        currency: quote.currency.clone(),
        pax_count: quote.pax_count,
        itinerary: render_itinerary(&quote.itinerary, can_see_cost(viewer.role, quote)),
        price: resolve_price(viewer.role, quote),
        operator_status: quote.operator.status,
        messages: render_messages(viewer, &quote.messages),
        record_version: quote.record_version,
    }
}

pub fn booking_view(viewer: &Actor, booking: &Booking) -> BookingView {
    let sees_ledger = matches!(viewer.role, Role::Admin | Role::Staff | Role::Agent);
    BookingView {
        id: booking.id.clone(),
        unique_ref_no: booking.unique_ref_no.clone(),
        status: booking.status,
        currency: booking.currency.clone(),
        pax_count: booking.pax_count,
        price: resolve_price(viewer.role, booking),
        paid_amount: sees_ledger.then_some(booking.paid_amount),
        balance_amount: sees_ledger.then_some(booking.balance_amount),
        operator_status: booking.operator.status,
        messages: render_messages(viewer, &booking.messages),
        record_version: booking.record_version,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_quote;

    fn message_from(id: &str, name: &str, role: Role) -> Message {
        Message::user(&Actor::new(id, name, role), "hello", Utc::now())
    }

    fn viewer(role: Role) -> Actor {
        Actor::new(format!("viewer-{}", role), format!("Viewer {}", role), role)
    }

    #[test]
    fn test_name_matrix() {
        let agent_msg = message_from("a-1", "Ravi", Role::Agent);
        let op_msg = message_from("o-1", "Kiran", Role::Operator);
        let staff_msg = message_from("s-1", "Asha", Role::Staff);

        let op = viewer(Role::Operator);
        assert_eq!(resolve_display_name(&op, &agent_msg), "Colleague");
        assert_eq!(resolve_display_name(&op, &staff_msg), "Staff: Asha");

        let agent = viewer(Role::Agent);
        assert_eq!(resolve_display_name(&agent, &op_msg), "Operator");
        assert_eq!(resolve_display_name(&agent, &staff_msg), "Staff: Asha");

        let staff = viewer(Role::Staff);
        assert_eq!(resolve_display_name(&staff, &agent_msg), "Ravi (AGENT)");
        assert_eq!(resolve_display_name(&staff, &op_msg), "Kiran (OPERATOR)");

        let client = Actor::public_client();
        assert_eq!(resolve_display_name(&client, &agent_msg), "Ravi");
        assert_eq!(resolve_display_name(&client, &op_msg), "Operator");
        assert_eq!(resolve_display_name(&client, &staff_msg), "Support");
    }

    #[test]
    fn test_own_and_system_messages() {
        let me = Actor::new("o-1", "Kiran", Role::Operator);
        let mine = Message::user(&me, "on my way", Utc::now());
        assert_eq!(resolve_display_name(&me, &mine), "You");

        let staff = Actor::new("s-1", "Asha", Role::Staff);
        let note = Message::system(&staff, "Quote approved", Utc::now());
        assert_eq!(resolve_display_name(&me, &note), "System");
    }

    #[test]
    fn test_no_name_leaks_between_agent_and_supply_side() {
        let secret = "SecretName";
        for viewer_role in Role::ALL {
            for sender_role in Role::ALL {
                let msg = message_from("sender", secret, sender_role);
                let shown = resolve_display_name(&viewer(viewer_role), &msg);

                let agent_to_supply = viewer_role == Role::Agent
                    && matches!(sender_role, Role::Operator | Role::HotelPartner);
                let supply_to_agent = matches!(viewer_role, Role::Operator | Role::HotelPartner)
                    && sender_role == Role::Agent;
                let same_side_peer = viewer_role == sender_role && !viewer_role.is_internal();

                if agent_to_supply || supply_to_agent || same_side_peer {
                    assert!(
                        !shown.contains(secret),
                        "{} saw real name of {}: {}",
                        viewer_role,
                        sender_role,
                        shown
                    );
                }
                if viewer_role.is_internal() {
                    assert!(shown.contains(secret));
                }
                assert!(!shown.is_empty());
            }
        }
    }

    #[test]
    fn test_operator_price_precedence() {
        let mut quote = sample_quote();
        quote.cost = Money::from_major(300);
        quote.operator.operator_price = Some(Money::from_major(500));
        quote.operator.net_cost_visible_to_operator = true;
        assert_eq!(
            resolve_price(Role::Operator, &quote),
            ResolvedPrice::Amount {
                amount: Money::from_major(500)
            }
        );

        quote.operator.operator_price = None;
        assert_eq!(
            resolve_price(Role::Operator, &quote),
            ResolvedPrice::Amount {
                amount: Money::from_major(300)
            }
        );

        quote.operator.net_cost_visible_to_operator = false;
        assert_eq!(resolve_price(Role::Operator, &quote), ResolvedPrice::Hidden);
        assert_eq!(resolve_price(Role::HotelPartner, &quote), ResolvedPrice::Hidden);
    }

    #[test]
    fn test_agent_and_staff_prices() {
        let quote = sample_quote();
        assert_eq!(
            resolve_price(Role::Agent, &quote),
            ResolvedPrice::Amount {
                amount: quote.selling_price
            }
        );
        assert!(matches!(
            resolve_price(Role::Admin, &quote),
            ResolvedPrice::Full { .. }
        ));
    }

    #[test]
    fn test_display_price_precedence() {
        let mut quote = sample_quote();
        assert_eq!(display_price(&quote), quote.selling_price);
        quote.selling_price = Money::zero();
        assert_eq!(display_price(&quote), quote.price);
        quote.price = Money::zero();
        assert_eq!(display_price(&quote), quote.cost);
    }

    #[test]
    fn test_quote_view_hides_service_costs_from_agent() {
        let quote = sample_quote();
        let view = quote_view(&viewer(Role::Agent), &quote);
        assert!(view.itinerary[0].services[0].cost.is_none());

        let view = quote_view(&viewer(Role::Staff), &quote);
        assert_eq!(
            view.itinerary[0].services[0].cost,
            Some(Money::from_major(100))
        );
    }
}
