//! # Demo Data Seeder
//!
//! Runs a handful of quotes through the full workflow against a database so
//! a fresh install has something to look at.
//!
//! ## Usage
//! ```bash
//! # Seed the default database from the default config
//! cargo run -p tripdesk-engine --bin tripdesk-seed
//!
//! # Explicit database and config
//! cargo run -p tripdesk-engine --bin tripdesk-seed -- --db ./data/tripdesk.db --config ./tripdesk.toml
//!
//! # Throwaway run
//! cargo run -p tripdesk-engine --bin tripdesk-seed -- --db :memory:
//! ```
//!
//! ## What Gets Created
//! - A wallet for the demo agent, topped up
//! - One quote per itinerary template, submitted and approved
//! - Every second quote revised once, the rest converted to bookings
//! - Bookings confirmed, assigned to the demo operator, advance paid

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tripdesk_core::audit::EntityType;
use tripdesk_core::booking::NewPayment;
use tripdesk_core::lifecycle::QuoteDraft;
use tripdesk_core::operator::AssignmentRequest;
use tripdesk_core::pricing::{AgentMarkup, PricingRules};
use tripdesk_core::{
    Actor, BookingStatus, ItineraryItem, Money, PaymentMode, PaymentType, Percent, QuoteStatus,
    Role, Service, ServiceType, Traveler,
};
use tripdesk_db::Database;
use tripdesk_engine::{
    init_tracing, Collaborators, DeskSettings, EngineConfig, ManualPaymentVerifier, QuoteDesk,
    RecordRef,
};

/// (title, client, pax, [(day title, service type, service name, cost in cents)])
type Template = (
    &'static str,
    &'static str,
    u32,
    &'static [(&'static str, ServiceType, &'static str, i64)],
);

const TEMPLATES: &[Template] = &[
    (
        "Kerala Backwaters",
        "Iyer Family",
        2,
        &[
            ("Arrival in Kochi", ServiceType::Transfer, "Airport pickup", 2500),
            ("Alleppey houseboat", ServiceType::Hotel, "Lake Palace Houseboat", 24050),
            ("Kumarakom", ServiceType::Activity, "Bird sanctuary walk", 1800),
        ],
    ),
    (
        "Munnar Tea Trail",
        "Menon Family",
        4,
        &[
            ("Drive to Munnar", ServiceType::Transfer, "Private Innova", 9000),
            ("Tea estates", ServiceType::Activity, "Estate tour and tasting", 3200),
            ("Hill stay", ServiceType::Hotel, "Misty Mountain Resort", 15000),
        ],
    ),
    (
        "Goa Beach Break",
        "D'Souza Couple",
        2,
        &[
            ("North Goa", ServiceType::Hotel, "Baga Beach Villa", 18000),
            ("Old Goa", ServiceType::Activity, "Heritage walk", 1500),
        ],
    ),
    (
        "Rajasthan Forts",
        "Sharma Group",
        6,
        &[
            ("Jaipur", ServiceType::Hotel, "Pink City Haveli", 32000),
            ("Amber Fort", ServiceType::Activity, "Guided fort visit", 4800),
            ("Jodhpur transfer", ServiceType::Transfer, "Tempo traveller", 12000),
        ],
    ),
];

const USAGE: &str = "\
TripDesk Demo Data Seeder

Usage: tripdesk-seed [OPTIONS]

Options:
  -d, --db <PATH>        Database file path, or :memory: (default: from config)
  -c, --config <PATH>    Config file path (default: platform config dir)
  -h, --help             Show this help message";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                let value = args.get(i + 1).context("--db needs a path")?;
                db_path = Some(PathBuf::from(value));
                i += 1;
            }
            "--config" | "-c" => {
                let value = args.get(i + 1).context("--config needs a path")?;
                config_path = Some(PathBuf::from(value));
                i += 1;
            }
            "--help" | "-h" => {
                println!("{}", USAGE);
                return Ok(());
            }
            other => bail!("unknown argument '{}'\n\n{}", other, USAGE),
        }
        i += 1;
    }

    let mut config = EngineConfig::load(config_path).context("loading config")?;
    if db_path.is_some() {
        config.database.path = db_path;
    }
    init_tracing(&config.logging)?;

    let db = Database::new(config.database_config()?)
        .await
        .context("opening database")?;
    let desk = QuoteDesk::new(
        Collaborators::sqlite(
            &db,
            config.rate_table()?,
            Arc::new(ManualPaymentVerifier),
        ),
        DeskSettings::from_config(&config),
    );

    let existing = db.quotes().all().await?.len();
    if existing > 0 {
        warn!(existing, "Database already has quotes, skipping seed");
        println!("Database already has {} quotes; delete it to regenerate.", existing);
        return Ok(());
    }

    let started = std::time::Instant::now();
    let first_booking = seed(&desk).await?;

    let quotes = db.quotes();
    let bookings = db.bookings();
    println!("Seed complete in {:?}", started.elapsed());
    println!("  Quotes approved:    {}", quotes.count_by_status(QuoteStatus::Approved).await?);
    println!("  Quotes in draft:    {}", quotes.count_by_status(QuoteStatus::Draft).await?);
    println!("  Quotes booked:      {}", quotes.count_by_status(QuoteStatus::Booked).await?);
    println!("  Bookings confirmed: {}", bookings.count_by_status(BookingStatus::Confirmed).await?);
    println!("  Audit entries:      {}", db.audit_log().count().await?);

    if let Some(booking_id) = first_booking {
        println!("Audit trail of booking {}:", booking_id);
        for entry in db
            .audit_log()
            .entries_for(EntityType::Booking, &booking_id)
            .await?
        {
            println!("  {}  {} by {}", entry.timestamp, entry.action, entry.actor_id);
        }
    }

    db.close().await;
    Ok(())
}

/// Returns the id of the first booking created.
async fn seed(desk: &QuoteDesk) -> Result<Option<String>> {
    let agent = Actor::new("agent-demo", "Ravi Travels", Role::Agent);
    let staff = Actor::new("staff-demo", "Asha", Role::Staff);
    let operator = Actor::new("operator-demo", "Munnar Cabs", Role::Operator);

    let wallet = desk
        .open_wallet(&agent.user_id, "USD", Money::from_major(500), &staff)
        .await?;
    desk.credit_wallet(
        &agent.user_id,
        wallet.record_version,
        Money::from_major(2000),
        "seed-topup",
        &staff,
    )
    .await?;

    let mut first_booking = None;
    for (index, template) in TEMPLATES.iter().enumerate() {
        let quote = desk.create_quote(draft_from(template, &agent), &agent).await?;
        let quote = desk
            .submit_quote(&quote.id, quote.record_version, &agent)
            .await?;
        let quote = desk
            .approve_quote(&quote.id, quote.record_version, &staff)
            .await?;

        if index % 2 == 1 {
            let revision = desk.create_revision(&quote.id, &staff).await?;
            desk.post_quote_message(
                &revision.id,
                revision.record_version,
                "Can we upgrade the hotel?",
                &agent,
            )
            .await?;
            info!(reference = %revision.unique_ref_no, "Seeded revised quote");
            continue;
        }

        let travelers = (1..=template.2)
            .map(|n| Traveler::named(format!("{} traveler {}", template.1, n)))
            .collect();
        let booking = desk
            .convert_to_booking(&quote.id, quote.record_version, travelers, &agent)
            .await?;
        let booking = desk
            .confirm_booking(&booking.id, booking.record_version, &staff)
            .await?;

        let target = RecordRef::Booking(booking.id.clone());
        desk.assign_operator(
            target.clone(),
            booking.record_version,
            AssignmentRequest {
                operator_id: operator.user_id.clone(),
                operator_price: None,
                net_cost_visible_to_operator: true,
            },
            &staff,
        )
        .await?;
        let seen = desk.booking_view(&booking.id, &operator).await?;
        desk.accept_assignment(target, seen.record_version, &operator)
            .await?;
        let version = desk.booking_view(&booking.id, &staff).await?.record_version;

        let payment = NewPayment {
            id: format!("seed-advance-{}", index + 1),
            amount: booking.advance_amount,
            payment_type: PaymentType::Advance,
            mode: PaymentMode::Wallet,
            reference: None,
        };
        let receipt = desk
            .record_payment(&booking.id, version, payment, &staff)
            .await?;
        info!(
            reference = %booking.unique_ref_no,
            receipt = %receipt.entry.receipt_number,
            "Seeded booking"
        );
        first_booking.get_or_insert(booking.id);
    }
    Ok(first_booking)
}

fn draft_from(template: &Template, agent: &Actor) -> QuoteDraft {
    let (title, client, pax, days) = *template;
    QuoteDraft {
        title: title.to_string(),
        agent_id: agent.user_id.clone(),
        client_name: client.to_string(),
        currency: "USD".to_string(),
        pax_count: pax,
        itinerary: days
            .iter()
            .zip(1..)
            .map(|((day_title, kind, name, cents), day)| ItineraryItem {
                day,
                title: day_title.to_string(),
                description: String::new(),
                services: vec![Service::new(
                    *kind,
                    *name,
                    Money::new(Decimal::new(*cents, 2)),
                    "USD",
                )],
                inclusions: Vec::new(),
            })
            .collect(),
        pricing_rules: PricingRules {
            company_markup_percent: Percent::from_whole(10),
            agent_markup: AgentMarkup::Percent(Percent::from_whole(5)),
            gst_percent: Percent::from_whole(5),
        },
    }
}
