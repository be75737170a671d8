//! # Seed Data Generator
//!
//! Populates the database with a demo user for development: a client, a
//! payout account, invoices in every lifecycle state and a subscription
//! period. Prints the payment descriptor of each payable record.
//!
//! ## Usage
//! ```bash
//! # 12 invoices (default), settings from billing.toml / INVOICER_* env
//! cargo run -p invoicer-db --bin seed
//!
//! # Custom amount and database
//! cargo run -p invoicer-db --bin seed -- --count 50 --db ./data/invoicer.db
//!
//! # Explicit config file
//! cargo run -p invoicer-db --bin seed -- --config ./billing.toml
//! ```

use chrono::{Datelike, Duration, Local, NaiveDate};
use std::env;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use invoicer_core::{InvoiceAction, NewClient, NewInvoice, NewLineItem, NewSubscriptionPeriod};
use invoicer_db::{BillingConfig, ConfigError, Database};

const DEMO_USER: &str = "demo-user";
const DEMO_ACCOUNT: &str = "19-2000145399/0800";
const DEMO_CURRENCY: &str = "CZK";

/// Services billed on the demo invoices: (description, unit price in cents).
const SERVICES: &[(&str, i64)] = &[
    ("Consulting", 150_000),
    ("Code review", 90_000),
    ("Workshop", 1_200_000),
    ("Hosting", 49_900),
    ("Support hours", 80_000),
    ("Travel", 35_000),
];

/// Cycles the demo invoices through the lifecycle.
const SCRIPTS: &[&[InvoiceAction]] = &[
    &[],
    &[InvoiceAction::Send],
    &[InvoiceAction::Send, InvoiceAction::MarkPaid],
    &[InvoiceAction::Advance, InvoiceAction::Advance, InvoiceAction::MarkUnpaid],
    &[InvoiceAction::Cancel],
    &[InvoiceAction::Send, InvoiceAction::MarkPaid, InvoiceAction::Cancel],
];

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,invoicer_db=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Loads billing settings, falling back to a demo currency when none is
/// configured.
fn load_config(path: Option<PathBuf>) -> Result<BillingConfig, ConfigError> {
    match BillingConfig::load(path) {
        Err(ConfigError::MissingRequired { field }) => {
            warn!(%field, "No currency configured, seeding with {DEMO_CURRENCY}");
            let mut config = BillingConfig::default();
            config.apply_overrides(|key| env::var(key).ok())?;
            config
                .payment
                .currency
                .get_or_insert_with(|| DEMO_CURRENCY.to_string());
            config.validate()?;
            Ok(config)
        }
        other => other,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 12;
    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(12);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Invoicer Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>      Number of invoices to generate (default: 12)");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("      --config <PATH>  billing.toml to load");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = load_config(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    let currency = config.currency()?.to_string();
    let encoder = config.encoder();

    println!("🌱 Invoicer Seed Data Generator");
    println!("===============================");
    println!("Database: {}", config.database.path.display());
    println!("Currency: {}", currency);
    println!("Invoices: {}", count);
    println!();

    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.invoices().list(DEMO_USER, None).await?;
    if !existing.is_empty() {
        println!("⚠ Demo user already has {} invoices", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    db.accounts()
        .set(DEMO_USER, DEMO_ACCOUNT, encoder.policy())
        .await?;
    let client = db
        .clients()
        .create(
            DEMO_USER,
            NewClient {
                name: "ACME s.r.o.".to_string(),
                email: Some("billing@acme.example".to_string()),
                company_id: Some("12345678".to_string()),
            },
        )
        .await?;
    println!("✓ Client and payout account created");
    println!();

    let today = Local::now().date_naive();
    let start = std::time::Instant::now();
    let mut generated = 0;

    for n in 0..count {
        let input = demo_invoice(&client.id, &currency, today, n);
        let number = input.number.clone();

        let invoice = match db.invoices().create(DEMO_USER, input).await {
            Ok(invoice) => invoice,
            Err(e) => {
                eprintln!("Failed to create invoice {}: {}", number, e);
                continue;
            }
        };

        let mut current = invoice;
        for action in SCRIPTS[n % SCRIPTS.len()] {
            current = db
                .invoices()
                .transition(DEMO_USER, &current.id, *action, today)
                .await?;
        }

        let spd = db
            .invoices()
            .descriptor(DEMO_USER, &current.id, &encoder)
            .await?;
        println!("  {:<10} {:<9} {}", current.number, current.status, spd);
        generated += 1;
    }

    let period = db
        .subscriptions()
        .open_period(
            DEMO_USER,
            NewSubscriptionPeriod {
                plan: "Pro".to_string(),
                amount_cents: 29_900,
                currency: currency.clone(),
                period_start: month_start(today),
                period_end: month_start(today) + Duration::days(29),
            },
        )
        .await?;
    let spd = db
        .subscriptions()
        .descriptor(DEMO_USER, &period.id, &encoder)
        .await?;
    println!("  {:<10} {:<9} {}", "Pro", "open", spd);

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} invoices in {:?}", generated, elapsed);
    println!(
        "  Active variable symbols: {}",
        db.symbols().count_active().await?
    );

    if let Some(sample) = db.invoices().list(DEMO_USER, None).await?.first() {
        println!();
        println!("Sample invoice:");
        println!("{}", serde_json::to_string_pretty(sample)?);
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// One to three service lines, varied by `seed`.
fn demo_invoice(client_id: &str, currency: &str, today: NaiveDate, seed: usize) -> NewInvoice {
    let lines = 1 + seed % 3;
    let items = (0..lines)
        .map(|line| {
            let (description, price) = SERVICES[(seed + line * 2) % SERVICES.len()];
            NewLineItem::new(description, 1 + ((seed + line) % 4) as i64, price)
        })
        .collect();

    let issue_date = today - Duration::days((seed * 3) as i64);

    NewInvoice {
        client_id: client_id.to_string(),
        number: format!("{}-{:04}", today.year(), seed + 1),
        issue_date,
        due_date: Some(issue_date + Duration::days(14)),
        currency: currency.to_string(),
        items,
    }
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
