//! # invoicer-db: Database Layer for Invoicer
//!
//! This crate provides database access for the invoicing core. It uses
//! SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Invoicer Data Flow                               │
//! │                                                                         │
//! │  HTTP handler (create invoice, mark paid, show QR)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   invoicer-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (invoice.rs)  │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ InvoiceRepo   │    │ 001_initial  │  │   │
//! │  │   │ BillingConfig │    │ SymbolRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │                               │   │
//! │  └────────────────────────────────┼───────────────────────────────┘   │
//! │                                   ▼                                     │
//! │                    invoicer-core (lifecycle, SPAYD, symbols)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Billing configuration (TOML + environment)
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and configuration error types
//! - [`repository`] - Invoices, subscriptions, symbols, clients, accounts
//!
//! ## Usage
//!
//! ```rust,ignore
//! use invoicer_db::{BillingConfig, Database};
//!
//! let config = BillingConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let invoice = db.invoices().create(user_id, new_invoice).await?;
//! let spd = db.invoices().descriptor(user_id, &invoice.id, &config.encoder()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{BillingConfig, DatabaseSettings, PaymentSettings, SymbolSettings};
pub use error::{ConfigError, ConfigResult, DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::account::AccountRepository;
pub use repository::client::ClientRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::purge::{PurgeReport, PurgeRepository};
pub use repository::subscription::SubscriptionRepository;
pub use repository::symbol::{SymbolLookup, SymbolRepository};
