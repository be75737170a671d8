//! # Domain Types
//!
//! Records shared by the payment core, the database layer and the web UI.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Client      │   │    Invoice      │   │  InvoiceItem    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  client_id (FK) │◄──│  invoice_id (FK)│       │
//! │  │  user_id        │   │  number         │   │  description    │       │
//! │  │  name           │   │  status         │   │  quantity       │       │
//! │  │  email          │   │  total_cents    │   │  unit_price     │       │
//! │  └─────────────────┘   │  variable_symbol│   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │  ┌─────────────────────┐    ┌─────────────────┐                        │
//! │  │ SubscriptionPeriod  │    │  SymbolOwner    │                        │
//! │  │  ─────────────────  │    │  ─────────────  │                        │
//! │  │  plan, amount_cents │    │  Invoice        │                        │
//! │  │  variable_symbol    │    │  Subscription   │                        │
//! │  └─────────────────────┘    └─────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4, immutable, used for database relations
//! - A business key: invoice `number`, `variable_symbol`

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::lifecycle::{BillingState, InvoiceStatus};
use crate::money::Money;

// =============================================================================
// Client
// =============================================================================

/// A customer billed by a user.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Client {
    pub id: String,
    /// Owning user.
    pub user_id: String,
    pub name: String,
    pub email: Option<String>,
    /// Company registration number (IČO).
    pub company_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input for creating a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewClient {
    pub name: String,
    pub email: Option<String>,
    pub company_id: Option<String>,
}

// =============================================================================
// Invoice
// =============================================================================

/// An invoice owned by a user.
///
/// Lifecycle fields (`status`, `is_paid`, `is_canceled`, `payment_date`)
/// are changed only through transitions; see [`crate::lifecycle`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning user. Every query is scoped by it.
    pub user_id: String,

    pub client_id: String,

    /// Human-readable invoice number, unique per user.
    pub number: String,

    #[ts(as = "String")]
    pub issue_date: NaiveDate,

    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,

    /// ISO 4217 code, uppercase.
    pub currency: String,

    /// Sum of line totals in minor units.
    pub total_cents: i64,

    pub status: InvoiceStatus,
    pub is_paid: bool,
    pub is_canceled: bool,

    #[ts(as = "Option<String>")]
    pub payment_date: Option<NaiveDate>,

    /// Payment reference, 6 digits. Never changes after creation.
    pub variable_symbol: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns the lifecycle-owned fields.
    pub fn billing_state(&self) -> BillingState {
        BillingState {
            status: self.status,
            is_paid: self.is_paid,
            is_canceled: self.is_canceled,
            payment_date: self.payment_date,
        }
    }

    /// Overwrites the lifecycle-owned fields.
    pub fn apply_billing_state(&mut self, state: BillingState) {
        self.status = state.status;
        self.is_paid = state.is_paid;
        self.is_canceled = state.is_canceled;
        self.payment_date = state.payment_date;
    }
}

/// A line on an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    /// Zero-based display order.
    pub position: i64,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// `quantity × unit_price_cents`, frozen at write time.
    pub line_total_cents: i64,
}

impl InvoiceItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// Input for one invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewLineItem {
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl NewLineItem {
    pub fn new(description: impl Into<String>, quantity: i64, unit_price_cents: i64) -> Self {
        NewLineItem {
            description: description.into(),
            quantity,
            unit_price_cents,
        }
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// Sums the line totals of `items`.
pub fn items_total(items: &[NewLineItem]) -> Money {
    items.iter().map(NewLineItem::line_total).sum()
}

/// Input for creating an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewInvoice {
    pub client_id: String,
    pub number: String,
    #[ts(as = "String")]
    pub issue_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    pub currency: String,
    pub items: Vec<NewLineItem>,
}

impl NewInvoice {
    /// Total of all lines.
    pub fn total(&self) -> Money {
        items_total(&self.items)
    }
}

// =============================================================================
// Subscription Period
// =============================================================================

/// One billing period of a user's subscription plan.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SubscriptionPeriod {
    pub id: String,
    pub user_id: String,
    pub plan: String,
    pub amount_cents: i64,
    pub currency: String,
    #[ts(as = "String")]
    pub period_start: NaiveDate,
    #[ts(as = "String")]
    pub period_end: NaiveDate,
    pub variable_symbol: String,
    pub is_paid: bool,
    #[ts(as = "Option<String>")]
    pub payment_date: Option<NaiveDate>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SubscriptionPeriod {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Input for opening a subscription period.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSubscriptionPeriod {
    pub plan: String,
    pub amount_cents: i64,
    pub currency: String,
    #[ts(as = "String")]
    pub period_start: NaiveDate,
    #[ts(as = "String")]
    pub period_end: NaiveDate,
}

// =============================================================================
// Symbol Owner
// =============================================================================

/// The kind of record a payment symbol belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SymbolOwner {
    Invoice,
    Subscription,
}

impl SymbolOwner {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SymbolOwner::Invoice => "invoice",
            SymbolOwner::Subscription => "subscription",
        }
    }
}

impl fmt::Display for SymbolOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_invoice() -> Invoice {
        let now = Utc::now();
        Invoice {
            id: "inv-1".to_string(),
            user_id: "user-1".to_string(),
            client_id: "client-1".to_string(),
            number: "2026-001".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            due_date: None,
            currency: "CZK".to_string(),
            total_cents: 123450,
            status: InvoiceStatus::Draft,
            is_paid: false,
            is_canceled: false,
            payment_date: None,
            variable_symbol: "123456".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_line_totals() {
        let items = vec![
            NewLineItem::new("Consulting", 3, 150000),
            NewLineItem::new("Travel", 1, 2550),
        ];
        assert_eq!(items[0].line_total().cents(), 450000);
        assert_eq!(items_total(&items).cents(), 452550);
    }

    #[test]
    fn test_invoice_total() {
        assert_eq!(sample_invoice().total().to_string(), "1234.50");
    }

    #[test]
    fn test_billing_state_round_trip() {
        let mut invoice = sample_invoice();
        let state = BillingState {
            status: InvoiceStatus::Paid,
            is_paid: true,
            is_canceled: false,
            payment_date: NaiveDate::from_ymd_opt(2026, 3, 9),
        };
        invoice.apply_billing_state(state);
        assert_eq!(invoice.billing_state(), state);
    }

    #[test]
    fn test_symbol_owner_names() {
        assert_eq!(SymbolOwner::Invoice.to_string(), "invoice");
        assert_eq!(SymbolOwner::Subscription.as_str(), "subscription");
    }
}
