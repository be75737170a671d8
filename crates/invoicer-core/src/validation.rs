//! # Validation Module
//!
//! Input validation for invoices, clients and subscription periods.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Web form                                                     │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Business rules (non-empty lines, currency code, quantities)      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── UNIQUE variable symbol (payment_symbols)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::types::{NewClient, NewInvoice, NewLineItem, NewSubscriptionPeriod};
use crate::{MAX_ITEM_QUANTITY, MAX_LINE_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an ISO 4217 currency code and returns it uppercased.
///
/// ## Rules
/// - Exactly three ASCII letters
/// - Case-insensitive on input
///
/// ## Example
/// ```rust
/// use invoicer_core::validation::validate_currency;
///
/// assert_eq!(validate_currency("czk").unwrap(), "CZK");
/// assert!(validate_currency("").is_err());
/// assert!(validate_currency("CZ1").is_err());
/// ```
pub fn validate_currency(currency: &str) -> ValidationResult<String> {
    let currency = currency.trim();

    if currency.is_empty() {
        return Err(ValidationError::Required {
            field: "currency".to_string(),
        });
    }

    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be a three-letter ISO 4217 code".to_string(),
        });
    }

    Ok(currency.to_ascii_uppercase())
}

fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a line description (1-500 characters).
pub fn validate_description(description: &str) -> ValidationResult<()> {
    validate_text("description", description, 500)
}

/// Validates an invoice number (1-50 characters).
pub fn validate_invoice_number(number: &str) -> ValidationResult<()> {
    validate_text("number", number, 50)
}

/// Validates a client name (1-200 characters).
pub fn validate_client_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, 200)
}

/// Validates a subscription plan name (1-100 characters).
pub fn validate_plan(plan: &str) -> ValidationResult<()> {
    validate_text("plan", plan, 100)
}

/// Loose email shape check: one `@` with text on both sides and a dot in
/// the domain.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "must look like name@example.com".to_string(),
    };

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(invalid());
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in minor units.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free lines)
///
/// ## Example
/// ```rust
/// use invoicer_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates an invoice's line set.
///
/// ## Rules
/// - At least one line, at most MAX_LINE_ITEMS
/// - Every line passes the description, quantity and price checks
/// - The summed total fits in i64
pub fn validate_line_items(items: &[NewLineItem]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if items.len() > MAX_LINE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_LINE_ITEMS as i64,
        });
    }

    let mut total: i64 = 0;
    for item in items {
        validate_description(&item.description)?;
        validate_quantity(item.quantity)?;
        validate_price_cents(item.unit_price_cents)?;

        total = item
            .unit_price_cents
            .checked_mul(item.quantity)
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "total".to_string(),
                min: 0,
                max: i64::MAX,
            })?;
    }

    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates a new invoice and returns its normalized currency.
pub fn validate_new_invoice(invoice: &NewInvoice) -> ValidationResult<String> {
    validate_uuid(&invoice.client_id)?;
    validate_invoice_number(&invoice.number)?;
    let currency = validate_currency(&invoice.currency)?;
    validate_line_items(&invoice.items)?;

    if let Some(due) = invoice.due_date {
        validate_date_order("due_date", invoice.issue_date, due)?;
    }

    Ok(currency)
}

/// Validates a new client.
pub fn validate_new_client(client: &NewClient) -> ValidationResult<()> {
    validate_client_name(&client.name)?;
    if let Some(email) = client.email.as_deref() {
        validate_email(email)?;
    }
    Ok(())
}

/// Validates a new subscription period and returns its normalized currency.
pub fn validate_new_period(period: &NewSubscriptionPeriod) -> ValidationResult<String> {
    validate_plan(&period.plan)?;
    if period.amount_cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    let currency = validate_currency(&period.currency)?;
    validate_date_order("period_end", period.period_start, period.period_end)?;
    Ok(currency)
}

fn validate_date_order(field: &str, start: NaiveDate, end: NaiveDate) -> ValidationResult<()> {
    if end < start {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: format!("must not be before {start}"),
        });
    }
    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use invoicer_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT_ID: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, d).unwrap()
    }

    fn new_invoice(items: Vec<NewLineItem>) -> NewInvoice {
        NewInvoice {
            client_id: CLIENT_ID.to_string(),
            number: "2026-001".to_string(),
            issue_date: date(3, 1),
            due_date: Some(date(3, 15)),
            currency: "czk".to_string(),
            items,
        }
    }

    #[test]
    fn test_validate_currency() {
        assert_eq!(validate_currency("CZK").unwrap(), "CZK");
        assert_eq!(validate_currency(" eur ").unwrap(), "EUR");

        assert!(matches!(
            validate_currency(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(validate_currency("CZ").is_err());
        assert!(validate_currency("CZKK").is_err());
        assert!(validate_currency("C1K").is_err());
        assert!(validate_currency("ČZK").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_line_items() {
        assert!(matches!(
            validate_line_items(&[]),
            Err(ValidationError::Required { .. })
        ));
        assert!(validate_line_items(&[NewLineItem::new("Work", 2, 5000)]).is_ok());
        assert!(validate_line_items(&[NewLineItem::new("  ", 1, 5000)]).is_err());
        assert!(validate_line_items(&[NewLineItem::new("Work", 1, -1)]).is_err());

        let too_many = vec![NewLineItem::new("x", 1, 1); MAX_LINE_ITEMS + 1];
        assert!(validate_line_items(&too_many).is_err());
    }

    #[test]
    fn test_line_total_overflow_is_rejected() {
        let items = vec![NewLineItem::new("Huge", 2, i64::MAX / 2 + 1)];
        assert!(matches!(
            validate_line_items(&items),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_new_invoice() {
        let invoice = new_invoice(vec![NewLineItem::new("Work", 1, 100)]);
        assert_eq!(validate_new_invoice(&invoice).unwrap(), "CZK");

        let mut backwards = invoice.clone();
        backwards.due_date = Some(date(2, 1));
        assert!(validate_new_invoice(&backwards).is_err());

        let mut bad_client = invoice;
        bad_client.client_id = "nope".to_string();
        assert!(validate_new_invoice(&bad_client).is_err());
    }

    #[test]
    fn test_validate_new_period() {
        let period = NewSubscriptionPeriod {
            plan: "Pro".to_string(),
            amount_cents: 29900,
            currency: "czk".to_string(),
            period_start: date(3, 1),
            period_end: date(3, 31),
        };
        assert_eq!(validate_new_period(&period).unwrap(), "CZK");

        let free = NewSubscriptionPeriod {
            amount_cents: 0,
            ..period
        };
        assert!(validate_new_period(&free).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("billing@example.cz").is_ok());
        assert!(validate_email("nobody").is_err());
        assert!(validate_email("@example.cz").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("a@b@c.cz").is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid(CLIENT_ID).is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("123").is_err());
    }
}
