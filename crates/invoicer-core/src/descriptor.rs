//! # Payment Descriptor (SPAYD)
//!
//! Builds the "Short Payment Descriptor" string that Czech banking apps
//! read from a QR code.
//!
//! ## Wire Format
//! ```text
//! SPD*1.0*ACC:<iban>[*AM:<d.dd>]*CC:<CUR>[*MSG:<text>][*X-VS:<digits>]
//!  │       │          │          │         │           │
//!  │       │          │          │         │           └─ digits only, ≤ 10
//!  │       │          │          │         └─ ≤ 60 chars, no '*' / newline
//!  │       │          │          └─ always present
//!  │       │          └─ only when amount > 0, two decimals, '.' separator
//!  │       └─ normalized account
//!  └─ protocol + version
//! ```
//!
//! Field order never changes; a missing optional field is omitted without
//! shifting the others. The descriptor is rebuilt on every render and never
//! stored.

use std::fmt;

use crate::account::{AccountIdentifier, AccountPolicy};
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Invoice, SubscriptionPeriod};
use crate::validation::validate_currency;

/// Protocol marker and version.
pub const SPAYD_HEADER: &str = "SPD*1.0";

/// Longest message a scanning app reliably shows.
pub const MESSAGE_MAX_CHARS: usize = 60;

/// Longest variable symbol accepted by Czech banks.
pub const SYMBOL_MAX_DIGITS: usize = 10;

const FIELD_DELIMITER: char = '*';

// =============================================================================
// Payment Descriptor
// =============================================================================

/// An encoded SPAYD string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaymentDescriptor(String);

impl PaymentDescriptor {
    /// Returns the descriptor as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the descriptor, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PaymentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PaymentDescriptor {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Encoder
// =============================================================================

/// Encodes payment descriptors under a given account policy.
///
/// ## Example
/// ```rust
/// use invoicer_core::descriptor::DescriptorEncoder;
/// use invoicer_core::money::Money;
///
/// let encoder = DescriptorEncoder::default();
/// let spd = encoder
///     .encode(
///         "CZ6501000000000123456789",
///         Some(Money::from_cents(123450)),
///         "CZK",
///         Some("Invoice #42"),
///         Some("abc123"),
///     )
///     .unwrap();
///
/// assert_eq!(
///     spd.as_str(),
///     "SPD*1.0*ACC:CZ6501000000000123456789*AM:1234.50*CC:CZK*MSG:Invoice #42*X-VS:123"
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct DescriptorEncoder {
    policy: AccountPolicy,
}

impl DescriptorEncoder {
    /// Creates an encoder that normalizes accounts with `policy`.
    pub fn new(policy: AccountPolicy) -> Self {
        DescriptorEncoder { policy }
    }

    /// Returns the account policy in use.
    pub fn policy(&self) -> &AccountPolicy {
        &self.policy
    }

    /// Encodes a descriptor.
    ///
    /// ## Errors
    /// - `MissingAccount` when `account_ref` is blank
    /// - `InvalidAccountFormat` from the normalizer
    /// - `Validation` when `currency` is not a 3-letter code
    ///
    /// Message and symbol never fail; unusable values are left out.
    pub fn encode(
        &self,
        account_ref: &str,
        amount: Option<Money>,
        currency: &str,
        message: Option<&str>,
        symbol: Option<&str>,
    ) -> CoreResult<PaymentDescriptor> {
        if account_ref.trim().is_empty() {
            return Err(CoreError::MissingAccount);
        }

        let account = self.policy.normalize(account_ref)?;
        let currency = validate_currency(currency)?;

        Ok(assemble(&account, amount, &currency, message, symbol))
    }

    /// Encodes the descriptor for an invoice payable to `account_ref`.
    ///
    /// Amount is the invoice total, the message names the invoice number
    /// and the variable symbol is the one allocated at creation.
    pub fn encode_invoice(
        &self,
        invoice: &Invoice,
        account_ref: &str,
    ) -> CoreResult<PaymentDescriptor> {
        let message = format!("Invoice {}", invoice.number);
        self.encode(
            account_ref,
            Some(invoice.total()),
            &invoice.currency,
            Some(&message),
            Some(&invoice.variable_symbol),
        )
    }

    /// Encodes the descriptor for a subscription period.
    pub fn encode_subscription(
        &self,
        period: &SubscriptionPeriod,
        account_ref: &str,
    ) -> CoreResult<PaymentDescriptor> {
        let message = format!("{} {}", period.plan, period.period_start.format("%Y-%m"));
        self.encode(
            account_ref,
            Some(period.amount()),
            &period.currency,
            Some(&message),
            Some(&period.variable_symbol),
        )
    }
}

/// Encodes with the default account policy.
pub fn encode(
    account_ref: &str,
    amount: Option<Money>,
    currency: &str,
    message: Option<&str>,
    symbol: Option<&str>,
) -> CoreResult<PaymentDescriptor> {
    DescriptorEncoder::default().encode(account_ref, amount, currency, message, symbol)
}

fn assemble(
    account: &AccountIdentifier,
    amount: Option<Money>,
    currency: &str,
    message: Option<&str>,
    symbol: Option<&str>,
) -> PaymentDescriptor {
    let mut out = format!("{}*ACC:{}", SPAYD_HEADER, account);

    if let Some(amount) = amount.filter(Money::is_positive) {
        out.push_str("*AM:");
        out.push_str(&amount.to_string());
    }

    out.push_str("*CC:");
    out.push_str(currency);

    if let Some(message) = message.and_then(sanitize_message) {
        out.push_str("*MSG:");
        out.push_str(&message);
    }

    if let Some(symbol) = symbol.and_then(sanitize_symbol) {
        out.push_str("*X-VS:");
        out.push_str(&symbol);
    }

    PaymentDescriptor(out)
}

/// Truncates to [`MESSAGE_MAX_CHARS`], replaces each run of delimiters and
/// line breaks with one space and trims. `None` when nothing is left.
pub fn sanitize_message(message: &str) -> Option<String> {
    let mut out = String::with_capacity(message.len().min(MESSAGE_MAX_CHARS));
    let mut in_run = false;

    for c in message.chars().take(MESSAGE_MAX_CHARS) {
        if c == FIELD_DELIMITER || c == '\n' || c == '\r' {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }

    let trimmed = out.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Keeps only ASCII digits, at most [`SYMBOL_MAX_DIGITS`]. `None` when no
/// digit is left.
pub fn sanitize_symbol(symbol: &str) -> Option<String> {
    let digits: String = symbol
        .chars()
        .filter(char::is_ascii_digit)
        .take(SYMBOL_MAX_DIGITS)
        .collect();

    (!digits.is_empty()).then_some(digits)
}

// =============================================================================
// Unit Tests
// =============================================================================
