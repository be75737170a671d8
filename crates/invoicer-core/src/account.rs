//! # Account Normalizer
//!
//! Converts a Czech bank account reference into an IBAN.
//!
//! ## Accepted Inputs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Account Reference Forms                              │
//! │                                                                         │
//! │  Canonical      "CZ65 0800 0000 1920 0014 5399"                        │
//! │                 └── whitespace stripped, returned as-is                │
//! │                                                                         │
//! │  Local          "19-2000145399/0800"       prefix-account/bank         │
//! │                 "123456789/0100"           account/bank                │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │  CZ │ 65 │ 0800 │ 000019 │ 2000145399                                  │
//! │  cc   ck   bank   prefix   account       (4 + 6 + 10 = 20 digit BBAN)  │
//! │                                                                         │
//! │  Anything else  → InvalidAccountFormat (never passed through)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Check Digits
//! The default [`CheckDigitPolicy::Computed`] derives the two check digits
//! with ISO 7064 MOD 97-10 over the BBAN. [`CheckDigitPolicy::Legacy`]
//! reproduces the constant `65` written by earlier releases; those
//! identifiers fail IBAN validation for almost every real account and the
//! policy exists only to regenerate historical descriptors byte for byte.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};

/// Check digits emitted by the legacy normalizer for every local account.
pub const LEGACY_CHECK_DIGITS: &str = "65";

const BANK_CODE_WIDTH: usize = 4;
const PREFIX_WIDTH: usize = 6;
const ACCOUNT_WIDTH: usize = 10;

// =============================================================================
// Policy
// =============================================================================

/// How the two IBAN check digits are produced for local accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckDigitPolicy {
    /// ISO 7064 MOD 97-10 over the BBAN.
    #[default]
    Computed,
    /// Constant [`LEGACY_CHECK_DIGITS`].
    Legacy,
}

impl fmt::Display for CheckDigitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckDigitPolicy::Computed => write!(f, "computed"),
            CheckDigitPolicy::Legacy => write!(f, "legacy"),
        }
    }
}

impl FromStr for CheckDigitPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "computed" | "mod97" => Ok(CheckDigitPolicy::Computed),
            "legacy" | "fixed" => Ok(CheckDigitPolicy::Legacy),
            other => Err(ValidationError::InvalidFormat {
                field: "check_digits".to_string(),
                reason: format!("unknown policy '{}', expected computed or legacy", other),
            }),
        }
    }
}

/// Normalizer settings.
///
/// ## Example
/// ```rust
/// use invoicer_core::account::AccountPolicy;
///
/// let iban = AccountPolicy::default().normalize("19-2000145399/0800").unwrap();
/// assert_eq!(iban.as_str(), "CZ6508000000192000145399");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPolicy {
    /// Two-letter country marker; also decides the canonical branch.
    pub country_code: String,

    /// Check digit production for local accounts.
    pub check_digits: CheckDigitPolicy,

    /// Validate already-canonical input (length + checksum) instead of
    /// trusting the country prefix.
    pub strict_canonical: bool,
}

impl Default for AccountPolicy {
    fn default() -> Self {
        AccountPolicy {
            country_code: "CZ".to_string(),
            check_digits: CheckDigitPolicy::Computed,
            strict_canonical: false,
        }
    }
}

impl AccountPolicy {
    /// The policy of earlier releases: constant check digits, lenient
    /// canonical pass-through.
    pub fn legacy() -> Self {
        AccountPolicy {
            check_digits: CheckDigitPolicy::Legacy,
            ..Self::default()
        }
    }

    /// Computed check digits and full validation of canonical input.
    pub fn strict() -> Self {
        AccountPolicy {
            strict_canonical: true,
            ..Self::default()
        }
    }

    /// Normalizes a raw account reference.
    ///
    /// ## Rules
    /// 1. Whitespace is removed.
    /// 2. A value starting with the country code is canonical and is
    ///    returned unchanged. It must be ASCII letters and digits; strict
    ///    mode also checks length and checksum.
    /// 3. Otherwise `[prefix-]account/bankCode` is parsed, zero-padded and
    ///    assembled as `country + check + bank + prefix + account`.
    pub fn normalize(&self, raw: &str) -> CoreResult<AccountIdentifier> {
        let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();

        if cleaned.starts_with(self.country_code.as_str()) {
            if !cleaned.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(CoreError::invalid_account(
                    raw,
                    "canonical account must be letters and digits only",
                ));
            }
            if self.strict_canonical {
                self.check_canonical(raw, &cleaned)?;
            }
            return Ok(AccountIdentifier(cleaned));
        }

        let (account_part, bank_code) = cleaned
            .split_once('/')
            .ok_or_else(|| CoreError::invalid_account(raw, "expected [prefix-]account/bankCode"))?;

        let (prefix, number) = match account_part.split_once('-') {
            Some((prefix, number)) => (prefix, number),
            None => ("", account_part),
        };

        if account_part.contains('-') && prefix.is_empty() {
            return Err(CoreError::invalid_account(raw, "empty account prefix"));
        }

        let bank_code = pad_segment(raw, "bank code", bank_code, BANK_CODE_WIDTH, false)?;
        let prefix = pad_segment(raw, "prefix", prefix, PREFIX_WIDTH, true)?;
        let number = pad_segment(raw, "account number", number, ACCOUNT_WIDTH, false)?;

        let bban = format!("{}{}{}", bank_code, prefix, number);
        let check = match self.check_digits {
            CheckDigitPolicy::Computed => iban_check_digits(&self.country_code, &bban),
            CheckDigitPolicy::Legacy => LEGACY_CHECK_DIGITS.to_string(),
        };

        Ok(AccountIdentifier(format!(
            "{}{}{}",
            self.country_code, check, bban
        )))
    }

    fn check_canonical(&self, raw: &str, cleaned: &str) -> CoreResult<()> {
        if let Some(expected) = iban_length(&self.country_code) {
            if cleaned.len() != expected {
                return Err(CoreError::invalid_account(
                    raw,
                    format!("{} IBAN must be {} characters", self.country_code, expected),
                ));
            }
        }

        if !validate_iban(cleaned) {
            return Err(CoreError::invalid_account(raw, "IBAN checksum mismatch"));
        }

        Ok(())
    }
}

/// Normalizes with the default policy (CZ, computed check digits, lenient
/// canonical pass-through).
pub fn normalize(raw: &str) -> CoreResult<AccountIdentifier> {
    AccountPolicy::default().normalize(raw)
}

fn pad_segment(
    raw: &str,
    name: &str,
    segment: &str,
    width: usize,
    optional: bool,
) -> CoreResult<String> {
    if segment.is_empty() && !optional {
        return Err(CoreError::invalid_account(raw, format!("{} is empty", name)));
    }

    if !segment.chars().all(|c| c.is_ascii_digit()) {
        return Err(CoreError::invalid_account(
            raw,
            format!("{} must contain only digits", name),
        ));
    }

    if segment.len() > width {
        return Err(CoreError::invalid_account(
            raw,
            format!("{} has more than {} digits", name, width),
        ));
    }

    Ok(format!("{:0>width$}", segment, width = width))
}

// =============================================================================
// Account Identifier
// =============================================================================

/// A canonical (IBAN-shaped) account identifier.
///
/// Only [`AccountPolicy::normalize`] constructs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AccountIdentifier(String);

impl AccountIdentifier {
    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the two-letter country marker.
    pub fn country_code(&self) -> &str {
        self.0.get(..2).unwrap_or_default()
    }

    /// Returns the two check digits.
    pub fn check_digits(&self) -> &str {
        self.0.get(2..4).unwrap_or_default()
    }

    /// Returns the 4-digit bank code for Czech-shaped identifiers.
    pub fn bank_code(&self) -> Option<&str> {
        self.0.get(4..8)
    }

    /// Checks the MOD 97 checksum.
    pub fn has_valid_checksum(&self) -> bool {
        validate_iban(&self.0)
    }

    /// Consumes the identifier, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AccountIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AccountIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// IBAN Checksum
// =============================================================================

/// Fixed IBAN lengths for the countries the normalizer is used with.
fn iban_length(country: &str) -> Option<usize> {
    match country {
        "CZ" | "SK" => Some(24),
        "AT" => Some(20),
        "DE" => Some(22),
        "PL" => Some(28),
        _ => None,
    }
}

/// Incremental MOD 97 over an alphanumeric string (A=10 … Z=35).
fn mod97(chars: impl Iterator<Item = char>) -> Option<u32> {
    let mut remainder: u32 = 0;
    for c in chars {
        remainder = match c {
            '0'..='9' => (remainder * 10 + c.to_digit(10)?) % 97,
            'A'..='Z' => (remainder * 100 + (c as u32 - 'A' as u32 + 10)) % 97,
            _ => return None,
        };
    }
    Some(remainder)
}

/// Computes the ISO 7064 MOD 97-10 check digits for `country` + `bban`.
///
/// ## Example
/// ```rust
/// use invoicer_core::account::iban_check_digits;
///
/// assert_eq!(iban_check_digits("CZ", "08000000192000145399"), "65");
/// ```
pub fn iban_check_digits(country: &str, bban: &str) -> String {
    let rearranged = bban.chars().chain(country.chars()).chain("00".chars());
    let remainder = mod97(rearranged).unwrap_or(0);
    format!("{:02}", 98 - remainder)
}

/// Validates an IBAN: shape, length bounds and MOD 97 == 1.
///
/// Whitespace is ignored.
pub fn validate_iban(iban: &str) -> bool {
    let cleaned: String = iban.chars().filter(|c| !c.is_whitespace()).collect();

    if !(15..=34).contains(&cleaned.len()) {
        return false;
    }

    let bytes = cleaned.as_bytes();
    if !bytes[..2].iter().all(u8::is_ascii_uppercase) || !bytes[2..4].iter().all(u8::is_ascii_digit)
    {
        return false;
    }

    let rearranged = cleaned[4..].chars().chain(cleaned[..4].chars());
    mod97(rearranged) == Some(1)
}

// =============================================================================
// Unit Tests
// =============================================================================
