//! # Billing Configuration
//!
//! Payment, symbol allocation and database settings.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     INVOICER_CURRENCY=CZK                                              │
//! │     INVOICER_CHECK_DIGITS=legacy                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/invoicer/billing.toml (Linux)                            │
//! │     ~/Library/Application Support/com.invoicer.invoicer/billing.toml   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     Everything except the currency, which has no safe default          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [payment]
//! currency = "CZK"
//! country_code = "CZ"
//! check_digits = "computed"  # computed | legacy
//! strict_canonical = false
//! qr_error_correction = "M"  # L | M | Q | H
//!
//! [symbols]
//! max_attempts = 100
//! insert_retries = 1
//!
//! [database]
//! path = "./invoicer.db"
//! max_connections = 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use invoicer_core::account::{AccountPolicy, CheckDigitPolicy};
use invoicer_core::descriptor::DescriptorEncoder;
use invoicer_core::qr::ErrorCorrection;
use invoicer_core::symbol::DEFAULT_MAX_ATTEMPTS;
use invoicer_core::validation::validate_currency;

use crate::error::{ConfigError, ConfigResult};
use crate::pool::DbConfig;

// =============================================================================
// Payment Settings
// =============================================================================

/// How descriptors are produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// ISO 4217 code written into every descriptor. Required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    #[serde(default = "default_country_code")]
    pub country_code: String,

    #[serde(default)]
    pub check_digits: CheckDigitPolicy,

    #[serde(default)]
    pub strict_canonical: bool,

    #[serde(default)]
    pub qr_error_correction: ErrorCorrection,
}

fn default_country_code() -> String {
    "CZ".to_string()
}

impl Default for PaymentSettings {
    fn default() -> Self {
        PaymentSettings {
            currency: None,
            country_code: default_country_code(),
            check_digits: CheckDigitPolicy::default(),
            strict_canonical: false,
            qr_error_correction: ErrorCorrection::default(),
        }
    }
}

// =============================================================================
// Symbol Settings
// =============================================================================

/// Variable symbol allocation budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSettings {
    /// Candidates checked against the arena before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Extra inserts after a UNIQUE violation on the arena.
    #[serde(default = "default_insert_retries")]
    pub insert_retries: u32,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_insert_retries() -> u32 {
    1
}

impl Default for SymbolSettings {
    fn default() -> Self {
        SymbolSettings {
            max_attempts: default_max_attempts(),
            insert_retries: default_insert_retries(),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./invoicer.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Main Billing Configuration
// =============================================================================

/// Complete billing configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingConfig {
    #[serde(default)]
    pub payment: PaymentSettings,

    #[serde(default)]
    pub symbols: SymbolSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl BillingConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (billing.toml)
    /// 3. Environment variables
    ///
    /// The result is validated; a missing currency is an error.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading billing config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        config.normalize();

        Ok(config)
    }

    /// Parses a TOML document without validating it.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoConfigPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Billing config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let currency = self
            .payment
            .currency
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "payment.currency".to_string(),
            })?;
        validate_currency(currency)
            .map_err(|e| ConfigError::invalid("payment.currency", e.to_string()))?;

        let country = &self.payment.country_code;
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::invalid(
                "payment.country_code",
                "must be two uppercase letters",
            ));
        }

        if self.symbols.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "symbols.max_attempts",
                "must be greater than 0",
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid(
                "database.max_connections",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    fn normalize(&mut self) {
        if let Some(currency) = self.payment.currency.as_mut() {
            *currency = currency.trim().to_ascii_uppercase();
        }
    }

    /// Applies overrides from a variable lookup (the process environment in
    /// [`BillingConfig::load`]).
    pub fn apply_overrides<F>(&mut self, var: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(currency) = var("INVOICER_CURRENCY") {
            debug!(currency = %currency, "Overriding currency from environment");
            self.payment.currency = Some(currency);
        }

        if let Some(country) = var("INVOICER_COUNTRY_CODE") {
            self.payment.country_code = country.trim().to_ascii_uppercase();
        }

        if let Some(policy) = var("INVOICER_CHECK_DIGITS") {
            debug!(policy = %policy, "Overriding check digit policy from environment");
            self.payment.check_digits = policy
                .parse()
                .map_err(|e: invoicer_core::ValidationError| {
                    ConfigError::invalid("INVOICER_CHECK_DIGITS", e.to_string())
                })?;
        }

        if let Some(strict) = var("INVOICER_STRICT_CANONICAL") {
            self.payment.strict_canonical = parse_bool(&strict).ok_or_else(|| {
                ConfigError::invalid("INVOICER_STRICT_CANONICAL", "expected true or false")
            })?;
        }

        if let Some(path) = var("INVOICER_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(attempts) = var("INVOICER_SYMBOL_ATTEMPTS") {
            self.symbols.max_attempts = attempts.trim().parse().map_err(|_| {
                ConfigError::invalid("INVOICER_SYMBOL_ATTEMPTS", "expected a positive integer")
            })?;
        }

        Ok(())
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "invoicer", "invoicer")
            .map(|dirs| dirs.config_dir().join("billing.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// The configured currency.
    pub fn currency(&self) -> ConfigResult<&str> {
        self.payment
            .currency
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "payment.currency".to_string(),
            })
    }

    /// Normalizer settings.
    pub fn account_policy(&self) -> AccountPolicy {
        AccountPolicy {
            country_code: self.payment.country_code.clone(),
            check_digits: self.payment.check_digits,
            strict_canonical: self.payment.strict_canonical,
        }
    }

    /// Encoder using [`BillingConfig::account_policy`].
    pub fn encoder(&self) -> DescriptorEncoder {
        DescriptorEncoder::new(self.account_policy())
    }

    /// Pool settings for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .symbol_settings(self.symbols)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
