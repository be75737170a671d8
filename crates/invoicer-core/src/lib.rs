//! # invoicer-core: Payment Core for Invoicer
//!
//! The invoice payment lifecycle and payment descriptor logic, as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Invoicer Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Web layer (routing, sessions, pages)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ invoicer-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌──────────┐  ┌───────────┐  │   │
//! │  │   │  account  │─►│ descriptor │  │  symbol  │  │ lifecycle │  │   │
//! │  │   │   IBAN    │  │   SPAYD    │  │ allocator│  │  Draft →  │  │   │
//! │  │   └───────────┘  └────────────┘  └──────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  invoicer-db (Database Layer)                   │   │
//! │  │      SQLite repositories, symbol arena, atomic transitions      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`account`] - Local bank account → IBAN normalization
//! - [`descriptor`] - SPAYD payment descriptor encoding
//! - [`symbol`] - Variable symbol generation with bounded retry
//! - [`lifecycle`] - Invoice status state machine
//! - [`qr`] - QR rendering seam
//! - [`types`] - Domain records
//! - [`money`] - Integer money
//! - [`validation`] - Input rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use invoicer_core::descriptor::DescriptorEncoder;
//! use invoicer_core::Money;
//!
//! let spd = DescriptorEncoder::default()
//!     .encode(
//!         "19-2000145399/0800",
//!         Some(Money::from_cents(50000)),
//!         "CZK",
//!         Some("Invoice 7"),
//!         Some("704512"),
//!     )
//!     .unwrap();
//!
//! assert_eq!(
//!     spd.as_str(),
//!     "SPD*1.0*ACC:CZ6508000000192000145399*AM:500.00*CC:CZK*MSG:Invoice 7*X-VS:704512"
//! );
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod account;
pub mod descriptor;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod qr;
pub mod symbol;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use account::{AccountIdentifier, AccountPolicy, CheckDigitPolicy};
pub use descriptor::{DescriptorEncoder, PaymentDescriptor};
pub use error::{CoreError, CoreResult, ValidationError};
pub use lifecycle::{BillingState, InvoiceAction, InvoiceStatus};
pub use money::Money;
pub use qr::{ErrorCorrection, QrRenderer};
pub use symbol::{PaymentSymbol, RandomSource, StdRandom, SymbolAllocator};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines on one invoice.
pub const MAX_LINE_ITEMS: usize = 200;

/// Maximum quantity on one line.
///
/// ## Business Reason
/// Catches typos like 10000 instead of 10 before they reach a client.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;
