//! # Error Types
//!
//! Domain-specific error types for invoicer-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  invoicer-core errors (this file)                                      │
//! │  ├── CoreError        - Payment / lifecycle rule violations            │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  invoicer-db errors (separate crate)                                   │
//! │  └── DbError          - Database failures, wraps CoreError             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → web layer → user        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (invoice ID, raw input, etc.)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

use crate::lifecycle::{InvoiceAction, InvoiceStatus};

// =============================================================================
// Core Error
// =============================================================================

/// Payment-core errors.
///
/// Every failure of the normalizer, encoder, allocator and lifecycle is one
/// of these variants. Sanitization of optional descriptor fields never
/// produces an error; invalid values are simply omitted.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The bank account reference is neither canonical nor
    /// `[prefix-]account/bankCode`.
    ///
    /// ## When This Occurs
    /// - No `/` separator and no country prefix (`"123456789"`)
    /// - Non-digit characters in a local segment (`"12a/0100"`)
    /// - A segment longer than its padded width (`"12345678901/0100"`)
    /// - Strict mode: canonical value with a wrong length or checksum
    #[error("Invalid bank account '{input}': {reason}")]
    InvalidAccountFormat { input: String, reason: String },

    /// No destination account to encode into a descriptor.
    #[error("No bank account configured for payments")]
    MissingAccount,

    /// The allocator could not find a free variable symbol within its
    /// retry budget.
    #[error("No free variable symbol found after {attempts} attempts")]
    SymbolSpaceExhausted { attempts: u32 },

    /// Content edit attempted outside `Draft`.
    ///
    /// ## User Workflow
    /// ```text
    /// Edit invoice lines
    ///      │
    ///      ▼
    /// status == Sent
    ///      │
    ///      ▼
    /// InvalidStateForEdit { invoice_id, current_status: Sent }
    ///      │
    ///      ▼
    /// UI shows: "Invoice was already sent and can no longer be edited"
    /// ```
    #[error("Invoice {invoice_id} is {current_status}, only drafts can be edited")]
    InvalidStateForEdit {
        invoice_id: String,
        current_status: InvoiceStatus,
    },

    /// The lifecycle does not allow `action` from `from`.
    #[error("Cannot {action} an invoice that is {from}")]
    InvalidTransition {
        from: InvoiceStatus,
        action: InvoiceAction,
    },

    /// Referenced record is absent or not owned by the caller.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidAccountFormat error.
    pub fn invalid_account(input: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidAccountFormat {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before any record is written.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid currency code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidStateForEdit {
            invoice_id: "inv-1".to_string(),
            current_status: InvoiceStatus::Sent,
        };
        assert_eq!(
            err.to_string(),
            "Invoice inv-1 is sent, only drafts can be edited"
        );

        let err = CoreError::InvalidTransition {
            from: InvoiceStatus::Canceled,
            action: InvoiceAction::MarkPaid,
        };
        assert_eq!(err.to_string(), "Cannot mark paid an invoice that is canceled");

        let err = CoreError::SymbolSpaceExhausted { attempts: 100 };
        assert_eq!(
            err.to_string(),
            "No free variable symbol found after 100 attempts"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "items".to_string(),
        };
        assert_eq!(err.to_string(), "items is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "currency".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
