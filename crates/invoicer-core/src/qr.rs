//! # QR Rendering Seam
//!
//! Descriptors end up in a QR code. Image generation is a collaborator's
//! job; the core only fixes the input it receives.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::descriptor::{DescriptorEncoder, PaymentDescriptor};
use crate::error::{CoreResult, ValidationError};
use crate::types::Invoice;

/// QR error-correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorCorrection {
    /// ~7% recovery.
    L,
    /// ~15% recovery.
    #[default]
    M,
    /// ~25% recovery.
    Q,
    /// ~30% recovery.
    H,
}

impl fmt::Display for ErrorCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            ErrorCorrection::L => "L",
            ErrorCorrection::M => "M",
            ErrorCorrection::Q => "Q",
            ErrorCorrection::H => "H",
        };
        f.write_str(level)
    }
}

impl FromStr for ErrorCorrection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(ErrorCorrection::L),
            "M" => Ok(ErrorCorrection::M),
            "Q" => Ok(ErrorCorrection::Q),
            "H" => Ok(ErrorCorrection::H),
            _ => Err(ValidationError::InvalidFormat {
                field: "qr_error_correction".to_string(),
                reason: format!("'{s}' is not one of L, M, Q, H"),
            }),
        }
    }
}

/// Turns a descriptor into an image.
pub trait QrRenderer {
    type Error;

    /// Renders `descriptor` at the requested error-correction level.
    /// The image format is up to the implementation.
    fn render(
        &self,
        descriptor: &PaymentDescriptor,
        level: ErrorCorrection,
    ) -> Result<Vec<u8>, Self::Error>;
}

/// Encodes the invoice's descriptor and hands it to `renderer`.
///
/// Encoding failures surface as the outer error; the renderer's own
/// failure is the inner one.
pub fn render_invoice<Q: QrRenderer>(
    renderer: &Q,
    encoder: &DescriptorEncoder,
    invoice: &Invoice,
    account_ref: &str,
    level: ErrorCorrection,
) -> CoreResult<Result<Vec<u8>, Q::Error>> {
    let descriptor = encoder.encode_invoice(invoice, account_ref)?;
    Ok(renderer.render(&descriptor, level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountPolicy;
    use crate::error::CoreError;
    use crate::lifecycle::InvoiceStatus;
    use chrono::{NaiveDate, Utc};
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingRenderer {
        seen: RefCell<Vec<(String, ErrorCorrection)>>,
    }

    impl QrRenderer for RecordingRenderer {
        type Error = std::convert::Infallible;

        fn render(
            &self,
            descriptor: &PaymentDescriptor,
            level: ErrorCorrection,
        ) -> Result<Vec<u8>, Self::Error> {
            self.seen
                .borrow_mut()
                .push((descriptor.as_str().to_string(), level));
            Ok(descriptor.as_str().as_bytes().to_vec())
        }
    }

    fn invoice() -> Invoice {
        let now = Utc::now();
        Invoice {
            id: "inv-1".to_string(),
            user_id: "user-1".to_string(),
            client_id: "client-1".to_string(),
            number: "42".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            due_date: None,
            currency: "CZK".to_string(),
            total_cents: 123450,
            status: InvoiceStatus::Sent,
            is_paid: false,
            is_canceled: false,
            payment_date: None,
            variable_symbol: "123456".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!("m".parse::<ErrorCorrection>().unwrap(), ErrorCorrection::M);
        assert_eq!("H".parse::<ErrorCorrection>().unwrap(), ErrorCorrection::H);
        assert!("X".parse::<ErrorCorrection>().is_err());
        assert_eq!(ErrorCorrection::default(), ErrorCorrection::M);
    }

    #[test]
    fn test_render_invoice_passes_descriptor() {
        let renderer = RecordingRenderer::default();
        let encoder = DescriptorEncoder::new(AccountPolicy::legacy());

        let bytes = render_invoice(
            &renderer,
            &encoder,
            &invoice(),
            "123456789/0100",
            ErrorCorrection::Q,
        )
        .unwrap()
        .unwrap();

        let expected =
            "SPD*1.0*ACC:CZ6501000000000123456789*AM:1234.50*CC:CZK*MSG:Invoice 42*X-VS:123456";
        assert_eq!(bytes, expected.as_bytes());
        assert_eq!(
            renderer.seen.borrow().as_slice(),
            &[(expected.to_string(), ErrorCorrection::Q)]
        );
    }

    #[test]
    fn test_render_invoice_without_account() {
        let renderer = RecordingRenderer::default();
        let result = render_invoice(
            &renderer,
            &DescriptorEncoder::default(),
            &invoice(),
            "  ",
            ErrorCorrection::M,
        );
        assert!(matches!(result, Err(CoreError::MissingAccount)));
        assert!(renderer.seen.borrow().is_empty());
    }
}
