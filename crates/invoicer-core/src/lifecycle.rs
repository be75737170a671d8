//! # Invoice Lifecycle
//!
//! The billing-status state machine.
//!
//! ## State Diagram
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Invoice Lifecycle                                 │
//! │                                                                         │
//! │              send               mark paid                              │
//! │   ┌───────┐ ──────► ┌──────┐ ──────────► ┌──────┐                       │
//! │   │ Draft │         │ Sent │             │ Paid │                       │
//! │   └───┬───┘         └──┬───┘ ◄────────── └──┬───┘                       │
//! │       │                │      mark unpaid   │                           │
//! │       │ cancel         │ cancel             │ cancel                    │
//! │       ▼                ▼                    ▼                           │
//! │   ┌─────────────────────────────────────────────┐                      │
//! │   │                 Canceled                    │  (terminal)          │
//! │   └─────────────────────────────────────────────┘                      │
//! │                                                                         │
//! │  Content edits: Draft only                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `advance` moves one step along the top row.
//!
//! Transitions here are pure: they compute the next [`BillingState`]. The
//! database layer applies the result with an update conditioned on the
//! status it was computed from.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Invoice Status
// =============================================================================

/// The billing status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Being prepared; content may still change.
    #[default]
    Draft,
    /// Delivered to the client, awaiting payment.
    Sent,
    /// Payment received.
    Paid,
    /// Withdrawn. Terminal.
    Canceled,
}

impl InvoiceStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [InvoiceStatus; 4] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::Paid,
        InvoiceStatus::Canceled,
    ];

    /// Lowercase name, as stored in the database.
    pub const fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Canceled => "canceled",
        }
    }

    /// Only drafts accept content edits.
    #[inline]
    pub const fn is_editable(&self) -> bool {
        matches!(self, InvoiceStatus::Draft)
    }

    /// No transition leaves a terminal status.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Canceled)
    }

    /// Returns the status `action` leads to, if allowed.
    pub const fn target(&self, action: InvoiceAction) -> Option<InvoiceStatus> {
        use InvoiceAction as A;
        use InvoiceStatus as S;

        match (*self, action) {
            (S::Draft, A::Send | A::Advance) => Some(S::Sent),
            (S::Sent, A::MarkPaid | A::Advance) => Some(S::Paid),
            (S::Paid, A::MarkUnpaid) => Some(S::Sent),
            (S::Draft | S::Sent | S::Paid, A::Cancel) => Some(S::Canceled),
            _ => None,
        }
    }

    /// Statuses reachable in one step.
    pub fn successors(&self) -> Vec<InvoiceStatus> {
        let mut out = Vec::new();
        for target in InvoiceAction::ALL.iter().filter_map(|a| self.target(*a)) {
            if !out.contains(&target) {
                out.push(target);
            }
        }
        out
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// =============================================================================
// Invoice Action
// =============================================================================

/// A lifecycle trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceAction {
    Send,
    MarkPaid,
    MarkUnpaid,
    Cancel,
    /// One step forward: send a draft, settle a sent invoice.
    Advance,
}

impl InvoiceAction {
    pub const ALL: [InvoiceAction; 5] = [
        InvoiceAction::Send,
        InvoiceAction::MarkPaid,
        InvoiceAction::MarkUnpaid,
        InvoiceAction::Cancel,
        InvoiceAction::Advance,
    ];
}

impl fmt::Display for InvoiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceAction::Send => write!(f, "send"),
            InvoiceAction::MarkPaid => write!(f, "mark paid"),
            InvoiceAction::MarkUnpaid => write!(f, "mark unpaid"),
            InvoiceAction::Cancel => write!(f, "cancel"),
            InvoiceAction::Advance => write!(f, "advance"),
        }
    }
}

// =============================================================================
// Billing State
// =============================================================================

/// The lifecycle-owned fields of an invoice.
///
/// ## Invariants
/// - `is_paid` ⇔ `status == Paid`, and then `payment_date` is set
/// - `is_canceled` ⇔ `status == Canceled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BillingState {
    pub status: InvoiceStatus,
    pub is_paid: bool,
    pub is_canceled: bool,
    pub payment_date: Option<NaiveDate>,
}

impl BillingState {
    /// The state of a freshly created invoice.
    pub fn new_draft() -> Self {
        BillingState::default()
    }

    /// Computes the state after `action`.
    ///
    /// `today` becomes the payment date when the invoice is marked paid, so
    /// a `Paid → Sent → Paid` round-trip always carries the latest date.
    ///
    /// ## Errors
    /// `InvalidTransition` when the lifecycle forbids `action`.
    pub fn apply(&self, action: InvoiceAction, today: NaiveDate) -> CoreResult<BillingState> {
        let status = self
            .status
            .target(action)
            .ok_or(CoreError::InvalidTransition {
                from: self.status,
                action,
            })?;

        let next = match status {
            InvoiceStatus::Draft | InvoiceStatus::Sent => BillingState {
                status,
                is_paid: false,
                is_canceled: false,
                payment_date: None,
            },
            InvoiceStatus::Paid => BillingState {
                status,
                is_paid: true,
                is_canceled: false,
                payment_date: Some(today),
            },
            // Payment fields are frozen as they were.
            InvoiceStatus::Canceled => BillingState {
                status,
                is_canceled: true,
                ..*self
            },
        };

        Ok(next)
    }

    /// Checks the invariants of the stored flags.
    pub fn is_consistent(&self) -> bool {
        let paid_ok = match self.status {
            InvoiceStatus::Paid => self.is_paid && self.payment_date.is_some(),
            InvoiceStatus::Canceled => true,
            _ => !self.is_paid,
        };
        paid_ok && (self.is_canceled == (self.status == InvoiceStatus::Canceled))
    }
}

/// Fails with `InvalidStateForEdit` unless `status` allows content edits.
pub fn ensure_editable(invoice_id: &str, status: InvoiceStatus) -> CoreResult<()> {
    if status.is_editable() {
        Ok(())
    } else {
        Err(CoreError::InvalidStateForEdit {
            invoice_id: invoice_id.to_string(),
            current_status: status,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
