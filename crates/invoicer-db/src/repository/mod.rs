//! # Repository Module
//!
//! Database repository implementations for the invoicing core.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who talks to which table                             │
//! │                                                                         │
//! │  db.invoices().create(user, input)                                     │
//! │       │                                                                 │
//! │       ├──► SymbolRepository   (payment_symbols: the arena)             │
//! │       ├──► ClientRepository   (clients: ownership check)               │
//! │       └──► invoices + invoice_items                                    │
//! │                                                                         │
//! │  db.invoices().descriptor(user, id, &encoder)                          │
//! │       │                                                                 │
//! │       └──► AccountRepository  (payment_accounts) ──► DescriptorEncoder │
//! │                                                                         │
//! │  Every query carries user_id. A foreign row reads as NotFound.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Invoices, lines, lifecycle
//! - [`SubscriptionRepository`](subscription::SubscriptionRepository) - Subscription periods
//! - [`SymbolRepository`](symbol::SymbolRepository) - Variable symbol arena
//! - [`ClientRepository`](client::ClientRepository) - Clients
//! - [`AccountRepository`](account::AccountRepository) - Payout bank accounts
//! - [`PurgeRepository`](purge::PurgeRepository) - Whole-account deletion

pub mod account;
pub mod client;
pub mod invoice;
pub mod purge;
pub mod subscription;
pub mod symbol;
