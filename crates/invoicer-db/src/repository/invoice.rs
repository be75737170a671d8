//! # Invoice Repository
//!
//! Invoice persistence and the lifecycle transitions applied to it.
//!
//! ## Conditioned Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    How a transition is applied                          │
//! │                                                                         │
//! │  read invoice (id, user_id)            ── absent/foreign ──► NotFound  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BillingState::apply(action, today)    ── forbidden ──► InvalidTransition
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UPDATE invoices SET …                                                  │
//! │  WHERE id = ? AND user_id = ? AND status = <status we read>            │
//! │       │                                                                 │
//! │       ├── 1 row  ──► done                                              │
//! │       └── 0 rows ──► someone else moved it: re-read and re-validate    │
//! │                      (3 rounds, then ConcurrentModification)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Local, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use invoicer_core::lifecycle::ensure_editable;
use invoicer_core::symbol::{PaymentSymbol, RandomSource, StdRandom, SymbolAllocator};
use invoicer_core::types::items_total;
use invoicer_core::validation::{validate_line_items, validate_new_invoice};
use invoicer_core::{
    BillingState, CoreError, DescriptorEncoder, Invoice, InvoiceAction, InvoiceItem,
    InvoiceStatus, NewInvoice, NewLineItem, PaymentDescriptor, SymbolOwner,
};

use crate::config::SymbolSettings;
use crate::error::{DbError, DbResult};
use crate::repository::account::AccountRepository;
use crate::repository::client::ClientRepository;
use crate::repository::symbol::{allocate_symbol, reserve_in, InsertRetry, SymbolLookup, SymbolRepository};

/// Re-read rounds before a transition gives up on a contended invoice.
pub const MAX_TRANSITION_ROUNDS: u32 = 3;

const INVOICE_COLUMNS: &str = "id, user_id, client_id, number, issue_date, due_date, currency, \
    total_cents, status, is_paid, is_canceled, payment_date, variable_symbol, created_at, updated_at";

/// The business date used for payment dates.
fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Repository for invoice database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.invoices();
///
/// let invoice = repo.create(user_id, new_invoice).await?;
/// let invoice = repo.send(user_id, &invoice.id).await?;
/// let spd = repo.descriptor(user_id, &invoice.id, &config.encoder()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
    symbols: SymbolSettings,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool, symbols: SymbolSettings) -> Self {
        InvoiceRepository { pool, symbols }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Creates a `Draft` invoice with a fresh variable symbol.
    ///
    /// ## What This Does
    /// 1. Validates lines, currency, number and dates
    /// 2. Checks the client belongs to `user_id`
    /// 3. Allocates a symbol against the arena (OS-seeded randomness)
    /// 4. Reserves the symbol and inserts invoice + lines in one transaction
    /// 5. On an arena collision, retries with a fresh symbol
    pub async fn create(&self, user_id: &str, input: NewInvoice) -> DbResult<Invoice> {
        let mut allocator =
            SymbolAllocator::new(StdRandom::from_entropy()).with_max_attempts(self.symbols.max_attempts);
        let lookup = SymbolRepository::new(self.pool.clone());

        self.create_with(user_id, input, &mut allocator, &lookup).await
    }

    /// [`InvoiceRepository::create`] with an explicit allocator and lookup.
    pub async fn create_with<R, L>(
        &self,
        user_id: &str,
        input: NewInvoice,
        allocator: &mut SymbolAllocator<R>,
        lookup: &L,
    ) -> DbResult<Invoice>
    where
        R: RandomSource,
        L: SymbolLookup,
    {
        let currency = validate_new_invoice(&input)?;
        ClientRepository::new(self.pool.clone())
            .get(user_id, &input.client_id)
            .await?;

        let mut retry = InsertRetry::new(self.symbols.insert_retries);
        loop {
            let symbol = allocate_symbol(lookup, allocator).await?;

            match self.insert(user_id, &input, &currency, &symbol).await {
                Ok(invoice) => {
                    info!(
                        id = %invoice.id,
                        number = %invoice.number,
                        symbol = %invoice.variable_symbol,
                        total = %invoice.total(),
                        "Invoice created"
                    );
                    return Ok(invoice);
                }
                Err(err) => retry.check(err, &symbol)?,
            }
        }
    }

    async fn insert(
        &self,
        user_id: &str,
        input: &NewInvoice,
        currency: &str,
        symbol: &PaymentSymbol,
    ) -> DbResult<Invoice> {
        let now = Utc::now();
        let state = BillingState::new_draft();
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            client_id: input.client_id.clone(),
            number: input.number.trim().to_string(),
            issue_date: input.issue_date,
            due_date: input.due_date,
            currency: currency.to_string(),
            total_cents: input.total().cents(),
            status: state.status,
            is_paid: state.is_paid,
            is_canceled: state.is_canceled,
            payment_date: state.payment_date,
            variable_symbol: symbol.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %invoice.id, symbol = %symbol, "Inserting invoice");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        reserve_in(&mut tx, symbol, user_id, SymbolOwner::Invoice, &invoice.id).await?;

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, user_id, client_id, number, issue_date, due_date, currency,
                total_cents, status, is_paid, is_canceled, payment_date,
                variable_symbol, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.user_id)
        .bind(&invoice.client_id)
        .bind(&invoice.number)
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(&invoice.currency)
        .bind(invoice.total_cents)
        .bind(invoice.status)
        .bind(invoice.is_paid)
        .bind(invoice.is_canceled)
        .bind(invoice.payment_date)
        .bind(&invoice.variable_symbol)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await?;

        insert_items(&mut tx, &invoice.id, &input.items).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(invoice)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Gets an invoice by ID.
    ///
    /// ## Returns
    /// * `Ok(Invoice)` - Found and owned by `user_id`
    /// * `Err(DbError::NotFound)` - Absent or foreign
    pub async fn get(&self, user_id: &str, id: &str) -> DbResult<Invoice> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1 AND user_id = ?2");

        sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", id))
    }

    /// Lists a user's invoices, newest first, optionally by status.
    pub async fn list(&self, user_id: &str, status: Option<InvoiceStatus>) -> DbResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices \
             WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2) \
             ORDER BY issue_date DESC, number DESC"
        );

        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(user_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        debug!(user_id, count = invoices.len(), "Listed invoices");
        Ok(invoices)
    }

    /// Lines of an invoice in display order.
    pub async fn items(&self, user_id: &str, invoice_id: &str) -> DbResult<Vec<InvoiceItem>> {
        self.get(user_id, invoice_id).await?;

        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT id, invoice_id, position, description, quantity, unit_price_cents, line_total_cents
            FROM invoice_items
            WHERE invoice_id = ?1
            ORDER BY position
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    // =========================================================================
    // Draft Edits
    // =========================================================================

    /// Replaces all lines of a draft and recomputes its total.
    ///
    /// ## Errors
    /// - `Validation` for an empty or invalid line set
    /// - `InvalidStateForEdit` unless the invoice is `Draft`
    pub async fn replace_items(
        &self,
        user_id: &str,
        invoice_id: &str,
        items: Vec<NewLineItem>,
    ) -> DbResult<Invoice> {
        validate_line_items(&items)?;

        let mut invoice = self.get(user_id, invoice_id).await?;
        ensure_editable(&invoice.id, invoice.status)?;

        let total = items_total(&items);
        let now = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE invoices SET total_cents = ?1, updated_at = ?2
            WHERE id = ?3 AND user_id = ?4 AND status = 'draft'
            "#,
        )
        .bind(total.cents())
        .bind(now)
        .bind(invoice_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

            // Sent, canceled or purged since we read it.
            let current = self.get(user_id, invoice_id).await?;
            ensure_editable(&current.id, current.status)?;
            return Err(DbError::ConcurrentModification {
                entity: "Invoice".to_string(),
                id: invoice_id.to_string(),
                rounds: 1,
            });
        }

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, invoice_id, &items).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(id = %invoice_id, lines = items.len(), total = %total, "Replaced invoice lines");

        invoice.total_cents = total.cents();
        invoice.updated_at = now;
        Ok(invoice)
    }

    // =========================================================================
    // Lifecycle Transitions
    // =========================================================================

    /// Draft → Sent.
    pub async fn send(&self, user_id: &str, id: &str) -> DbResult<Invoice> {
        self.transition(user_id, id, InvoiceAction::Send, today()).await
    }

    /// Sent → Paid, dated today.
    pub async fn mark_paid(&self, user_id: &str, id: &str) -> DbResult<Invoice> {
        self.mark_paid_on(user_id, id, today()).await
    }

    /// Sent → Paid with an explicit payment date.
    pub async fn mark_paid_on(&self, user_id: &str, id: &str, date: NaiveDate) -> DbResult<Invoice> {
        self.transition(user_id, id, InvoiceAction::MarkPaid, date).await
    }

    /// Paid → Sent; clears the payment date.
    pub async fn mark_unpaid(&self, user_id: &str, id: &str) -> DbResult<Invoice> {
        self.transition(user_id, id, InvoiceAction::MarkUnpaid, today()).await
    }

    /// Draft, Sent or Paid → Canceled.
    pub async fn cancel(&self, user_id: &str, id: &str) -> DbResult<Invoice> {
        self.transition(user_id, id, InvoiceAction::Cancel, today()).await
    }

    /// One step forward: Draft → Sent, Sent → Paid.
    pub async fn advance(&self, user_id: &str, id: &str) -> DbResult<Invoice> {
        self.transition(user_id, id, InvoiceAction::Advance, today()).await
    }

    /// Applies `action` as a conditioned update, re-reading on contention.
    pub async fn transition(
        &self,
        user_id: &str,
        id: &str,
        action: InvoiceAction,
        today: NaiveDate,
    ) -> DbResult<Invoice> {
        for round in 1..=MAX_TRANSITION_ROUNDS {
            let invoice = self.get(user_id, id).await?;
            let next = invoice.billing_state().apply(action, today)?;

            if let Some(updated) = self.try_apply(invoice, next).await? {
                debug!(id, %action, status = %updated.status, "Invoice transitioned");
                return Ok(updated);
            }

            warn!(id, %action, round, "Invoice changed during transition, re-reading");
        }

        Err(DbError::ConcurrentModification {
            entity: "Invoice".to_string(),
            id: id.to_string(),
            rounds: MAX_TRANSITION_ROUNDS,
        })
    }

    /// Writes `next` if the stored status still matches `snapshot`.
    /// `None` when another writer got there first.
    async fn try_apply(&self, mut snapshot: Invoice, next: BillingState) -> DbResult<Option<Invoice>> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE invoices SET
                status = ?1,
                is_paid = ?2,
                is_canceled = ?3,
                payment_date = ?4,
                updated_at = ?5
            WHERE id = ?6 AND user_id = ?7 AND status = ?8
            "#,
        )
        .bind(next.status)
        .bind(next.is_paid)
        .bind(next.is_canceled)
        .bind(next.payment_date)
        .bind(now)
        .bind(&snapshot.id)
        .bind(&snapshot.user_id)
        .bind(snapshot.status)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        snapshot.apply_billing_state(next);
        snapshot.updated_at = now;
        Ok(Some(snapshot))
    }

    // =========================================================================
    // Payment Descriptor
    // =========================================================================

    /// Renders the SPAYD descriptor for an invoice, paid to the owner's
    /// stored account.
    ///
    /// ## Errors
    /// - `NotFound` for an absent or foreign invoice
    /// - `MissingAccount` when the owner has no payout account
    /// - normalizer failures for a malformed stored account
    pub async fn descriptor(
        &self,
        user_id: &str,
        invoice_id: &str,
        encoder: &DescriptorEncoder,
    ) -> DbResult<PaymentDescriptor> {
        let invoice = self.get(user_id, invoice_id).await?;
        let account = AccountRepository::new(self.pool.clone())
            .get(user_id)
            .await?
            .ok_or(CoreError::MissingAccount)?;

        Ok(encoder.encode_invoice(&invoice, &account)?)
    }
}

async fn insert_items(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    items: &[NewLineItem],
) -> DbResult<()> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO invoice_items (
                id, invoice_id, position, description, quantity, unit_price_cents, line_total_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(invoice_id)
        .bind(position as i64)
        .bind(item.description.trim())
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.line_total().cents())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::test_support::{date, new_invoice, setup, AlwaysFree, USER};
    use invoicer_core::symbol::ScriptedRandom;
    use invoicer_core::AccountPolicy;

    #[tokio::test]
    async fn test_create_draft_with_symbol() {
        let (db, client) = setup().await;
        let repo = db.invoices();

        let invoice = repo
            .create(USER, new_invoice(&client.id, "2026-001"))
            .await
            .unwrap();

        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert!(!invoice.is_paid);
        assert_eq!(invoice.currency, "CZK");
        assert_eq!(invoice.total_cents, 452550);
        assert!(invoice.variable_symbol.parse::<PaymentSymbol>().is_ok());

        let symbol: PaymentSymbol = invoice.variable_symbol.parse().unwrap();
        assert_eq!(
            db.symbols().owner_of(&symbol).await.unwrap(),
            Some((SymbolOwner::Invoice, invoice.id.clone()))
        );

        let items = repo.items(USER, &invoice.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "Consulting");
        assert_eq!(items[0].line_total_cents, 450000);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_lines() {
        let (db, client) = setup().await;
        let mut input = new_invoice(&client.id, "2026-001");
        input.items.clear();

        let err = db.invoices().create(USER, input).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
        assert_eq!(db.symbols().count_active().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_requires_own_client() {
        let (db, client) = setup().await;
        let err = db
            .invoices()
            .create("someone-else", new_invoice(&client.id, "2026-001"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_number_is_not_retried() {
        let (db, client) = setup().await;
        let repo = db.invoices();

        repo.create(USER, new_invoice(&client.id, "2026-001"))
            .await
            .unwrap();
        let err = repo
            .create(USER, new_invoice(&client.id, "2026-001"))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::UniqueViolation { .. }));
        // The losing transaction rolled back its arena row.
        assert_eq!(db.symbols().count_active().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_allocation_skips_symbols_in_use() {
        let (db, client) = setup().await;
        let repo = db.invoices();
        let arena = db.symbols();

        let mut allocator = SymbolAllocator::new(ScriptedRandom::symbols(&[123456, 234567]));
        let first = repo
            .create_with(USER, new_invoice(&client.id, "1"), &mut allocator, &arena)
            .await
            .unwrap();
        let second = repo
            .create_with(USER, new_invoice(&client.id, "2"), &mut allocator, &arena)
            .await
            .unwrap();

        assert_eq!(first.variable_symbol, "123456");
        assert_eq!(second.variable_symbol, "234567");
    }

    #[tokio::test]
    async fn test_stale_lookup_collision_is_retried() {
        let (db, client) = setup().await;
        let repo = db.invoices();

        let mut seed = SymbolAllocator::new(ScriptedRandom::symbols(&[123456]));
        repo.create_with(USER, new_invoice(&client.id, "1"), &mut seed, &db.symbols())
            .await
            .unwrap();

        // The lookup claims 123456 is free; the arena disagrees at insert.
        let mut allocator = SymbolAllocator::new(ScriptedRandom::symbols(&[123456, 345678]));
        let invoice = repo
            .create_with(USER, new_invoice(&client.id, "2"), &mut allocator, &AlwaysFree)
            .await
            .unwrap();

        assert_eq!(invoice.variable_symbol, "345678");
        assert_eq!(db.symbols().count_active().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_collision_past_retry_budget_is_exhaustion() {
        let db = Database::new(DbConfig::in_memory().symbol_settings(SymbolSettings {
            max_attempts: 100,
            insert_retries: 0,
        }))
        .await
        .unwrap();
        let client = crate::repository::test_support::client(&db).await;
        let repo = db.invoices();

        let mut seed = SymbolAllocator::new(ScriptedRandom::symbols(&[123456]));
        repo.create_with(USER, new_invoice(&client.id, "1"), &mut seed, &db.symbols())
            .await
            .unwrap();

        let mut allocator = SymbolAllocator::new(ScriptedRandom::symbols(&[123456, 345678]));
        let err = repo
            .create_with(USER, new_invoice(&client.id, "2"), &mut allocator, &AlwaysFree)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::SymbolSpaceExhausted { attempts: 1 })
        ));
        assert_eq!(repo.list(USER, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_full_lifecycle_with_fresh_payment_date() {
        let (db, client) = setup().await;
        let repo = db.invoices();
        let invoice = repo
            .create(USER, new_invoice(&client.id, "2026-001"))
            .await
            .unwrap();

        let sent = repo.send(USER, &invoice.id).await.unwrap();
        assert_eq!(sent.status, InvoiceStatus::Sent);

        let paid = repo.mark_paid_on(USER, &invoice.id, date(3, 10)).await.unwrap();
        assert!(paid.is_paid);
        assert_eq!(paid.payment_date, Some(date(3, 10)));

        let unpaid = repo.mark_unpaid(USER, &invoice.id).await.unwrap();
        assert_eq!(unpaid.status, InvoiceStatus::Sent);
        assert_eq!(unpaid.payment_date, None);

        repo.mark_paid_on(USER, &invoice.id, date(3, 20)).await.unwrap();
        let stored = repo.get(USER, &invoice.id).await.unwrap();
        assert_eq!(stored.status, InvoiceStatus::Paid);
        assert!(stored.is_paid);
        assert_eq!(stored.payment_date, Some(date(3, 20)));
    }

    #[tokio::test]
    async fn test_cancel_is_terminal() {
        let (db, client) = setup().await;
        let repo = db.invoices();
        let invoice = repo
            .create(USER, new_invoice(&client.id, "2026-001"))
            .await
            .unwrap();

        let canceled = repo.cancel(USER, &invoice.id).await.unwrap();
        assert!(canceled.is_canceled);

        let err = repo.send(USER, &invoice.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidTransition {
                from: InvoiceStatus::Canceled,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_advance() {
        let (db, client) = setup().await;
        let repo = db.invoices();
        let invoice = repo
            .create(USER, new_invoice(&client.id, "2026-001"))
            .await
            .unwrap();

        assert_eq!(
            repo.advance(USER, &invoice.id).await.unwrap().status,
            InvoiceStatus::Sent
        );
        let paid = repo.advance(USER, &invoice.id).await.unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert!(paid.payment_date.is_some());
        assert!(repo.advance(USER, &invoice.id).await.is_err());
    }

    #[tokio::test]
    async fn test_transitions_are_scoped_to_owner() {
        let (db, client) = setup().await;
        let repo = db.invoices();
        let invoice = repo
            .create(USER, new_invoice(&client.id, "2026-001"))
            .await
            .unwrap();

        let err = repo.send("intruder", &invoice.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert_eq!(
            repo.get(USER, &invoice.id).await.unwrap().status,
            InvoiceStatus::Draft
        );

        let err = repo.send(USER, "missing").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_stale_snapshot_does_not_apply() {
        let (db, client) = setup().await;
        let repo = db.invoices();
        let invoice = repo
            .create(USER, new_invoice(&client.id, "2026-001"))
            .await
            .unwrap();

        let snapshot = repo.get(USER, &invoice.id).await.unwrap();
        repo.cancel(USER, &invoice.id).await.unwrap();

        let next = snapshot
            .billing_state()
            .apply(InvoiceAction::Send, date(3, 2))
            .unwrap();
        assert!(repo.try_apply(snapshot, next).await.unwrap().is_none());
        assert_eq!(
            repo.get(USER, &invoice.id).await.unwrap().status,
            InvoiceStatus::Canceled
        );
    }

    /// Both calls share the single in-memory connection, so they interleave
    /// at await points instead of writing in parallel.
    #[tokio::test]
    async fn test_interleaved_mark_paid_has_one_winner() {
        let (db, client) = setup().await;
        let repo = db.invoices();
        let invoice = repo
            .create(USER, new_invoice(&client.id, "2026-001"))
            .await
            .unwrap();
        repo.send(USER, &invoice.id).await.unwrap();

        let (a, b) = tokio::join!(
            repo.mark_paid_on(USER, &invoice.id, date(3, 5)),
            repo.mark_paid_on(USER, &invoice.id, date(3, 6)),
        );

        assert!(a.is_ok() != b.is_ok());
        let loser = a.err().or(b.err()).unwrap();
        assert!(matches!(
            loser,
            DbError::Domain(CoreError::InvalidTransition {
                from: InvoiceStatus::Paid,
                ..
            })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_mark_paid_on_file_pool_has_one_winner() {
        let path = std::env::temp_dir().join(format!("invoicer-race-{}.db", Uuid::new_v4()));
        let db = Database::new(DbConfig::new(&path).max_connections(4))
            .await
            .unwrap();
        let client = crate::repository::test_support::client(&db).await;
        let repo = db.invoices();
        let invoice = repo
            .create(USER, new_invoice(&client.id, "2026-001"))
            .await
            .unwrap();
        repo.send(USER, &invoice.id).await.unwrap();

        let tasks: Vec<_> = (1..=6)
            .map(|day| {
                let repo = repo.clone();
                let id = invoice.id.clone();
                tokio::spawn(async move { repo.mark_paid_on(USER, &id, date(3, day)).await })
            })
            .collect();

        let mut winners = Vec::new();
        for task in tasks {
            match task.await.unwrap() {
                Ok(paid) => winners.push(paid),
                Err(err) => assert!(
                    matches!(
                        err,
                        DbError::Domain(CoreError::InvalidTransition {
                            from: InvoiceStatus::Paid,
                            ..
                        })
                    ),
                    "unexpected error: {err}"
                ),
            }
        }

        assert_eq!(winners.len(), 1);
        let stored = repo.get(USER, &invoice.id).await.unwrap();
        assert_eq!(stored.status, InvoiceStatus::Paid);
        assert_eq!(stored.payment_date, winners[0].payment_date);

        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let mut file = path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }

    #[tokio::test]
    async fn test_replace_items_only_in_draft() {
        let (db, client) = setup().await;
        let repo = db.invoices();
        let invoice = repo
            .create(USER, new_invoice(&client.id, "2026-001"))
            .await
            .unwrap();

        let updated = repo
            .replace_items(USER, &invoice.id, vec![NewLineItem::new("Audit", 2, 10000)])
            .await
            .unwrap();
        assert_eq!(updated.total_cents, 20000);
        assert_eq!(repo.items(USER, &invoice.id).await.unwrap().len(), 1);
        assert_eq!(repo.get(USER, &invoice.id).await.unwrap().total_cents, 20000);

        repo.send(USER, &invoice.id).await.unwrap();
        let err = repo
            .replace_items(USER, &invoice.id, vec![NewLineItem::new("Audit", 3, 10000)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidStateForEdit {
                current_status: InvoiceStatus::Sent,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let (db, client) = setup().await;
        let repo = db.invoices();
        let a = repo.create(USER, new_invoice(&client.id, "1")).await.unwrap();
        repo.create(USER, new_invoice(&client.id, "2")).await.unwrap();
        repo.send(USER, &a.id).await.unwrap();

        assert_eq!(repo.list(USER, None).await.unwrap().len(), 2);
        let sent = repo.list(USER, Some(InvoiceStatus::Sent)).await.unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, a.id);
        assert!(repo.list("nobody", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_descriptor_uses_owner_account() {
        let (db, client) = setup().await;
        let repo = db.invoices();
        let encoder = DescriptorEncoder::new(AccountPolicy::legacy());

        let mut allocator = SymbolAllocator::new(ScriptedRandom::symbols(&[420042]));
        let invoice = repo
            .create_with(USER, new_invoice(&client.id, "42"), &mut allocator, &db.symbols())
            .await
            .unwrap();

        let err = repo.descriptor(USER, &invoice.id, &encoder).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::MissingAccount)));

        db.accounts()
            .set(USER, "123456789/0100", encoder.policy())
            .await
            .unwrap();
        let spd = repo.descriptor(USER, &invoice.id, &encoder).await.unwrap();
        assert_eq!(
            spd.as_str(),
            "SPD*1.0*ACC:CZ6501000000000123456789*AM:4525.50*CC:CZK*MSG:Invoice 42*X-VS:420042"
        );
    }
}
