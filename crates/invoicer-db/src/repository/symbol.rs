//! # Payment Symbol Arena
//!
//! Every active variable symbol has exactly one row in `payment_symbols`.
//! The PRIMARY KEY on that table is the only authority on uniqueness.
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Check, then reserve                                  │
//! │                                                                         │
//! │  SymbolAllocator::candidates()      (≤ max_attempts draws)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SymbolLookup::is_taken(candidate) ── taken ──► next candidate          │
//! │       │ free                                                            │
//! │       ▼                                                                 │
//! │  BEGIN                                                                 │
//! │    INSERT INTO payment_symbols  ── UNIQUE violation ──► InsertRetry     │
//! │    INSERT INTO invoices / subscription_periods        (fresh candidate, │
//! │  COMMIT                                                 then exhausted) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The lookup only narrows the race window; two creators can still pick
//! the same free candidate. The loser's INSERT fails and it retries.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::future::Future;
use tracing::{debug, warn};

use invoicer_core::symbol::{PaymentSymbol, RandomSource, SymbolAllocator};
use invoicer_core::{CoreError, SymbolOwner};

use crate::error::{DbError, DbResult};

/// Constraint key reported by SQLite when the arena rejects a symbol.
pub const SYMBOL_KEY: &str = "payment_symbols.symbol";

// =============================================================================
// Lookup Seam
// =============================================================================

/// Answers "is this symbol already in use?".
///
/// The arena repository is the production implementation. Tests plug in
/// stale or adversarial lookups to drive the insert-time retry path.
pub trait SymbolLookup {
    fn is_taken(&self, symbol: &PaymentSymbol) -> impl Future<Output = DbResult<bool>> + Send;
}

/// Draws candidates until `lookup` reports one as free.
///
/// ## Errors
/// `SymbolSpaceExhausted` after `allocator.max_attempts()` taken candidates.
pub async fn allocate_symbol<L, R>(
    lookup: &L,
    allocator: &mut SymbolAllocator<R>,
) -> DbResult<PaymentSymbol>
where
    L: SymbolLookup,
    R: RandomSource,
{
    let attempts = allocator.max_attempts();

    for candidate in allocator.candidates() {
        if !lookup.is_taken(&candidate).await? {
            debug!(symbol = %candidate, "Variable symbol candidate is free");
            return Ok(candidate);
        }
    }

    warn!(attempts, "No free variable symbol within budget");
    Err(CoreError::SymbolSpaceExhausted { attempts }.into())
}

/// Budget for UNIQUE violations on the arena at insert time.
#[derive(Debug)]
pub(crate) struct InsertRetry {
    remaining: u32,
    attempts: u32,
}

impl InsertRetry {
    pub(crate) fn new(retries: u32) -> Self {
        InsertRetry {
            remaining: retries,
            attempts: 0,
        }
    }

    /// Decides what a failed insert means.
    ///
    /// `Ok(())` asks the caller to try again with a fresh candidate. Errors
    /// other than an arena collision pass through untouched; a collision
    /// past the budget becomes `SymbolSpaceExhausted`.
    pub(crate) fn check(&mut self, err: DbError, symbol: &PaymentSymbol) -> DbResult<()> {
        if !err.is_unique_violation_on(SYMBOL_KEY) {
            return Err(err);
        }

        self.attempts += 1;
        if self.remaining == 0 {
            warn!(symbol = %symbol, attempts = self.attempts, "Variable symbol collisions exhausted retries");
            return Err(CoreError::SymbolSpaceExhausted {
                attempts: self.attempts,
            }
            .into());
        }

        self.remaining -= 1;
        warn!(
            symbol = %symbol,
            remaining = self.remaining,
            "Variable symbol taken at insert, retrying with a fresh candidate"
        );
        Ok(())
    }
}

/// Inserts `symbol` into the arena on an open connection or transaction.
///
/// A collision is reported as `UniqueViolation` on [`SYMBOL_KEY`].
pub(crate) async fn reserve_in(
    conn: &mut SqliteConnection,
    symbol: &PaymentSymbol,
    user_id: &str,
    owner: SymbolOwner,
    owner_id: &str,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payment_symbols (symbol, user_id, owner_kind, owner_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(symbol.as_str())
    .bind(user_id)
    .bind(owner)
    .bind(owner_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        err if err.is_unique_violation_on(SYMBOL_KEY) => DbError::duplicate(SYMBOL_KEY, symbol.as_str()),
        err => err,
    })?;

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the payment symbol arena.
#[derive(Debug, Clone)]
pub struct SymbolRepository {
    pool: SqlitePool,
}

impl SymbolRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SymbolRepository { pool }
    }

    /// Whether `symbol` is held by any record.
    pub async fn exists_symbol(&self, symbol: &PaymentSymbol) -> DbResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM payment_symbols WHERE symbol = ?1")
                .bind(symbol.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(found.is_some())
    }

    /// Number of symbols currently held.
    pub async fn count_active(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment_symbols")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// The record holding `symbol`, if any.
    pub async fn owner_of(&self, symbol: &PaymentSymbol) -> DbResult<Option<(SymbolOwner, String)>> {
        let owner: Option<(SymbolOwner, String)> = sqlx::query_as(
            "SELECT owner_kind, owner_id FROM payment_symbols WHERE symbol = ?1",
        )
        .bind(symbol.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(owner)
    }

    /// Reserves `symbol` for a record outside any wider transaction.
    pub async fn reserve(
        &self,
        symbol: &PaymentSymbol,
        user_id: &str,
        owner: SymbolOwner,
        owner_id: &str,
    ) -> DbResult<()> {
        debug!(symbol = %symbol, %owner, owner_id, "Reserving variable symbol");
        let mut conn = self.pool.acquire().await?;
        reserve_in(&mut conn, symbol, user_id, owner, owner_id).await
    }

    /// Frees the symbol held by a record.
    ///
    /// Fails with `ForeignKeyViolation` while the owning invoice or
    /// subscription period still exists.
    pub async fn release_for_owner(&self, owner: SymbolOwner, owner_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM payment_symbols WHERE owner_kind = ?1 AND owner_id = ?2")
            .bind(owner)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        debug!(%owner, owner_id, released = result.rows_affected(), "Released variable symbol");
        Ok(result.rows_affected() > 0)
    }
}

impl SymbolLookup for SymbolRepository {
    async fn is_taken(&self, symbol: &PaymentSymbol) -> DbResult<bool> {
        self.exists_symbol(symbol).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use invoicer_core::symbol::ScriptedRandom;

    fn symbol(s: &str) -> PaymentSymbol {
        s.parse().unwrap()
    }

    async fn arena() -> SymbolRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().symbols()
    }

    #[tokio::test]
    async fn test_reserve_and_lookup() {
        let repo = arena().await;
        let s = symbol("123456");

        assert!(!repo.exists_symbol(&s).await.unwrap());
        repo.reserve(&s, "user-1", SymbolOwner::Invoice, "inv-1")
            .await
            .unwrap();

        assert!(repo.exists_symbol(&s).await.unwrap());
        assert!(repo.is_taken(&s).await.unwrap());
        assert_eq!(repo.count_active().await.unwrap(), 1);
        assert_eq!(
            repo.owner_of(&s).await.unwrap(),
            Some((SymbolOwner::Invoice, "inv-1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_duplicate_reserve_is_unique_violation() {
        let repo = arena().await;
        let s = symbol("654321");

        repo.reserve(&s, "user-1", SymbolOwner::Invoice, "inv-1")
            .await
            .unwrap();
        let err = repo
            .reserve(&s, "user-2", SymbolOwner::Subscription, "sub-9")
            .await
            .unwrap_err();

        assert!(err.is_unique_violation_on(SYMBOL_KEY));
        assert!(matches!(err, DbError::UniqueViolation { ref value, .. } if value == "654321"));
    }

    #[tokio::test]
    async fn test_release_for_owner() {
        let repo = arena().await;
        let s = symbol("700001");

        repo.reserve(&s, "user-1", SymbolOwner::Subscription, "sub-1")
            .await
            .unwrap();
        assert!(repo
            .release_for_owner(SymbolOwner::Subscription, "sub-1")
            .await
            .unwrap());
        assert!(!repo.exists_symbol(&s).await.unwrap());
        assert!(!repo
            .release_for_owner(SymbolOwner::Subscription, "sub-1")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_allocate_skips_taken_candidates() {
        let repo = arena().await;
        repo.reserve(&symbol("111111"), "user-1", SymbolOwner::Invoice, "inv-1")
            .await
            .unwrap();

        let mut allocator = SymbolAllocator::new(ScriptedRandom::symbols(&[111111, 222222]));
        let allocated = allocate_symbol(&repo, &mut allocator).await.unwrap();
        assert_eq!(allocated.as_str(), "222222");
    }

    #[tokio::test]
    async fn test_allocate_exhausts_budget() {
        let repo = arena().await;
        repo.reserve(&symbol("111111"), "user-1", SymbolOwner::Invoice, "inv-1")
            .await
            .unwrap();

        let mut allocator =
            SymbolAllocator::new(ScriptedRandom::symbols(&[111111])).with_max_attempts(5);
        let err = allocate_symbol(&repo, &mut allocator).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::SymbolSpaceExhausted { attempts: 5 })
        ));
    }

    #[test]
    fn test_insert_retry_budget() {
        let s = symbol("123456");
        let mut retry = InsertRetry::new(1);

        assert!(retry.check(DbError::duplicate(SYMBOL_KEY, "123456"), &s).is_ok());
        let err = retry
            .check(DbError::duplicate(SYMBOL_KEY, "123456"), &s)
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::SymbolSpaceExhausted { attempts: 2 })
        ));

        let mut retry = InsertRetry::new(3);
        let err = retry
            .check(DbError::duplicate("invoices.user_id, invoices.number", "7"), &s)
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
