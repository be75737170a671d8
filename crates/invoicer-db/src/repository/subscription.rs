//! # Subscription Period Repository
//!
//! Billing periods of a user's own subscription. Each period draws its
//! variable symbol from the same arena as invoices, so a bank transfer
//! identifies exactly one record across both kinds.

use chrono::{Local, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use invoicer_core::symbol::{PaymentSymbol, RandomSource, StdRandom, SymbolAllocator};
use invoicer_core::validation::validate_new_period;
use invoicer_core::{
    CoreError, DescriptorEncoder, NewSubscriptionPeriod, PaymentDescriptor, SubscriptionPeriod,
    SymbolOwner,
};

use crate::config::SymbolSettings;
use crate::error::{DbError, DbResult};
use crate::repository::account::AccountRepository;
use crate::repository::symbol::{allocate_symbol, reserve_in, InsertRetry, SymbolLookup, SymbolRepository};

const PERIOD_COLUMNS: &str = "id, user_id, plan, amount_cents, currency, period_start, period_end, \
    variable_symbol, is_paid, payment_date, created_at";

/// Repository for subscription period operations.
#[derive(Debug, Clone)]
pub struct SubscriptionRepository {
    pool: SqlitePool,
    symbols: SymbolSettings,
}

impl SubscriptionRepository {
    pub fn new(pool: SqlitePool, symbols: SymbolSettings) -> Self {
        SubscriptionRepository { pool, symbols }
    }

    /// Opens an unpaid period with a fresh variable symbol.
    pub async fn open_period(
        &self,
        user_id: &str,
        input: NewSubscriptionPeriod,
    ) -> DbResult<SubscriptionPeriod> {
        let mut allocator =
            SymbolAllocator::new(StdRandom::from_entropy()).with_max_attempts(self.symbols.max_attempts);
        let lookup = SymbolRepository::new(self.pool.clone());

        self.open_period_with(user_id, input, &mut allocator, &lookup)
            .await
    }

    /// [`SubscriptionRepository::open_period`] with an explicit allocator
    /// and lookup.
    pub async fn open_period_with<R, L>(
        &self,
        user_id: &str,
        input: NewSubscriptionPeriod,
        allocator: &mut SymbolAllocator<R>,
        lookup: &L,
    ) -> DbResult<SubscriptionPeriod>
    where
        R: RandomSource,
        L: SymbolLookup,
    {
        let currency = validate_new_period(&input)?;

        let mut retry = InsertRetry::new(self.symbols.insert_retries);
        loop {
            let symbol = allocate_symbol(lookup, allocator).await?;

            match self.insert(user_id, &input, &currency, &symbol).await {
                Ok(period) => {
                    info!(
                        id = %period.id,
                        plan = %period.plan,
                        symbol = %period.variable_symbol,
                        "Subscription period opened"
                    );
                    return Ok(period);
                }
                Err(err) => retry.check(err, &symbol)?,
            }
        }
    }

    async fn insert(
        &self,
        user_id: &str,
        input: &NewSubscriptionPeriod,
        currency: &str,
        symbol: &PaymentSymbol,
    ) -> DbResult<SubscriptionPeriod> {
        let period = SubscriptionPeriod {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            plan: input.plan.trim().to_string(),
            amount_cents: input.amount_cents,
            currency: currency.to_string(),
            period_start: input.period_start,
            period_end: input.period_end,
            variable_symbol: symbol.as_str().to_string(),
            is_paid: false,
            payment_date: None,
            created_at: Utc::now(),
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        reserve_in(&mut tx, symbol, user_id, SymbolOwner::Subscription, &period.id).await?;

        sqlx::query(
            r#"
            INSERT INTO subscription_periods (
                id, user_id, plan, amount_cents, currency, period_start, period_end,
                variable_symbol, is_paid, payment_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&period.id)
        .bind(&period.user_id)
        .bind(&period.plan)
        .bind(period.amount_cents)
        .bind(&period.currency)
        .bind(period.period_start)
        .bind(period.period_end)
        .bind(&period.variable_symbol)
        .bind(period.is_paid)
        .bind(period.payment_date)
        .bind(period.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(period)
    }

    /// Gets a period by ID, scoped to its owner.
    pub async fn get(&self, user_id: &str, id: &str) -> DbResult<SubscriptionPeriod> {
        let sql = format!(
            "SELECT {PERIOD_COLUMNS} FROM subscription_periods WHERE id = ?1 AND user_id = ?2"
        );

        sqlx::query_as::<_, SubscriptionPeriod>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("SubscriptionPeriod", id))
    }

    /// All periods of a user, most recent first.
    pub async fn list(&self, user_id: &str) -> DbResult<Vec<SubscriptionPeriod>> {
        let sql = format!(
            "SELECT {PERIOD_COLUMNS} FROM subscription_periods \
             WHERE user_id = ?1 ORDER BY period_start DESC"
        );

        let periods = sqlx::query_as::<_, SubscriptionPeriod>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(periods)
    }

    /// Records payment of a period, dated today.
    pub async fn mark_paid(&self, user_id: &str, id: &str) -> DbResult<SubscriptionPeriod> {
        self.mark_paid_on(user_id, id, Local::now().date_naive())
            .await
    }

    /// Records payment of a period.
    ///
    /// Paying an already paid period is a no-op that keeps the first
    /// payment date.
    pub async fn mark_paid_on(
        &self,
        user_id: &str,
        id: &str,
        date: NaiveDate,
    ) -> DbResult<SubscriptionPeriod> {
        let result = sqlx::query(
            r#"
            UPDATE subscription_periods SET is_paid = 1, payment_date = ?1
            WHERE id = ?2 AND user_id = ?3 AND is_paid = 0
            "#,
        )
        .bind(date)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(id, "Subscription period already paid or missing");
        }

        // Missing or foreign periods surface as NotFound here.
        self.get(user_id, id).await
    }

    /// Renders the SPAYD descriptor for a period.
    pub async fn descriptor(
        &self,
        user_id: &str,
        id: &str,
        encoder: &DescriptorEncoder,
    ) -> DbResult<PaymentDescriptor> {
        let period = self.get(user_id, id).await?;
        let account = AccountRepository::new(self.pool.clone())
            .get(user_id)
            .await?
            .ok_or(CoreError::MissingAccount)?;

        Ok(encoder.encode_subscription(&period, &account)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{date, setup, AlwaysFree, USER};
    use invoicer_core::symbol::ScriptedRandom;
    use invoicer_core::AccountPolicy;

    fn march() -> NewSubscriptionPeriod {
        NewSubscriptionPeriod {
            plan: "Pro".to_string(),
            amount_cents: 29900,
            currency: "czk".to_string(),
            period_start: date(3, 1),
            period_end: date(3, 31),
        }
    }

    #[tokio::test]
    async fn test_open_and_pay_period() {
        let (db, _) = setup().await;
        let repo = db.subscriptions();

        let period = repo.open_period(USER, march()).await.unwrap();
        assert!(!period.is_paid);
        assert_eq!(period.currency, "CZK");

        let paid = repo.mark_paid_on(USER, &period.id, date(3, 3)).await.unwrap();
        assert!(paid.is_paid);
        assert_eq!(paid.payment_date, Some(date(3, 3)));

        // Second payment keeps the first date.
        let again = repo.mark_paid_on(USER, &period.id, date(3, 9)).await.unwrap();
        assert_eq!(again.payment_date, Some(date(3, 3)));
    }

    #[tokio::test]
    async fn test_mark_paid_foreign_period_is_not_found() {
        let (db, _) = setup().await;
        let repo = db.subscriptions();
        let period = repo.open_period(USER, march()).await.unwrap();

        let err = repo.mark_paid("intruder", &period.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert!(!repo.get(USER, &period.id).await.unwrap().is_paid);
    }

    #[tokio::test]
    async fn test_rejects_invalid_period() {
        let (db, _) = setup().await;
        let input = NewSubscriptionPeriod {
            amount_cents: 0,
            ..march()
        };

        let err = db.subscriptions().open_period(USER, input).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_shares_arena_with_invoices() {
        let (db, client) = setup().await;

        let mut allocator = SymbolAllocator::new(ScriptedRandom::symbols(&[555555]));
        db.invoices()
            .create_with(
                USER,
                crate::repository::test_support::new_invoice(&client.id, "1"),
                &mut allocator,
                &db.symbols(),
            )
            .await
            .unwrap();

        // A stale lookup lets the taken symbol through; the arena refuses it.
        let mut allocator = SymbolAllocator::new(ScriptedRandom::symbols(&[555555, 666666]));
        let period = db
            .subscriptions()
            .open_period_with(USER, march(), &mut allocator, &AlwaysFree)
            .await
            .unwrap();

        assert_eq!(period.variable_symbol, "666666");
        assert_eq!(
            db.symbols().owner_of(&"666666".parse().unwrap()).await.unwrap(),
            Some((SymbolOwner::Subscription, period.id.clone()))
        );
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (db, _) = setup().await;
        let repo = db.subscriptions();
        repo.open_period(USER, march()).await.unwrap();
        repo.open_period(
            USER,
            NewSubscriptionPeriod {
                period_start: date(4, 1),
                period_end: date(4, 30),
                ..march()
            },
        )
        .await
        .unwrap();

        let periods = repo.list(USER).await.unwrap();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].period_start, date(4, 1));
    }

    #[tokio::test]
    async fn test_descriptor() {
        let (db, _) = setup().await;
        let encoder = DescriptorEncoder::new(AccountPolicy::legacy());
        db.accounts()
            .set(USER, "123456789/0100", encoder.policy())
            .await
            .unwrap();

        let mut allocator = SymbolAllocator::new(ScriptedRandom::symbols(&[777001]));
        let period = db
            .subscriptions()
            .open_period_with(USER, march(), &mut allocator, &db.symbols())
            .await
            .unwrap();

        let spd = db
            .subscriptions()
            .descriptor(USER, &period.id, &encoder)
            .await
            .unwrap();
        assert_eq!(
            spd.as_str(),
            "SPD*1.0*ACC:CZ6501000000000123456789*AM:299.00*CC:CZK*MSG:Pro 2026-03*X-VS:777001"
        );
    }
}
