//! # Account Purge
//!
//! Permanent removal of everything a user owns. This is the only path that
//! deletes invoices and the only one that returns symbols to the arena.
//!
//! Deletion order follows the foreign keys: lines before invoices, invoices
//! and periods before the symbols they hold, invoices before clients.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};

/// Row counts removed by [`PurgeRepository::purge_user`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub invoice_items: u64,
    pub invoices: u64,
    pub subscription_periods: u64,
    pub symbols_released: u64,
    pub clients: u64,
    pub accounts: u64,
}

impl PurgeReport {
    pub fn is_empty(&self) -> bool {
        *self == PurgeReport::default()
    }
}

#[derive(Debug, Clone)]
pub struct PurgeRepository {
    pool: SqlitePool,
}

impl PurgeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PurgeRepository { pool }
    }

    /// Deletes all of `user_id`'s records in one transaction.
    ///
    /// Either everything goes or nothing does; a failure leaves the
    /// account intact.
    pub async fn purge_user(&self, user_id: &str) -> DbResult<PurgeReport> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let invoice_items = sqlx::query(
            "DELETE FROM invoice_items WHERE invoice_id IN (SELECT id FROM invoices WHERE user_id = ?1)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let invoices = sqlx::query("DELETE FROM invoices WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let subscription_periods = sqlx::query("DELETE FROM subscription_periods WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let symbols_released = sqlx::query("DELETE FROM payment_symbols WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let clients = sqlx::query("DELETE FROM clients WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let accounts = sqlx::query("DELETE FROM payment_accounts WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let report = PurgeReport {
            invoice_items,
            invoices,
            subscription_periods,
            symbols_released,
            clients,
            accounts,
        };

        info!(user_id, ?report, "User data purged");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{client, date, new_invoice, setup, USER};
    use invoicer_core::symbol::{ScriptedRandom, SymbolAllocator};
    use invoicer_core::{AccountPolicy, NewSubscriptionPeriod, PaymentSymbol};

    #[tokio::test]
    async fn test_purge_releases_symbols() {
        let (db, acme) = setup().await;
        db.accounts()
            .set(USER, "123456789/0100", &AccountPolicy::default())
            .await
            .unwrap();

        let mut allocator = SymbolAllocator::new(ScriptedRandom::symbols(&[101010, 202020]));
        db.invoices()
            .create_with(USER, new_invoice(&acme.id, "1"), &mut allocator, &db.symbols())
            .await
            .unwrap();
        db.subscriptions()
            .open_period_with(
                USER,
                NewSubscriptionPeriod {
                    plan: "Pro".to_string(),
                    amount_cents: 29900,
                    currency: "CZK".to_string(),
                    period_start: date(3, 1),
                    period_end: date(3, 31),
                },
                &mut allocator,
                &db.symbols(),
            )
            .await
            .unwrap();

        let report = db.purge().purge_user(USER).await.unwrap();
        assert_eq!(
            report,
            PurgeReport {
                invoice_items: 2,
                invoices: 1,
                subscription_periods: 1,
                symbols_released: 2,
                clients: 1,
                accounts: 1,
            }
        );

        assert_eq!(db.symbols().count_active().await.unwrap(), 0);
        let freed: PaymentSymbol = "101010".parse().unwrap();
        assert!(!db.symbols().exists_symbol(&freed).await.unwrap());
        assert!(db.invoices().list(USER, None).await.unwrap().is_empty());
        assert_eq!(db.accounts().get(USER).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_purge_leaves_other_users_alone() {
        let (db, acme) = setup().await;
        db.invoices()
            .create(USER, new_invoice(&acme.id, "1"))
            .await
            .unwrap();

        let report = db.purge().purge_user("someone-else").await.unwrap();
        assert!(report.is_empty());
        assert_eq!(db.invoices().list(USER, None).await.unwrap().len(), 1);
        assert_eq!(db.symbols().count_active().await.unwrap(), 1);

        // The user can start over after a purge.
        db.purge().purge_user(USER).await.unwrap();
        let fresh = client(&db).await;
        db.invoices()
            .create(USER, new_invoice(&fresh.id, "1"))
            .await
            .unwrap();
    }
}
