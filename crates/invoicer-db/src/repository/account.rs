//! # Payout Account Repository
//!
//! The bank account a user is paid to. Stored in the notation the user
//! typed; normalization happens each time a descriptor is rendered.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use invoicer_core::AccountPolicy;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AccountRepository { pool }
    }

    /// Stores `raw` as the user's payout account.
    ///
    /// The value must normalize under `policy`, so a typo is caught here
    /// and not on the first invoice render.
    pub async fn set(&self, user_id: &str, raw: &str, policy: &AccountPolicy) -> DbResult<()> {
        let normalized = policy.normalize(raw)?;
        debug!(user_id, account = %normalized, "Saving payout account");

        sqlx::query(
            r#"
            INSERT INTO payment_accounts (user_id, account, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (user_id) DO UPDATE SET
                account = excluded.account,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(raw.trim())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The stored account, if the user configured one.
    pub async fn get(&self, user_id: &str) -> DbResult<Option<String>> {
        let account: Option<String> =
            sqlx::query_scalar("SELECT account FROM payment_accounts WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use invoicer_core::CoreError;

    #[tokio::test]
    async fn test_set_overwrites() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.accounts();
        let policy = AccountPolicy::default();

        assert_eq!(repo.get("user-1").await.unwrap(), None);

        repo.set("user-1", "123456789/0100", &policy).await.unwrap();
        repo.set("user-1", " 19-2000145399/0800 ", &policy).await.unwrap();

        assert_eq!(
            repo.get("user-1").await.unwrap().as_deref(),
            Some("19-2000145399/0800")
        );
    }

    #[tokio::test]
    async fn test_set_rejects_malformed_account() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .accounts()
            .set("user-1", "123456789", &AccountPolicy::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidAccountFormat { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_rejects_descriptor_delimiters() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.accounts();

        let err = repo
            .set("user-1", "CZ65*AM:99999.00", &AccountPolicy::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidAccountFormat { .. })
        ));
        assert_eq!(repo.get("user-1").await.unwrap(), None);
    }
}
