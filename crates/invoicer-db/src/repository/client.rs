//! # Client Repository
//!
//! Customers an invoice can be addressed to. Every query is scoped to the
//! owning user; another user's client is indistinguishable from a missing
//! one.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use invoicer_core::validation::validate_new_client;
use invoicer_core::{Client, NewClient};

use crate::error::{DbError, DbResult};

/// Repository for client database operations.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    pool: SqlitePool,
}

impl ClientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ClientRepository { pool }
    }

    /// Creates a client owned by `user_id`.
    pub async fn create(&self, user_id: &str, input: NewClient) -> DbResult<Client> {
        validate_new_client(&input)?;

        let client = Client {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: input.name.trim().to_string(),
            email: input.email.map(|e| e.trim().to_string()),
            company_id: input.company_id,
            created_at: Utc::now(),
        };

        debug!(id = %client.id, user_id, "Creating client");

        sqlx::query(
            r#"
            INSERT INTO clients (id, user_id, name, email, company_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&client.id)
        .bind(&client.user_id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.company_id)
        .bind(client.created_at)
        .execute(&self.pool)
        .await?;

        Ok(client)
    }

    /// Gets a client by ID.
    ///
    /// ## Returns
    /// * `Ok(Client)` - Client found and owned by `user_id`
    /// * `Err(DbError::NotFound)` - Absent or foreign
    pub async fn get(&self, user_id: &str, id: &str) -> DbResult<Client> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT id, user_id, name, email, company_id, created_at
            FROM clients
            WHERE id = ?1 AND user_id = ?2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Client", id))
    }

    /// Lists a user's clients by name.
    pub async fn list(&self, user_id: &str) -> DbResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT id, user_id, name, email, company_id, created_at
            FROM clients
            WHERE user_id = ?1
            ORDER BY name COLLATE NOCASE
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn acme() -> NewClient {
        NewClient {
            name: " ACME s.r.o. ".to_string(),
            email: Some("billing@acme.cz".to_string()),
            company_id: Some("12345678".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.clients();

        let created = repo.create("user-1", acme()).await.unwrap();
        assert_eq!(created.name, "ACME s.r.o.");

        let fetched = repo.get("user-1", &created.id).await.unwrap();
        assert_eq!(fetched.email.as_deref(), Some("billing@acme.cz"));
    }

    #[tokio::test]
    async fn test_foreign_client_is_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.clients();

        let created = repo.create("user-1", acme()).await.unwrap();
        let err = repo.get("user-2", &created.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert!(repo.list("user-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_client_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let input = NewClient {
            name: "  ".to_string(),
            ..acme()
        };
        let err = db.clients().create("user-1", input).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));
    }
}
