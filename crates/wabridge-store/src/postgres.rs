//! Postgres session store (feature-gated).
//!
//! One two-column table: `wa_session(key TEXT PRIMARY KEY, value
//! TEXT)`. Values pass through base64 so arbitrary binary blobs
//! survive the TEXT column exactly.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sqlx::PgPool;
use wabridge_core::traits::{SessionStore, StoreError};

const CREATE_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS wa_session (key TEXT PRIMARY KEY, value TEXT NOT NULL)";

/// Session store backed by a Postgres table.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and ensure the session table exists.
    ///
    /// # Errors
    /// Returns error if the database is unreachable.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await.map_err(unavailable)?;
        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(unavailable)?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool (shared with other tables).
    ///
    /// # Errors
    /// Returns error if the session table cannot be created.
    pub async fn with_pool(pool: PgPool) -> Result<Self, StoreError> {
        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(unavailable)?;
        Ok(Self { pool })
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl SessionStore for PgStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let row: Option<String> =
            sqlx::query_scalar("SELECT value FROM wa_session WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;

        row.map(|text| {
            BASE64
                .decode(text)
                .map_err(|e| StoreError::Corrupt(format!("key {key}: {e}")))
        })
        .transpose()
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO wa_session (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(BASE64.encode(value))
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM wa_session WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM wa_session")
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
