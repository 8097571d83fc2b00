//! Flat key/value settings persistence.

use crate::error::{DatabaseError, Error, Result};
use std::collections::HashMap;

use super::Database;

impl Database {
    /// Load all settings rows as a key/value map
    pub async fn load_settings(&self) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to load settings: {}",
                    e
                )))
            })?;

        Ok(rows.into_iter().collect())
    }

    /// Upsert a batch of settings rows in a single transaction
    ///
    /// All rows are written or none are, so a reader never observes a
    /// half-applied configuration.
    pub async fn save_settings(&self, entries: &[(String, String)]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin settings transaction: {}",
                e
            )))
        })?;

        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO settings (key, value, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                "#,
            )
            .bind(key)
            .bind(value)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to save setting '{}': {}",
                    key, e
                )))
            })?;
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit settings: {}",
                e
            )))
        })?;

        Ok(())
    }
}
