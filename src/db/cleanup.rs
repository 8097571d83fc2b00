//! Pending cleanup entry persistence.

use crate::error::{DatabaseError, Error, Result};
use std::path::Path;

use super::{CleanupEntry, Database};

impl Database {
    /// Record an extracted file for later deletion
    ///
    /// Returns the entry's database ID.
    pub async fn add_cleanup_entry(&self, path: &Path, expires_at: i64) -> Result<i64> {
        let path_str = path.to_string_lossy().into_owned();
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO cleanup_entries (path, expires_at, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&path_str)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to add cleanup entry for '{}': {}",
                path_str, e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Fetch entries whose expiry has passed, oldest first
    pub async fn due_cleanup_entries(&self, now: i64) -> Result<Vec<CleanupEntry>> {
        sqlx::query_as::<_, CleanupEntry>(
            r#"
            SELECT id, path, expires_at, created_at
            FROM cleanup_entries
            WHERE expires_at <= ?
            ORDER BY expires_at ASC, id ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to query due cleanup entries: {}",
                e
            )))
        })
    }

    /// Fetch every pending entry regardless of expiry
    pub async fn pending_cleanup_entries(&self) -> Result<Vec<CleanupEntry>> {
        sqlx::query_as::<_, CleanupEntry>(
            r#"
            SELECT id, path, expires_at, created_at
            FROM cleanup_entries
            ORDER BY expires_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to query cleanup entries: {}",
                e
            )))
        })
    }

    /// Remove a processed entry
    pub async fn remove_cleanup_entry(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM cleanup_entries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to remove cleanup entry {}: {}",
                    id, e
                )))
            })?;

        Ok(())
    }
}
