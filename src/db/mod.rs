//! Database layer for torrent-unpack
//!
//! Handles SQLite persistence for extraction settings and pending cleanup
//! entries.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`settings`] — Flat key/value configuration record
//! - [`cleanup`] — Pending deletions that must survive restart

use sqlx::{FromRow, sqlite::SqlitePool};

mod cleanup;
mod migrations;
mod settings;

/// Pending cleanup entry from the database
///
/// One row per extracted file; the cleanup scheduler deletes the file once
/// `expires_at` has passed and then removes the row.
#[derive(Debug, Clone, FromRow)]
pub struct CleanupEntry {
    /// Unique database ID
    pub id: i64,
    /// Absolute path of the extracted file
    pub path: String,
    /// Unix timestamp after which the file should be deleted
    pub expires_at: i64,
    /// Unix timestamp when the entry was recorded
    pub created_at: i64,
}

/// Database handle wrapping a SQLite connection pool
#[derive(Clone, Debug)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    async fn test_db(dir: &TempDir) -> Database {
        Database::new(&dir.path().join("unpack.db")).await.unwrap()
    }

    #[tokio::test]
    async fn new_creates_database_file_and_schema() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        // fresh database has no settings and no cleanup entries
        let settings = db.load_settings().await.unwrap();
        assert!(settings.is_empty());
        let entries = db.pending_cleanup_entries().await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn new_creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("state").join("deep").join("unpack.db");
        let db = Database::new(&nested).await.unwrap();
        assert!(nested.exists());
        drop(db);
    }

    #[tokio::test]
    async fn reopening_database_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("unpack.db");
        {
            let db = Database::new(&path).await.unwrap();
            db.save_settings(&[("auto_cleanup".into(), "true".into())])
                .await
                .unwrap();
        }
        // migrations must not re-run destructively
        let db = Database::new(&path).await.unwrap();
        let settings = db.load_settings().await.unwrap();
        assert_eq!(settings.get("auto_cleanup").map(String::as_str), Some("true"));
    }

    #[tokio::test]
    async fn settings_upsert_overwrites_existing_values() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        db.save_settings(&[
            ("extract_path".into(), "/data/a".into()),
            ("use_temp_dir".into(), "false".into()),
        ])
        .await
        .unwrap();
        db.save_settings(&[("extract_path".into(), "/data/b".into())])
            .await
            .unwrap();

        let settings = db.load_settings().await.unwrap();
        assert_eq!(settings.get("extract_path").map(String::as_str), Some("/data/b"));
        assert_eq!(settings.get("use_temp_dir").map(String::as_str), Some("false"));
    }

    #[tokio::test]
    async fn cleanup_entries_round_trip() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        let id = db
            .add_cleanup_entry(Path::new("/data/out/file.mkv"), 1_000)
            .await
            .unwrap();
        assert!(id > 0);

        let all = db.pending_cleanup_entries().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].path, "/data/out/file.mkv");
        assert_eq!(all[0].expires_at, 1_000);

        db.remove_cleanup_entry(id).await.unwrap();
        assert!(db.pending_cleanup_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn due_cleanup_entries_respects_expiry() {
        let dir = TempDir::new().unwrap();
        let db = test_db(&dir).await;

        db.add_cleanup_entry(Path::new("/a"), 100).await.unwrap();
        db.add_cleanup_entry(Path::new("/b"), 200).await.unwrap();
        db.add_cleanup_entry(Path::new("/c"), 300).await.unwrap();

        let due = db.due_cleanup_entries(200).await.unwrap();
        let paths: Vec<&str> = due.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["/a", "/b"]);
    }
}
