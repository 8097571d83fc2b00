//! Background deletion of expired extracted output.

use crate::db::Database;
use crate::error::Result;
use crate::fsops::Filesystem;
use crate::types::Event;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often the cleanup loop polls for due entries
pub(crate) const CLEANUP_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Deletes extracted files once their retention window has passed
///
/// Entries are persisted in the database, so deletions scheduled before a
/// restart still fire afterwards. Entries are independent: one failed
/// deletion is logged, reported on the event channel, and discarded without
/// affecting the rest.
#[derive(Clone)]
pub struct CleanupScheduler {
    db: Arc<Database>,
    fs: Arc<dyn Filesystem>,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
}

impl CleanupScheduler {
    pub(crate) fn new(
        db: Arc<Database>,
        fs: Arc<dyn Filesystem>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            db,
            fs,
            event_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Spawn the background sweep loop
    pub(crate) fn start(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_POLL_INTERVAL);
            // the first tick fires immediately, catching entries that came
            // due while the process was down
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        scheduler.sweep().await;
                    }
                    _ = scheduler.cancel.cancelled() => {
                        debug!("cleanup scheduler stopping");
                        break;
                    }
                }
            }
        })
    }

    /// Record extracted files for deletion after `retention_hours`
    pub(crate) async fn register(&self, files: &[PathBuf], retention_hours: f64) -> Result<()> {
        let expires_at =
            chrono::Utc::now().timestamp() + (retention_hours * 3600.0).round() as i64;

        for file in files {
            self.db.add_cleanup_entry(file, expires_at).await?;
        }

        debug!(
            count = files.len(),
            expires_at, "registered extracted files for cleanup"
        );
        Ok(())
    }

    /// Delete every entry whose expiry has passed
    ///
    /// Files that vanished since registration are dropped from tracking
    /// without an error. Each processed entry is removed from the database
    /// regardless of the deletion result.
    pub(crate) async fn sweep(&self) {
        let now = chrono::Utc::now().timestamp();
        let due = match self.db.due_cleanup_entries(now).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "failed to query due cleanup entries");
                return;
            }
        };

        for entry in due {
            let path = PathBuf::from(&entry.path);
            self.process_entry(&path).await;

            if let Err(e) = self.db.remove_cleanup_entry(entry.id).await {
                warn!(entry_id = entry.id, error = %e, "failed to remove cleanup entry");
            }
        }
    }

    async fn process_entry(&self, path: &Path) {
        if !self.fs.exists(path).await {
            debug!(path = %path.display(), "tracked file no longer exists, dropping entry");
            return;
        }

        match self.fs.remove(path).await {
            Ok(()) => {
                info!(path = %path.display(), "deleted expired extracted file");
                let _ = self.event_tx.send(Event::CleanupDeleted {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to delete expired file");
                let _ = self.event_tx.send(Event::CleanupFailed {
                    path: path.to_path_buf(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Stop the background loop
    pub(crate) fn stop(&self) {
        self.cancel.cancel();
    }
}
