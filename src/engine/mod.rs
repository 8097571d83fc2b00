//! Extraction engine facade
//!
//! [`ExtractionEngine`] wires the configuration store, the job scheduler,
//! the cleanup scheduler, and the host client's [`TorrentSource`] together.
//! Hosts construct one engine per client instance, feed it completion
//! events, and subscribe to the event channel for progress.

mod scheduler;
mod worker;


use crate::cleanup::CleanupScheduler;
use crate::config::{Config, ConfigUpdate};
use crate::config_store::ConfigStore;
use crate::db::Database;
use crate::decompress::{ArchiveDecompressor, Decompressor, filter_primary_volumes};
use crate::error::{Error, Result};
use crate::fsops::{Filesystem, TokioFilesystem};
use crate::resolver::resolve_destination;
use crate::torrents::TorrentSource;
use crate::types::{ArchiveTask, CompletedTorrent, Event, Job, JobStatus, TorrentId};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the broadcast event channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Top-level handle owning the extraction pipeline
///
/// Cloning is cheap; all clones share the same state.
#[derive(Clone)]
pub struct ExtractionEngine {
    /// Backing database (settings and cleanup entries)
    pub db: Arc<Database>,
    config: Arc<ConfigStore>,
    event_tx: broadcast::Sender<Event>,
    scheduler: scheduler::ExtractionScheduler,
    cleanup: CleanupScheduler,
    torrents: Arc<dyn TorrentSource>,
    background: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ExtractionEngine {
    /// Create an engine with the default filesystem and decompressor
    pub async fn new(db_path: &Path, torrents: Arc<dyn TorrentSource>) -> Result<Self> {
        Self::with_capabilities(
            db_path,
            torrents,
            Arc::new(TokioFilesystem),
            Arc::new(ArchiveDecompressor),
        )
        .await
    }

    /// Create an engine with explicit filesystem and decompressor
    /// implementations
    pub async fn with_capabilities(
        db_path: &Path,
        torrents: Arc<dyn TorrentSource>,
        fs: Arc<dyn Filesystem>,
        decompressor: Arc<dyn Decompressor>,
    ) -> Result<Self> {
        let db = Arc::new(Database::new(db_path).await?);
        let config = Arc::new(ConfigStore::load(db.clone()).await?);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let cleanup = CleanupScheduler::new(db.clone(), fs.clone(), event_tx.clone());

        let max_concurrent = config.current().await.max_concurrent_extractions;
        let scheduler = scheduler::ExtractionScheduler::new(
            scheduler::JobContext {
                config: config.clone(),
                fs,
                decompressor,
                cleanup: cleanup.clone(),
                event_tx: event_tx.clone(),
            },
            max_concurrent,
        );

        let background = vec![scheduler.start(), cleanup.start()];
        info!(db_path = %db_path.display(), "extraction engine started");

        Ok(Self {
            db,
            config,
            event_tx,
            scheduler,
            cleanup,
            torrents,
            background: Arc::new(Mutex::new(background)),
        })
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration snapshot
    pub async fn get_config(&self) -> Config {
        (*self.config.current().await).clone()
    }

    /// Apply a partial configuration update
    ///
    /// A new concurrency limit takes effect for future admissions without
    /// interrupting running jobs.
    pub async fn set_config(&self, update: ConfigUpdate) -> Result<Config> {
        let next = self.config.update(update).await?;
        self.scheduler.set_limit(next.max_concurrent_extractions);
        let _ = self.event_tx.send(Event::ConfigChanged);
        Ok((*next).clone())
    }

    /// Handle a completion event from the host client
    ///
    /// Applies the label filter, reduces the file list to primary archive
    /// volumes, resolves destinations, and enqueues a job. Returns whether a
    /// job was enqueued; a torrent with no matching label or no archives is
    /// skipped with `Ok(false)`.
    pub async fn handle_torrent_completed(&self, torrent: CompletedTorrent) -> Result<bool> {
        let config = self.config.current().await;
        if !config.label_filter.is_empty()
            && !torrent
                .labels
                .iter()
                .any(|label| config.label_filter.contains(label))
        {
            debug!(
                torrent_id = %torrent.id,
                labels = ?torrent.labels,
                "no label matches the filter, skipping"
            );
            return Ok(false);
        }

        self.submit_job(&config, torrent, false).await
    }

    /// Handle a completion event carrying only a torrent id
    ///
    /// Looks the torrent up through the [`TorrentSource`]; an unknown id is
    /// logged and skipped.
    pub async fn notify_torrent_completed(&self, id: &TorrentId) -> Result<bool> {
        match self.torrents.completed_torrent(id).await? {
            Some(torrent) => self.handle_torrent_completed(torrent).await,
            None => {
                warn!(torrent_id = %id, "completion event for unknown torrent");
                Ok(false)
            }
        }
    }

    /// Manually extract a torrent, bypassing the label filter
    ///
    /// A finished job for the same torrent is replaced; a queued or running
    /// one is left alone and `Ok(false)` is returned.
    pub async fn force_extract(&self, id: &TorrentId) -> Result<bool> {
        let torrent = self
            .torrents
            .completed_torrent(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let config = self.config.current().await;
        self.submit_job(&config, torrent, true).await
    }

    async fn submit_job(
        &self,
        config: &Config,
        torrent: CompletedTorrent,
        replace_terminal: bool,
    ) -> Result<bool> {
        let archives = filter_primary_volumes(&torrent.archive_files);
        if archives.is_empty() {
            debug!(torrent_id = %torrent.id, "no extractable archives, skipping");
            return Ok(false);
        }

        let mut tasks = Vec::with_capacity(archives.len());
        for archive in archives {
            let destination = resolve_destination(config, &torrent, &archive)?;
            tasks.push(ArchiveTask {
                archive,
                destination,
            });
        }

        let archive_count = tasks.len();
        let job = Job {
            torrent_id: torrent.id.clone(),
            display_name: torrent.display_name.clone(),
            archives: tasks,
            status: JobStatus::Pending,
            enqueued_at: chrono::Utc::now().timestamp(),
            completed_at: None,
            outcomes: Vec::new(),
        };

        let queued = self.scheduler.submit(job, replace_terminal).await?;
        if queued {
            let _ = self.event_tx.send(Event::JobQueued {
                id: torrent.id,
                name: torrent.display_name,
                archive_count,
            });
        }
        Ok(queued)
    }

    /// Cancel a pending job
    pub async fn cancel(&self, id: &TorrentId) -> bool {
        self.scheduler.cancel(id).await
    }

    /// Snapshot of a job by torrent id
    pub async fn job(&self, id: &TorrentId) -> Option<Job> {
        self.scheduler.job(id).await
    }

    /// Status of a job by torrent id
    pub async fn job_status(&self, id: &TorrentId) -> Option<JobStatus> {
        self.scheduler.job_status(id).await
    }

    /// Stop accepting jobs and wait for running workers and background
    /// loops to finish
    pub async fn shutdown(&self) {
        info!("shutting down extraction engine");
        self.scheduler.shutdown().await;
        self.cleanup.stop();

        let handles: Vec<_> = self.background.lock().await.drain(..).collect();
        let _ = futures::future::join_all(handles).await;
        info!("extraction engine stopped");
    }
}
