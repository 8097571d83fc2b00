//! Job queue and admission control.

use crate::cleanup::CleanupScheduler;
use crate::config_store::ConfigStore;
use crate::decompress::Decompressor;
use crate::error::{Error, Result};
use crate::fsops::Filesystem;
use crate::types::{Event, Job, JobStatus, TorrentId};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::worker;

/// Shared capabilities handed to every worker
pub(crate) struct JobContext {
    pub(crate) config: Arc<ConfigStore>,
    pub(crate) fs: Arc<dyn Filesystem>,
    pub(crate) decompressor: Arc<dyn Decompressor>,
    pub(crate) cleanup: CleanupScheduler,
    pub(crate) event_tx: broadcast::Sender<Event>,
}

/// FIFO job queue with a bounded number of concurrently running workers
///
/// Jobs are admitted strictly in submission order. The concurrency limit can
/// change at runtime; raising it admits waiting jobs immediately, lowering it
/// only affects future admissions and never interrupts a running worker.
#[derive(Clone)]
pub(crate) struct ExtractionScheduler {
    ctx: Arc<JobContext>,
    pending: Arc<Mutex<VecDeque<TorrentId>>>,
    jobs: Arc<Mutex<HashMap<TorrentId, Job>>>,
    active: Arc<Mutex<HashMap<TorrentId, CancellationToken>>>,
    active_count: Arc<AtomicUsize>,
    limit: Arc<AtomicUsize>,
    wake: Arc<Notify>,
    accepting_new: Arc<AtomicBool>,
    shutdown_token: CancellationToken,
    worker_handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ExtractionScheduler {
    pub(crate) fn new(ctx: JobContext, max_concurrent: usize) -> Self {
        Self {
            ctx: Arc::new(ctx),
            pending: Arc::new(Mutex::new(VecDeque::new())),
            jobs: Arc::new(Mutex::new(HashMap::new())),
            active: Arc::new(Mutex::new(HashMap::new())),
            active_count: Arc::new(AtomicUsize::new(0)),
            limit: Arc::new(AtomicUsize::new(max_concurrent.clamp(1, 10))),
            wake: Arc::new(Notify::new()),
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: CancellationToken::new(),
            worker_handles: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Spawn the admission loop
    pub(crate) fn start(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            loop {
                if scheduler.shutdown_token.is_cancelled() {
                    break;
                }
                if !scheduler.try_admit().await {
                    tokio::select! {
                        _ = scheduler.wake.notified() => {}
                        _ = scheduler.shutdown_token.cancelled() => break,
                        // slot releases race with notifications, so poll too
                        _ = tokio::time::sleep(Duration::from_millis(100)) => {}
                    }
                }
            }
            debug!("extraction scheduler stopping");
        })
    }

    /// Admit the next pending job if a worker slot is free
    ///
    /// Returns whether a job was admitted, so the caller can keep draining
    /// the queue before going back to sleep.
    async fn try_admit(&self) -> bool {
        if self.active_count.load(Ordering::SeqCst) >= self.limit.load(Ordering::SeqCst) {
            return false;
        }

        let Some(id) = self.pending.lock().await.pop_front() else {
            return false;
        };

        let token = CancellationToken::new();
        self.active.lock().await.insert(id.clone(), token.clone());
        self.active_count.fetch_add(1, Ordering::SeqCst);

        let worker_ctx = worker::WorkerContext {
            torrent_id: id.clone(),
            jobs: self.jobs.clone(),
            config: self.ctx.config.clone(),
            fs: self.ctx.fs.clone(),
            decompressor: self.ctx.decompressor.clone(),
            cleanup: self.ctx.cleanup.clone(),
            event_tx: self.ctx.event_tx.clone(),
            cancel: token,
        };

        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            // the worker runs in its own task so a panic is contained and
            // the slot is always released
            let worker_task = tokio::spawn(worker::run_job(worker_ctx));
            if let Err(e) = worker_task.await {
                error!(torrent_id = %id, error = %e, "extraction worker panicked");
                scheduler.mark_failed(&id, "extraction worker panicked").await;
            }
            scheduler.release_slot(&id).await;
        });
        self.worker_handles.lock().await.push(handle);
        true
    }

    async fn mark_failed(&self, id: &TorrentId, reason: &str) {
        let mut jobs = self.jobs.lock().await;
        if let Some(job) = jobs.get_mut(id) {
            if !job.status.is_terminal() {
                job.status = JobStatus::Failed;
                job.completed_at = Some(chrono::Utc::now().timestamp());
                let _ = self.ctx.event_tx.send(Event::JobFailed {
                    id: id.clone(),
                    error: reason.to_string(),
                });
            }
        }
    }

    async fn release_slot(&self, id: &TorrentId) {
        self.active.lock().await.remove(id);
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Enqueue a job
    ///
    /// Returns `Ok(false)` without touching the queue when a job for the
    /// same torrent already exists, unless that job is terminal and
    /// `replace_terminal` is set (the manual re-extract path).
    pub(crate) async fn submit(&self, job: Job, replace_terminal: bool) -> Result<bool> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let id = job.torrent_id.clone();
        {
            let mut jobs = self.jobs.lock().await;
            if let Some(existing) = jobs.get(&id) {
                if !existing.status.is_terminal() {
                    debug!(torrent_id = %id, "job already queued or running, ignoring");
                    return Ok(false);
                }
                if !replace_terminal {
                    debug!(torrent_id = %id, "job already finished, ignoring");
                    return Ok(false);
                }
            }
            jobs.insert(id.clone(), job);
        }

        self.pending.lock().await.push_back(id.clone());
        self.wake.notify_one();
        info!(torrent_id = %id, "extraction job enqueued");
        Ok(true)
    }

    /// Cancel a job that has not started yet
    ///
    /// Running jobs are left alone; only a pending job can be withdrawn.
    /// Returns whether anything was cancelled.
    pub(crate) async fn cancel(&self, id: &TorrentId) -> bool {
        let withdrawn = {
            let mut pending = self.pending.lock().await;
            match pending.iter().position(|p| p == id) {
                Some(pos) => {
                    pending.remove(pos);
                    true
                }
                None => false,
            }
        };
        if !withdrawn {
            return false;
        }

        {
            let mut jobs = self.jobs.lock().await;
            if let Some(job) = jobs.get_mut(id) {
                job.status = JobStatus::Failed;
                job.completed_at = Some(chrono::Utc::now().timestamp());
            }
        }

        info!(torrent_id = %id, "pending job cancelled");
        let _ = self.ctx.event_tx.send(Event::JobCancelled { id: id.clone() });
        true
    }

    /// Change the concurrency limit, effective for future admissions
    pub(crate) fn set_limit(&self, max_concurrent: usize) {
        self.limit
            .store(max_concurrent.clamp(1, 10), Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Snapshot of a job by torrent id
    pub(crate) async fn job(&self, id: &TorrentId) -> Option<Job> {
        self.jobs.lock().await.get(id).cloned()
    }

    /// Status of a job by torrent id
    pub(crate) async fn job_status(&self, id: &TorrentId) -> Option<JobStatus> {
        self.jobs.lock().await.get(id).map(|job| job.status)
    }

    /// Stop accepting jobs, cancel running workers, and wait for them
    pub(crate) async fn shutdown(&self) {
        self.accepting_new.store(false, Ordering::SeqCst);
        self.shutdown_token.cancel();

        for token in self.active.lock().await.values() {
            token.cancel();
        }

        let handles: Vec<_> = self.worker_handles.lock().await.drain(..).collect();
        let _ = futures::future::join_all(handles).await;
        debug!("all extraction workers stopped");
    }
}
