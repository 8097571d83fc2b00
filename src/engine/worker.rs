//! Extraction worker: runs one job from staging through final placement.

use crate::cleanup::CleanupScheduler;
use crate::config_store::ConfigStore;
use crate::decompress::Decompressor;
use crate::error::{Error, JobError, Result};
use crate::fsops::Filesystem;
use crate::types::{ArchiveOutcome, ArchiveTask, Event, Job, JobStatus, TorrentId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything a worker needs to run one job
pub(crate) struct WorkerContext {
    pub(crate) torrent_id: TorrentId,
    pub(crate) jobs: Arc<Mutex<HashMap<TorrentId, Job>>>,
    pub(crate) config: Arc<ConfigStore>,
    pub(crate) fs: Arc<dyn Filesystem>,
    pub(crate) decompressor: Arc<dyn Decompressor>,
    pub(crate) cleanup: CleanupScheduler,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) cancel: CancellationToken,
}

struct JobSummary {
    extracted_files: usize,
    failed_archives: usize,
}

/// Run a job to a terminal status and emit the matching event
pub(crate) async fn run_job(ctx: WorkerContext) {
    let id = ctx.torrent_id.clone();
    let mut outcomes = Vec::new();

    match execute(&ctx, &mut outcomes).await {
        Ok(summary) => {
            finish(&ctx, JobStatus::Done, outcomes).await;
            info!(
                torrent_id = %id,
                extracted = summary.extracted_files,
                failed = summary.failed_archives,
                "extraction job completed"
            );
            let _ = ctx.event_tx.send(Event::JobCompleted {
                id,
                extracted_files: summary.extracted_files,
                failed_archives: summary.failed_archives,
            });
        }
        Err(e) => {
            warn!(torrent_id = %id, error = %e, "extraction job failed");
            finish(&ctx, JobStatus::Failed, outcomes).await;
            let _ = ctx.event_tx.send(Event::JobFailed {
                id,
                error: e.to_string(),
            });
        }
    }
}

async fn set_status(ctx: &WorkerContext, status: JobStatus) {
    if let Some(job) = ctx.jobs.lock().await.get_mut(&ctx.torrent_id) {
        job.status = status;
    }
}

async fn finish(ctx: &WorkerContext, status: JobStatus, outcomes: Vec<ArchiveOutcome>) {
    if let Some(job) = ctx.jobs.lock().await.get_mut(&ctx.torrent_id) {
        job.status = status;
        job.completed_at = Some(chrono::Utc::now().timestamp());
        job.outcomes = outcomes;
    }
}

async fn execute(ctx: &WorkerContext, outcomes: &mut Vec<ArchiveOutcome>) -> Result<JobSummary> {
    let config = ctx.config.current().await;
    let tasks = ctx
        .jobs
        .lock()
        .await
        .get(&ctx.torrent_id)
        .map(|job| job.archives.clone())
        .ok_or_else(|| Error::NotFound(ctx.torrent_id.to_string()))?;

    let _ = ctx.event_tx.send(Event::JobStarted {
        id: ctx.torrent_id.clone(),
    });
    info!(
        torrent_id = %ctx.torrent_id,
        archives = tasks.len(),
        "starting extraction"
    );

    let stage_root = config
        .use_temp_dir
        .then(|| config.temp_dir.join(ctx.torrent_id.as_str()));

    if let Some(root) = &stage_root {
        set_status(ctx, JobStatus::Staging).await;
        if ctx.cancel.is_cancelled() {
            return Err(JobError::Cancelled.into());
        }
        prepare_stage(ctx, root, &tasks).await?;
    }

    set_status(ctx, JobStatus::Extracting).await;
    if ctx.cancel.is_cancelled() {
        discard_stage(stage_root.as_deref()).await;
        return Err(JobError::Cancelled.into());
    }

    // (archive index, output directory, extracted files) per success
    let mut successes: Vec<(usize, PathBuf, Vec<PathBuf>)> = Vec::new();
    for (index, task) in tasks.iter().enumerate() {
        let out_dir = match &stage_root {
            Some(root) => root.join(index.to_string()),
            None => task.destination.clone(),
        };

        match ctx.decompressor.decompress(&task.archive, &out_dir).await {
            Ok(files) => {
                outcomes.push(ArchiveOutcome::Extracted {
                    files: files.clone(),
                });
                successes.push((index, out_dir, files));
            }
            Err(e) => {
                warn!(
                    torrent_id = %ctx.torrent_id,
                    archive = %task.archive.display(),
                    error = %e,
                    "archive failed to extract"
                );
                outcomes.push(ArchiveOutcome::Failed {
                    reason: e.to_string(),
                });
            }
        }
    }

    if successes.is_empty() {
        discard_stage(stage_root.as_deref()).await;
        return Err(JobError::AllArchivesFailed { count: tasks.len() }.into());
    }

    let final_files = if let Some(root) = &stage_root {
        set_status(ctx, JobStatus::Moving).await;
        if ctx.cancel.is_cancelled() {
            discard_stage(Some(root)).await;
            return Err(JobError::Cancelled.into());
        }

        // a move failure aborts the job but leaves the staged output on
        // disk so nothing already extracted is lost
        let moved = move_staged(ctx, &tasks, &successes).await?;
        discard_stage(Some(root)).await;

        let mut files = Vec::new();
        for (index, placed) in moved {
            outcomes[index] = ArchiveOutcome::Extracted {
                files: placed.clone(),
            };
            files.extend(placed);
        }
        files
    } else {
        successes
            .iter()
            .flat_map(|(_, _, files)| files.iter().cloned())
            .collect()
    };

    // cleanup policy is read at completion time, not at submission
    let config = ctx.config.current().await;
    if config.auto_cleanup {
        if let Err(e) = ctx
            .cleanup
            .register(&final_files, config.cleanup_time_hours)
            .await
        {
            warn!(
                torrent_id = %ctx.torrent_id,
                error = %e,
                "failed to record cleanup entries"
            );
        }
    }

    Ok(JobSummary {
        extracted_files: final_files.len(),
        failed_archives: tasks.len() - successes.len(),
    })
}

/// Create the staging directory and verify there is room for the job
///
/// The required space estimate is the sum of the archive sizes; archives
/// that cannot be sized are counted as zero.
async fn prepare_stage(ctx: &WorkerContext, root: &Path, tasks: &[ArchiveTask]) -> Result<()> {
    tokio::fs::create_dir_all(root).await.map_err(|e| JobError::Stage {
        reason: format!(
            "failed to create staging directory '{}': {}",
            root.display(),
            e
        ),
    })?;

    let mut required: u64 = 0;
    for task in tasks {
        match tokio::fs::metadata(&task.archive).await {
            Ok(meta) => required = required.saturating_add(meta.len()),
            Err(e) => {
                debug!(archive = %task.archive.display(), error = %e, "could not size archive")
            }
        }
    }

    let available = ctx
        .fs
        .available_space(root)
        .await
        .map_err(|e| JobError::Stage {
            reason: format!("failed to check free space under '{}': {}", root.display(), e),
        })?;

    if available < required {
        discard_stage(Some(root)).await;
        return Err(JobError::InsufficientSpace {
            required,
            available,
        }
        .into());
    }

    Ok(())
}

/// Move staged output into each archive's resolved destination
///
/// Each file lands under a `.part` name first and is renamed into place, so
/// the final path never holds a half-written file.
async fn move_staged(
    ctx: &WorkerContext,
    tasks: &[ArchiveTask],
    successes: &[(usize, PathBuf, Vec<PathBuf>)],
) -> Result<Vec<(usize, Vec<PathBuf>)>> {
    let mut moved = Vec::with_capacity(successes.len());

    for (index, out_dir, files) in successes {
        let dest = &tasks[*index].destination;
        let mut placed = Vec::with_capacity(files.len());

        for file in files {
            let rel = file.strip_prefix(out_dir).map_err(|_| JobError::Move {
                source_path: file.clone(),
                dest_path: dest.clone(),
                reason: "staged file is outside its staging directory".into(),
            })?;
            let target = dest.join(rel);

            move_into_place(ctx.fs.as_ref(), file, &target)
                .await
                .map_err(|e| JobError::Move {
                    source_path: file.clone(),
                    dest_path: target.clone(),
                    reason: e.to_string(),
                })?;
            placed.push(target);
        }

        moved.push((*index, placed));
    }

    Ok(moved)
}

async fn move_into_place(
    fs: &dyn Filesystem,
    source: &Path,
    dest: &Path,
) -> std::io::Result<()> {
    let mut partial = dest.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    fs.move_path(source, &partial).await?;
    fs.move_path(&partial, dest).await?;
    Ok(())
}

/// Best-effort removal of the staging root
async fn discard_stage(root: Option<&Path>) {
    if let Some(root) = root {
        if let Err(e) = tokio::fs::remove_dir_all(root).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %root.display(), error = %e, "failed to remove staging directory");
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsops::TokioFilesystem;
    use tempfile::TempDir;

    #[tokio::test]
    async fn move_into_place_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("staged.mkv");
        tokio::fs::write(&source, b"payload").await.unwrap();

        let dest = dir.path().join("library").join("final.mkv");
        move_into_place(&TokioFilesystem, &source, &dest)
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"payload");
        assert!(!source.exists());
        assert!(!dir.path().join("library").join("final.mkv.part").exists());
    }

    #[tokio::test]
    async fn discard_stage_tolerates_missing_root() {
        let dir = TempDir::new().unwrap();
        discard_stage(Some(&dir.path().join("never-created"))).await;
        discard_stage(None).await;
    }
}
