//! Core types and events for torrent-unpack

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a torrent, as assigned by the host client
///
/// Most clients use the info-hash hex string, but the engine treats the id
/// as opaque.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TorrentId(pub String);

impl TorrentId {
    /// Create a new TorrentId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TorrentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TorrentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TorrentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extraction job status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Queued and waiting for a worker slot
    Pending,
    /// Preparing the temporary staging directory
    Staging,
    /// Decompressing archives
    Extracting,
    /// Moving staged output to the final destination
    Moving,
    /// Completed (possibly with per-archive failures)
    Done,
    /// Failed (all archives failed, staging failed, move failed, or cancelled)
    Failed,
}

impl JobStatus {
    /// Whether this status is terminal (the job will not progress further)
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

/// Archive type detected by file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    /// RAR archive (.rar, .r00 split volumes)
    Rar,
    /// 7-Zip archive (.7z)
    SevenZip,
    /// ZIP archive (.zip)
    Zip,
}

/// Metadata for a completed torrent, as reported by the host client
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletedTorrent {
    /// Torrent identifier
    pub id: TorrentId,
    /// Display name (usually the torrent's top-level name)
    pub display_name: String,
    /// Directory the torrent's payload was saved into
    pub save_path: PathBuf,
    /// Labels assigned to the torrent, in client order
    pub labels: Vec<String>,
    /// Absolute paths of the torrent's files (the engine filters these down
    /// to extractable archives)
    pub archive_files: Vec<PathBuf>,
}

/// One archive within a job, paired with its resolved output directory
#[derive(Clone, Debug)]
pub struct ArchiveTask {
    /// Absolute path of the archive file
    pub archive: PathBuf,
    /// Resolved destination directory for this archive's contents
    pub destination: PathBuf,
}

/// Result of extracting a single archive
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ArchiveOutcome {
    /// Archive extracted successfully
    Extracted {
        /// Final paths of the extracted files
        files: Vec<PathBuf>,
    },
    /// Archive failed to extract
    Failed {
        /// The reason extraction failed
        reason: String,
    },
}

/// An extraction job, owned by the scheduler until terminal
#[derive(Clone, Debug)]
pub struct Job {
    /// Torrent this job belongs to
    pub torrent_id: TorrentId,
    /// Torrent display name (used for logging and name appending)
    pub display_name: String,
    /// Archives to extract, each with its resolved destination
    pub archives: Vec<ArchiveTask>,
    /// Current status
    pub status: JobStatus,
    /// Unix timestamp when the job was enqueued
    pub enqueued_at: i64,
    /// Unix timestamp when the job reached a terminal status
    pub completed_at: Option<i64>,
    /// Per-archive outcomes, filled in when the job completes
    pub outcomes: Vec<ArchiveOutcome>,
}

/// Event emitted during the extraction lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job added to the queue
    JobQueued {
        /// Torrent ID
        id: TorrentId,
        /// Torrent display name
        name: String,
        /// Number of archives in the job
        archive_count: usize,
    },

    /// Job picked up by a worker
    JobStarted {
        /// Torrent ID
        id: TorrentId,
    },

    /// Job finished (at least one archive succeeded)
    JobCompleted {
        /// Torrent ID
        id: TorrentId,
        /// Number of files placed at the destination
        extracted_files: usize,
        /// Number of archives that failed (0 for a clean run)
        failed_archives: usize,
    },

    /// Job failed
    JobFailed {
        /// Torrent ID
        id: TorrentId,
        /// Error message
        error: String,
    },

    /// Pending job cancelled before it started
    JobCancelled {
        /// Torrent ID
        id: TorrentId,
    },

    /// Expired extracted file deleted by the cleanup scheduler
    CleanupDeleted {
        /// The deleted path
        path: PathBuf,
    },

    /// Cleanup deletion failed (the entry is discarded regardless)
    CleanupFailed {
        /// The path that could not be deleted
        path: PathBuf,
        /// Error message
        error: String,
    },

    /// Configuration updated
    ConfigChanged,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn torrent_id_display_and_as_str() {
        let id = TorrentId::new("abc123");
        assert_eq!(id.to_string(), "abc123");
        assert_eq!(id.as_str(), "abc123");
    }

    #[test]
    fn torrent_id_serializes_transparently() {
        let id = TorrentId::new("deadbeef");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"deadbeef\"");
        let back: TorrentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn job_status_terminal_states() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Staging.is_terminal());
        assert!(!JobStatus::Extracting.is_terminal());
        assert!(!JobStatus::Moving.is_terminal());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::JobQueued {
            id: TorrentId::new("abc"),
            name: "Test Torrent".into(),
            archive_count: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "job_queued");
        assert_eq!(json["id"], "abc");
        assert_eq!(json["archive_count"], 2);
    }

    #[test]
    fn archive_outcome_serializes_with_result_tag() {
        let outcome = ArchiveOutcome::Failed {
            reason: "bad crc".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["result"], "failed");
        assert_eq!(json["reason"], "bad crc");
    }
}
