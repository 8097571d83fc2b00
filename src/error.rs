//! Error types for torrent-unpack
//!
//! This module provides error handling for the library, including:
//! - Configuration errors with the offending setting key
//! - Database errors (connection, migration, query)
//! - Per-job extraction errors (staging, archive, move)

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for torrent-unpack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for torrent-unpack
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "extract_path")
        key: Option<String>,
    },

    /// Persisted configuration could not be decoded
    ///
    /// Raised by the settings translation layer when a stored value fails to
    /// parse. The config store recovers by substituting defaults, so this is
    /// normally only logged.
    #[error("persisted configuration is corrupt: {0}")]
    ConfigCorrupt(String),

    /// No output directory could be computed for a torrent
    #[error("cannot resolve destination for '{torrent}': {reason}")]
    UnresolvableDestination {
        /// Display name of the torrent being resolved
        torrent: String,
        /// Why resolution failed (e.g., empty extract path)
        reason: String,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Extraction job error
    #[error("extraction error: {0}")]
    Job(#[from] JobError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Torrent not found
    #[error("torrent not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Errors raised while executing a single extraction job
#[derive(Debug, Error)]
pub enum JobError {
    /// Failed to prepare the staging directory
    #[error("staging failed: {reason}")]
    Stage {
        /// The reason staging failed
        reason: String,
    },

    /// Not enough free space in the staging location
    #[error("insufficient disk space: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        /// Number of bytes required for the staged archives
        required: u64,
        /// Number of bytes currently available on disk
        available: u64,
    },

    /// A single archive failed to extract
    #[error("extraction failed for {}: {reason}", archive.display())]
    Archive {
        /// The archive file that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// Every archive in the job failed to extract
    #[error("all {count} archives failed to extract")]
    AllArchivesFailed {
        /// The number of archives that were attempted
        count: usize,
    },

    /// File move to the final destination failed
    #[error("failed to move {} to {}: {reason}", source_path.display(), dest_path.display())]
    Move {
        /// The source path of the file being moved
        source_path: PathBuf,
        /// The destination path where the file should be moved
        dest_path: PathBuf,
        /// The reason the move failed
        reason: String,
    },

    /// Job was cancelled between phases
    #[error("job cancelled")]
    Cancelled,

    /// Cleanup registration or deletion failed (non-fatal, usually logged as warning)
    #[error("cleanup failed for {}: {reason}", path.display())]
    Cleanup {
        /// The path for which cleanup failed
        path: PathBuf,
        /// The reason cleanup failed
        reason: String,
    },
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display_includes_message() {
        let err = Error::Config {
            message: "extract_path must not be empty".into(),
            key: Some("extract_path".into()),
        };
        assert!(err.to_string().contains("extract_path must not be empty"));
    }

    #[test]
    fn unresolvable_destination_display_includes_torrent_and_reason() {
        let err = Error::UnresolvableDestination {
            torrent: "My.Show.S01".into(),
            reason: "extract path is empty".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("My.Show.S01"));
        assert!(msg.contains("extract path is empty"));
    }

    #[test]
    fn job_error_converts_to_top_level_error() {
        let err: Error = JobError::AllArchivesFailed { count: 3 }.into();
        assert!(matches!(
            err,
            Error::Job(JobError::AllArchivesFailed { count: 3 })
        ));
    }

    #[test]
    fn insufficient_space_display_includes_byte_counts() {
        let err = JobError::InsufficientSpace {
            required: 1_048_576,
            available: 512,
        };
        let msg = err.to_string();
        assert!(msg.contains("1048576"));
        assert!(msg.contains("512"));
    }

    #[test]
    fn move_error_display_includes_both_paths() {
        let err = JobError::Move {
            source_path: PathBuf::from("/tmp/stage/file.mkv"),
            dest_path: PathBuf::from("/data/out/file.mkv"),
            reason: "permission denied".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/stage/file.mkv"));
        assert!(msg.contains("/data/out/file.mkv"));
    }

    #[test]
    fn io_error_converts_via_from() {
        let err: Error = std::io::Error::other("disk fail").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
