//! # torrent-unpack
//!
//! Archive extraction engine for torrent client backends.
//!
//! When the host client reports a finished torrent, the engine filters its
//! files down to extractable archives (RAR, 7z, ZIP), resolves where the
//! output should go from the configured extraction mode, and runs the job on
//! a bounded worker pool. Output can be staged through a temporary directory
//! and moved into place atomically, and extracted files can be deleted again
//! after a retention window.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use torrent_unpack::{ExtractionEngine, TorrentSource};
//!
//! # async fn run(torrents: Arc<dyn TorrentSource>) -> torrent_unpack::Result<()> {
//! let engine = ExtractionEngine::new(Path::new("unpack.db"), torrents).await?;
//!
//! let mut events = engine.subscribe();
//! engine.notify_torrent_completed(&"abc123".into()).await?;
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod cleanup;
pub mod config;
pub mod config_store;
pub mod db;
pub mod decompress;
pub mod engine;
pub mod error;
pub mod fsops;
pub mod resolver;
pub mod torrents;
pub mod types;

pub use config::{Config, ConfigUpdate, ExtractionMode};
pub use config_store::ConfigStore;
pub use db::{CleanupEntry, Database};
pub use decompress::{ArchiveDecompressor, Decompressor};
pub use engine::ExtractionEngine;
pub use error::{DatabaseError, Error, JobError, Result};
pub use fsops::{Filesystem, TokioFilesystem};
pub use torrents::TorrentSource;
pub use types::{
    ArchiveOutcome, ArchiveTask, ArchiveType, CompletedTorrent, Event, Job, JobStatus, TorrentId,
};
