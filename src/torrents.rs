//! Host client integration seam.

use crate::error::Result;
use crate::types::{CompletedTorrent, TorrentId};
use async_trait::async_trait;

/// Lookup of completed-torrent metadata by id
///
/// The engine never drives the torrent lifecycle itself; the host client
/// implements this trait and the engine queries it when a completion event
/// or a manual extraction request names a torrent id.
#[async_trait]
pub trait TorrentSource: Send + Sync {
    /// Fetch metadata for a completed torrent
    ///
    /// Returns `Ok(None)` when the id is unknown or the torrent has not
    /// finished downloading.
    async fn completed_torrent(&self, id: &TorrentId) -> Result<Option<CompletedTorrent>>;
}
