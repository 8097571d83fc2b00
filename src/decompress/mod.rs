//! Archive decompression
//!
//! The [`Decompressor`] trait is the seam workers extract through;
//! [`ArchiveDecompressor`] is the built-in implementation covering RAR, 7z,
//! and ZIP. Extraction runs on the blocking thread pool since all three
//! format crates are synchronous.

use crate::error::{Error, JobError, Result};
use crate::types::ArchiveType;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

mod rar;
mod sevenz;
mod zip;

pub use rar::RarExtractor;
pub use sevenz::SevenZipExtractor;
pub use zip::ZipExtractor;

/// Extracts a single archive into a target directory
#[async_trait]
pub trait Decompressor: Send + Sync {
    /// Decompress `archive` into `dest`, returning the extracted file paths
    ///
    /// The destination directory is created if missing. Entries that would
    /// escape the destination are skipped or rejected.
    async fn decompress(&self, archive: &Path, dest: &Path) -> Result<Vec<PathBuf>>;
}

/// Built-in [`Decompressor`] for RAR/7z/ZIP archives
#[derive(Clone, Copy, Debug, Default)]
pub struct ArchiveDecompressor;

#[async_trait]
impl Decompressor for ArchiveDecompressor {
    async fn decompress(&self, archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
        let archive_type = detect_archive_type(archive).ok_or_else(|| {
            Error::Job(JobError::Archive {
                archive: archive.to_path_buf(),
                reason: "unrecognized archive extension".into(),
            })
        })?;

        debug!(
            archive = %archive.display(),
            dest = %dest.display(),
            ?archive_type,
            "decompressing archive"
        );

        let archive_owned = archive.to_path_buf();
        let dest_owned = dest.to_path_buf();

        tokio::task::spawn_blocking(move || match archive_type {
            ArchiveType::Rar => RarExtractor::extract(&archive_owned, &dest_owned),
            ArchiveType::SevenZip => SevenZipExtractor::extract(&archive_owned, &dest_owned),
            ArchiveType::Zip => ZipExtractor::extract(&archive_owned, &dest_owned),
        })
        .await
        .map_err(|e| {
            Error::Job(JobError::Archive {
                archive: archive.to_path_buf(),
                reason: format!("extraction task panicked: {}", e),
            })
        })?
    }
}

/// Detect the archive type from a file extension
pub fn detect_archive_type(path: &Path) -> Option<ArchiveType> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    match ext.as_str() {
        "rar" | "r00" => Some(ArchiveType::Rar),
        "7z" => Some(ArchiveType::SevenZip),
        "zip" => Some(ArchiveType::Zip),
        _ => None,
    }
}

/// Whether the path looks like a supported archive
pub fn is_archive(path: &Path) -> bool {
    detect_archive_type(path).is_some()
}

/// Reduce a torrent's file list to the archives worth extracting
///
/// Split-volume housekeeping:
/// - a `.r00` volume is skipped when its `.rar` head is also present (the
///   head pulls in the whole set)
/// - `.partN.rar` volumes are skipped for N != 1
pub fn filter_primary_volumes(files: &[PathBuf]) -> Vec<PathBuf> {
    files
        .iter()
        .filter(|path| is_archive(path))
        .filter(|path| {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();

            if ext == "r00" {
                // sibling comparison ignores case, like the extension check
                let head = path.with_extension("rar");
                if files
                    .iter()
                    .any(|f| f.as_os_str().eq_ignore_ascii_case(head.as_os_str()))
                {
                    return false;
                }
            }

            if ext == "rar" && !is_first_part(path) {
                return false;
            }

            true
        })
        .cloned()
        .collect()
}

/// Whether a `.rar` path is the first (or only) part of its set
///
/// `movie.part02.rar` is not; `movie.part01.rar`, `movie.part1.rar` and
/// plain `movie.rar` are.
fn is_first_part(path: &Path) -> bool {
    let stem = match path.file_stem() {
        Some(s) => s.to_string_lossy().to_lowercase(),
        None => return true,
    };

    if let Some(pos) = stem.rfind("part") {
        let suffix = &stem[pos + 4..];
        if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
            return suffix.parse::<u32>().map(|n| n == 1).unwrap_or(true);
        }
    }

    true
}
