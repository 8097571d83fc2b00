use crate::error::{Error, JobError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Archive extractor for ZIP files
pub struct ZipExtractor;

impl ZipExtractor {
    /// Extract a ZIP archive into `dest_path`
    pub fn extract(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "extracting ZIP archive");

        // Create destination directory if it doesn't exist
        std::fs::create_dir_all(dest_path).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to create destination: {}",
                e
            )))
        })?;

        // Open the archive
        let file = std::fs::File::open(archive_path).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to open ZIP archive: {}",
                e
            )))
        })?;

        let mut archive = zip::ZipArchive::new(file).map_err(|e| {
            Error::Job(JobError::Archive {
                archive: archive_path.to_path_buf(),
                reason: format!("failed to read ZIP archive: {}", e),
            })
        })?;

        let mut extracted_files = Vec::new();

        // Extract each file
        for i in 0..archive.len() {
            let entry = archive.by_index(i).map_err(|e| {
                Error::Job(JobError::Archive {
                    archive: archive_path.to_path_buf(),
                    reason: format!("failed to read ZIP entry: {}", e),
                })
            })?;

            if let Some(file_path) = Self::extract_zip_entry(entry, dest_path)? {
                extracted_files.push(file_path);
            }
        }

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "ZIP extraction successful"
        );

        Ok(extracted_files)
    }

    /// Extract a single ZIP entry to disk, creating directories as needed
    fn extract_zip_entry(
        mut entry: zip::read::ZipFile,
        dest_path: &Path,
    ) -> Result<Option<PathBuf>> {
        // enclosed_name rejects entries that would escape the destination
        let file_path = match entry.enclosed_name() {
            Some(path) => dest_path.join(path),
            None => {
                warn!("skipping entry with unsafe path");
                return Ok(None);
            }
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&file_path).map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "failed to create directory: {}",
                    e
                )))
            })?;
            Ok(None)
        } else {
            // Create parent directories if needed
            if let Some(parent) = file_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Io(std::io::Error::other(format!(
                        "failed to create parent directories: {}",
                        e
                    )))
                })?;
            }

            let mut outfile = std::fs::File::create(&file_path).map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "failed to create output file: {}",
                    e
                )))
            })?;

            std::io::copy(&mut entry, &mut outfile).map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "failed to extract file: {}",
                    e
                )))
            })?;

            Ok(Some(file_path))
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_zip(archive_path: &Path, files: &[(&str, &[u8])]) {
        let file = std::fs::File::create(archive_path).unwrap();
        let mut writer = ::zip::ZipWriter::new(file);
        let options = ::zip::write::FileOptions::default()
            .compression_method(::zip::CompressionMethod::Stored);
        for (name, content) in files {
            writer.start_file(*name, options).unwrap();
            std::io::Write::write_all(&mut writer, content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn extract_returns_extracted_paths() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("a.zip");
        create_zip(&archive, &[("one.txt", b"1"), ("dir/two.txt", b"22")]);

        let dest = dir.path().join("out");
        let files = ZipExtractor::extract(&archive, &dest).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.contains(&dest.join("one.txt")));
        assert!(files.contains(&dest.join("dir/two.txt")));
        assert_eq!(std::fs::read(dest.join("dir/two.txt")).unwrap(), b"22");
    }

    #[test]
    fn extract_creates_missing_destination() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("a.zip");
        create_zip(&archive, &[("f", b"x")]);

        let dest = dir.path().join("does/not/exist/yet");
        ZipExtractor::extract(&archive, &dest).unwrap();
        assert!(dest.join("f").exists());
    }

    #[test]
    fn extract_garbage_fails() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bad.zip");
        std::fs::write(&archive, b"garbage").unwrap();

        let err = ZipExtractor::extract(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, Error::Job(JobError::Archive { .. })));
    }

    #[test]
    fn extract_missing_archive_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err =
            ZipExtractor::extract(&dir.path().join("missing.zip"), &dir.path().join("out"))
                .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
