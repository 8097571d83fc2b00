use crate::error::{Error, JobError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Archive extractor for 7z files
pub struct SevenZipExtractor;

impl SevenZipExtractor {
    /// Extract a 7z archive into `dest_path`
    pub fn extract(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "extracting 7z archive");

        // Create destination directory if it doesn't exist
        std::fs::create_dir_all(dest_path).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to create destination: {}",
                e
            )))
        })?;

        sevenz_rust::decompress_file(archive_path, dest_path).map_err(|e| {
            Error::Job(JobError::Archive {
                archive: archive_path.to_path_buf(),
                reason: format!("failed to extract 7z archive: {}", e),
            })
        })?;

        // Validate that all extracted files are within dest_path (path traversal protection)
        Self::validate_extracted_paths(dest_path)?;

        // Collect the extracted files by scanning the destination directory
        let extracted_files = Self::collect_extracted_files(dest_path)?;

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "7z extraction successful"
        );
        Ok(extracted_files)
    }

    /// Validate that all extracted files are within the destination directory.
    /// This protects against path traversal attacks in 7z archives.
    fn validate_extracted_paths(dest_path: &Path) -> Result<()> {
        let canonical_dest = dest_path.canonicalize().map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to canonicalize destination path: {}",
                e
            )))
        })?;

        fn check_dir(dir: &Path, canonical_dest: &Path) -> Result<()> {
            let entries = std::fs::read_dir(dir).map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "failed to read directory: {}",
                    e
                )))
            })?;

            for entry in entries {
                let entry = entry.map_err(|e| {
                    Error::Io(std::io::Error::other(format!(
                        "failed to read entry: {}",
                        e
                    )))
                })?;
                let path = entry.path();
                let canonical = path.canonicalize().map_err(|e| {
                    Error::Io(std::io::Error::other(format!(
                        "failed to canonicalize extracted path: {}",
                        e
                    )))
                })?;

                if !canonical.starts_with(canonical_dest) {
                    return Err(Error::Job(JobError::Archive {
                        archive: dir.to_path_buf(),
                        reason: format!(
                            "path traversal detected: extracted file {:?} is outside destination",
                            canonical
                        ),
                    }));
                }

                if path.is_dir() {
                    check_dir(&path, canonical_dest)?;
                }
            }
            Ok(())
        }

        check_dir(dest_path, &canonical_dest)
    }

    /// Recursively collect all files (not directories) from a directory
    fn collect_extracted_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        fn visit_dir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
            let entries = std::fs::read_dir(dir).map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "failed to read directory: {}",
                    e
                )))
            })?;

            for entry in entries {
                let entry = entry.map_err(|e| {
                    Error::Io(std::io::Error::other(format!(
                        "failed to read entry: {}",
                        e
                    )))
                })?;
                let path = entry.path();

                if path.is_dir() {
                    visit_dir(&path, files)?;
                } else {
                    files.push(path);
                }
            }
            Ok(())
        }

        visit_dir(dir, &mut files)?;
        Ok(files)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_7z(archive_path: &Path, source_dir: &Path) {
        sevenz_rust::compress_to_path(source_dir, archive_path).unwrap();
    }

    #[test]
    fn extract_returns_extracted_paths() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source");
        std::fs::create_dir_all(source.join("inner")).unwrap();
        std::fs::write(source.join("top.txt"), b"top").unwrap();
        std::fs::write(source.join("inner").join("deep.txt"), b"deep").unwrap();

        let archive = dir.path().join("a.7z");
        create_7z(&archive, &source);

        let dest = dir.path().join("out");
        let files = SevenZipExtractor::extract(&archive, &dest).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.starts_with(&dest)));
    }

    #[test]
    fn extract_garbage_fails() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bad.7z");
        std::fs::write(&archive, b"not a 7z archive").unwrap();

        let err = SevenZipExtractor::extract(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, Error::Job(JobError::Archive { .. })));
    }

    #[test]
    fn collect_extracted_files_walks_recursively() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/one"), b"1").unwrap();
        std::fs::write(dir.path().join("a/b/two"), b"2").unwrap();

        let files = SevenZipExtractor::collect_extracted_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn validate_accepts_normal_layout() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/file"), b"x").unwrap();

        SevenZipExtractor::validate_extracted_paths(dir.path()).unwrap();
    }
}
