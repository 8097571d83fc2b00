//! Filesystem operations behind a pluggable trait
//!
//! Workers and the cleanup scheduler go through [`Filesystem`] so tests can
//! substitute failing or instrumented implementations. [`TokioFilesystem`]
//! is the default, backed by `tokio::fs` plus a blocking `statvfs` /
//! `GetDiskFreeSpaceExW` call for free-space checks.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Filesystem operations needed by extraction workers and cleanup
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Move a file to `dest`, creating parent directories as needed
    ///
    /// Falls back to copy + delete when a rename is not possible (e.g.
    /// across filesystems).
    async fn move_path(&self, source: &Path, dest: &Path) -> std::io::Result<()>;

    /// Delete a file or directory tree
    async fn remove(&self, path: &Path) -> std::io::Result<()>;

    /// Whether the path currently exists
    async fn exists(&self, path: &Path) -> bool;

    /// Bytes available to unprivileged users on the filesystem holding `path`
    async fn available_space(&self, path: &Path) -> std::io::Result<u64>;
}

/// Default [`Filesystem`] implementation backed by `tokio::fs`
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioFilesystem;

#[async_trait]
impl Filesystem for TokioFilesystem {
    async fn move_path(&self, source: &Path, dest: &Path) -> std::io::Result<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        match tokio::fs::rename(source, dest).await {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                // Cross-device renames fail; fall back to copy + delete for
                // regular files
                let meta = tokio::fs::metadata(source).await?;
                if !meta.is_file() {
                    return Err(rename_err);
                }
                debug!(
                    source = %source.display(),
                    dest = %dest.display(),
                    error = %rename_err,
                    "rename failed, copying instead"
                );
                tokio::fs::copy(source, dest).await?;
                tokio::fs::remove_file(source).await?;
                Ok(())
            }
        }
    }

    async fn remove(&self, path: &Path) -> std::io::Result<()> {
        let meta = tokio::fs::metadata(path).await?;
        if meta.is_dir() {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        }
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn available_space(&self, path: &Path) -> std::io::Result<u64> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || get_available_space(&path))
            .await
            .map_err(std::io::Error::other)?
    }
}

/// Get available disk space for a path in bytes
///
/// Uses `statvfs` on Unix and `GetDiskFreeSpaceExW` on Windows. The path
/// must exist.
pub fn get_available_space(path: &Path) -> std::io::Result<u64> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        // Convert path to C string for statvfs call
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        // SAFETY: This is safe because:
        // 1. c_path is a valid, null-terminated C string created from the input path
        // 2. stat is properly initialized with zeroed memory before the call
        // 3. We check the return value and propagate any OS errors
        // 4. The statvfs struct is only read after a successful call
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
                return Err(std::io::Error::last_os_error());
            }

            // Available space = available blocks * fragment size
            // f_bavail is available blocks for unprivileged users
            let available_bytes = stat.f_bavail.saturating_mul(stat.f_frsize);
            Ok(available_bytes)
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::fileapi::GetDiskFreeSpaceExW;

        // Convert path to wide string for Windows API
        let wide_path: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0)) // null terminator
            .collect();

        // SAFETY: This is safe because:
        // 1. wide_path is a valid, null-terminated wide string
        // 2. All output pointers point to valid, properly aligned u64 variables
        // 3. We check the return value and propagate any OS errors
        // 4. The output variables are only read after a successful call
        unsafe {
            let mut free_bytes_available: u64 = 0;
            let mut _total_bytes: u64 = 0;
            let mut _total_free_bytes: u64 = 0;

            if GetDiskFreeSpaceExW(
                wide_path.as_ptr(),
                &mut free_bytes_available as *mut u64 as *mut _,
                &mut _total_bytes as *mut u64 as *mut _,
                &mut _total_free_bytes as *mut u64 as *mut _,
            ) == 0
            {
                return Err(std::io::Error::last_os_error());
            }

            Ok(free_bytes_available)
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn move_path_moves_file_and_creates_parents() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.txt");
        tokio::fs::write(&source, b"payload").await.unwrap();

        let dest = dir.path().join("nested").join("deep").join("b.txt");
        TokioFilesystem.move_path(&source, &dest).await.unwrap();

        assert!(!source.exists());
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn move_path_missing_source_errors() {
        let dir = TempDir::new().unwrap();
        let result = TokioFilesystem
            .move_path(&dir.path().join("missing"), &dir.path().join("out"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn remove_handles_files_and_directories() {
        let dir = TempDir::new().unwrap();
        let fs = TokioFilesystem;

        let file = dir.path().join("f.txt");
        tokio::fs::write(&file, b"x").await.unwrap();
        fs.remove(&file).await.unwrap();
        assert!(!file.exists());

        let tree = dir.path().join("tree");
        tokio::fs::create_dir_all(tree.join("inner")).await.unwrap();
        tokio::fs::write(tree.join("inner").join("f"), b"x")
            .await
            .unwrap();
        fs.remove(&tree).await.unwrap();
        assert!(!tree.exists());
    }

    #[tokio::test]
    async fn exists_reports_presence() {
        let dir = TempDir::new().unwrap();
        let fs = TokioFilesystem;
        assert!(fs.exists(dir.path()).await);
        assert!(!fs.exists(&dir.path().join("missing")).await);
    }

    #[tokio::test]
    async fn available_space_is_positive_for_valid_path() {
        let dir = TempDir::new().unwrap();
        let available = TokioFilesystem.available_space(dir.path()).await.unwrap();
        assert!(available > 0, "available space should be greater than 0");
    }

    #[test]
    fn get_available_space_nonexistent_path_errors() {
        let result = get_available_space(Path::new("/nonexistent/path/that/should/not/exist"));
        assert!(result.is_err());
    }
}
