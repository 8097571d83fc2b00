//! Destination resolution
//!
//! Pure functions mapping (configuration, torrent metadata, archive path) to
//! the absolute directory extraction output should land in. No filesystem
//! access happens here; workers create the directories later.

use crate::config::{Config, ExtractionMode};
use crate::error::{Error, Result};
use crate::types::CompletedTorrent;
use std::path::{Path, PathBuf};

/// First label on the torrent that passes the configured filter
///
/// Labels are checked in the torrent's order. With an empty filter every
/// label matches, so the torrent's first label wins. Returns `None` for an
/// unlabeled torrent or when no label passes the filter.
pub fn matched_label(config: &Config, torrent: &CompletedTorrent) -> Option<String> {
    torrent
        .labels
        .iter()
        .find(|label| config.label_filter.is_empty() || config.label_filter.contains(label))
        .cloned()
}

/// Resolve the output directory for one archive of a completed torrent
///
/// 1. The base comes from the mode: the configured folder, the torrent's
///    top-level directory, or the archive's own directory.
/// 2. In selected-folder mode with `append_matched_label`, the first matching
///    label is appended (nothing for unlabeled torrents).
/// 3. With `append_archive_name`, the torrent's display name is appended.
///
/// Fails with [`Error::UnresolvableDestination`] when the base for the mode
/// is empty or not absolute.
pub fn resolve_destination(
    config: &Config,
    torrent: &CompletedTorrent,
    archive: &Path,
) -> Result<PathBuf> {
    let unresolvable = |reason: String| Error::UnresolvableDestination {
        torrent: torrent.display_name.clone(),
        reason,
    };

    let mut dest = match config.extraction_mode {
        ExtractionMode::SelectedFolder => {
            if config.extract_path.as_os_str().is_empty() {
                return Err(unresolvable("extract path is not configured".into()));
            }
            config.extract_path.clone()
        }
        ExtractionMode::TorrentRoot => {
            if torrent.save_path.as_os_str().is_empty() {
                return Err(unresolvable("torrent has no save path".into()));
            }
            torrent.save_path.join(&torrent.display_name)
        }
        ExtractionMode::InPlace => archive
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                unresolvable(format!(
                    "archive '{}' has no parent directory",
                    archive.display()
                ))
            })?,
    };

    if !dest.is_absolute() {
        return Err(unresolvable(format!(
            "resolved base '{}' is not absolute",
            dest.display()
        )));
    }

    if config.extraction_mode == ExtractionMode::SelectedFolder && config.append_matched_label {
        if let Some(label) = matched_label(config, torrent) {
            dest.push(label);
        }
    }

    if config.append_archive_name {
        dest.push(&torrent.display_name);
    }

    Ok(dest)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TorrentId;

    fn torrent(save_path: &str, labels: &[&str]) -> CompletedTorrent {
        CompletedTorrent {
            id: TorrentId::new("t1"),
            display_name: "My.Show.S01".into(),
            save_path: PathBuf::from(save_path),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            archive_files: vec![],
        }
    }

    #[test]
    fn selected_folder_uses_extract_path() {
        let config = Config {
            extraction_mode: ExtractionMode::SelectedFolder,
            extract_path: PathBuf::from("/out"),
            ..Default::default()
        };
        let t = torrent("/data", &[]);
        let dest =
            resolve_destination(&config, &t, Path::new("/data/My.Show.S01/a.rar")).unwrap();
        assert_eq!(dest, PathBuf::from("/out"));
    }

    #[test]
    fn selected_folder_appends_matching_label() {
        let config = Config {
            extraction_mode: ExtractionMode::SelectedFolder,
            extract_path: PathBuf::from("/out"),
            append_matched_label: true,
            label_filter: vec!["movies".into(), "tv".into()],
            ..Default::default()
        };
        let t = torrent("/data", &["movies"]);
        let dest = resolve_destination(&config, &t, Path::new("/data/a.rar")).unwrap();
        assert_eq!(dest, PathBuf::from("/out/movies"));
    }

    #[test]
    fn label_append_uses_first_label_in_torrent_order() {
        let config = Config {
            extraction_mode: ExtractionMode::SelectedFolder,
            extract_path: PathBuf::from("/out"),
            append_matched_label: true,
            label_filter: vec!["tv".into(), "movies".into()],
            ..Default::default()
        };
        let t = torrent("/data", &["movies", "tv"]);
        let dest = resolve_destination(&config, &t, Path::new("/data/a.rar")).unwrap();
        assert_eq!(dest, PathBuf::from("/out/movies"));
    }

    #[test]
    fn label_append_with_empty_filter_takes_first_label() {
        let config = Config {
            extraction_mode: ExtractionMode::SelectedFolder,
            extract_path: PathBuf::from("/out"),
            append_matched_label: true,
            ..Default::default()
        };
        let t = torrent("/data", &["anime", "tv"]);
        let dest = resolve_destination(&config, &t, Path::new("/data/a.rar")).unwrap();
        assert_eq!(dest, PathBuf::from("/out/anime"));
    }

    #[test]
    fn label_append_with_no_labels_appends_nothing() {
        let config = Config {
            extraction_mode: ExtractionMode::SelectedFolder,
            extract_path: PathBuf::from("/out"),
            append_matched_label: true,
            ..Default::default()
        };
        let t = torrent("/data", &[]);
        let dest = resolve_destination(&config, &t, Path::new("/data/a.rar")).unwrap();
        assert_eq!(dest, PathBuf::from("/out"));
    }

    #[test]
    fn label_append_ignored_outside_selected_folder() {
        let config = Config {
            extraction_mode: ExtractionMode::TorrentRoot,
            append_matched_label: true,
            ..Default::default()
        };
        let t = torrent("/data", &["movies"]);
        let dest = resolve_destination(&config, &t, Path::new("/data/a.rar")).unwrap();
        assert_eq!(dest, PathBuf::from("/data/My.Show.S01"));
    }

    #[test]
    fn torrent_root_joins_save_path_and_name() {
        let config = Config {
            extraction_mode: ExtractionMode::TorrentRoot,
            ..Default::default()
        };
        let t = torrent("/downloads", &[]);
        let dest = resolve_destination(&config, &t, Path::new("/downloads/x/a.rar")).unwrap();
        assert_eq!(dest, PathBuf::from("/downloads/My.Show.S01"));
    }

    #[test]
    fn in_place_uses_each_archive_parent() {
        let config = Config {
            extraction_mode: ExtractionMode::InPlace,
            ..Default::default()
        };
        let t = torrent("/data", &[]);
        let dest =
            resolve_destination(&config, &t, Path::new("/data/torrent1/file.rar")).unwrap();
        assert_eq!(dest, PathBuf::from("/data/torrent1"));

        let dest =
            resolve_destination(&config, &t, Path::new("/data/torrent1/cd2/file.rar")).unwrap();
        assert_eq!(dest, PathBuf::from("/data/torrent1/cd2"));
    }

    #[test]
    fn append_archive_name_appends_display_name() {
        let config = Config {
            extraction_mode: ExtractionMode::SelectedFolder,
            extract_path: PathBuf::from("/out"),
            append_archive_name: true,
            ..Default::default()
        };
        let t = torrent("/data", &[]);
        let dest = resolve_destination(&config, &t, Path::new("/data/a.rar")).unwrap();
        assert_eq!(dest, PathBuf::from("/out/My.Show.S01"));
    }

    #[test]
    fn label_then_name_append_stack_in_order() {
        let config = Config {
            extraction_mode: ExtractionMode::SelectedFolder,
            extract_path: PathBuf::from("/out"),
            append_matched_label: true,
            append_archive_name: true,
            label_filter: vec!["movies".into()],
            ..Default::default()
        };
        let t = torrent("/data", &["movies"]);
        let dest = resolve_destination(&config, &t, Path::new("/data/a.rar")).unwrap();
        assert_eq!(dest, PathBuf::from("/out/movies/My.Show.S01"));
    }

    #[test]
    fn empty_extract_path_is_unresolvable() {
        let config = Config {
            extraction_mode: ExtractionMode::SelectedFolder,
            ..Default::default()
        };
        let t = torrent("/data", &[]);
        let err = resolve_destination(&config, &t, Path::new("/data/a.rar")).unwrap_err();
        assert!(matches!(err, Error::UnresolvableDestination { .. }));
    }

    #[test]
    fn empty_save_path_is_unresolvable_for_torrent_root() {
        let config = Config {
            extraction_mode: ExtractionMode::TorrentRoot,
            ..Default::default()
        };
        let t = torrent("", &[]);
        let err = resolve_destination(&config, &t, Path::new("/data/a.rar")).unwrap_err();
        assert!(matches!(err, Error::UnresolvableDestination { .. }));
    }

    #[test]
    fn relative_base_is_unresolvable() {
        let config = Config {
            extraction_mode: ExtractionMode::SelectedFolder,
            extract_path: PathBuf::from("relative/out"),
            ..Default::default()
        };
        let t = torrent("/data", &[]);
        let err = resolve_destination(&config, &t, Path::new("/data/a.rar")).unwrap_err();
        assert!(matches!(err, Error::UnresolvableDestination { .. }));
    }

    #[test]
    fn resolution_is_deterministic() {
        let config = Config {
            extraction_mode: ExtractionMode::SelectedFolder,
            extract_path: PathBuf::from("/out"),
            append_matched_label: true,
            label_filter: vec!["movies".into()],
            ..Default::default()
        };
        let t = torrent("/data", &["movies"]);
        let a = resolve_destination(&config, &t, Path::new("/data/a.rar")).unwrap();
        let b = resolve_destination(&config, &t, Path::new("/data/a.rar")).unwrap();
        assert_eq!(a, b);
    }
}
