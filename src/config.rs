//! Extraction configuration
//!
//! The runtime representation uses [`ExtractionMode`], a tagged enum with
//! exactly one active mode. Older installs persisted three mutually exclusive
//! booleans (`extract_in_place` / `extract_torrent_root` /
//! `extract_selected_folder`); the [`legacy`] submodule keeps that encoding
//! confined to the persistence edge.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where extracted output goes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// A single configured directory (`extract_path`)
    SelectedFolder,
    /// The torrent's own top-level directory (`save_path/display_name`)
    #[default]
    TorrentRoot,
    /// The directory containing each archive
    InPlace,
}

fn default_max_concurrent() -> usize {
    2
}

fn default_cleanup_time_hours() -> f64 {
    2.0
}

/// Extraction settings
///
/// Loaded from the settings table at startup and mutated through
/// [`ConfigStore::update`](crate::config_store::ConfigStore::update). Every
/// extraction decision reads an immutable snapshot of this struct.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Destination mode
    #[serde(default)]
    pub extraction_mode: ExtractionMode,

    /// Output directory for [`ExtractionMode::SelectedFolder`]
    #[serde(default)]
    pub extract_path: PathBuf,

    /// Stage extraction through a temporary directory before moving output
    /// into place
    #[serde(default)]
    pub use_temp_dir: bool,

    /// Base temporary directory, required when `use_temp_dir` is set
    #[serde(default)]
    pub temp_dir: PathBuf,

    /// Maximum number of simultaneously running extraction jobs, clamped
    /// to [1, 10]
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_extractions: usize,

    /// Append a subdirectory named after the torrent to the destination
    #[serde(default)]
    pub append_archive_name: bool,

    /// Append the first matching label to the destination
    /// ([`ExtractionMode::SelectedFolder`] only)
    #[serde(default)]
    pub append_matched_label: bool,

    /// Only extract torrents carrying one of these labels; empty matches all
    #[serde(default)]
    pub label_filter: Vec<String>,

    /// Delete extracted output after `cleanup_time_hours`
    #[serde(default)]
    pub auto_cleanup: bool,

    /// Hours to keep extracted output when `auto_cleanup` is set
    /// (minimum 1)
    #[serde(default = "default_cleanup_time_hours")]
    pub cleanup_time_hours: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extraction_mode: ExtractionMode::TorrentRoot,
            extract_path: PathBuf::new(),
            use_temp_dir: false,
            temp_dir: PathBuf::new(),
            max_concurrent_extractions: default_max_concurrent(),
            append_archive_name: false,
            append_matched_label: false,
            label_filter: Vec::new(),
            auto_cleanup: false,
            cleanup_time_hours: default_cleanup_time_hours(),
        }
    }
}

impl Config {
    /// Merge a partial update into this configuration, returning the result
    pub fn apply(&self, update: &ConfigUpdate) -> Config {
        let mut next = self.clone();
        if let Some(mode) = update.extraction_mode {
            next.extraction_mode = mode;
        }
        if let Some(ref path) = update.extract_path {
            next.extract_path = path.clone();
        }
        if let Some(use_temp) = update.use_temp_dir {
            next.use_temp_dir = use_temp;
        }
        if let Some(ref dir) = update.temp_dir {
            next.temp_dir = dir.clone();
        }
        if let Some(max) = update.max_concurrent_extractions {
            next.max_concurrent_extractions = max;
        }
        if let Some(append) = update.append_archive_name {
            next.append_archive_name = append;
        }
        if let Some(append) = update.append_matched_label {
            next.append_matched_label = append;
        }
        if let Some(ref filter) = update.label_filter {
            next.label_filter = filter.clone();
        }
        if let Some(cleanup) = update.auto_cleanup {
            next.auto_cleanup = cleanup;
        }
        if let Some(hours) = update.cleanup_time_hours {
            next.cleanup_time_hours = hours;
        }
        next
    }

    /// Validate the configuration
    ///
    /// Rejects combinations that cannot be executed: a missing extract path
    /// for SelectedFolder mode, a missing temp dir when staging is enabled,
    /// and a non-positive cleanup retention.
    pub fn validate(&self) -> Result<()> {
        if self.extraction_mode == ExtractionMode::SelectedFolder
            && self.extract_path.as_os_str().is_empty()
        {
            return Err(Error::Config {
                message: "extract_path must be set when using the selected folder mode".into(),
                key: Some("extract_path".into()),
            });
        }

        if self.use_temp_dir && self.temp_dir.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "temp_dir must be set when use_temp_dir is enabled".into(),
                key: Some("temp_dir".into()),
            });
        }

        if self.cleanup_time_hours <= 0.0 {
            return Err(Error::Config {
                message: "cleanup_time_hours must be positive".into(),
                key: Some("cleanup_time".into()),
            });
        }

        Ok(())
    }

    /// Clamp out-of-range values into their supported ranges
    ///
    /// The concurrency ceiling is clamped to [1, 10] and the cleanup
    /// retention to a minimum of one hour, matching the bounds the settings
    /// loader enforces.
    pub fn normalized(mut self) -> Config {
        self.max_concurrent_extractions = self.max_concurrent_extractions.clamp(1, 10);
        if self.cleanup_time_hours < 1.0 {
            self.cleanup_time_hours = 1.0;
        }
        self
    }
}

/// Partial configuration update
///
/// Every field is optional; unset fields keep their current value.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    /// New destination mode
    pub extraction_mode: Option<ExtractionMode>,
    /// New output directory for SelectedFolder mode
    pub extract_path: Option<PathBuf>,
    /// Enable or disable temp-dir staging
    pub use_temp_dir: Option<bool>,
    /// New base temporary directory
    pub temp_dir: Option<PathBuf>,
    /// New concurrency ceiling (clamped to [1, 10])
    pub max_concurrent_extractions: Option<usize>,
    /// Enable or disable torrent-name appending
    pub append_archive_name: Option<bool>,
    /// Enable or disable label appending
    pub append_matched_label: Option<bool>,
    /// New label filter
    pub label_filter: Option<Vec<String>>,
    /// Enable or disable automatic cleanup
    pub auto_cleanup: Option<bool>,
    /// New cleanup retention in hours
    pub cleanup_time_hours: Option<f64>,
}

/// Translation between [`Config`] and the flat key/value settings record
///
/// The stored encoding keeps the field names older installs used, including
/// the boolean mode triple and the comma-separated label filter. Nothing
/// outside this module sees the triple.
pub(crate) mod legacy {
    use super::{Config, ExtractionMode};
    use crate::error::{Error, Result};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn bool_str(value: bool) -> &'static str {
        if value { "true" } else { "false" }
    }

    /// Encode a configuration as settings rows
    pub(crate) fn to_settings(config: &Config) -> Vec<(String, String)> {
        let (in_place, torrent_root, selected_folder) = match config.extraction_mode {
            ExtractionMode::InPlace => (true, false, false),
            ExtractionMode::TorrentRoot => (false, true, false),
            ExtractionMode::SelectedFolder => (false, false, true),
        };

        vec![
            (
                "extract_path".into(),
                config.extract_path.to_string_lossy().into_owned(),
            ),
            ("extract_in_place".into(), bool_str(in_place).into()),
            ("extract_torrent_root".into(), bool_str(torrent_root).into()),
            (
                "extract_selected_folder".into(),
                bool_str(selected_folder).into(),
            ),
            ("use_temp_dir".into(), bool_str(config.use_temp_dir).into()),
            (
                "temp_dir".into(),
                config.temp_dir.to_string_lossy().into_owned(),
            ),
            (
                "append_matched_label".into(),
                bool_str(config.append_matched_label).into(),
            ),
            (
                "append_archive_name".into(),
                bool_str(config.append_archive_name).into(),
            ),
            ("label_filter".into(), config.label_filter.join(",")),
            ("cleanup_time".into(), config.cleanup_time_hours.to_string()),
            ("auto_cleanup".into(), bool_str(config.auto_cleanup).into()),
            (
                "max_extract_threads".into(),
                config.max_concurrent_extractions.to_string(),
            ),
        ]
    }

    fn parse_bool(settings: &HashMap<String, String>, key: &str, default: bool) -> Result<bool> {
        match settings.get(key) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                other => Err(Error::ConfigCorrupt(format!(
                    "invalid boolean for {}: '{}'",
                    key, other
                ))),
            },
        }
    }

    /// Decode settings rows into a configuration
    ///
    /// Missing keys fall back to their defaults; unparseable values fail with
    /// [`Error::ConfigCorrupt`]. When more than one mode boolean is set, the
    /// precedence is in-place, then torrent-root, then selected-folder; when
    /// none is set the mode decodes to selected-folder.
    pub(crate) fn from_settings(settings: &HashMap<String, String>) -> Result<Config> {
        let defaults = Config::default();

        let in_place = parse_bool(settings, "extract_in_place", false)?;
        let torrent_root = parse_bool(settings, "extract_torrent_root", false)?;

        let extraction_mode = if in_place {
            ExtractionMode::InPlace
        } else if torrent_root {
            ExtractionMode::TorrentRoot
        } else {
            // extract_selected_folder does not need consulting: it is the
            // fallback whether set or not
            ExtractionMode::SelectedFolder
        };

        let cleanup_time_hours = match settings.get("cleanup_time") {
            None => defaults.cleanup_time_hours,
            Some(v) => v.parse::<f64>().map_err(|_| {
                Error::ConfigCorrupt(format!("invalid number for cleanup_time: '{}'", v))
            })?,
        };

        let max_concurrent_extractions = match settings.get("max_extract_threads") {
            None => defaults.max_concurrent_extractions,
            Some(v) => v.parse::<usize>().map_err(|_| {
                Error::ConfigCorrupt(format!("invalid number for max_extract_threads: '{}'", v))
            })?,
        };

        let label_filter = settings
            .get("label_filter")
            .map(|s| parse_label_filter(s))
            .unwrap_or_default();

        Ok(Config {
            extraction_mode,
            extract_path: settings
                .get("extract_path")
                .map(PathBuf::from)
                .unwrap_or_default(),
            use_temp_dir: parse_bool(settings, "use_temp_dir", false)?,
            temp_dir: settings
                .get("temp_dir")
                .map(PathBuf::from)
                .unwrap_or_default(),
            max_concurrent_extractions,
            append_archive_name: parse_bool(settings, "append_archive_name", false)?,
            append_matched_label: parse_bool(settings, "append_matched_label", false)?,
            label_filter,
            auto_cleanup: parse_bool(settings, "auto_cleanup", false)?,
            cleanup_time_hours,
        })
    }

    /// Split a comma-separated label filter, trimming whitespace and
    /// dropping empty entries
    pub(crate) fn parse_label_filter(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }
}
