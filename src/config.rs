//! Runtime configuration, stored as JSON.

use crate::error::{ArchiveError, Result};
use crate::timeline::RolloverRule;
use chrono::Duration;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "airtime";
const CONFIG_FILE: &str = "config.json";

pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Directory the capture process writes segments into.
    pub capture_dir: PathBuf,
    /// Directory assembled programme recordings are written to.
    pub output_dir: PathBuf,
    /// SQLite file holding the schedule.
    pub database_path: PathBuf,
    /// Segments older than this many days are deleted.
    pub retention_days: u32,
    /// Listing pages live at `<source_base_url><weekday>`.
    pub source_base_url: String,
    /// Weekday pages to ingest, in order.
    pub days: Vec<String>,
    /// File extension of capture segments and assembled recordings.
    pub segment_extension: String,
    /// How far back the planner looks for unassembled programmes.
    pub pending_lookback_hours: u32,
    /// How far ahead the planner looks for the programme closing a window.
    pub pending_lookahead_hours: u32,
    pub ffmpeg_binary: PathBuf,
    pub rollover_rule: RolloverRule,
}

fn base_dir(preferred: Option<PathBuf>) -> PathBuf {
    preferred
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        let audio = base_dir(dirs::audio_dir());
        ArchiveConfig {
            capture_dir: audio.join("captures"),
            output_dir: audio.join("programmes"),
            database_path: base_dir(dirs::data_dir()).join("schedule.sqlite3"),
            retention_days: 2,
            source_base_url: "https://www.angelradio.co.uk/".to_string(),
            days: WEEKDAYS.iter().map(|d| d.to_string()).collect(),
            segment_extension: "mp3".to_string(),
            pending_lookback_hours: 24,
            pending_lookahead_hours: 1,
            ffmpeg_binary: PathBuf::from("ffmpeg"),
            rollover_rule: RolloverRule::Strict,
        }
    }
}

impl ArchiveConfig {
    /// `<config dir>/airtime/config.json`.
    pub fn default_path() -> PathBuf {
        base_dir(dirs::config_dir()).join(CONFIG_FILE)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(ArchiveConfig::default());
        }
        let data = fs::read_to_string(path).map_err(|e| ArchiveError::io(path, e))?;
        let config: ArchiveConfig = serde_json::from_str(&data)
            .map_err(|e| ArchiveError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ArchiveError::Config(format!("serialize error: {e}")))?;
        fs::write(path, json).map_err(|e| ArchiveError::io(path, e))
    }

    pub fn validate(&self) -> Result<()> {
        if self.retention_days == 0 {
            return Err(ArchiveError::Config("retention_days must be at least 1".into()));
        }
        if self.segment_extension.trim_start_matches('.').is_empty() {
            return Err(ArchiveError::Config("segment_extension must not be empty".into()));
        }
        if self.days.is_empty() {
            return Err(ArchiveError::Config("days must name at least one weekday".into()));
        }
        if let Some(bad) = self
            .days
            .iter()
            .find(|d| !WEEKDAYS.iter().any(|w| w.eq_ignore_ascii_case(d)))
        {
            return Err(ArchiveError::Config(format!("'{bad}' is not a weekday")));
        }
        Ok(())
    }

    pub fn retention(&self) -> Duration {
        Duration::days(i64::from(self.retention_days))
    }

    /// Extension without a leading dot.
    pub fn extension(&self) -> &str {
        self.segment_extension.trim_start_matches('.')
    }
}
