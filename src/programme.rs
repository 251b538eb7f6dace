use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One scheduled broadcast.
///
/// `start_time` is unique within a store. `filepath` stays `None` until the
/// programme's recording has been assembled; after that the row is frozen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Programme {
    pub id: Option<i64>,
    pub start_time: NaiveDateTime,
    /// Placeholder of start + 1h. The real end is the next programme's start,
    /// worked out at assembly time.
    pub end_time: NaiveDateTime,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<PathBuf>,
}

impl Programme {
    pub fn new(start_time: NaiveDateTime, title: String, subtitle: Option<String>) -> Self {
        Programme {
            id: None,
            start_time,
            end_time: start_time + Duration::hours(1),
            title,
            subtitle: subtitle.filter(|s| !s.is_empty()),
            filepath: None,
        }
    }

    pub fn is_assembled(&self) -> bool {
        self.filepath.is_some()
    }

    /// Format as "YYYY-MM-DD HH:MM - Title - Subtitle".
    pub fn display_line(&self) -> String {
        format!(
            "{} - {} - {}",
            self.start_time.format("%Y-%m-%d %H:%M"),
            self.title,
            self.subtitle.as_deref().unwrap_or("")
        )
    }
}
