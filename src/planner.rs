//! Assembly of per-programme recordings from capture segments.
//!
//! Pending programmes are taken in start order and paired with the next
//! stored programme; the pair's start times bound a half-open window of
//! segments. A programme whose successor is unknown or has not started yet
//! waits for a later run.

use crate::concat::Concatenator;
use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};
use crate::programme::Programme;
use crate::segments::SegmentScan;
use crate::store::ScheduleStore;
use chrono::{Duration, NaiveDateTime};
use log::{error, info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Replace everything except alphanumerics, space, underscore and hyphen.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `YYYY_MM_DD_HH_MM_<sanitized title>.<ext>`
pub fn artifact_name(start: NaiveDateTime, title: &str, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        start.format("%Y_%m_%d_%H_%M"),
        sanitize_title(title),
        extension
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct AssemblyFailure {
    pub programme: String,
    pub kind: &'static str,
    pub error: String,
}

impl AssemblyFailure {
    fn new(programme: &Programme, err: &ArchiveError) -> Self {
        AssemblyFailure {
            programme: programme.display_line(),
            kind: err.kind(),
            error: err.to_string(),
        }
    }
}

/// What one planner run did.
#[derive(Debug, Default, Serialize)]
pub struct AssemblyReport {
    /// Recordings created by this run.
    pub assembled: Vec<PathBuf>,
    /// Recordings that were already on disk and have now been recorded.
    pub already_present: Vec<PathBuf>,
    /// Programmes with no segments in their window.
    pub gaps: Vec<String>,
    pub failed: Vec<AssemblyFailure>,
    /// First programme whose successor has not started yet; it and
    /// everything after it is left for a later run.
    pub awaiting_successor: Option<String>,
}

pub struct AssemblyPlanner {
    output_dir: PathBuf,
    extension: String,
    lookback: Duration,
    lookahead: Duration,
}

impl AssemblyPlanner {
    pub fn new(output_dir: &Path, extension: &str, lookback: Duration, lookahead: Duration) -> Self {
        AssemblyPlanner {
            output_dir: output_dir.to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
            lookback,
            lookahead,
        }
    }

    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self::new(
            &config.output_dir,
            config.extension(),
            Duration::hours(i64::from(config.pending_lookback_hours)),
            Duration::hours(i64::from(config.pending_lookahead_hours)),
        )
    }

    pub fn artifact_path(&self, programme: &Programme) -> PathBuf {
        self.output_dir.join(artifact_name(
            programme.start_time,
            &programme.title,
            &self.extension,
        ))
    }

    /// Bounds of the pending-programme query around `now`, both exclusive.
    pub fn pending_window(&self, now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        (now - self.lookback, now + self.lookahead)
    }

    /// Assemble every pending programme whose successor has already started.
    ///
    /// A window runs from a programme's start to the start of the next stored
    /// programme, whether or not that one has been assembled. Failing to read
    /// the store abandons the run; anything that goes wrong for a single
    /// programme is recorded in the report and the batch carries on.
    pub fn run(
        &self,
        store: &mut dyn ScheduleStore,
        scan: &SegmentScan,
        joiner: &dyn Concatenator,
        now: NaiveDateTime,
    ) -> Result<AssemblyReport> {
        fs::create_dir_all(&self.output_dir).map_err(|e| ArchiveError::io(&self.output_dir, e))?;

        let (window_start, window_end) = self.pending_window(now);
        let pending = store.list_pending(window_start, window_end)?;
        let mut report = AssemblyReport::default();
        info!("{} pending programme(s) to consider", pending.len());

        for programme in &pending {
            let next_start = match store.next_start_after(programme.start_time)? {
                Some(next) if next <= now => next,
                _ => {
                    // Later pending programmes start after this one, so they wait too.
                    report.awaiting_successor = Some(programme.display_line());
                    break;
                }
            };
            let Some(id) = programme.id else {
                let err = ArchiveError::Storage("pending programme has no id".into());
                report.failed.push(AssemblyFailure::new(programme, &err));
                continue;
            };

            let segments = scan.list_segments(programme.start_time, next_start);
            if segments.is_empty() {
                warn!(
                    "No segments for '{}' from {} to {}, skipping",
                    programme.title, programme.start_time, next_start
                );
                report.gaps.push(programme.display_line());
                continue;
            }

            let output = self.artifact_path(programme);
            let existed = output.exists();
            if existed {
                info!("{} already exists, skipping concatenation", output.display());
            } else {
                let inputs: Vec<PathBuf> = segments.iter().map(|s| s.path.clone()).collect();
                if let Err(err) = joiner.concatenate(&inputs, &output) {
                    warn!("Could not assemble '{}': {err}", programme.title);
                    report.failed.push(AssemblyFailure::new(programme, &err));
                    continue;
                }
                info!("Created {} from {} segment(s)", output.display(), inputs.len());
            }

            if let Err(err) = store.set_filepath(id, &output) {
                error!("Could not record {} for '{}': {err}", output.display(), programme.title);
                report.failed.push(AssemblyFailure::new(programme, &err));
                continue;
            }
            if existed {
                report.already_present.push(output);
            } else {
                report.assembled.push(output);
            }
        }
        Ok(report)
    }
}
