//! Capture segments on disk.
//!
//! The capture process writes fixed-length files named
//! `YYYYMMDDHHMM<anything>.<ext>`; the 12-digit prefix is the segment's start.

use crate::error::{ArchiveError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use log::warn;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const TIMESTAMP_PREFIX_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub path: PathBuf,
    pub start: NaiveDateTime,
}

/// Parse the `YYYYMMDDHHMM` prefix of a capture file name.
pub fn parse_segment_timestamp(file_name: &str) -> Result<NaiveDateTime> {
    let prefix = file_name
        .get(..TIMESTAMP_PREFIX_LEN)
        .filter(|p| p.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| ArchiveError::parse(file_name, "expected a YYYYMMDDHHMM prefix"))?;

    let field = |range: std::ops::Range<usize>| -> u32 {
        // All-digit and at most four wide, so this cannot overflow.
        prefix[range].parse().unwrap_or_default()
    };
    let year = i32::try_from(field(0..4)).unwrap_or_default();
    NaiveDate::from_ymd_opt(year, field(4..6), field(6..8))
        .and_then(|d| d.and_hms_opt(field(8..10), field(10..12), 0))
        .ok_or_else(|| ArchiveError::parse(file_name, "prefix is not a valid date and time"))
}

/// One pass over the capture directory.
#[derive(Debug, Default)]
pub struct SegmentScan {
    /// Ascending by start time.
    pub segments: Vec<Segment>,
    /// Files with the right extension whose names did not parse.
    pub malformed: Vec<PathBuf>,
}

impl SegmentScan {
    pub fn new(mut segments: Vec<Segment>, malformed: Vec<PathBuf>) -> Self {
        segments.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.path.cmp(&b.path)));
        SegmentScan {
            segments,
            malformed,
        }
    }

    /// Segments starting in `[start, end)`, ascending.
    pub fn list_segments(&self, start: NaiveDateTime, end: NaiveDateTime) -> &[Segment] {
        if end <= start {
            return &[];
        }
        let from = self.segments.partition_point(|s| s.start < start);
        let to = self.segments.partition_point(|s| s.start < end);
        &self.segments[from..to]
    }

    /// Segments starting strictly before `cutoff`.
    pub fn older_than(&self, cutoff: NaiveDateTime) -> &[Segment] {
        let to = self.segments.partition_point(|s| s.start < cutoff);
        &self.segments[..to]
    }
}

pub trait SegmentIndex {
    fn scan(&self) -> Result<SegmentScan>;
    fn remove(&self, segment: &Segment) -> Result<()>;
}

/// Segments stored as files in one directory.
pub struct DirSegmentIndex {
    dir: PathBuf,
    extension: String,
}

impl DirSegmentIndex {
    pub fn new(dir: &Path, extension: &str) -> Self {
        DirSegmentIndex {
            dir: dir.to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }
}

impl SegmentIndex for DirSegmentIndex {
    fn scan(&self) -> Result<SegmentScan> {
        let entries = fs::read_dir(&self.dir).map_err(|e| ArchiveError::io(&self.dir, e))?;
        let mut segments = Vec::new();
        let mut malformed = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| ArchiveError::io(&self.dir, e))?;
            let path = entry.path();
            if !path.is_file() || !self.has_extension(&path) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match parse_segment_timestamp(&name) {
                Ok(start) => segments.push(Segment { path, start }),
                Err(err) => {
                    warn!("Skipping capture file with invalid timestamp: {err}");
                    malformed.push(path);
                }
            }
        }
        Ok(SegmentScan::new(segments, malformed))
    }

    fn remove(&self, segment: &Segment) -> Result<()> {
        fs::remove_file(&segment.path).map_err(|e| ArchiveError::io(&segment.path, e))
    }
}
