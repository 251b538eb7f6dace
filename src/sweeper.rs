//! Age-based deletion of capture segments.
//!
//! Deletion ignores assembly state entirely: a segment past the retention
//! window is removed whether or not it ever made it into a recording.

use crate::config::ArchiveConfig;
use crate::segments::{SegmentIndex, SegmentScan};
use chrono::{Duration, NaiveDateTime};
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct SweepReport {
    pub cutoff: NaiveDateTime,
    pub deleted: Vec<PathBuf>,
    pub retained: usize,
    pub failed: Vec<SweepFailure>,
}

pub struct RetentionSweeper {
    retention: Duration,
}

impl RetentionSweeper {
    pub fn new(retention: Duration) -> Self {
        RetentionSweeper { retention }
    }

    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self::new(config.retention())
    }

    pub fn cutoff(&self, now: NaiveDateTime) -> NaiveDateTime {
        now - self.retention
    }

    /// Delete every scanned segment that started strictly before
    /// `now - retention`. Names that did not parse never reach `scan.segments`
    /// and so are never deleted.
    pub fn sweep(
        &self,
        index: &dyn SegmentIndex,
        scan: &SegmentScan,
        now: NaiveDateTime,
    ) -> SweepReport {
        let cutoff = self.cutoff(now);
        let expired = scan.older_than(cutoff);
        let mut report = SweepReport {
            cutoff,
            deleted: Vec::new(),
            retained: scan.segments.len() - expired.len(),
            failed: Vec::new(),
        };

        for segment in expired {
            match index.remove(segment) {
                Ok(()) => {
                    info!("Deleted old recording: {}", segment.path.display());
                    report.deleted.push(segment.path.clone());
                }
                Err(err) => {
                    warn!("Could not delete {}: {err}", segment.path.display());
                    report.failed.push(SweepFailure {
                        path: segment.path.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::DirSegmentIndex;
    use chrono::NaiveDate;
    use std::fs;
    use std::path::Path;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    fn sweep(
        index: &DirSegmentIndex,
        sweeper: &RetentionSweeper,
        now: NaiveDateTime,
    ) -> SweepReport {
        let scan = index.scan().unwrap();
        sweeper.sweep(index, &scan, now)
    }

    #[test]
    fn deletes_only_strictly_older_segments() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "202510111200.mp3");
        touch(dir.path(), "202510121159.mp3");
        touch(dir.path(), "202510121200.mp3");
        touch(dir.path(), "202510141200.mp3");
        let index = DirSegmentIndex::new(dir.path(), "mp3");
        let sweeper = RetentionSweeper::new(Duration::days(2));

        let report = sweep(&index, &sweeper, at(14, 12, 0));
        assert_eq!(report.cutoff, at(12, 12, 0));
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(report.retained, 2);
        assert!(!dir.path().join("202510121159.mp3").exists());
        assert!(dir.path().join("202510121200.mp3").exists());
    }

    #[test]
    fn second_sweep_deletes_nothing_more() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "202510101200.mp3");
        touch(dir.path(), "202510141000.mp3");
        let index = DirSegmentIndex::new(dir.path(), "mp3");
        let sweeper = RetentionSweeper::new(Duration::days(2));

        assert_eq!(sweep(&index, &sweeper, at(14, 12, 0)).deleted.len(), 1);
        let again = sweep(&index, &sweeper, at(14, 12, 0));
        assert!(again.deleted.is_empty());
        assert_eq!(again.retained, 1);
    }

    #[test]
    fn malformed_and_foreign_files_survive() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "old-capture.mp3");
        touch(dir.path(), "202501010000.wav");
        let index = DirSegmentIndex::new(dir.path(), "mp3");

        let report = sweep(&index, &RetentionSweeper::new(Duration::days(2)), at(14, 12, 0));
        assert!(report.deleted.is_empty());
        assert_eq!(report.retained, 0);
        assert!(dir.path().join("old-capture.mp3").exists());
        assert!(dir.path().join("202501010000.wav").exists());
    }

    #[test]
    fn vanished_segment_is_a_failure_not_an_abort() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "202510101200.mp3");
        touch(dir.path(), "202510101300.mp3");
        let index = DirSegmentIndex::new(dir.path(), "mp3");
        let scan = index.scan().unwrap();
        fs::remove_file(dir.path().join("202510101200.mp3")).unwrap();

        let report = RetentionSweeper::new(Duration::days(2)).sweep(&index, &scan, at(14, 12, 0));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.deleted.len(), 1);
    }

    #[test]
    fn from_config_uses_retention_days() {
        let mut config = ArchiveConfig::default();
        config.retention_days = 5;
        let sweeper = RetentionSweeper::from_config(&config);
        assert_eq!(sweeper.cutoff(at(14, 12, 0)), at(9, 12, 0));
    }
}
