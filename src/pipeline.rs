//! Pipeline: one scheduled invocation of the archive.
//!
//! Owns the configured collaborators and runs the stages in order: ingest
//! every listing day, assemble closed windows, then sweep expired segments.
//! The capture directory is scanned once per run and both segment stages
//! share that scan.
//! Both the CLI and the headless tests drive the archive through here.

use crate::concat::{Concatenator, FfmpegConcatenator};
use crate::config::{ArchiveConfig, WEEKDAYS};
use crate::error::{ArchiveError, Result};
use crate::ingest::{IngestReport, IngestSummary, Ingestor};
use crate::planner::{AssemblyPlanner, AssemblyReport};
use crate::segments::{DirSegmentIndex, SegmentIndex, SegmentScan};
use crate::source::{HttpScheduleSource, ScheduleSource};
use crate::store::{ScheduleStore, SqliteStore};
use crate::sweeper::{RetentionSweeper, SweepReport};
use chrono::{Datelike, Duration, NaiveDateTime};
use log::{error, info};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
pub struct StageError {
    pub stage: &'static str,
    pub kind: &'static str,
    pub error: String,
}

/// Everything one full run did.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub ingest: IngestSummary,
    /// Capture files whose names did not parse, from this run's single scan.
    pub malformed_segments: Vec<PathBuf>,
    pub assembly: Option<AssemblyReport>,
    pub sweep: Option<SweepReport>,
    pub stage_errors: Vec<StageError>,
}

pub struct Pipeline {
    config: ArchiveConfig,
    source: Box<dyn ScheduleSource>,
    store: Box<dyn ScheduleStore>,
    index: Box<dyn SegmentIndex>,
    joiner: Box<dyn Concatenator>,
}

impl Pipeline {
    pub fn new(
        config: ArchiveConfig,
        source: Box<dyn ScheduleSource>,
        store: Box<dyn ScheduleStore>,
        index: Box<dyn SegmentIndex>,
        joiner: Box<dyn Concatenator>,
    ) -> Self {
        Pipeline {
            config,
            source,
            store,
            index,
            joiner,
        }
    }

    /// Wire up the production collaborators described by `config`.
    pub fn from_config(config: ArchiveConfig) -> Result<Self> {
        config.validate()?;
        let source = HttpScheduleSource::new(&config.source_base_url)?;
        let store = SqliteStore::open(&config.database_path)?;
        let index = DirSegmentIndex::new(&config.capture_dir, config.extension());
        let joiner = FfmpegConcatenator::new(config.ffmpeg_binary.clone());
        Ok(Self::new(
            config,
            Box::new(source),
            Box::new(store),
            Box::new(index),
            Box::new(joiner),
        ))
    }

    pub fn store(&self) -> &dyn ScheduleStore {
        self.store.as_ref()
    }

    /// Ingest all configured days for `year`.
    pub fn ingest_all(&mut self, year: i32) -> IngestSummary {
        Ingestor::from_config(&self.config).ingest_all(
            self.source.as_ref(),
            self.store.as_mut(),
            year,
        )
    }

    /// Ingest a single weekday, named in any case.
    pub fn ingest_day(&mut self, day: &str, year: i32) -> Result<IngestReport> {
        let day = WEEKDAYS
            .iter()
            .find(|w| w.eq_ignore_ascii_case(day))
            .ok_or_else(|| ArchiveError::Config(format!("'{day}' is not a weekday")))?;
        Ingestor::from_config(&self.config).ingest_day(
            self.source.as_ref(),
            self.store.as_mut(),
            day,
            year,
        )
    }

    /// One pass over the capture directory. Each unparsable name is
    /// logged by the index during the pass.
    pub fn scan_segments(&self) -> Result<SegmentScan> {
        self.index.scan()
    }

    pub fn assemble(&mut self, now: NaiveDateTime) -> Result<AssemblyReport> {
        let scan = self.scan_segments()?;
        self.assemble_scanned(&scan, now)
    }

    /// Sweep with the configured retention, or `retention_days` when given.
    pub fn sweep(&self, now: NaiveDateTime, retention_days: Option<u32>) -> Result<SweepReport> {
        let scan = self.scan_segments()?;
        Ok(self.sweep_scanned(&scan, now, retention_days))
    }

    fn assemble_scanned(
        &mut self,
        scan: &SegmentScan,
        now: NaiveDateTime,
    ) -> Result<AssemblyReport> {
        AssemblyPlanner::from_config(&self.config).run(
            self.store.as_mut(),
            scan,
            self.joiner.as_ref(),
            now,
        )
    }

    fn sweep_scanned(
        &self,
        scan: &SegmentScan,
        now: NaiveDateTime,
        retention_days: Option<u32>,
    ) -> SweepReport {
        let sweeper = match retention_days {
            Some(days) => RetentionSweeper::new(Duration::days(i64::from(days))),
            None => RetentionSweeper::from_config(&self.config),
        };
        sweeper.sweep(self.index.as_ref(), scan, now)
    }

    /// Ingest, scan, assemble, sweep. A failing ingest day or assembly is
    /// reported and the later stages still run; without a scan neither
    /// segment stage can.
    pub fn run(&mut self, now: NaiveDateTime) -> RunReport {
        let mut report = RunReport {
            ingest: self.ingest_all(now.year()),
            ..RunReport::default()
        };
        info!(
            "Ingested {} programme(s); {} day(s) failed",
            report.ingest.inserted(),
            report.ingest.failed_days.len()
        );

        let scan = match self.scan_segments() {
            Ok(scan) => scan,
            Err(err) => {
                error!("Segment scan failed: {err}");
                report.stage_errors.push(stage_error("scan", &err));
                return report;
            }
        };
        report.malformed_segments = scan.malformed.clone();

        match self.assemble_scanned(&scan, now) {
            Ok(assembly) => {
                info!(
                    "Assembled {} recording(s), {} already present, {} gap(s), {} failure(s)",
                    assembly.assembled.len(),
                    assembly.already_present.len(),
                    assembly.gaps.len(),
                    assembly.failed.len()
                );
                report.assembly = Some(assembly);
            }
            Err(err) => {
                error!("Assembly abandoned: {err}");
                report.stage_errors.push(stage_error("assemble", &err));
            }
        }

        let sweep = self.sweep_scanned(&scan, now, None);
        info!("Swept {} expired segment(s)", sweep.deleted.len());
        report.sweep = Some(sweep);
        report
    }
}

fn stage_error(stage: &'static str, err: &ArchiveError) -> StageError {
    StageError {
        stage,
        kind: err.kind(),
        error: err.to_string(),
    }
}
