//! Listing ingestion: page text → programmes → store.

use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};
use crate::listing;
use crate::source::ScheduleSource;
use crate::store::ScheduleStore;
use crate::timeline::{self, RolloverRule};
use chrono::NaiveDate;
use log::{error, info, warn};
use serde::Serialize;

/// Outcome of ingesting one weekday's listing.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub day: String,
    pub date: NaiveDate,
    pub inserted: usize,
    pub duplicates: usize,
    pub dropped_tokens: usize,
    /// Rows the store refused for reasons other than a duplicate start.
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayFailure {
    pub day: String,
    pub kind: &'static str,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct IngestSummary {
    pub reports: Vec<IngestReport>,
    pub failed_days: Vec<DayFailure>,
}

impl IngestSummary {
    pub fn inserted(&self) -> usize {
        self.reports.iter().map(|r| r.inserted).sum()
    }
}

pub struct Ingestor {
    days: Vec<String>,
    rule: RolloverRule,
}

impl Ingestor {
    pub fn new(days: Vec<String>, rule: RolloverRule) -> Self {
        Ingestor { days, rule }
    }

    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self::new(config.days.clone(), config.rollover_rule)
    }

    /// Parse one page's text and store its programmes.
    ///
    /// A page without a day label cannot be anchored and is rejected whole.
    pub fn ingest_text(
        &self,
        store: &mut dyn ScheduleStore,
        day: &str,
        text: &str,
        year: i32,
    ) -> Result<IngestReport> {
        let date = listing::extract_day_label(text)?.anchor(year)?;
        let entries = listing::extract_entries(text);
        let timeline = timeline::reconstruct(&entries, date, self.rule);

        let mut report = IngestReport {
            day: day.to_string(),
            date,
            inserted: 0,
            duplicates: 0,
            dropped_tokens: timeline.rejected.len(),
            failed: Vec::new(),
        };

        for programme in &timeline.programmes {
            info!("{}", programme.display_line());
            match store.upsert(programme) {
                Ok(_) => report.inserted += 1,
                Err(ArchiveError::DuplicateKey(_)) => report.duplicates += 1,
                Err(err) => {
                    error!("Error inserting {}: {err}", programme.title);
                    report.failed.push(format!("{}: {err}", programme.display_line()));
                }
            }
        }
        Ok(report)
    }

    pub fn ingest_day(
        &self,
        source: &dyn ScheduleSource,
        store: &mut dyn ScheduleStore,
        day: &str,
        year: i32,
    ) -> Result<IngestReport> {
        let text = source.fetch_day(day)?;
        self.ingest_text(store, day, &text, year)
    }

    /// Ingest every configured day. A failed day does not stop the others.
    pub fn ingest_all(
        &self,
        source: &dyn ScheduleSource,
        store: &mut dyn ScheduleStore,
        year: i32,
    ) -> IngestSummary {
        let mut summary = IngestSummary::default();
        for day in &self.days {
            info!("Uploading programmes for {day}...");
            match self.ingest_day(source, store, day, year) {
                Ok(report) => {
                    info!(
                        "Finished {day} ({}): {} new, {} already known, {} dropped",
                        report.date, report.inserted, report.duplicates, report.dropped_tokens
                    );
                    summary.reports.push(report);
                }
                Err(err) => {
                    warn!("Abandoning {day}: {err}");
                    summary.failed_days.push(DayFailure {
                        day: day.clone(),
                        kind: err.kind(),
                        error: err.to_string(),
                    });
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use chrono::NaiveDateTime;
    use std::collections::HashMap;

    struct PageSource(HashMap<&'static str, &'static str>);

    impl ScheduleSource for PageSource {
        fn fetch_day(&self, day: &str) -> Result<String> {
            self.0
                .get(day)
                .map(|s| s.to_string())
                .ok_or_else(|| ArchiveError::SourceUnavailable {
                    day: day.to_string(),
                    reason: "404 Not Found".into(),
                })
        }
    }

    const TUESDAY: &str = "\
Tuesday 14th October
9:00 Breakfast - with Pat
12:00 Lunch
1:15 Matinee
";

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn ingestor(days: &[&str]) -> Ingestor {
        Ingestor::new(days.iter().map(|d| d.to_string()).collect(), RolloverRule::Strict)
    }

    #[test]
    fn ingest_text_stores_reconstructed_programmes() {
        let mut store = InMemoryStore::new();
        let report = ingestor(&["Tuesday"])
            .ingest_text(&mut store, "Tuesday", TUESDAY, 2025)
            .unwrap();
        assert_eq!(report.inserted, 3);
        assert_eq!(report.date, NaiveDate::from_ymd_opt(2025, 10, 14).unwrap());
        let starts: Vec<_> = store.all().iter().map(|p| p.start_time).collect();
        assert_eq!(starts, vec![at(14, 9, 0), at(14, 12, 0), at(14, 13, 15)]);
        assert_eq!(store.all()[0].subtitle.as_deref(), Some("with Pat"));
    }

    #[test]
    fn reingesting_counts_duplicates() {
        let mut store = InMemoryStore::new();
        let ing = ingestor(&["Tuesday"]);
        ing.ingest_text(&mut store, "Tuesday", TUESDAY, 2025).unwrap();
        let again = ing.ingest_text(&mut store, "Tuesday", TUESDAY, 2025).unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.duplicates, 3);
        assert_eq!(store.all().len(), 3);
    }

    #[test]
    fn page_without_label_is_rejected() {
        let mut store = InMemoryStore::new();
        let err = ingestor(&["Tuesday"])
            .ingest_text(&mut store, "Tuesday", "9:00 Breakfast", 2025)
            .unwrap_err();
        assert_eq!(err.kind(), "parse");
        assert!(store.all().is_empty());
    }

    #[test]
    fn unavailable_day_does_not_stop_others() {
        let source = PageSource(HashMap::from([("Tuesday", TUESDAY)]));
        let mut store = InMemoryStore::new();
        let summary = ingestor(&["Monday", "Tuesday"]).ingest_all(&source, &mut store, 2025);
        assert_eq!(summary.failed_days.len(), 1);
        assert_eq!(summary.failed_days[0].day, "Monday");
        assert_eq!(summary.failed_days[0].kind, "source_unavailable");
        assert_eq!(summary.inserted(), 3);
    }
}
