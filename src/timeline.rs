//! Timeline reconstruction for meridian-less schedule listings.
//!
//! A listing page gives clock times like "9:00", "12:30", "1:15" with no
//! AM/PM marker and no date boundary. Reading them in order, the
//! reconstructor decides when the listing has moved into the afternoon and
//! when it has crossed midnight, and places every entry on an absolute
//! timeline anchored to the page's day label.
//!
//! The decision is a three-state machine driven only by the previous
//! *scraped* hour:
//!
//! | state       | rollover test passes | hour < previous | hour adjustment      |
//! |-------------|----------------------|-----------------|----------------------|
//! | `Am`        | (not evaluated)      | → `Pm`          | none                 |
//! | `Pm`        | → `PmNextDay`        | stays           | +12 when hour < 12   |
//! | `PmNextDay` | stays                | stays           | none, date + 1 day   |
//!
//! The rollover test is a heuristic. It assumes the listing starts before
//! midday and crosses midnight at most once.

use crate::error::{ArchiveError, Result};
use crate::listing::ListingEntry;
use crate::programme::Programme;
use chrono::{Duration, Month, NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ambiguous clock reading, exactly as scraped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockToken {
    pub hour: u32,
    pub minute: u32,
}

impl ClockToken {
    pub fn new(hour: u32, minute: u32) -> Self {
        ClockToken { hour, minute }
    }
}

/// Parse "H:MM", "HH:MM" or the dotted "H.MM" form.
pub fn parse_clock_token(text: &str) -> Result<ClockToken> {
    let trimmed = text.trim();
    let normalized = trimmed.replace('.', ":");
    let (hour, minute) = normalized
        .split_once(':')
        .ok_or_else(|| ArchiveError::parse(trimmed, "expected H:MM"))?;
    let hour: u32 = hour
        .parse()
        .map_err(|_| ArchiveError::parse(trimmed, "hour is not a number"))?;
    let minute: u32 = minute
        .parse()
        .map_err(|_| ArchiveError::parse(trimmed, "minute is not a number"))?;
    if hour > 23 || minute > 59 {
        return Err(ArchiveError::parse(trimmed, "time out of range"));
    }
    Ok(ClockToken { hour, minute })
}

/// The "Monday 14th October" style label printed once per listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayLabel {
    pub day_of_month: u32,
    pub month: Month,
}

impl DayLabel {
    /// Build a label from the scraped day number and month name.
    /// Month names may be full or three-letter, in any case.
    pub fn parse(day_of_month: &str, month_name: &str) -> Result<Self> {
        let day_of_month: u32 = day_of_month.trim().parse().map_err(|_| {
            ArchiveError::parse(day_of_month, "day of month is not a number")
        })?;
        let month: Month = month_name
            .trim()
            .parse()
            .map_err(|_| ArchiveError::parse(month_name, "unknown month name"))?;
        Ok(DayLabel {
            day_of_month,
            month,
        })
    }

    /// Resolve the label to a calendar date in `year`.
    pub fn anchor(&self, year: i32) -> Result<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month.number_from_month(), self.day_of_month)
            .ok_or_else(|| ArchiveError::parse(self.to_string(), format!("no such date in {year}")))
    }
}

impl fmt::Display for DayLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.day_of_month, self.month.name())
    }
}

/// How eagerly a drop in hour is read as a midnight crossing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloverRule {
    /// Fires only when the previous hour was 10, 11 or 12 and the new hour is
    /// at least twelve lower. In practice that is a 12:xx to 0:xx drop.
    #[default]
    Strict,
    /// Also fires on any drop below 10 o'clock from the 10/11/12 band, so a
    /// "12:30, 1:00" tail lands on the next day. Changes results for listings
    /// the strict rule handles, so it is opt-in.
    Lenient,
}

impl RolloverRule {
    pub fn crosses_midnight(self, previous_hour: u32, hour: u32) -> bool {
        if !(10..=12).contains(&previous_hour) {
            return false;
        }
        let strict = i64::from(hour) <= i64::from(previous_hour) - 12;
        match self {
            RolloverRule::Strict => strict,
            RolloverRule::Lenient => strict || (hour < previous_hour && hour < 10),
        }
    }

    pub fn from_str_loose(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(RolloverRule::Strict),
            "lenient" => Ok(RolloverRule::Lenient),
            _ => Err(ArchiveError::Config(format!(
                "unknown rollover rule '{s}', expected strict or lenient"
            ))),
        }
    }
}

impl fmt::Display for RolloverRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RolloverRule::Strict => write!(f, "strict"),
            RolloverRule::Lenient => write!(f, "lenient"),
        }
    }
}

/// Where the scan currently believes it is in the broadcast day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MeridianState {
    #[default]
    Am,
    Pm,
    PmNextDay,
}

impl MeridianState {
    /// Advance on one token. Both tests read the same pre-update
    /// `previous_hour`; the rollover test only applies once already in `Pm`.
    pub fn step(self, previous_hour: u32, hour: u32, rule: RolloverRule) -> Self {
        let mut state = self;
        if state == MeridianState::Pm && rule.crosses_midnight(previous_hour, hour) {
            state = MeridianState::PmNextDay;
        }
        if hour < previous_hour && state == MeridianState::Am {
            state = MeridianState::Pm;
        }
        state
    }

    /// Convert a scraped hour into a 24-hour clock hour for this state.
    pub fn adjust_hour(self, hour: u32) -> u32 {
        if self == MeridianState::Pm && hour < 12 {
            hour + 12
        } else {
            hour
        }
    }

    pub fn is_next_day(self) -> bool {
        self == MeridianState::PmNextDay
    }
}

/// Sequential scanner placing tokens for one listing day.
#[derive(Debug, Clone)]
pub struct TimelineReconstructor {
    date: NaiveDate,
    rule: RolloverRule,
    state: MeridianState,
    previous_hour: u32,
}

impl TimelineReconstructor {
    pub fn new(date: NaiveDate, rule: RolloverRule) -> Self {
        TimelineReconstructor {
            date,
            rule,
            state: MeridianState::Am,
            previous_hour: 0,
        }
    }

    pub fn state(&self) -> MeridianState {
        self.state
    }

    /// Place the next token on the timeline. An out-of-range token is
    /// rejected before it can move the state machine.
    pub fn place(&mut self, token: ClockToken) -> Result<NaiveDateTime> {
        if token.hour > 23 || token.minute > 59 {
            return Err(ArchiveError::parse(
                format!("{}:{:02}", token.hour, token.minute),
                "time out of range",
            ));
        }
        let state = self.state.step(self.previous_hour, token.hour, self.rule);
        self.state = state;
        self.previous_hour = token.hour;

        let hour = state.adjust_hour(token.hour);
        let time = NaiveTime::from_hms_opt(hour, token.minute, 0).ok_or_else(|| {
            ArchiveError::parse(format!("{}:{:02}", token.hour, token.minute), "not a clock time")
        })?;
        let mut at = self.date.and_time(time);
        if state.is_next_day() {
            at += Duration::days(1);
        }
        Ok(at)
    }

    /// Place a whole ordered token sequence.
    pub fn place_all(&mut self, tokens: &[ClockToken]) -> Result<Vec<NaiveDateTime>> {
        tokens.iter().map(|t| self.place(*t)).collect()
    }
}

/// Programmes built from one listing, plus the entries that had to be dropped.
#[derive(Debug, Default)]
pub struct Timeline {
    pub programmes: Vec<Programme>,
    pub rejected: Vec<ArchiveError>,
}

/// Turn scraped listing entries into programmes on `date`.
///
/// Entries whose time text does not parse are reported and skipped; they do
/// not advance the state machine.
pub fn reconstruct(entries: &[ListingEntry], date: NaiveDate, rule: RolloverRule) -> Timeline {
    let mut scanner = TimelineReconstructor::new(date, rule);
    let mut timeline = Timeline::default();

    for entry in entries {
        let placed = parse_clock_token(&entry.time_text).and_then(|token| scanner.place(token));
        match placed {
            Ok(start) => {
                debug!("{} -> {} ({:?})", entry.time_text, start, scanner.state());
                timeline.programmes.push(Programme::new(
                    start,
                    entry.title.clone(),
                    entry.subtitle.clone(),
                ));
            }
            Err(err) => {
                warn!("Dropping listing entry '{}': {}", entry.title, err);
                timeline.rejected.push(err);
            }
        }
    }
    timeline
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 14).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn tokens(list: &[(u32, u32)]) -> Vec<ClockToken> {
        list.iter().map(|&(h, m)| ClockToken::new(h, m)).collect()
    }

    fn entry(time: &str, title: &str) -> ListingEntry {
        ListingEntry {
            time_text: time.to_string(),
            title: title.to_string(),
            subtitle: None,
        }
    }

    #[test]
    fn parse_clock_token_colon_and_dot() {
        assert_eq!(parse_clock_token("9:05").unwrap(), ClockToken::new(9, 5));
        assert_eq!(parse_clock_token("12.30").unwrap(), ClockToken::new(12, 30));
        assert_eq!(parse_clock_token(" 1:00 ").unwrap(), ClockToken::new(1, 0));
    }

    #[test]
    fn parse_clock_token_rejects_garbage() {
        assert!(parse_clock_token("9").is_err());
        assert!(parse_clock_token("a:00").is_err());
        assert!(parse_clock_token("9:xx").is_err());
        assert!(parse_clock_token("9:60").is_err());
        assert!(parse_clock_token("").is_err());
    }

    #[test]
    fn day_label_accepts_full_and_short_months() {
        let label = DayLabel::parse("14", "October").unwrap();
        assert_eq!(label.anchor(2025).unwrap(), day());
        let label = DayLabel::parse("3", "jan").unwrap();
        assert_eq!(label.month, Month::January);
        assert!(DayLabel::parse("3", "Smarch").is_err());
        assert!(DayLabel::parse("x", "May").is_err());
    }

    #[test]
    fn day_label_rejects_impossible_dates() {
        let label = DayLabel::parse("31", "April").unwrap();
        assert!(label.anchor(2025).is_err());
        let leap = DayLabel::parse("29", "February").unwrap();
        assert!(leap.anchor(2024).is_ok());
        assert!(leap.anchor(2025).is_err());
    }

    #[test]
    fn morning_only_listing_never_leaves_am() {
        let mut scanner = TimelineReconstructor::new(day(), RolloverRule::Strict);
        let placed = scanner
            .place_all(&tokens(&[(6, 0), (7, 30), (9, 0), (9, 0), (10, 15), (11, 59)]))
            .unwrap();
        assert_eq!(scanner.state(), MeridianState::Am);
        assert!(placed.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(placed[0], at(14, 6, 0));
        assert_eq!(placed[5], at(14, 11, 59));
    }

    #[test]
    fn afternoon_flip_after_noon() {
        let mut scanner = TimelineReconstructor::new(day(), RolloverRule::Strict);
        let placed = scanner
            .place_all(&tokens(&[(9, 0), (10, 30), (12, 0), (1, 15), (2, 0)]))
            .unwrap();
        assert_eq!(
            placed,
            vec![
                at(14, 9, 0),
                at(14, 10, 30),
                at(14, 12, 0),
                at(14, 13, 15),
                at(14, 14, 0)
            ]
        );
        assert_eq!(scanner.state(), MeridianState::Pm);
    }

    #[test]
    fn strict_rollover_on_drop_to_zero_hour() {
        let mut scanner = TimelineReconstructor::new(day(), RolloverRule::Strict);
        let placed = scanner
            .place_all(&tokens(&[
                (9, 0),
                (11, 45),
                (12, 0),
                (1, 0),
                (6, 0),
                (10, 0),
                (11, 0),
                (12, 0),
                (12, 30),
                (0, 30),
                (1, 0),
            ]))
            .unwrap();
        assert_eq!(placed[3], at(14, 13, 0));
        assert_eq!(placed[6], at(14, 23, 0));
        assert_eq!(placed[7], at(14, 12, 0));
        assert_eq!(placed[9], at(15, 0, 30));
        assert_eq!(placed[10], at(15, 1, 0));
        assert_eq!(scanner.state(), MeridianState::PmNextDay);
    }

    #[test]
    fn strict_rule_keeps_one_oclock_after_twelve_on_same_day() {
        // 12 -> 1 is the afternoon flip under the strict rule, never a rollover.
        let mut scanner = TimelineReconstructor::new(day(), RolloverRule::Strict);
        let placed = scanner
            .place_all(&tokens(&[(9, 0), (11, 45), (12, 0), (12, 15), (12, 30), (1, 0)]))
            .unwrap();
        assert_eq!(placed[5], at(14, 13, 0));
        assert_eq!(scanner.state(), MeridianState::Pm);
    }

    #[test]
    fn lenient_rollover_moves_late_tail_to_next_day() {
        let mut scanner = TimelineReconstructor::new(day(), RolloverRule::Lenient);
        let placed = scanner
            .place_all(&tokens(&[
                (9, 0),
                (12, 0),
                (1, 0),
                (8, 0),
                (11, 45),
                (12, 0),
                (12, 15),
                (12, 30),
                (1, 0),
                (2, 0),
            ]))
            .unwrap();
        assert_eq!(placed[2], at(14, 13, 0));
        assert_eq!(placed[4], at(14, 23, 45));
        assert_eq!(placed[7], at(14, 12, 30));
        assert_eq!(placed[8], at(15, 1, 0));
        assert_eq!(placed[9], at(15, 2, 0));
    }

    #[test]
    fn rollover_needs_pm_first() {
        // A drop from 12 straight to 0 in the morning only flips to PM.
        let state = MeridianState::Am.step(12, 0, RolloverRule::Strict);
        assert_eq!(state, MeridianState::Pm);
        let state = MeridianState::Pm.step(12, 0, RolloverRule::Strict);
        assert_eq!(state, MeridianState::PmNextDay);
    }

    #[test]
    fn rollover_needs_late_evening_previous_hour() {
        assert!(!RolloverRule::Strict.crosses_midnight(9, 0));
        assert!(!RolloverRule::Lenient.crosses_midnight(9, 1));
        assert!(RolloverRule::Strict.crosses_midnight(12, 0));
        assert!(!RolloverRule::Strict.crosses_midnight(11, 0));
        assert!(RolloverRule::Lenient.crosses_midnight(11, 0));
        assert!(!RolloverRule::Lenient.crosses_midnight(12, 10));
    }

    #[test]
    fn next_day_state_is_sticky() {
        let state = MeridianState::PmNextDay.step(0, 11, RolloverRule::Strict);
        assert_eq!(state, MeridianState::PmNextDay);
        assert_eq!(state.adjust_hour(11), 11);
        assert_eq!(MeridianState::Pm.adjust_hour(12), 12);
        assert_eq!(MeridianState::Pm.adjust_hour(3), 15);
    }

    #[test]
    fn previous_hour_tracks_scraped_value() {
        // 11 is remembered as 11, not 23, so the band check sees it.
        let mut scanner = TimelineReconstructor::new(day(), RolloverRule::Lenient);
        let placed = scanner
            .place_all(&tokens(&[(9, 0), (12, 0), (1, 0), (11, 0), (1, 0)]))
            .unwrap();
        assert_eq!(placed[3], at(14, 23, 0));
        assert_eq!(placed[4], at(15, 1, 0));
    }

    #[test]
    fn out_of_range_token_leaves_scan_untouched() {
        let mut scanner = TimelineReconstructor::new(day(), RolloverRule::Strict);
        scanner.place(ClockToken::new(12, 0)).unwrap();
        assert!(scanner.place(ClockToken::new(1, 75)).is_err());
        assert!(scanner.place(ClockToken::new(30, 0)).is_err());
        assert_eq!(scanner.state(), MeridianState::Am);

        // Still compared against 12, so 1:00 is the afternoon flip.
        assert_eq!(scanner.place(ClockToken::new(1, 0)).unwrap(), at(14, 13, 0));
    }

    #[test]
    fn reconstruct_drops_bad_tokens_without_advancing() {
        let entries = vec![
            entry("9:00", "Breakfast"),
            entry("1O:00", "Typo"),
            entry("12:00", "Lunch"),
            entry("1:00", "Matinee"),
        ];
        let timeline = reconstruct(&entries, day(), RolloverRule::Strict);
        assert_eq!(timeline.rejected.len(), 1);
        assert_eq!(timeline.programmes.len(), 3);
        assert_eq!(timeline.programmes[2].title, "Matinee");
        assert_eq!(timeline.programmes[2].start_time, at(14, 13, 0));
        assert_eq!(timeline.programmes[2].end_time, at(14, 14, 0));
    }

    #[test]
    fn rollover_rule_parsing_and_serde() {
        assert_eq!(RolloverRule::from_str_loose("LENIENT").unwrap(), RolloverRule::Lenient);
        assert!(RolloverRule::from_str_loose("sometimes").is_err());
        let json = serde_json::to_string(&RolloverRule::Strict).unwrap();
        assert_eq!(json, "\"strict\"");
        assert_eq!(RolloverRule::default().to_string(), "strict");
    }
}
