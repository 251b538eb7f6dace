//! Extraction of schedule entries from a listing page's visible text.

use crate::error::{ArchiveError, Result};
use crate::timeline::DayLabel;
use regex_lite::Regex;
use std::sync::LazyLock;

/// Marker the station prints against entries carried over from the next day.
const CARRY_OVER_MARKER: &str = "TOMORROW";

// regex-lite's \s and \w are ASCII-only, so non-ASCII spaces and letters
// are spelled out as code point ranges.
static ENTRY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"([0-9]{1,2}[:.][0-9]{2})",
        r"[\s\x{A0}\x{2000}-\x{200A}\x{202F}\x{3000}]+",
        r"([\w\x{A0}\x{C0}-\x{1FFF}\x{2C00}-\x{D7FF}\x{F900}-\x{FFEF}\x{10000}-\x{10FFFF}'’&() ]*)",
        r"(?:[-–] (.*))?",
    ))
    .expect("Invalid regex pattern for listing entries")
});

static DAY_LABEL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\w*day\D+(\d+)(?:st|nd|rd|th)\W+([A-Z][a-z]+)")
        .expect("Invalid regex pattern for day label")
});

/// One raw (time, title, subtitle) triple, in page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub time_text: String,
    pub title: String,
    pub subtitle: Option<String>,
}

/// Find every schedule entry in the page text, in order of appearance.
pub fn extract_entries(text: &str) -> Vec<ListingEntry> {
    ENTRY_PATTERN
        .captures_iter(text)
        .map(|caps| ListingEntry {
            time_text: caps[1].to_string(),
            title: clean(caps.get(2).map_or("", |m| m.as_str())),
            subtitle: caps
                .get(3)
                .map(|m| clean(m.as_str()))
                .filter(|s| !s.is_empty()),
        })
        .collect()
}

/// Find the first "Monday 14th October" style label on the page.
pub fn extract_day_label(text: &str) -> Result<DayLabel> {
    let caps = DAY_LABEL_PATTERN
        .captures(text)
        .ok_or_else(|| ArchiveError::parse(preview(text), "no day label on page"))?;
    DayLabel::parse(&caps[1], &caps[2])
}

fn clean(raw: &str) -> String {
    raw.replace(CARRY_OVER_MARKER, "")
        .replace('\u{a0}', " ")
        .trim()
        .to_string()
}

fn preview(text: &str) -> String {
    text.chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Month;

    const PAGE: &str = "\
Angel Radio
Tuesday 14th October
6:00 Early Start - with Pat
9.00 Morning Melodies
12:00 Lunchtime Requests - Ask Anything
1:15 Afternoon Tea
11:00 Late Show
12:00 TOMORROW Night Owls - TOMORROW
";

    #[test]
    fn extracts_entries_in_order() {
        let entries = extract_entries(PAGE);
        assert_eq!(entries.len(), 6);
        assert_eq!(entries[0].time_text, "6:00");
        assert_eq!(entries[0].title, "Early Start");
        assert_eq!(entries[0].subtitle.as_deref(), Some("with Pat"));
        assert_eq!(entries[1].time_text, "9.00");
        assert_eq!(entries[1].title, "Morning Melodies");
        assert!(entries[1].subtitle.is_none());
    }

    #[test]
    fn strips_carry_over_marker() {
        let entries = extract_entries(PAGE);
        let last = entries.last().unwrap();
        assert_eq!(last.title, "Night Owls");
        assert!(last.subtitle.is_none());
    }

    #[test]
    fn accented_titles_are_kept_whole() {
        let entries = extract_entries("9:00 Café Hour - with Zoë\n10:30 Доброе утро");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Café Hour");
        assert_eq!(entries[0].subtitle.as_deref(), Some("with Zoë"));
        assert_eq!(entries[1].title, "Доброе утро");
    }

    #[test]
    fn non_breaking_spaces_separate_and_normalise() {
        let entries = extract_entries("9:00\u{a0}Breakfast\n10:00\u{a0}Hymns\u{a0}&\u{a0}Praise");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].time_text, "9:00");
        assert_eq!(entries[0].title, "Breakfast");
        assert_eq!(entries[1].title, "Hymns & Praise");
    }

    #[test]
    fn finds_day_label() {
        let label = extract_day_label(PAGE).unwrap();
        assert_eq!(label.day_of_month, 14);
        assert_eq!(label.month, Month::October);
    }

    #[test]
    fn missing_day_label_is_parse_error() {
        let err = extract_day_label("9:00 Breakfast").unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn empty_text_has_no_entries() {
        assert!(extract_entries("").is_empty());
        assert!(extract_entries("no times here").is_empty());
    }
}
