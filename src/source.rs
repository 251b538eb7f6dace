//! Fetching listing pages from the station website.

use crate::error::{ArchiveError, Result};
use log::info;
use reqwest::blocking::Client;
use scraper::Html;
use std::time::Duration;

/// Timeout for one listing page request (seconds).
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Anything that can hand back the visible text of one weekday's listing.
pub trait ScheduleSource {
    fn fetch_day(&self, day: &str) -> Result<String>;
}

/// Listing pages served at `<base_url><weekday in lowercase>`.
pub struct HttpScheduleSource {
    base_url: String,
    client: Client,
}

impl HttpScheduleSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("airtime/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ArchiveError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(HttpScheduleSource {
            base_url: base_url.to_string(),
            client,
        })
    }

    pub fn url_for(&self, day: &str) -> String {
        day_url(&self.base_url, day)
    }
}

impl ScheduleSource for HttpScheduleSource {
    fn fetch_day(&self, day: &str) -> Result<String> {
        let url = self.url_for(day);
        info!("Fetching listing for {day} from {url}");
        let unavailable = |reason: String| ArchiveError::SourceUnavailable {
            day: day.to_string(),
            reason,
        };
        let response = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| unavailable(e.to_string()))?;
        let html = response.text().map_err(|e| unavailable(e.to_string()))?;
        Ok(page_text(&html))
    }
}

fn day_url(base_url: &str, day: &str) -> String {
    let mut url = base_url.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str(&day.to_lowercase());
    url
}

/// Flatten an HTML document to its visible text, skipping script and style
/// bodies.
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();
    for node in document.root_element().descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|e| e.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));
        if !hidden {
            text.push_str(fragment);
        }
    }
    text
}
