//! Live headline search through Google News RSS.
//!
//! Each chunk is one search query of the form
//! `"<scope> after:<day before start> before:<end>"`. The feed is parsed, each
//! entry is dated from its `pubDate`, and only entries dated inside the
//! chunk (`start <= date < end`) are kept so that adjacent chunks never
//! return the same day twice.
//!
//! # URL Pattern
//!
//! ```text
//! https://news.google.com/rss/search?q=AAPL%20after%3A2023-12-31%20before%3A2024-01-10&hl=en-US&gl=US&ceid=US:en
//! ```

use crate::error::FetchError;
use crate::fetch::{FetchCapability, FetchOutcome};
use crate::models::{DateRange, Item, source_label_from_url};
use crate::utils::html_to_text;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

pub const GOOGLE_NEWS_RSS: &str = "https://news.google.com/rss/search";
const DEFAULT_USER_AGENT: &str = concat!("awful_ticker_feed/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct LiveSearchFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl LiveSearchFetcher {
    pub fn new(user_agent: Option<&str>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: GOOGLE_NEWS_RSS.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Full search URL for one chunk.
    pub fn search_url(&self, scope: &str, range: &DateRange) -> String {
        let after = range.start - Duration::days(1);
        let query = format!("{scope} after:{after} before:{}", range.end);
        format!(
            "{}?q={}&hl=en-US&gl=US&ceid=US:en",
            self.base_url,
            urlencoding::encode(&query)
        )
    }
}

impl FetchCapability for LiveSearchFetcher {
    #[instrument(level = "info", skip_all, fields(%scope, %range, target_count))]
    async fn fetch(&self, scope: &str, range: &DateRange, target_count: usize) -> FetchOutcome {
        let url = self.search_url(scope, range);
        debug!(%url, "Searching");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("request failed: {e}")))?;

        let status = resp.status();
        if let Some(err) = status_error(status) {
            warn!(%status, "Search rejected");
            return Err(err);
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Transient(format!("reading body: {e}")))?;
        let items = parse_feed(&body, scope, range, target_count)?;
        info!(items = items.len(), "Fetched live items");
        Ok(items)
    }
}

/// Map a non-success HTTP status onto a fetch error.
pub fn status_error(status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        None
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Some(FetchError::Auth(format!("HTTP {status}")))
    } else {
        Some(FetchError::Transient(format!("HTTP {status}")))
    }
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    source: Option<RssSource>,
}

#[derive(Debug, Deserialize)]
struct RssSource {
    #[serde(rename = "@url", default)]
    url: Option<String>,
    #[serde(rename = "$text", default)]
    name: String,
}

/// Parse a Google News RSS document into items dated inside `range`.
pub fn parse_feed(
    xml: &str,
    scope: &str,
    range: &DateRange,
    target_count: usize,
) -> Result<Vec<Item>, FetchError> {
    let rss: Rss = quick_xml::de::from_str(xml)
        .map_err(|e| FetchError::Transient(format!("malformed feed: {e}")))?;

    let items = rss
        .channel
        .items
        .into_iter()
        .filter_map(|entry| {
            let date = entry
                .pub_date
                .as_deref()
                .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())?
                .with_timezone(&Utc)
                .date_naive();
            if !range.contains(date) {
                return None;
            }

            let source_name = entry
                .source
                .as_ref()
                .map(|s| s.name.trim().to_string())
                .filter(|s| !s.is_empty());
            let label = source_name
                .clone()
                .or_else(|| entry.source.as_ref()?.url.as_deref().and_then(source_label_from_url))
                .unwrap_or_else(|| "unknown".to_string());

            let text = match entry.title.as_deref().map(str::trim) {
                Some(t) if !t.is_empty() => strip_publisher_suffix(t, source_name.as_deref()),
                _ => html_to_text(entry.description.as_deref().unwrap_or_default()),
            };
            if text.is_empty() {
                return None;
            }

            Some(Item::new(date.to_string(), text, label, scope))
        })
        .take(target_count)
        .collect();
    Ok(items)
}

/// Google appends `" - Publisher"` to every headline.
fn strip_publisher_suffix(title: &str, publisher: Option<&str>) -> String {
    if let Some(p) = publisher {
        if let Some(stripped) = title.strip_suffix(p) {
            if let Some(stripped) = stripped.trim_end().strip_suffix('-') {
                return stripped.trim_end().to_string();
            }
        }
    }
    title.to_string()
}
