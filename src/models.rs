//! Data models for feed requests, planned chunks and fetched items.
//!
//! This module defines the core data structures used throughout the application:
//! - [`DateRange`]: A validated span of UTC calendar days
//! - [`Chunk`]: One bounded sub-request produced by the planner
//! - [`Item`]: A single news-like text item for a scope
//! - [`FetchMode`]: Which fetch capability serves the request
//! - [`GeneratedItem`]: The shape the LLM is asked to return
//! - [`FeedSnapshot`]: The JSON export of a finished session

use crate::error::FeedError;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A span of UTC calendar days, `start <= end`.
///
/// The span is half-open for counting purposes: `2024-01-01..2024-01-10`
/// covers nine days. A range whose start equals its end is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, FeedError> {
        if start > end {
            return Err(FeedError::PlanningInput(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Number of calendar days covered.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `date` falls on one of the covered days (`start <= date < end`).
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One bounded sub-request: a sub-range and how many items to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub range: DateRange,
    pub target_count: usize,
}

/// A news-like text item.
///
/// `id` is assigned once when the fetch response is mapped and never changes.
/// Items are never mutated after they land in the accumulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub timestamp: String,
    pub text: String,
    pub source_label: String,
    pub scope_tag: String,
}

impl Item {
    /// Create an item with a freshly generated id.
    pub fn new(
        timestamp: impl Into<String>,
        text: impl Into<String>,
        source_label: impl Into<String>,
        scope_tag: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: timestamp.into(),
            text: text.into(),
            source_label: source_label.into(),
            scope_tag: scope_tag.into(),
        }
    }
}

/// Selects which fetch capability serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchMode {
    /// Crawl real headlines from a news search feed.
    LiveSearch,
    /// Ask an LLM to generate plausible items.
    Synthetic,
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchMode::LiveSearch => f.write_str("LIVE_SEARCH"),
            FetchMode::Synthetic => f.write_str("SYNTHETIC"),
        }
    }
}

/// One entry as returned by the LLM.
///
/// Field names match the JSON schema in the prompt. `date` and `source` are
/// optional because models drop them more often than the text.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratedItem {
    #[serde(default, alias = "time", alias = "timestamp")]
    pub date: Option<String>,
    #[serde(alias = "headline", alias = "content")]
    pub text: String,
    #[serde(default, alias = "publisher")]
    pub source: Option<String>,
}

/// Either a bare array or an object wrapping it under `items`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GeneratedResponse {
    Bare(Vec<GeneratedItem>),
    Wrapped { items: Vec<GeneratedItem> },
}

impl GeneratedResponse {
    pub fn into_items(self) -> Vec<GeneratedItem> {
        match self {
            GeneratedResponse::Bare(items) => items,
            GeneratedResponse::Wrapped { items } => items,
        }
    }
}

/// The JSON export of one session.
#[derive(Debug, Serialize, Deserialize)]
pub struct FeedSnapshot {
    pub scope: String,
    pub mode: FetchMode,
    pub range: DateRange,
    /// RFC 3339 UTC time the snapshot was taken.
    pub generated_at: String,
    pub items: Vec<Item>,
}

impl FeedSnapshot {
    pub fn new(scope: &str, mode: FetchMode, range: DateRange, items: Vec<Item>) -> Self {
        Self {
            scope: scope.to_string(),
            mode,
            range,
            generated_at: Utc::now().to_rfc3339(),
            items,
        }
    }
}

/// Extract the domain name (before .com/.org/etc) from a URL.
/// For example: "https://www.reuters.com/markets" -> "reuters"
pub fn source_label_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let parts: Vec<&str> = host.split('.').collect();
    if parts.len() >= 2 {
        Some(parts[parts.len() - 2].to_string())
    } else {
        None
    }
}
