//! Fetch capabilities: where feed items come from.
//!
//! The scheduler only knows [`FetchCapability`]. Concrete sources:
//!
//! | Mode | Module | Backend |
//! |------|--------|---------|
//! | `LIVE_SEARCH` | [`live`] | Google News RSS search |
//! | `SYNTHETIC` | [`synthetic`] | OpenAI-compatible LLM via `awful_aj` |
//!
//! Both map their failures onto [`FetchError`]: a rejected credential is
//! `Auth` and aborts the run, everything else is `Transient` and only costs
//! the chunk.

pub mod live;
pub mod synthetic;

use crate::error::FetchError;
use crate::models::{DateRange, FetchMode, Item};

pub use live::LiveSearchFetcher;
pub use synthetic::SyntheticFetcher;

/// Result of fetching one chunk.
pub type FetchOutcome = Result<Vec<Item>, FetchError>;

/// An async source of items for a scope over a date range.
pub trait FetchCapability {
    /// Fetch up to `target_count` items for `scope` within `range`.
    async fn fetch(&self, scope: &str, range: &DateRange, target_count: usize) -> FetchOutcome;
}

/// The fetcher selected by [`FetchMode`].
#[derive(Debug)]
pub enum FeedFetcher {
    Live(LiveSearchFetcher),
    Synthetic(SyntheticFetcher),
}

impl FeedFetcher {
    pub fn mode(&self) -> FetchMode {
        match self {
            FeedFetcher::Live(_) => FetchMode::LiveSearch,
            FeedFetcher::Synthetic(_) => FetchMode::Synthetic,
        }
    }
}

impl FetchCapability for FeedFetcher {
    async fn fetch(&self, scope: &str, range: &DateRange, target_count: usize) -> FetchOutcome {
        match self {
            FeedFetcher::Live(f) => f.fetch(scope, range, target_count).await,
            FeedFetcher::Synthetic(f) => f.fetch(scope, range, target_count).await,
        }
    }
}
