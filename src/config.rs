//! Run configuration: YAML settings merged under CLI flags.
//!
//! Precedence, highest first: command-line flag, settings file, built-in
//! default. The merged, validated result is a [`RunRequest`].
//!
//! ```yaml
//! # feed.yaml
//! density: 2.0
//! concurrency: 4
//! pause_ms: 1500
//! items_per_request: 30
//! template: ticker_feed_synthetic
//! user_agent: "Mozilla/5.0 (compatible; awful_ticker_feed)"
//! search_url: https://news.google.com/rss/search
//! ```

use crate::cli::Cli;
use crate::error::FeedError;
use crate::models::{DateRange, FetchMode};
use crate::scheduler::{DEFAULT_CONCURRENCY, DEFAULT_PAUSE, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_DENSITY: f64 = 1.0;
pub const DEFAULT_ITEMS_PER_REQUEST: usize = 25;
pub const DEFAULT_TEMPLATE: &str = "ticker_feed_synthetic";

/// Optional defaults read from a YAML file.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedSettings {
    pub density: Option<f64>,
    pub concurrency: Option<usize>,
    pub pause_ms: Option<u64>,
    pub items_per_request: Option<usize>,
    pub template: Option<String>,
    pub user_agent: Option<String>,
    /// Override for the live search endpoint.
    pub search_url: Option<String>,
}

impl FeedSettings {
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, FeedError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let settings = Self::from_yaml(&raw)?;
        info!(?settings, "Loaded feed settings");
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, FeedError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }
}

/// Everything one invocation needs, validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub scope: String,
    pub range: DateRange,
    pub mode: FetchMode,
    pub density: f64,
    pub items_per_request: usize,
    pub scheduler: SchedulerConfig,
    pub template: String,
    pub user_agent: Option<String>,
    pub search_url: Option<String>,
    pub llm_config: Option<PathBuf>,
    pub csv_output: PathBuf,
    pub json_output: Option<PathBuf>,
    pub exclude_sources: Vec<String>,
}

impl RunRequest {
    /// Merge CLI flags over `settings` and validate.
    pub fn from_cli(cli: Cli, settings: FeedSettings) -> Result<Self, FeedError> {
        let scope = cli.scope.trim().to_string();
        if scope.is_empty() {
            return Err(FeedError::Config("scope must not be empty".into()));
        }

        let range = DateRange::new(cli.start, cli.end)?;

        let density = cli.density.or(settings.density).unwrap_or(DEFAULT_DENSITY);
        if !density.is_finite() {
            return Err(FeedError::Config(format!("density must be finite, got {density}")));
        }

        let concurrency = cli
            .concurrency
            .or(settings.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(FeedError::Config("concurrency must be at least 1".into()));
        }

        let items_per_request = cli
            .items_per_request
            .or(settings.items_per_request)
            .unwrap_or(DEFAULT_ITEMS_PER_REQUEST);
        if items_per_request == 0 {
            return Err(FeedError::Config("items per request must be at least 1".into()));
        }

        let pause = cli
            .pause_ms
            .or(settings.pause_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_PAUSE);

        Ok(Self {
            scope,
            range,
            mode: cli.mode,
            density,
            items_per_request,
            scheduler: SchedulerConfig { concurrency, pause },
            template: cli
                .template
                .or(settings.template)
                .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
            user_agent: settings.user_agent,
            search_url: settings.search_url,
            llm_config: cli.llm_config,
            csv_output: cli.csv_output,
            json_output: cli.json_output,
            exclude_sources: cli.exclude_sources,
        })
    }
}
