//! LLM-backed synthetic feed generator.
//!
//! Each chunk becomes one prompt asking the model for `target_count`
//! plausible news items about the scope, dated inside the chunk's range, as a
//! JSON array. The response goes through the same defensive parsing as any
//! other model output: code fences are stripped, a truncated response is
//! re-asked once, and a non-conforming response fails the chunk.

use crate::api::ask_with_backoff;
use crate::error::{FeedError, FetchError};
use crate::fetch::{FetchCapability, FetchOutcome};
use crate::models::{DateRange, GeneratedResponse, Item};
use crate::utils::{looks_truncated, strip_code_fences, truncate_for_log};
use awful_aj::{config, config::AwfulJadeConfig, config_dir, template, template::ChatTemplate};
use chrono::NaiveDate;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Source label used when the model does not name one.
pub const DEFAULT_SOURCE_LABEL: &str = "synthetic";

#[derive(Debug)]
pub struct SyntheticFetcher {
    config: AwfulJadeConfig,
    template: ChatTemplate,
}

impl SyntheticFetcher {
    pub fn new(config: AwfulJadeConfig, template: ChatTemplate) -> Self {
        Self { config, template }
    }

    /// Load the LLM config and chat template.
    ///
    /// `llm_config` defaults to `config.yaml` in the `awful_aj` config dir.
    #[instrument(level = "info", skip_all, fields(template = %template_name))]
    pub async fn load(llm_config: Option<&Path>, template_name: &str) -> Result<Self, FeedError> {
        let template = template::load_template(template_name)
            .await
            .map_err(|e| FeedError::Config(format!("loading template {template_name}: {e}")))?;
        info!("Loaded template");

        let conf_file = match llm_config {
            Some(p) => p.to_path_buf(),
            None => config_dir()
                .map_err(|e| FeedError::Config(format!("locating config dir: {e}")))?
                .join("config.yaml"),
        };
        let config_path = conf_file
            .to_str()
            .ok_or_else(|| {
                FeedError::Config(format!("not a valid config filename: {}", conf_file.display()))
            })?;
        let config = config::load_config(config_path)
            .map_err(|e| FeedError::Config(format!("loading {config_path}: {e}")))?;
        info!(config_path, "Loaded configuration");

        Ok(Self::new(config, template))
    }
}

impl FetchCapability for SyntheticFetcher {
    #[instrument(level = "info", skip_all, fields(%scope, %range, target_count))]
    async fn fetch(&self, scope: &str, range: &DateRange, target_count: usize) -> FetchOutcome {
        let prompt = build_prompt(scope, range, target_count);

        let response = ask_with_backoff(&self.config, &prompt, &self.template).await?;
        let mut parsed = parse_generated(&response, scope, range, target_count);

        // If the parse failed due to EOF (truncation), re-ask ONCE
        if let Err(ref e) = parsed {
            if looks_truncated(e) {
                warn!(error = %e, "EOF while parsing; re-asking once");
                let retry = ask_with_backoff(&self.config, &prompt, &self.template).await?;
                parsed = parse_generated(&retry, scope, range, target_count);
            }
        }

        match parsed {
            Ok(items) => {
                debug!(items = items.len(), "Generated items");
                Ok(items)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    response_preview = %truncate_for_log(&response, 300),
                    "Model returned non-conforming JSON"
                );
                Err(FetchError::Transient(format!("non-conforming model output: {e}")))
            }
        }
    }
}

/// Build the user prompt for one chunk.
pub fn build_prompt(scope: &str, range: &DateRange, target_count: usize) -> String {
    format!(
        "Generate {target_count} realistic, distinct news items about {scope} published between \
         {start} and {end}. Spread the dates across the period. Respond with only a JSON array of \
         objects with the keys \"date\" (YYYY-MM-DD), \"text\" (one or two sentences) and \
         \"source\" (the publication name).",
        start = range.start,
        end = range.end,
    )
}

/// Map a raw model response onto items.
///
/// Entries with empty text are dropped; at most `target_count` are kept.
/// Dates that do not parse as `YYYY-MM-DD` fall back to the range start.
pub fn parse_generated(
    raw: &str,
    scope: &str,
    range: &DateRange,
    target_count: usize,
) -> Result<Vec<Item>, serde_json::Error> {
    let response: GeneratedResponse = serde_json::from_str(strip_code_fences(raw))?;
    let items = response
        .into_items()
        .into_iter()
        .filter(|g| !g.text.trim().is_empty())
        .take(target_count)
        .map(|g| {
            let date = g
                .date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d.get(..10).unwrap_or(d), "%Y-%m-%d").ok())
                .unwrap_or(range.start);
            let source = g
                .source
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SOURCE_LABEL.to_string());
            Item::new(date.to_string(), g.text.trim(), source, scope)
        })
        .collect();
    Ok(items)
}
