//! LLM API interaction with exponential backoff retry logic.
//!
//! This module provides the interface the synthetic fetcher uses to talk to an
//! OpenAI-compatible LLM API. Transient failures are retried with exponential
//! backoff and jitter; authorization failures are returned immediately since
//! retrying a rejected key only burns time.
//!
//! # Architecture
//!
//! - [`AskAsync`]: Core trait defining async LLM interaction
//! - [`AskFnWrapper`]: Wraps the `awful_aj` library's `ask` function
//! - [`RetryAsk`]: Decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! - Maximum 5 retry attempts
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::error::FetchError;
use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Trait for async LLM interaction.
pub trait AskAsync {
    /// Send a prompt to the LLM and receive its raw text response.
    async fn ask(&self, text: &str) -> Result<String, FetchError>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..max_jitter)
/// ```
pub struct RetryAsk<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
    max_jitter_ms: u64,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// ```ignore
    /// let client = AskFnWrapper { config: &config, template: &template };
    /// let retry_client = RetryAsk::new(client, 5, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
            max_jitter_ms: 250,
        }
    }

    pub fn with_max_jitter_ms(mut self, max_jitter_ms: u64) -> Self {
        self.max_jitter_ms = max_jitter_ms;
        self
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) if e.is_fatal() => {
                    error!(attempt, error = %e, "ask() rejected; not retrying");
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=self.max_jitter_ms);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Wrapper around `awful_aj::api::ask` that implements [`AskAsync`].
#[derive(Debug)]
pub struct AskFnWrapper<'a> {
    /// LLM configuration (API keys, endpoints, model settings).
    pub config: &'a AwfulJadeConfig,
    /// Chat template defining the conversation structure.
    pub template: &'a ChatTemplate,
}

impl<'a> AskAsync for AskFnWrapper<'a> {
    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let res = ask(self.config, text.to_string(), self.template, None, None).await;
        let dt = t0.elapsed();

        res.map_err(|e| {
            warn!(elapsed_ms = dt.as_millis(), error = %e, "API call failed");
            FetchError::classify(e.to_string())
        })
    }
}

/// Send a prompt through `awful_aj` with the standard retry policy.
///
/// - Up to 5 retry attempts
/// - Exponential backoff: 1s, 2s, 4s, 8s, 16s (capped at 30s)
/// - Authorization failures short-circuit
#[instrument(level = "info", skip_all)]
pub async fn ask_with_backoff(
    config: &AwfulJadeConfig,
    prompt: &str,
    template: &ChatTemplate,
) -> Result<String, FetchError> {
    let t0 = Instant::now();
    let client = AskFnWrapper { config, template };
    let api = RetryAsk::new(client, 5, StdDuration::from_secs(1));
    let res = api.ask(prompt).await;
    let dt = t0.elapsed();

    match &res {
        Ok(_) => info!(elapsed_ms_total = dt.as_millis(), "ask_with_backoff succeeded"),
        Err(e) => {
            error!(elapsed_ms_total = dt.as_millis(), error = %e, "ask_with_backoff failed")
        }
    }
    res
}
