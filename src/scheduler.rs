//! Windowed, cancellable execution of planned chunks.
//!
//! Chunks are dispatched in consecutive windows of at most `concurrency`
//! fetches. Every window is a fan-out/fan-in barrier: all of its fetches are
//! awaited before the next window starts, so no more than `concurrency`
//! fetches are ever in flight.
//!
//! # Failure handling
//!
//! Each fetch settles independently. A transient failure is counted and the
//! run goes on. A fatal failure (rejected credential) lets the current window
//! drain, keeping whatever its siblings returned, and then aborts the run
//! with [`FeedError::Fatal`].
//!
//! # Cancellation
//!
//! The [`CancellationToken`] is checked before each window. It never
//! preempts an in-flight fetch; results that arrive after the cancel are
//! still appended. A cancel during the inter-window pause cuts the pause
//! short.
//!
//! All of this runs on the caller's task. Fetches are multiplexed with
//! [`FuturesUnordered`] and their items are appended in the order the
//! fetches resolve.

use crate::accumulator::ResultAccumulator;
use crate::error::FeedError;
use crate::fetch::FetchCapability;
use crate::models::Chunk;
use crate::progress::ProgressReporter;
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_CONCURRENCY: usize = 3;
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Fetches dispatched together per window. Zero is treated as one.
    pub concurrency: usize,
    /// Courtesy delay between windows.
    pub pause: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            pause: DEFAULT_PAUSE,
        }
    }
}

/// Counters for the run in progress.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunState {
    pub is_running: bool,
    pub cancel_requested: bool,
    /// Items returned by successful fetches.
    pub total_succeeded: usize,
    pub chunks_succeeded: usize,
    /// Failed fetches.
    pub total_failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Stopped,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Completed => f.write_str("Completed"),
            RunOutcome::Stopped => f.write_str("Stopped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub items_succeeded: usize,
    pub chunks_succeeded: usize,
    pub chunks_failed: usize,
    pub windows_dispatched: usize,
}

#[derive(Debug, Default)]
pub struct BatchScheduler {
    config: SchedulerConfig,
    state: RunState,
}

impl BatchScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            state: RunState::default(),
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Fetch every chunk, appending successes to `accumulator`.
    ///
    /// Reports one status line per window and a terminal line (`Completed`,
    /// `Stopped` or `Aborted`) with the succeeded/failed totals. Run state is
    /// reset however the run ends.
    #[instrument(level = "info", skip_all, fields(%scope, chunks = chunks.len(), concurrency = self.config.concurrency))]
    pub async fn run<F, R>(
        &mut self,
        chunks: &[Chunk],
        scope: &str,
        fetcher: &F,
        accumulator: &mut ResultAccumulator,
        reporter: &R,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, FeedError>
    where
        F: FetchCapability,
        R: ProgressReporter + ?Sized,
    {
        let t0 = Instant::now();
        self.state = RunState {
            is_running: true,
            ..RunState::default()
        };

        let result = self
            .drive(chunks, scope, fetcher, accumulator, reporter, cancel)
            .await;

        let totals = format!(
            "{} items from {} chunks, {} failed",
            self.state.total_succeeded, self.state.chunks_succeeded, self.state.total_failed
        );
        match &result {
            Ok(summary) => {
                info!(
                    outcome = %summary.outcome,
                    items = summary.items_succeeded,
                    failed = summary.chunks_failed,
                    elapsed_ms = t0.elapsed().as_millis(),
                    "Run finished"
                );
                reporter.report(&format!("{}: {totals}", summary.outcome));
            }
            Err(e) => {
                error!(
                    error = %e,
                    items = self.state.total_succeeded,
                    failed = self.state.total_failed,
                    elapsed_ms = t0.elapsed().as_millis(),
                    "Run aborted"
                );
                reporter.report(&format!("Aborted ({e}): {totals}"));
            }
        }

        self.state.is_running = false;
        self.state.cancel_requested = false;
        result
    }

    async fn drive<F, R>(
        &mut self,
        chunks: &[Chunk],
        scope: &str,
        fetcher: &F,
        accumulator: &mut ResultAccumulator,
        reporter: &R,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, FeedError>
    where
        F: FetchCapability,
        R: ProgressReporter + ?Sized,
    {
        let concurrency = self.config.concurrency.max(1);
        let windows: Vec<&[Chunk]> = chunks.chunks(concurrency).collect();
        let total_windows = windows.len();
        let mut dispatched = 0usize;

        for (index, window) in windows.iter().enumerate() {
            if cancel.is_cancelled() {
                self.state.cancel_requested = true;
                info!(window = index + 1, total_windows, "Cancellation requested; stopping");
                return Ok(self.summary(RunOutcome::Stopped, dispatched));
            }

            dispatched += 1;
            debug!(window = index + 1, size = window.len(), "Dispatching window");

            let mut in_flight: FuturesUnordered<_> = window
                .iter()
                .map(|chunk| async move {
                    let outcome = fetcher.fetch(scope, &chunk.range, chunk.target_count).await;
                    (chunk, outcome)
                })
                .collect();

            let mut fatal = None;
            let mut window_items = 0usize;
            let mut window_failed = 0usize;

            while let Some((chunk, outcome)) = in_flight.next().await {
                match outcome {
                    Ok(items) => {
                        let n = items.len();
                        accumulator.append(items);
                        self.state.total_succeeded += n;
                        self.state.chunks_succeeded += 1;
                        window_items += n;
                        debug!(range = %chunk.range, items = n, "Chunk fetched");
                    }
                    Err(e) => {
                        self.state.total_failed += 1;
                        window_failed += 1;
                        if e.is_fatal() {
                            error!(
                                range = %chunk.range,
                                error = %e,
                                "Chunk failed fatally; draining window"
                            );
                            fatal.get_or_insert(e);
                        } else {
                            warn!(range = %chunk.range, error = %e, "Chunk failed; continuing");
                        }
                    }
                }
            }

            reporter.report(&format!(
                "Window {}/{}: +{} items (total {}), {} failed",
                index + 1,
                total_windows,
                window_items,
                self.state.total_succeeded,
                window_failed
            ));

            if let Some(e) = fatal {
                return Err(FeedError::Fatal(e));
            }

            let more = index + 1 < total_windows;
            if more && !cancel.is_cancelled() && !self.config.pause.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => debug!("Pause interrupted by cancellation"),
                    _ = sleep(self.config.pause) => {}
                }
            }
        }

        Ok(self.summary(RunOutcome::Completed, dispatched))
    }

    fn summary(&self, outcome: RunOutcome, windows_dispatched: usize) -> RunSummary {
        RunSummary {
            outcome,
            items_succeeded: self.state.total_succeeded,
            chunks_succeeded: self.state.chunks_succeeded,
            chunks_failed: self.state.total_failed,
            windows_dispatched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::FetchOutcome;
    use crate::models::{DateRange, Item};
    use chrono::{Duration as ChronoDuration, NaiveDate};
    use std::cell::{Cell, RefCell};

    /// Fetcher driven by a closure returning `(yields_before_settling, outcome)`
    /// for the chunk index (derived from the chunk start).
    struct MockFetcher<G> {
        script: G,
        calls: Cell<usize>,
        in_flight: Cell<usize>,
        max_in_flight: Cell<usize>,
    }

    impl<G> MockFetcher<G>
    where
        G: Fn(usize, usize) -> (usize, FetchOutcome),
    {
        fn new(script: G) -> Self {
            Self {
                script,
                calls: Cell::new(0),
                in_flight: Cell::new(0),
                max_in_flight: Cell::new(0),
            }
        }
    }

    impl<G> FetchCapability for MockFetcher<G>
    where
        G: Fn(usize, usize) -> (usize, FetchOutcome),
    {
        async fn fetch(&self, scope: &str, range: &DateRange, target_count: usize) -> FetchOutcome {
            assert_eq!(scope, "TSLA");
            self.calls.set(self.calls.get() + 1);
            self.in_flight.set(self.in_flight.get() + 1);
            self.max_in_flight
                .set(self.max_in_flight.get().max(self.in_flight.get()));

            let index = ((range.start - base()).num_days() / 5) as usize;
            let (yields, outcome) = (self.script)(index, target_count);
            tokio::task::yield_now().await;
            for _ in 0..yields {
                tokio::task::yield_now().await;
            }

            self.in_flight.set(self.in_flight.get() - 1);
            outcome
        }
    }

    fn silent(_: &str) {}

    fn base() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| {
                let start = base() + ChronoDuration::days(5 * i as i64);
                Chunk {
                    range: DateRange {
                        start,
                        end: start + ChronoDuration::days(5),
                    },
                    target_count: 2,
                }
            })
            .collect()
    }

    fn items(index: usize, n: usize) -> Vec<Item> {
        (0..n)
            .map(|k| Item::new("2024-01-01", format!("chunk{index}-{k}"), "mock", "TSLA"))
            .collect()
    }

    fn quick() -> BatchScheduler {
        BatchScheduler::new(SchedulerConfig {
            concurrency: 3,
            pause: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn test_single_window_with_transient_failure() {
        let fetcher = MockFetcher::new(|i, _| match i {
            1 => (0, Err(FetchError::Transient("timeout".into()))),
            0 => (0, Ok(items(0, 2))),
            _ => (0, Ok(items(i, 3))),
        });
        let mut acc = ResultAccumulator::new();
        let mut scheduler = quick();

        let summary = scheduler
            .run(&chunks(3), "TSLA", &fetcher, &mut acc, &silent, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.items_succeeded, 5);
        assert_eq!(summary.chunks_succeeded, 2);
        assert_eq!(summary.chunks_failed, 1);
        assert_eq!(summary.windows_dispatched, 1);
        assert_eq!(acc.count(), 5);
        assert!(!scheduler.state().is_running);
    }

    #[tokio::test]
    async fn test_never_exceeds_concurrency() {
        let fetcher = MockFetcher::new(|i, target| (i % 3, Ok(items(i, target))));
        let mut acc = ResultAccumulator::new();
        let mut scheduler = quick();

        let summary = scheduler
            .run(&chunks(10), "TSLA", &fetcher, &mut acc, &silent, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fetcher.calls.get(), 10);
        assert_eq!(fetcher.max_in_flight.get(), 3);
        assert_eq!(summary.windows_dispatched, 4);
        assert_eq!(acc.count(), 20);
    }

    #[tokio::test]
    async fn test_zero_concurrency_runs_one_at_a_time() {
        let fetcher = MockFetcher::new(|i, target| (0, Ok(items(i, target))));
        let mut acc = ResultAccumulator::new();
        let mut scheduler = BatchScheduler::new(SchedulerConfig {
            concurrency: 0,
            pause: Duration::ZERO,
        });

        let summary = scheduler
            .run(&chunks(4), "TSLA", &fetcher, &mut acc, &silent, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fetcher.max_in_flight.get(), 1);
        assert_eq!(summary.windows_dispatched, 4);
    }

    #[tokio::test]
    async fn test_items_appended_in_resolution_order() {
        // chunk 0 settles last, chunk 2 first
        let fetcher = MockFetcher::new(|i, _| (6 - 3 * i, Ok(items(i, 1))));
        let mut acc = ResultAccumulator::new();

        quick()
            .run(&chunks(3), "TSLA", &fetcher, &mut acc, &silent, &CancellationToken::new())
            .await
            .unwrap();

        let texts: Vec<&str> = acc.all().iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["chunk2-0", "chunk1-0", "chunk0-0"]);
    }

    #[tokio::test]
    async fn test_cancel_during_pause_stops_next_window() {
        let fetcher = MockFetcher::new(|i, target| (0, Ok(items(i, target))));
        let mut acc = ResultAccumulator::new();
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let mut scheduler = BatchScheduler::new(SchedulerConfig {
            concurrency: 3,
            pause: Duration::from_secs(30),
        });

        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            scheduler.run(&chunks(9), "TSLA", &fetcher, &mut acc, &silent, &token),
        )
        .await
        .expect("pause should be cut short by cancellation")
        .unwrap();

        assert_eq!(summary.outcome, RunOutcome::Stopped);
        assert_eq!(summary.windows_dispatched, 1);
        assert_eq!(fetcher.calls.get(), 3);
        assert_eq!(acc.count(), 6);
        assert!(!scheduler.state().is_running);
        assert!(!scheduler.state().cancel_requested);
    }

    #[tokio::test]
    async fn test_pauses_only_between_windows() {
        let fetcher = MockFetcher::new(|i, target| (0, Ok(items(i, target))));
        let mut acc = ResultAccumulator::new();
        let pause = Duration::from_millis(200);
        let mut scheduler = BatchScheduler::new(SchedulerConfig {
            concurrency: 3,
            pause,
        });

        let t0 = Instant::now();
        let summary = scheduler
            .run(&chunks(9), "TSLA", &fetcher, &mut acc, &silent, &CancellationToken::new())
            .await
            .unwrap();
        let elapsed = t0.elapsed();

        assert_eq!(summary.windows_dispatched, 3);
        // Two pauses for three windows; none after the last.
        assert!(elapsed >= pause * 2, "elapsed {elapsed:?}");
        assert!(elapsed < pause * 3, "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_cancel_mid_window_keeps_in_flight_results() {
        let token = CancellationToken::new();
        let fetcher = MockFetcher::new(|i, target| {
            if i == 0 {
                token.cancel();
            }
            (1, Ok(items(i, target)))
        });
        let mut acc = ResultAccumulator::new();

        let summary = quick()
            .run(&chunks(6), "TSLA", &fetcher, &mut acc, &silent, &token)
            .await
            .unwrap();

        assert_eq!(summary.outcome, RunOutcome::Stopped);
        assert_eq!(fetcher.calls.get(), 3);
        assert_eq!(acc.count(), 6);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_dispatches_nothing() {
        let fetcher = MockFetcher::new(|i, target| (0, Ok(items(i, target))));
        let mut acc = ResultAccumulator::new();
        let token = CancellationToken::new();
        token.cancel();

        let summary = quick()
            .run(&chunks(3), "TSLA", &fetcher, &mut acc, &silent, &token)
            .await
            .unwrap();

        assert_eq!(summary.outcome, RunOutcome::Stopped);
        assert_eq!(summary.windows_dispatched, 0);
        assert_eq!(fetcher.calls.get(), 0);
        assert!(acc.is_empty());
    }

    #[tokio::test]
    async fn test_fatal_error_drains_window_then_aborts() {
        let fetcher = MockFetcher::new(|i, target| match i {
            1 => (0, Err(FetchError::Auth("HTTP 401".into()))),
            0 => (0, Ok(items(0, target))),
            _ => (4, Ok(items(i, target))),
        });
        let mut acc = ResultAccumulator::new();
        let statuses = RefCell::new(Vec::new());
        let reporter = |s: &str| statuses.borrow_mut().push(s.to_string());
        let mut scheduler = quick();

        let err = scheduler
            .run(&chunks(6), "TSLA", &fetcher, &mut acc, &reporter, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FeedError::Fatal(FetchError::Auth(_))));
        assert_eq!(fetcher.calls.get(), 3);
        // chunk 0 settled before the failure, chunk 2 after it
        assert_eq!(acc.count(), 4);
        assert!(!scheduler.state().is_running);

        let statuses = statuses.borrow();
        assert_eq!(statuses.len(), 2);
        assert!(statuses[1].starts_with("Aborted"));
        assert!(statuses[1].contains("4 items from 2 chunks, 1 failed"));
    }

    #[tokio::test]
    async fn test_progress_per_window_and_terminal() {
        let fetcher = MockFetcher::new(|i, target| (0, Ok(items(i, target))));
        let mut acc = ResultAccumulator::new();
        let statuses = RefCell::new(Vec::new());
        let reporter = |s: &str| statuses.borrow_mut().push(s.to_string());

        quick()
            .run(&chunks(5), "TSLA", &fetcher, &mut acc, &reporter, &CancellationToken::new())
            .await
            .unwrap();

        let statuses = statuses.borrow();
        assert_eq!(
            *statuses,
            vec![
                "Window 1/2: +6 items (total 6), 0 failed".to_string(),
                "Window 2/2: +4 items (total 10), 0 failed".to_string(),
                "Completed: 10 items from 5 chunks, 0 failed".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_chunks_completes_immediately() {
        let fetcher = MockFetcher::new(|i, target| (0, Ok(items(i, target))));
        let mut acc = ResultAccumulator::new();

        let summary = quick()
            .run(&[], "TSLA", &fetcher, &mut acc, &silent, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.windows_dispatched, 0);
        assert_eq!(fetcher.calls.get(), 0);
    }

    #[tokio::test]
    async fn test_state_counters_reset_between_runs() {
        let fetcher = MockFetcher::new(|i, target| (0, Ok(items(i, target))));
        let mut acc = ResultAccumulator::new();
        let mut scheduler = quick();
        let token = CancellationToken::new();

        scheduler
            .run(&chunks(2), "TSLA", &fetcher, &mut acc, &silent, &token)
            .await
            .unwrap();
        let second = scheduler
            .run(&chunks(1), "TSLA", &fetcher, &mut acc, &silent, &token)
            .await
            .unwrap();

        assert_eq!(second.items_succeeded, 2);
        assert_eq!(acc.count(), 6);
    }
}
