//! Progress reporting for feed runs.
//!
//! The scheduler emits a human-readable status after each window and one
//! terminal status when the run ends. Where those strings go is up to the
//! caller: [`TracingReporter`] logs them, and any `Fn(&str)` closure or
//! function works too.

use tracing::info;

pub trait ProgressReporter {
    fn report(&self, status: &str);
}

/// Forwards status lines to the `info` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, status: &str) {
        info!(target: "progress", "{status}");
    }
}

impl<F> ProgressReporter for F
where
    F: Fn(&str),
{
    fn report(&self, status: &str) {
        self(status)
    }
}
