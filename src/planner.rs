//! Split a date range into bounded sub-requests.
//!
//! The span of each chunk is sized so that, at the requested density, it
//! asks for roughly `items_per_request` items, then clamped to
//! [`MIN_CHUNK_DAYS`]..=[`MAX_CHUNK_DAYS`]. Chunks are walked forward from
//! the range start; the last one is cut short at the range end.

use crate::models::{Chunk, DateRange};
use chrono::Duration;
use tracing::debug;

/// Densities below this are treated as this value when sizing chunks.
pub const MIN_DENSITY: f64 = 0.1;
/// Shortest span a chunk is planned with.
pub const MIN_CHUNK_DAYS: i64 = 5;
/// Longest span a chunk is planned with.
pub const MAX_CHUNK_DAYS: i64 = 60;
/// Upper bound on the items requested for a single chunk.
pub const MAX_TARGET_COUNT: usize = 10_000;

/// Density actually used for sizing. NaN and non-positive values fall back
/// to [`MIN_DENSITY`].
pub fn effective_density(density: f64) -> f64 {
    density.max(MIN_DENSITY)
}

/// Calendar days covered by one chunk.
pub fn chunk_days(density: f64, items_per_request: usize) -> i64 {
    let raw = (items_per_request as f64 / effective_density(density)).ceil();
    // `as` saturates for huge values, so the clamp still applies.
    (raw as i64).clamp(MIN_CHUNK_DAYS, MAX_CHUNK_DAYS)
}

/// Plan the ordered, contiguous chunks covering `range`.
///
/// Pure and total: an empty range yields no chunks, and a stride whose
/// target works out to zero items is skipped.
pub fn plan(range: &DateRange, density: f64, items_per_request: usize) -> Vec<Chunk> {
    let density = effective_density(density);
    let step = chunk_days(density, items_per_request);

    let mut chunks = Vec::new();
    let mut cursor = range.start;
    while cursor < range.end {
        let next = (cursor + Duration::days(step)).min(range.end);
        let stride_days = (next - cursor).num_days();
        let count = (stride_days as f64 * density).ceil().min(MAX_TARGET_COUNT as f64);
        if count > 0.0 {
            chunks.push(Chunk {
                range: DateRange {
                    start: cursor,
                    end: next,
                },
                target_count: count as usize,
            });
        }
        cursor = next;
    }

    debug!(
        %range,
        density,
        chunk_days = step,
        chunks = chunks.len(),
        "Planned chunks"
    );
    chunks
}
