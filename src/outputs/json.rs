//! JSON snapshot of a session.
//!
//! The snapshot carries the request (scope, mode, range), the time it was
//! taken and every item in accumulator order.

use crate::models::FeedSnapshot;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

#[instrument(level = "info", skip_all, fields(path = %path.display(), items = snapshot.items.len()))]
pub async fn write_snapshot(snapshot: &FeedSnapshot, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json).await?;
    info!("Wrote JSON snapshot");
    Ok(())
}
