//! CSV export.
//!
//! The header is fixed: `Time,Sample ID,text,source`. The two free-text
//! columns are always quote-wrapped with embedded quotes doubled; time and
//! id are written as-is.

use crate::models::Item;
use itertools::Itertools;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

pub const CSV_HEADER: &str = "Time,Sample ID,text,source";

/// Wrap a field in quotes, doubling any quotes inside it.
pub fn quote_field(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

pub fn format_row(item: &Item) -> String {
    [
        item.timestamp.clone(),
        item.id.clone(),
        quote_field(&item.text),
        quote_field(&item.source_label),
    ]
    .iter()
    .join(",")
}

/// Render the whole document, header included, newline-terminated.
pub fn to_csv_string(items: &[Item]) -> String {
    std::iter::once(CSV_HEADER.to_string())
        .chain(items.iter().map(format_row))
        .map(|line| line + "\n")
        .collect()
}

#[instrument(level = "info", skip_all, fields(path = %path.display(), rows = items.len()))]
pub async fn write_csv(items: &[Item], path: &Path) -> Result<(), Box<dyn Error>> {
    fs::write(path, to_csv_string(items)).await?;
    info!("Wrote CSV export");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, text: &str, source: &str) -> Item {
        Item {
            id: id.to_string(),
            timestamp: "2024-01-03".to_string(),
            text: text.to_string(),
            source_label: source.to_string(),
            scope_tag: "AAPL".to_string(),
        }
    }

    #[test]
    fn test_quote_field() {
        assert_eq!(quote_field("plain"), "\"plain\"");
        assert_eq!(quote_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(quote_field(""), "\"\"");
    }

    #[test]
    fn test_row_layout() {
        let row = format_row(&item("id-1", "Apple, Inc. \"beats\"", "Reuters"));
        assert_eq!(row, "2024-01-03,id-1,\"Apple, Inc. \"\"beats\"\"\",\"Reuters\"");
    }

    #[test]
    fn test_document_order_and_header() {
        let doc = to_csv_string(&[item("a", "first", "x"), item("b", "second", "y")]);
        let lines: Vec<&str> = doc.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].contains(",a,"));
        assert!(lines[2].contains(",b,"));
        assert!(doc.ends_with('\n'));
    }

    #[test]
    fn test_empty_document_has_header_only() {
        assert_eq!(to_csv_string(&[]), format!("{CSV_HEADER}\n"));
    }

    #[tokio::test]
    async fn test_write_csv() {
        let path = std::env::temp_dir().join(format!("ticker_feed_{}.csv", uuid::Uuid::new_v4()));
        write_csv(&[item("a", "text", "src")], &path).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with(CSV_HEADER));
        let _ = std::fs::remove_file(&path);
    }
}
