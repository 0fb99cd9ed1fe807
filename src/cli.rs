//! Command-line interface definitions for Awful Ticker Feed.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Tuning knobs left unset here fall back to the YAML settings file given
//! with `--config`, then to built-in defaults (see [`crate::config`]).

use crate::models::FetchMode;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the Awful Ticker Feed application.
///
/// # Examples
///
/// ```sh
/// # Live headlines for a quarter
/// awful_ticker_feed -s AAPL --start 2024-01-01 --end 2024-04-01 -o ./aapl.csv
///
/// # Synthetic items, two per day, five requests at a time
/// awful_ticker_feed -s TSLA --start 2024-01-01 --end 2024-02-01 \
///     --mode synthetic --density 2 --concurrency 5 -o ./tsla.csv
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Ticker or topic the feed is about
    #[arg(short, long)]
    pub scope: String,

    /// First day of the range (YYYY-MM-DD)
    #[arg(long)]
    pub start: NaiveDate,

    /// Day the range ends on (YYYY-MM-DD)
    #[arg(long)]
    pub end: NaiveDate,

    /// Where items come from
    #[arg(long, value_enum, default_value = "live-search")]
    pub mode: FetchMode,

    /// Items requested per calendar day
    #[arg(short, long)]
    pub density: Option<f64>,

    /// Fetches dispatched together per window
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Pause between windows, in milliseconds
    #[arg(long)]
    pub pause_ms: Option<u64>,

    /// Items aimed for in a single fetch; sizes the chunks
    #[arg(long)]
    pub items_per_request: Option<usize>,

    /// Output path for the CSV export
    #[arg(short = 'o', long)]
    pub csv_output: PathBuf,

    /// Optional output path for a JSON snapshot of the session
    #[arg(short, long)]
    pub json_output: Option<PathBuf>,

    /// Optional path to a feed settings YAML file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path to the LLM config.yaml (synthetic mode)
    #[arg(long, env = "AWFUL_AJ_CONFIG")]
    pub llm_config: Option<PathBuf>,

    /// Chat template name (synthetic mode)
    #[arg(long)]
    pub template: Option<String>,

    /// Drop items from this source before export (repeatable)
    #[arg(long = "exclude-source")]
    pub exclude_sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "awful_ticker_feed",
            "--scope",
            "AAPL",
            "--start",
            "2024-01-01",
            "--end",
            "2024-01-10",
            "--csv-output",
            "./out.csv",
        ]);

        assert_eq!(cli.scope, "AAPL");
        assert_eq!(cli.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(cli.mode, FetchMode::LiveSearch);
        assert_eq!(cli.csv_output, PathBuf::from("./out.csv"));
        assert!(cli.density.is_none());
        assert!(cli.exclude_sources.is_empty());
    }

    #[test]
    fn test_cli_short_flags_and_tuning() {
        let cli = Cli::parse_from([
            "awful_ticker_feed",
            "-s",
            "TSLA",
            "--start",
            "2024-01-01",
            "--end",
            "2024-03-01",
            "--mode",
            "synthetic",
            "-d",
            "2.5",
            "--concurrency",
            "5",
            "--pause-ms",
            "250",
            "-o",
            "/tmp/tsla.csv",
            "-j",
            "/tmp/tsla.json",
            "--exclude-source",
            "reuters",
            "--exclude-source",
            "cnbc",
        ]);

        assert_eq!(cli.mode, FetchMode::Synthetic);
        assert_eq!(cli.density, Some(2.5));
        assert_eq!(cli.concurrency, Some(5));
        assert_eq!(cli.pause_ms, Some(250));
        assert_eq!(cli.json_output, Some(PathBuf::from("/tmp/tsla.json")));
        assert_eq!(cli.exclude_sources, vec!["reuters", "cnbc"]);
    }

    #[test]
    fn test_cli_rejects_bad_date() {
        let res = Cli::try_parse_from([
            "awful_ticker_feed",
            "-s",
            "AAPL",
            "--start",
            "01/01/2024",
            "--end",
            "2024-01-10",
            "-o",
            "out.csv",
        ]);
        assert!(res.is_err());
    }
}
