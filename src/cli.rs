//! Command-line interface definitions for the daily news brief.
//!
//! This module defines the CLI arguments and subcommands using the `clap` crate.
//! Global options can also be provided via environment variables.

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments for the daily news brief pipeline.
///
/// # Examples
///
/// ```sh
/// # Scrape page one of People's Daily into today's day file
/// daily_news_brief scrape --site people-daily --count 3
///
/// # Merge a batch produced by an external scraper
/// daily_news_brief append --batch ./yicai.json
///
/// # Dedupe, summarize and render the brief for a given day
/// daily_news_brief --date 2025-05-06 run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long, env = "DAILY_NEWS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the day files (overrides `data_dir` in the config)
    #[arg(long, env = "DAILY_NEWS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Collection date as YYYY-MM-DD; defaults to today's local date
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run a built-in scraper and append its batch to the day file
    Scrape {
        #[arg(long, value_enum, default_value_t = Site::PeopleDaily)]
        site: Site,

        /// Number of stories to take (overrides the config)
        #[arg(long)]
        count: Option<usize>,
    },

    /// Append an externally scraped batch (JSON) to the day file
    Append {
        #[arg(long)]
        batch: PathBuf,
    },

    /// Migrate the day file to the current shape and renumber ids from 1
    Normalize,

    /// Drop records whose titles already appeared in earlier collections
    Dedupe,

    /// Dedupe, then annotate every record and write the with-summary file
    Summarize,

    /// Render the brief from the with-summary file
    Brief {
        /// Output directory (overrides `output_dir` in the config)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Dedupe, summarize and render the brief
    Run,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    PeopleDaily,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "daily_news_brief",
            "--config",
            "./config.yaml",
            "--date",
            "2025-05-06",
            "append",
            "--batch",
            "./batch.json",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("./config.yaml")));
        assert_eq!(cli.date, NaiveDate::from_ymd_opt(2025, 5, 6));
        assert_eq!(
            cli.command,
            Command::Append {
                batch: PathBuf::from("./batch.json")
            }
        );
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["daily_news_brief", "-c", "/tmp/c.yaml", "run"]);

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.yaml")));
        assert_eq!(cli.date, None);
        assert_eq!(cli.command, Command::Run);
    }

    #[test]
    fn test_scrape_defaults() {
        let cli = Cli::parse_from(["daily_news_brief", "scrape"]);
        assert_eq!(
            cli.command,
            Command::Scrape {
                site: Site::PeopleDaily,
                count: None
            }
        );

        let cli = Cli::parse_from([
            "daily_news_brief",
            "scrape",
            "--site",
            "people-daily",
            "--count",
            "5",
        ]);
        assert_eq!(
            cli.command,
            Command::Scrape {
                site: Site::PeopleDaily,
                count: Some(5)
            }
        );
    }

    #[test]
    fn test_invalid_date_rejected() {
        let result = Cli::try_parse_from(["daily_news_brief", "--date", "2025/05/06", "dedupe"]);
        assert!(result.is_err());
    }
}
