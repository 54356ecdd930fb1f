//! # Daily News Brief
//!
//! A daily news pipeline for Chinese-language sources. Scrapers append the
//! day's articles to one JSON file per date; repeats of earlier collections
//! are dropped by exact title; each remaining article is summarized and
//! classified through an OpenAI-compatible LLM; and the results are
//! assembled into a Markdown brief.
//!
//! ## Features
//!
//! - Built-in People's Daily scraper, plus `append` for batches scraped elsewhere
//! - Stable, unique record ids across many scraper runs per day
//! - Exact-title deduplication against the previous days and today's snapshot
//! - LLM summary, category, source site and repeat flag per article, with a
//!   sentinel fallback so no article is ever dropped
//! - A brief grouped into China / International / Automotive sections
//!
//! ## Usage
//!
//! ```sh
//! daily_news_brief scrape --count 3
//! daily_news_brief append --batch ./yicai.json
//! daily_news_brief run
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Collection**: Scraper batches are merged into the day file
//! 2. **Deduplication**: Titles already seen are removed in place
//! 3. **Summarization**: Records are annotated into the with-summary file
//! 4. **Output**: The with-summary file is rendered as the daily brief

use chrono::{Local, NaiveDate};
use clap::Parser;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod brief;
mod cli;
mod config;
mod dedup;
mod error;
mod models;
mod scrapers;
mod store;
mod summarize;
mod utils;

use api::{ChatClient, RetryAsk};
use brief::BriefOptions;
use cli::{Cli, Command, Site};
use config::AppConfig;
use models::parse_day_file;
use store::DayStore;
use summarize::{BatchReport, Summarizer};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("daily_news_brief starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.config, ?args.data_dir, ?args.date, ?args.command, "Parsed CLI arguments");

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    info!(%date, data_dir = %config.data_dir.display(), "Resolved collection date");

    // Early check: ensure the data dir is writable
    if let Err(e) = ensure_writable_dir(&config.data_dir).await {
        error!(
            path = %config.data_dir.display(),
            error = %e,
            "Data directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let store = DayStore::new(&config.data_dir)
        .with_lock_policy(
            config.store.lock_attempts,
            Duration::from_millis(config.store.lock_delay_ms),
        )
        .with_stale_lock_age(Duration::from_secs(config.store.lock_stale_secs));

    match args.command {
        Command::Scrape { site, count } => {
            let count = count.unwrap_or(config.scrape.people_daily_count);
            scrape(&store, &config, date, site, count).await?;
        }
        Command::Append { batch } => {
            append_batch(&store, date, &batch).await?;
        }
        Command::Normalize => {
            let count = store.normalize(date).await?;
            println!("{date}: normalized {count} records");
        }
        Command::Dedupe => {
            let result = dedup::dedupe_day(&store, date, config.dedup.history_days).await?;
            println!(
                "{date}: removed {} repeated records, kept {}",
                result.removed_count(),
                result.kept.len()
            );
        }
        Command::Summarize => {
            summarize(&store, &config, date).await?;
        }
        Command::Brief { output_dir } => {
            let output_dir = output_dir.unwrap_or_else(|| config.output_dir.clone());
            brief(&store, &config, date, &output_dir).await?;
        }
        Command::Run => {
            summarize(&store, &config, date).await?;
            brief(&store, &config, date, &config.output_dir).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

#[instrument(level = "info", skip(store, config))]
async fn scrape(
    store: &DayStore,
    config: &AppConfig,
    date: NaiveDate,
    site: Site,
    count: usize,
) -> Result<(), Box<dyn Error>> {
    let client = scrapers::http_client(&config.scrape)?;
    let records = match site {
        Site::PeopleDaily => {
            let links = scrapers::people_daily::index_articles(&client, date, count).await?;
            scrapers::people_daily::fetch_articles(&client, links).await
        }
    };

    if records.is_empty() {
        warn!("Scraper returned no articles; day file left unchanged");
        return Ok(());
    }

    let merged = store.append(date, records).await?;
    println!("{date}: day file now holds {} records", merged.len());
    Ok(())
}

/// Merge an externally scraped batch. Any ids it carries are replaced.
#[instrument(level = "info", skip(store))]
async fn append_batch(store: &DayStore, date: NaiveDate, batch: &Path) -> Result<(), Box<dyn Error>> {
    let bytes = tokio::fs::read(batch).await?;
    let parsed = parse_day_file(&bytes)?;
    if parsed.legacy_shape {
        warn!(path = %batch.display(), "Batch uses a legacy shape; migrating");
    }
    info!(count = parsed.records.len(), "Read external batch");

    let merged = store.append(date, parsed.records).await?;
    println!("{date}: day file now holds {} records", merged.len());
    Ok(())
}

/// Dedupe the day file, annotate what is left, and write the with-summary file.
#[instrument(level = "info", skip(store, config))]
async fn summarize(
    store: &DayStore,
    config: &AppConfig,
    date: NaiveDate,
) -> Result<BatchReport, Box<dyn Error>> {
    let deduped = dedup::dedupe_day(store, date, config.dedup.history_days).await?;
    info!(
        removed = deduped.removed_count(),
        kept = deduped.kept.len(),
        history = deduped.history.len(),
        "Deduplicated day file"
    );

    let api_key = config.llm.api_key()?;
    let client = ChatClient::new(&config.llm, api_key)?;
    let client = RetryAsk::new(client, config.llm.max_retries, config.llm.base_delay());
    let summarizer = Summarizer::new(client, config.summarizer.max_content_chars);

    let report = summarizer
        .annotate_batch(
            deduped.kept,
            &deduped.history,
            config.summarizer.concurrency,
        )
        .await;
    store.save_summarized(date, &report.records).await?;

    for record in report.records.iter().filter(|r| r.needs_review()) {
        warn!(
            id = record.id,
            title = %record.title,
            summary = record.summary.as_deref().unwrap_or_default(),
            "Record needs manual review"
        );
    }
    println!(
        "{date}: {} records processed, {} need manual review, {} flagged as repeats",
        report.processed(),
        report.needs_review(),
        report.flagged_duplicates()
    );
    Ok(report)
}

#[instrument(level = "info", skip(store, config))]
async fn brief(
    store: &DayStore,
    config: &AppConfig,
    date: NaiveDate,
    output_dir: &Path,
) -> Result<PathBuf, Box<dyn Error>> {
    let records = store.load_summarized(date).await?;
    let options = BriefOptions {
        omit_flagged_duplicates: config.brief.omit_flagged_duplicates,
    };
    let path = brief::write_brief(output_dir, date, &records, options).await?;
    println!("{date}: brief written to {}", path.display());
    Ok(path)
}
