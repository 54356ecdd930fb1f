//! News source scrapers that feed the day file.
//!
//! Each scraper follows the same two-phase pattern:
//!
//! 1. **Indexing**: Discover article links from the source's front page
//! 2. **Fetching**: Download and parse article content from each link
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | People's Daily | [`people_daily`] | HTML scraping | Page one of the digital edition |
//!
//! Other outlets are scraped out of process and handed over with
//! `append --batch FILE`; their output goes through the same merge as the
//! built-in scrapers.

pub mod people_daily;

use crate::config::ScrapeConfig;
use reqwest::Client;
use std::time::Duration;

/// HTTP client shared by the built-in scrapers.
pub fn http_client(config: &ScrapeConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(30))
        .build()
}
