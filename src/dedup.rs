//! Cross-run deduplication by exact title.
//!
//! Titles from earlier collections are pooled into one lookup set, and any
//! of today's records whose title is already in it is dropped. Matching is
//! exact: case, whitespace and punctuation all count, so `央行降息公告` and
//! `央行降息公告。` are different articles. Near-duplicates are left to the
//! summarizer, which flags them separately without removing anything.

use crate::error::StoreError;
use crate::models::Record;
use crate::store::DayStore;
use chrono::{Days, NaiveDate};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Union of titles seen in earlier collections. Provenance is not kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalTitles {
    titles: HashSet<String>,
}

impl HistoricalTitles {
    pub fn from_sources<'a, I>(sources: I) -> Self
    where
        I: IntoIterator<Item = &'a [Record]>,
    {
        let mut history = Self::default();
        for source in sources {
            history.extend(source);
        }
        history
    }

    pub fn extend(&mut self, records: &[Record]) {
        self.titles
            .extend(records.iter().map(|r| r.title.clone()));
    }

    pub fn contains(&self, title: &str) -> bool {
        self.titles.contains(title)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Titles in a stable order, for prompts and logs.
    pub fn sorted(&self) -> Vec<&str> {
        let mut titles: Vec<&str> = self.titles.iter().map(String::as_str).collect();
        titles.sort_unstable();
        titles
    }
}

/// What [`dedupe`] kept and what it dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupOutcome {
    pub kept: Vec<Record>,
    pub removed: Vec<Record>,
    /// The pooled titles, reused as context for the summarizer.
    pub history: HistoricalTitles,
}

impl DedupOutcome {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// Drop every record whose title appears in any of `sources`.
///
/// Kept records stay in their original order with their ids untouched.
pub fn dedupe(today: Vec<Record>, sources: &[Vec<Record>]) -> DedupOutcome {
    let history = HistoricalTitles::from_sources(sources.iter().map(Vec::as_slice));
    let (removed, kept): (Vec<Record>, Vec<Record>) = today
        .into_iter()
        .partition(|record| history.contains(&record.title));
    DedupOutcome {
        kept,
        removed,
        history,
    }
}

/// Load the previous `history_days` day files plus today's earlier
/// snapshot. Missing or unreadable sources contribute nothing.
#[instrument(level = "info", skip(store))]
pub async fn history_sources(
    store: &DayStore,
    date: NaiveDate,
    history_days: u32,
) -> Vec<Vec<Record>> {
    let mut sources = Vec::new();

    for back in 1..=u64::from(history_days) {
        let Some(day) = date.checked_sub_days(Days::new(back)) else {
            break;
        };
        let path = store.day_path(day).display().to_string();
        sources.extend(usable(store.load(day).await, &path));
    }

    let snapshot = store.snapshot_path(date).display().to_string();
    sources.extend(usable(store.load_snapshot(date).await, &snapshot));

    info!(sources = sources.len(), "Loaded historical sources");
    sources
}

fn usable(loaded: Result<Vec<Record>, StoreError>, path: &str) -> Option<Vec<Record>> {
    match loaded {
        Ok(records) => {
            debug!(%path, count = records.len(), "Added historical source");
            Some(records)
        }
        Err(e) if e.is_not_found() => {
            debug!(%path, "Historical source absent; contributes nothing");
            None
        }
        Err(e) => {
            warn!(%path, error = %e, "Historical source unreadable; treating as empty");
            None
        }
    }
}

/// Deduplicate the day file for `date` against its history and write the
/// survivors back.
///
/// A missing day file is fatal: nothing was scraped for that date.
#[instrument(level = "info", skip(store))]
pub async fn dedupe_day(
    store: &DayStore,
    date: NaiveDate,
    history_days: u32,
) -> Result<DedupOutcome, StoreError> {
    let _lock = store.lock(date).await?;
    let today = store.load(date).await?;
    let sources = history_sources(store, date, history_days).await;

    let outcome = dedupe(today, &sources);
    if outcome.history.is_empty() {
        info!("No earlier titles to compare against");
    }
    for record in &outcome.removed {
        info!(id = record.id, title = %record.title, "Dropping repeated article");
    }

    if outcome.removed_count() > 0 {
        store.save(date, &outcome.kept).await?;
        info!(
            removed = outcome.removed_count(),
            kept = outcome.kept.len(),
            "Removed repeated articles from day file"
        );
    } else {
        info!(kept = outcome.kept.len(), "No repeated articles found");
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(entries: &[(u64, &str)]) -> Vec<Record> {
        entries
            .iter()
            .map(|(id, title)| {
                let mut r = Record::scraped(*title, format!("https://example.com/{id}"), "body");
                r.id = *id;
                r
            })
            .collect()
    }

    fn summary(rs: &[Record]) -> Vec<(u64, &str)> {
        rs.iter().map(|r| (r.id, r.title.as_str())).collect()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 6).unwrap()
    }

    #[test]
    fn test_removes_titles_seen_in_any_source() {
        let history = vec![records(&[(1, "A")]), records(&[(9, "C")])];
        let today = records(&[(1, "A"), (2, "B"), (3, "C"), (4, "D")]);

        let outcome = dedupe(today, &history);

        assert_eq!(summary(&outcome.kept), vec![(2, "B"), (4, "D")]);
        assert_eq!(outcome.removed_count(), 2);
    }

    #[test]
    fn test_title_match_is_exact() {
        let history = vec![records(&[(1, "央行降息公告")])];
        let today = records(&[(1, "央行降息公告"), (2, "央行降息公告。"), (3, " 央行降息公告")]);

        let outcome = dedupe(today, &history);

        assert_eq!(
            summary(&outcome.kept),
            vec![(2, "央行降息公告。"), (3, " 央行降息公告")]
        );
        assert_eq!(summary(&outcome.removed), vec![(1, "央行降息公告")]);
    }

    #[test]
    fn test_title_match_is_case_sensitive() {
        let history = vec![records(&[(1, "Tesla Cuts Prices")])];
        let outcome = dedupe(records(&[(1, "tesla cuts prices")]), &history);
        assert_eq!(outcome.kept.len(), 1);
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let history = vec![records(&[(1, "A"), (2, "C")])];
        let first = dedupe(records(&[(1, "A"), (2, "B"), (3, "C")]), &history);
        let second = dedupe(first.kept.clone(), &history);

        assert_eq!(second.removed_count(), 0);
        assert_eq!(second.kept, first.kept);
    }

    #[test]
    fn test_no_history_keeps_everything() {
        let today = records(&[(1, "A"), (2, "B")]);
        let outcome = dedupe(today.clone(), &[]);
        assert_eq!(outcome.kept, today);
        assert_eq!(outcome.removed_count(), 0);
    }

    #[test]
    fn test_duplicates_within_today_are_not_touched() {
        let outcome = dedupe(records(&[(1, "A"), (2, "A")]), &[records(&[(1, "B")])]);
        assert_eq!(outcome.kept.len(), 2);
    }

    #[test]
    fn test_historical_titles_sorted() {
        let history = HistoricalTitles::from_sources([records(&[(1, "b"), (2, "a")]).as_slice()]);
        assert_eq!(history.sorted(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_dedupe_day_missing_today_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = DayStore::new(dir.path());
        let err = dedupe_day(&store, date(), 1).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_dedupe_day_absent_history_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DayStore::new(dir.path());
        store.append(date(), records(&[(0, "A"), (0, "B")])).await.unwrap();

        let result = dedupe_day(&store, date(), 3).await.unwrap();

        assert!(result.history.is_empty());
        assert_eq!(result.kept.len(), 2);
    }

    #[tokio::test]
    async fn test_dedupe_day_rewrites_file_without_renumbering() {
        let dir = tempfile::tempdir().unwrap();
        let store = DayStore::new(dir.path());
        let yesterday = date().pred_opt().unwrap();
        store.append(yesterday, records(&[(0, "A")])).await.unwrap();
        std::fs::write(
            store.snapshot_path(date()),
            serde_json::to_string(&records(&[(1, "C")])).unwrap(),
        )
        .unwrap();
        store
            .append(date(), records(&[(0, "A"), (0, "B"), (0, "C"), (0, "D")]))
            .await
            .unwrap();

        let result = dedupe_day(&store, date(), 1).await.unwrap();

        assert_eq!(result.removed_count(), 2);
        assert!(result.history.contains("A"));
        assert!(result.history.contains("C"));
        let on_disk = store.load(date()).await.unwrap();
        assert_eq!(summary(&on_disk), vec![(2, "B"), (4, "D")]);
    }

    #[tokio::test]
    async fn test_unreadable_history_counts_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DayStore::new(dir.path());
        let yesterday = date().pred_opt().unwrap();
        std::fs::write(store.day_path(yesterday), "{ broken").unwrap();
        store.append(date(), records(&[(0, "A")])).await.unwrap();

        let result = dedupe_day(&store, date(), 1).await.unwrap();
        assert_eq!(result.kept.len(), 1);
    }
}
