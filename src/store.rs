//! Per-day record store.
//!
//! Each calendar date owns one JSON file holding the day's records as a bare
//! array. Scraper runs append to it, the deduplicator rewrites it, and the
//! summarizer writes a parallel `_with_summary` artifact next to it.
//!
//! # File Layout
//!
//! ```text
//! data_dir/
//! ├── Local_news_20250506.json               # day collection
//! ├── Local_news_20250506_1.json             # optional earlier-today snapshot
//! ├── Local_news_20250506_with_summary.json  # annotated copy
//! └── Local_news_20250506.json.lock          # present only while a writer holds it
//! ```
//!
//! # Writes
//!
//! Every write replaces the whole file: records are serialized to a sibling
//! `.tmp` file which is then renamed over the target. [`DayStore::append`]
//! additionally holds an exclusive lock file for its read-modify-write so two
//! scraper processes cannot drop each other's records.

use crate::error::StoreError;
use crate::models::{Record, parse_day_file};
use crate::utils::day_key;
use chrono::NaiveDate;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct DayStore {
    dir: PathBuf,
    lock_attempts: u32,
    lock_delay: Duration,
    lock_stale_after: Duration,
}

impl DayStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock_attempts: 50,
            lock_delay: Duration::from_millis(200),
            lock_stale_after: Duration::from_secs(600),
        }
    }

    /// How often and how patiently a writer retries a held lock.
    pub fn with_lock_policy(mut self, attempts: u32, delay: Duration) -> Self {
        self.lock_attempts = attempts.max(1);
        self.lock_delay = delay;
        self
    }

    /// Age after which a lock whose holder cannot be checked is taken over.
    pub fn with_stale_lock_age(mut self, age: Duration) -> Self {
        self.lock_stale_after = age;
        self
    }

    pub fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("Local_news_{}.json", day_key(date)))
    }

    pub fn snapshot_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("Local_news_{}_1.json", day_key(date)))
    }

    pub fn summary_path(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("Local_news_{}_with_summary.json", day_key(date)))
    }

    fn lock_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("Local_news_{}.json.lock", day_key(date)))
    }

    /// Load the day collection. Fails with [`StoreError::NotFound`] when no
    /// scraper has written anything for `date`.
    #[instrument(level = "info", skip_all, fields(%date))]
    pub async fn load(&self, date: NaiveDate) -> Result<Vec<Record>, StoreError> {
        read_records(&self.day_path(date)).await
    }

    /// Like [`DayStore::load`], with a missing file treated as empty.
    pub async fn load_or_empty(&self, date: NaiveDate) -> Result<Vec<Record>, StoreError> {
        match self.load(date).await {
            Err(StoreError::NotFound(_)) => Ok(Vec::new()),
            other => other,
        }
    }

    /// Load the earlier-today snapshot (`_1`) if one was kept.
    pub async fn load_snapshot(&self, date: NaiveDate) -> Result<Vec<Record>, StoreError> {
        read_records(&self.snapshot_path(date)).await
    }

    /// Replace the day collection. Does not take the writer lock; callers that
    /// read first should hold [`DayStore::lock`] across both steps.
    #[instrument(level = "info", skip_all, fields(%date, count = records.len()))]
    pub async fn save(&self, date: NaiveDate, records: &[Record]) -> Result<(), StoreError> {
        write_records(&self.day_path(date), records).await
    }

    /// Append a freshly scraped batch.
    ///
    /// Incoming ids are provisional: the i-th incoming record (1-based) gets
    /// `max(existing ids) + i`. The merged collection is written back in full
    /// and returned.
    #[instrument(level = "info", skip_all, fields(%date, incoming = incoming.len()))]
    pub async fn append(
        &self,
        date: NaiveDate,
        incoming: Vec<Record>,
    ) -> Result<Vec<Record>, StoreError> {
        let _lock = self.lock(date).await?;
        let existing = self.load_or_empty(date).await?;
        let existing_count = existing.len();
        let merged = merge_batch(existing, incoming);
        self.save(date, &merged).await?;
        if !ids_are_contiguous(&merged) {
            info!("Day file ids have gaps from earlier removals; `normalize` closes them");
        }
        info!(
            existing = existing_count,
            total = merged.len(),
            path = %self.day_path(date).display(),
            "Appended batch to day file"
        );
        Ok(merged)
    }

    /// Rewrite the day file in canonical shape with ids `1..=n` in file order.
    #[instrument(level = "info", skip_all, fields(%date))]
    pub async fn normalize(&self, date: NaiveDate) -> Result<usize, StoreError> {
        let _lock = self.lock(date).await?;
        let mut records = self.load(date).await?;
        renumber(&mut records);
        self.save(date, &records).await?;
        info!(count = records.len(), "Normalized day file");
        Ok(records.len())
    }

    /// Write the annotated collection as its own artifact.
    #[instrument(level = "info", skip_all, fields(%date, count = records.len()))]
    pub async fn save_summarized(
        &self,
        date: NaiveDate,
        records: &[Record],
    ) -> Result<(), StoreError> {
        write_records(&self.summary_path(date), records).await
    }

    pub async fn load_summarized(&self, date: NaiveDate) -> Result<Vec<Record>, StoreError> {
        read_records(&self.summary_path(date)).await
    }

    /// Take the exclusive writer lock for `date`.
    ///
    /// Retries while another writer holds it and gives up with
    /// [`StoreError::Locked`] after the configured number of attempts. A lock
    /// left behind by a process that no longer runs is removed and retaken.
    pub async fn lock(&self, date: NaiveDate) -> Result<DayLock, StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;
        let path = self.lock_path(date);

        let mut attempt = 0;
        while attempt < self.lock_attempts {
            attempt += 1;
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    let pid = std::process::id().to_string();
                    let recorded = async {
                        file.write_all(pid.as_bytes()).await?;
                        file.flush().await
                    }
                    .await;
                    if let Err(e) = recorded {
                        warn!(path = %path.display(), error = %e, "Could not record lock holder pid");
                    }
                    debug!(path = %path.display(), attempt, "Acquired day-file lock");
                    return Ok(DayLock { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if self.lock_is_stale(&path).await {
                        match fs::remove_file(&path).await {
                            Ok(()) => {
                                warn!(path = %path.display(), "Removed stale day-file lock");
                                // Taking over does not use up an attempt
                                attempt -= 1;
                                continue;
                            }
                            Err(e) if e.kind() == ErrorKind::NotFound => {
                                attempt -= 1;
                                continue;
                            }
                            Err(e) => return Err(StoreError::io(&path, e)),
                        }
                    }
                    debug!(path = %path.display(), attempt, "Day file locked; waiting");
                    if attempt < self.lock_attempts {
                        sleep(self.lock_delay).await;
                    }
                }
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }

        warn!(path = %path.display(), attempts = self.lock_attempts, "Gave up waiting for day-file lock");
        Err(StoreError::Locked(path))
    }

    /// A lock is stale when its recorded holder is known to have exited, or,
    /// when that cannot be told, when it is older than the stale age.
    async fn lock_is_stale(&self, path: &Path) -> bool {
        let holder = fs::read_to_string(path)
            .await
            .ok()
            .and_then(|raw| raw.trim().parse::<u32>().ok());

        if let Some(pid) = holder {
            match process_alive(pid).await {
                Some(true) => return false,
                Some(false) => {
                    debug!(path = %path.display(), pid, "Lock holder is no longer running");
                    return true;
                }
                None => {}
            }
        }

        let age = match fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO),
            Err(_) => return false,
        };
        age >= self.lock_stale_after
    }
}

/// Whether `pid` is running, when the platform exposes `/proc`.
async fn process_alive(pid: u32) -> Option<bool> {
    if !fs::try_exists("/proc/self").await.unwrap_or(false) {
        return None;
    }
    Some(
        fs::try_exists(format!("/proc/{pid}"))
            .await
            .unwrap_or(false),
    )
}

/// Exclusive writer lock on one day file. Released on drop.
#[derive(Debug)]
pub struct DayLock {
    path: PathBuf,
}

impl Drop for DayLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to release day-file lock");
        }
    }
}

/// Concatenate `incoming` after `existing`, giving incoming records the ids
/// `max(existing) + 1, + 2, ...` in their original order.
pub fn merge_batch(mut existing: Vec<Record>, incoming: Vec<Record>) -> Vec<Record> {
    let max_id = existing.iter().map(|r| r.id).max().unwrap_or(0);
    existing.extend(incoming.into_iter().zip(1u64..).map(|(mut record, k)| {
        record.id = max_id + k;
        record
    }));
    existing
}

/// Assign ids `1..=n` in slice order.
pub fn renumber(records: &mut [Record]) {
    for (record, id) in records.iter_mut().zip(1u64..) {
        record.id = id;
    }
}

/// True when ids are exactly `1..=n` in order.
pub fn ids_are_contiguous(records: &[Record]) -> bool {
    records.iter().zip(1u64..).all(|(r, expected)| r.id == expected)
}

async fn read_records(path: &Path) -> Result<Vec<Record>, StoreError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(StoreError::io(path, e)),
    };

    let parsed = parse_day_file(&bytes).map_err(|e| StoreError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if parsed.legacy_shape {
        warn!(path = %path.display(), "Day file uses a wrapped legacy shape; run `normalize` to rewrite it");
    }
    debug!(path = %path.display(), count = parsed.records.len(), "Read day file");
    Ok(parsed.records)
}

async fn write_records(path: &Path, records: &[Record]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }
    let json = serde_json::to_vec_pretty(records)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, json)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    debug!(path = %path.display(), count = records.len(), "Wrote day file");
    Ok(())
}
