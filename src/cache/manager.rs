//! Rate-limited cache persisting the last fetch result per key
//!
//! Provides a `RateLimitedCache` that stores one JSON lockfile per key with the
//! time of the last successful fetch and its payload. A costly fetch only runs
//! once the configured interval has elapsed; otherwise, or when the fetch fails,
//! the last known payload is returned.

use std::fmt;
use std::fs;
use std::future::Future;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::outcome::FetchOutcome;

/// Errors raised while reading or writing a lockfile
#[derive(Debug, Error)]
pub enum CacheError {
    /// The lockfile exists but could not be read
    #[error("Failed to read cache record: {0}")]
    Read(#[source] std::io::Error),

    /// The lockfile content is not a valid record
    #[error("Malformed cache record: {0}")]
    Parse(#[source] serde_json::Error),

    /// The record could not be encoded
    #[error("Failed to encode cache record: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The record could not be written to disk
    #[error("Failed to persist cache record: {0}")]
    Persist(#[source] std::io::Error),
}

/// Contents of a lockfile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// When the last successful fetch happened
    #[serde(deserialize_with = "deserialize_last_run")]
    pub last_run: DateTime<Utc>,
    /// Payload produced by that fetch
    pub last_data: Vec<String>,
}

/// Accepts RFC 3339 timestamps as well as the naive local ISO-8601 form
/// (`2025-01-03T14:22:05.123456`) found in older lockfiles.
fn deserialize_last_run<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_last_run(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid last_run timestamp: {}", raw)))
}

fn parse_last_run(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    let naive: NaiveDateTime = raw.parse().ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Freshness of a key as seen by `status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    /// No lockfile yet
    Absent,
    /// Within the interval; fetches are skipped until `next_due`
    Fresh {
        last_run: DateTime<Utc>,
        next_due: Option<DateTime<Utc>>,
        items: usize,
    },
    /// The interval has elapsed; the next fetch will run
    Stale { last_run: DateTime<Utc>, items: usize },
    /// The lockfile exists but cannot be used
    Unreadable(String),
}

impl CacheStatus {
    /// Whether a fetch would run right now
    pub fn is_due(&self) -> bool {
        !matches!(self, CacheStatus::Fresh { .. })
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStatus::Absent => write!(f, "absent (due)"),
            CacheStatus::Fresh {
                last_run,
                next_due,
                items,
            } => {
                write!(f, "fresh: {} items, last run {}", items, last_run.to_rfc3339())?;
                match next_due {
                    Some(next_due) => write!(f, ", next fetch due {}", next_due.to_rfc3339()),
                    None => Ok(()),
                }
            }
            CacheStatus::Stale { last_run, items } => write!(
                f,
                "stale (due): {} items, last run {}",
                items,
                last_run.to_rfc3339()
            ),
            CacheStatus::Unreadable(reason) => write!(f, "unreadable (due): {}", reason),
        }
    }
}

/// Gatekeeps a costly fetch behind a minimum interval
///
/// Each key is stored as `<cache_dir>/<key>.json`, with characters that are
/// not allowed in file names percent-encoded. Unreadable or corrupt
/// lockfiles are treated as missing, so they never block a fetch.
#[derive(Clone)]
pub struct RateLimitedCache {
    /// Directory where lockfiles are stored
    cache_dir: PathBuf,
    /// Source of `last_run` timestamps and staleness checks
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RateLimitedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitedCache")
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

impl RateLimitedCache {
    /// Creates a cache rooted at a custom directory
    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Directory holding the lockfiles
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the lockfile backing `key`
    pub fn lockfile_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", encode_key(key)))
    }

    /// Reads the record for `key`
    ///
    /// # Returns
    /// * `Ok(None)` if no lockfile exists
    /// * `Ok(Some(record))` if it exists and parses
    /// * `Err(CacheError)` if it exists but cannot be read or parsed
    pub fn read_record(&self, key: &str) -> Result<Option<CacheRecord>, CacheError> {
        let content = match fs::read_to_string(self.lockfile_path(key)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Read(e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(CacheError::Parse)
    }

    /// Fail-open read: any error is logged and treated as a missing record
    fn load(&self, key: &str) -> Option<CacheRecord> {
        match self.read_record(key) {
            Ok(record) => record,
            Err(error) => {
                warn!(key, %error, "Ignoring unusable cache record");
                None
            }
        }
    }

    /// A `last_run` slightly ahead of the clock is still fresh. One more than
    /// a whole interval ahead counts as stale so a corrupt timestamp cannot
    /// hold off fetches indefinitely.
    fn is_stale(&self, record: &CacheRecord, interval: Duration) -> bool {
        let now = self.clock.now();
        match now.signed_duration_since(record.last_run).to_std() {
            Ok(elapsed) => elapsed > interval,
            Err(_) => record
                .last_run
                .signed_duration_since(now)
                .to_std()
                .map_or(true, |ahead| ahead > interval),
        }
    }

    /// Returns true when more than `interval` has passed since the last fetch
    ///
    /// Missing, unreadable or malformed lockfiles are always due.
    pub fn is_due(&self, key: &str, interval: Duration) -> bool {
        match self.load(key) {
            Some(record) => self.is_stale(&record, interval),
            None => true,
        }
    }

    /// Returns the last cached payload, or an empty list if there is none
    pub fn get_cached(&self, key: &str) -> Vec<String> {
        self.load(key)
            .map(|record| record.last_data)
            .unwrap_or_default()
    }

    /// Persists `data` with the current time as the record for `key`
    ///
    /// The record is written to a uniquely named temporary sibling and renamed
    /// into place, so readers never see a partially written lockfile and
    /// concurrent writers never share a temporary file.
    pub fn record(&self, key: &str, data: &[String]) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_dir).map_err(CacheError::Persist)?;

        let record = CacheRecord {
            last_run: self.clock.now(),
            last_data: data.to_vec(),
        };
        let json = serde_json::to_string_pretty(&record).map_err(CacheError::Serialize)?;

        let path = self.lockfile_path(key);
        let mut file = NamedTempFile::new_in(&self.cache_dir).map_err(CacheError::Persist)?;
        file.write_all(json.as_bytes()).map_err(CacheError::Persist)?;
        file.as_file().sync_all().map_err(CacheError::Persist)?;
        // On failure the temporary file is handed back and removed when dropped.
        file.persist(&path).map_err(|e| CacheError::Persist(e.error))?;

        debug!(key, path = %path.display(), "Wrote cache record");
        Ok(())
    }

    /// Describes the freshness of `key` without touching it
    pub fn status(&self, key: &str, interval: Duration) -> CacheStatus {
        let record = match self.read_record(key) {
            Ok(Some(record)) => record,
            Ok(None) => return CacheStatus::Absent,
            Err(error) => return CacheStatus::Unreadable(error.to_string()),
        };

        let items = record.last_data.len();
        if self.is_stale(&record, interval) {
            CacheStatus::Stale {
                last_run: record.last_run,
                items,
            }
        } else {
            let next_due = chrono::Duration::from_std(interval)
                .ok()
                .and_then(|interval| record.last_run.checked_add_signed(interval));
            CacheStatus::Fresh {
                last_run: record.last_run,
                next_due,
                items,
            }
        }
    }

    /// Runs `fetch` if `key` is due, otherwise returns the cached payload
    ///
    /// # Behavior
    /// - Not due: returns cached data without calling `fetch`
    /// - Due and `fetch` succeeds: records and returns the fresh data, even if
    ///   the record cannot be written
    /// - Due and `fetch` fails: leaves the record untouched and falls back to
    ///   the cached data (empty on a first run)
    pub async fn fetch_with_outcome<F, Fut, E>(
        &self,
        key: &str,
        interval: Duration,
        fetch: F,
    ) -> FetchOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<String>, E>>,
        E: fmt::Display,
    {
        if !self.is_due(key, interval) {
            debug!(key, "Within interval, serving cached data");
            return FetchOutcome::Cached(self.get_cached(key));
        }

        match fetch().await {
            Ok(data) => {
                let persisted = match self.record(key, &data) {
                    Ok(()) => {
                        info!(key, items = data.len(), "Fetched and cached fresh data");
                        true
                    }
                    Err(error) => {
                        warn!(key, %error, "Fetched data could not be cached");
                        false
                    }
                };
                FetchOutcome::Fetched { data, persisted }
            }
            Err(error) => {
                let error = error.to_string();
                warn!(key, %error, "Fetch failed, falling back to cached data");
                FetchOutcome::Fallback {
                    data: self.get_cached(key),
                    error,
                }
            }
        }
    }

    /// Same as [`RateLimitedCache::fetch_with_outcome`], keeping only the data
    pub async fn fetch_if_due<F, Fut, E>(&self, key: &str, interval: Duration, fetch: F) -> Vec<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<String>, E>>,
        E: fmt::Display,
    {
        self.fetch_with_outcome(key, interval, fetch)
            .await
            .into_data()
    }
}

/// Percent-encodes characters that are not allowed in file names
///
/// `%` is encoded too, so distinct keys always map to distinct files.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '%' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => {
                encoded.push_str(&format!("%{:02X}", c as u32))
            }
            c if c.is_control() => encoded.push_str(&format!("%{:02X}", c as u32)),
            c => encoded.push(c),
        }
    }
    encoded
}
