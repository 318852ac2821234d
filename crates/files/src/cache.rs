//! Process-wide TTL cache of parsed file content, keyed by source URL.
//!
//! Entries expire a fixed time after they were written (20 minutes by
//! default). Expiry is checked on read; an expired entry is a miss and is
//! overwritten by the next successful load.
//!
//! Concurrent misses for the same URL are coalesced: the first caller runs
//! the load, later callers wait on the same in-flight cell and share its
//! result. Failed loads are handed to every waiter but never cached.

use chrono::{DateTime, Duration, Utc};
use rustedflow_core::error::FileError;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, LazyLock, Mutex, PoisonError, RwLock};
use tokio::sync::OnceCell;
use tracing::debug;

/// Default lifetime of a cache entry.
pub const DEFAULT_TTL_MINUTES: i64 = 20;

static GLOBAL: LazyLock<Arc<ContentCache>> = LazyLock::new(|| Arc::new(ContentCache::new()));

/// Parsed content of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedContent {
    /// Display name reported by the source (falls back to the URL)
    pub source_name: String,
    pub text: String,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    content: CachedContent,
    expires_at: DateTime<Utc>,
}

type LoadResult = Result<CachedContent, FileError>;
type InflightCell = Arc<OnceCell<LoadResult>>;

/// TTL content cache with per-key single-flight loading.
pub struct ContentCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
    inflight: Mutex<HashMap<String, InflightCell>>,
}

impl ContentCache {
    /// Create a cache with the default 20 minute TTL.
    pub fn new() -> Self {
        Self::with_ttl(Duration::minutes(DEFAULT_TTL_MINUTES))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// The cache shared by every dispatch in this process.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a non-expired entry.
    pub fn get(&self, url: &str) -> Option<CachedContent> {
        self.get_at(url, Utc::now())
    }

    pub fn get_at(&self, url: &str, now: DateTime<Utc>) -> Option<CachedContent> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(url)
            .filter(|e| now <= e.expires_at)
            .map(|e| e.content.clone())
    }

    /// Store content for `url`, replacing any previous entry.
    pub fn insert(&self, url: &str, content: CachedContent) {
        self.insert_at(url, content, Utc::now());
    }

    pub fn insert_at(&self, url: &str, content: CachedContent, now: DateTime<Utc>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            url.to_string(),
            CacheEntry {
                content,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, e| now <= e.expires_at);
        before - entries.len()
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return cached content for `url`, running `load` on a miss.
    ///
    /// At most one `load` runs per URL at a time; concurrent callers for the
    /// same URL share its result.
    pub async fn get_or_load<F, Fut>(&self, url: &str, load: F) -> LoadResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = LoadResult>,
    {
        if let Some(hit) = self.get(url) {
            debug!(url, "Content cache hit");
            return Ok(hit);
        }

        let cell = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                inflight
                    .entry(url.to_string())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let result = cell
            .get_or_init(|| async move {
                // A previous flight may have finished between the miss and now.
                if let Some(hit) = self.get(url) {
                    return Ok(hit);
                }
                debug!(url, "Content cache miss, loading");
                let loaded = load().await;
                if let Ok(content) = &loaded {
                    self.insert(url, content.clone());
                }
                loaded
            })
            .await
            .clone();

        let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if inflight.get(url).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
            inflight.remove(url);
        }

        result
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new()
    }
}
