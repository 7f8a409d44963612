//! In-memory cache of compiled templates.
//!
//! [`TemplateCache`] maps a logical template id to either a compiled value or
//! a *negative* entry recording that the source could not be read. Entries
//! use a sliding TTL: every hit refreshes the entry's timestamp.
//!
//! Expiry is enforced twice:
//! - on read, an entry older than the TTL is dropped and reported as a miss;
//! - [`TemplateCache::sweep`] removes every expired entry, and
//!   [`spawn_sweeper`] runs it on a background thread at a fixed interval.
//!
//! Disabling the cache ([`TemplateCache::set_enabled`]) turns every lookup
//! into a miss and every store into a no-op, so edits are always picked up.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use imdl_cache::{Lookup, TemplateCache};
//!
//! let cache = TemplateCache::new(Some(Duration::from_secs(60)));
//! cache.insert("index", "<h1>Home</h1>".to_owned());
//! cache.insert_absent("missing");
//!
//! assert!(matches!(cache.get("index"), Lookup::Hit(_)));
//! assert!(matches!(cache.get("missing"), Lookup::Absent));
//! assert!(matches!(cache.get("other"), Lookup::Miss));
//! ```

mod sweeper;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub use sweeper::{SweeperHandle, spawn_sweeper};

/// Result of a cache lookup.
#[derive(Debug)]
pub enum Lookup<T> {
    /// Cached value.
    Hit(Arc<T>),
    /// Known absent: a previous read failed.
    Absent,
    /// Nothing cached (or expired, or the cache is disabled).
    Miss,
}

impl<T> Lookup<T> {
    /// The cached value, if this is a hit.
    pub fn hit(self) -> Option<Arc<T>> {
        match self {
            Self::Hit(value) => Some(value),
            Self::Absent | Self::Miss => None,
        }
    }
}

struct Entry<T> {
    /// `None` marks a negative entry.
    payload: Option<Arc<T>>,
    touched_at: Instant,
}

impl<T> Entry<T> {
    fn expired(&self, ttl: Option<Duration>, now: Instant) -> bool {
        ttl.is_some_and(|ttl| now.duration_since(self.touched_at) > ttl)
    }
}

/// Thread-safe compiled template cache.
pub struct TemplateCache<T> {
    entries: Mutex<HashMap<String, Entry<T>>>,
    ttl: Option<Duration>,
    enabled: AtomicBool,
}

impl<T> TemplateCache<T> {
    /// Create an enabled cache. `ttl = None` means entries never expire.
    #[must_use]
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            enabled: AtomicBool::new(true),
        }
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Whether lookups and stores are active.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enable or bypass the cache. Existing entries are kept while bypassed.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Look up `id`, refreshing the entry's timestamp on a hit.
    pub fn get(&self, id: &str) -> Lookup<T> {
        if !self.is_enabled() {
            return Lookup::Miss;
        }

        let now = Instant::now();
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(id) else {
            tracing::debug!(id, "Cache miss");
            return Lookup::Miss;
        };

        if entry.expired(self.ttl, now) {
            entries.remove(id);
            tracing::debug!(id, "Cache entry expired on read");
            return Lookup::Miss;
        }

        entry.touched_at = now;
        match &entry.payload {
            Some(value) => {
                tracing::debug!(id, "Cache hit");
                Lookup::Hit(Arc::clone(value))
            }
            None => {
                tracing::debug!(id, "Negative cache hit");
                Lookup::Absent
            }
        }
    }

    /// Store a compiled value and return the shared handle to it.
    ///
    /// When the cache is disabled the value is returned without being stored.
    pub fn insert(&self, id: impl Into<String>, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.store(id.into(), Some(Arc::clone(&value)));
        value
    }

    /// Record that `id` could not be read.
    pub fn insert_absent(&self, id: impl Into<String>) {
        self.store(id.into(), None);
    }

    fn store(&self, id: String, payload: Option<Arc<T>>) {
        if !self.is_enabled() {
            return;
        }
        let entry = Entry {
            payload,
            touched_at: Instant::now(),
        };
        self.lock().insert(id, entry);
    }

    /// Drop the entry for `id`. Returns whether one existed.
    pub fn invalidate(&self, id: &str) -> bool {
        let removed = self.lock().remove(id).is_some();
        if removed {
            tracing::debug!(id, "Cache entry invalidated");
        }
        removed
    }

    /// Remove every expired entry. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.expired(self.ttl, now));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = entries.len(), "Cache swept");
        }
        removed
    }

    /// Drop every entry.
    pub fn reset(&self) {
        self.lock().clear();
        tracing::debug!("Cache reset");
    }

    /// Number of stored entries, negative ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> std::fmt::Debug for TemplateCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateCache")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn cache(ttl_ms: u64) -> TemplateCache<String> {
        TemplateCache::new(Some(Duration::from_millis(ttl_ms)))
    }

    #[test]
    fn test_miss_on_empty() {
        let cache = cache(1000);

        assert!(matches!(cache.get("index"), Lookup::Miss));
    }

    #[test]
    fn test_hit_returns_same_value() {
        let cache = cache(1000);
        let stored = cache.insert("index", "<p>x</p>".to_owned());

        let hit = cache.get("index").hit().unwrap();

        assert!(Arc::ptr_eq(&stored, &hit));
        assert_eq!(*hit, "<p>x</p>");
    }

    #[test]
    fn test_negative_entry() {
        let cache = cache(1000);
        cache.insert_absent("gone");

        assert!(matches!(cache.get("gone"), Lookup::Absent));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_insert_replaces_negative_entry() {
        let cache = cache(1000);
        cache.insert_absent("page");
        cache.insert("page", "v1".to_owned());

        assert!(matches!(cache.get("page"), Lookup::Hit(_)));
    }

    #[test]
    fn test_expired_on_read_before_sweep() {
        let cache = cache(50);
        cache.insert("index", "x".to_owned());

        thread::sleep(Duration::from_millis(100));

        assert_eq!(cache.len(), 1, "no sweep has run yet");
        assert!(matches!(cache.get("index"), Lookup::Miss));
        assert_eq!(cache.len(), 0, "expired entry dropped on read");
    }

    #[test]
    fn test_expired_by_sweep() {
        let cache = cache(50);
        cache.insert("a", "x".to_owned());
        cache.insert_absent("b");

        thread::sleep(Duration::from_millis(100));
        cache.insert("fresh", "y".to_owned());

        assert_eq!(cache.sweep(), 2);
        assert_eq!(cache.len(), 1);
        assert!(matches!(cache.get("fresh"), Lookup::Hit(_)));
    }

    #[test]
    fn test_hit_refreshes_timestamp() {
        let cache = cache(80);
        cache.insert("index", "x".to_owned());

        for _ in 0..4 {
            thread::sleep(Duration::from_millis(40));
            assert!(matches!(cache.get("index"), Lookup::Hit(_)));
        }
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let cache: TemplateCache<String> = TemplateCache::new(None);
        cache.insert("index", "x".to_owned());

        thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.sweep(), 0);
        assert!(matches!(cache.get("index"), Lookup::Hit(_)));
    }

    #[test]
    fn test_invalidate() {
        let cache = cache(1000);
        cache.insert("index", "x".to_owned());

        assert!(cache.invalidate("index"));
        assert!(!cache.invalidate("index"));
        assert!(matches!(cache.get("index"), Lookup::Miss));
    }

    #[test]
    fn test_reset() {
        let cache = cache(1000);
        cache.insert("a", "x".to_owned());
        cache.insert_absent("b");

        cache.reset();

        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_bypasses_reads_and_writes() {
        let cache = cache(1000);
        cache.insert("kept", "x".to_owned());
        cache.set_enabled(false);

        let value = cache.insert("new", "y".to_owned());
        cache.insert_absent("gone");

        assert_eq!(*value, "y");
        assert!(matches!(cache.get("kept"), Lookup::Miss));
        assert!(matches!(cache.get("new"), Lookup::Miss));
        assert_eq!(cache.len(), 1);

        cache.set_enabled(true);
        assert!(matches!(cache.get("kept"), Lookup::Hit(_)));
        assert!(matches!(cache.get("new"), Lookup::Miss));
    }

    #[test]
    fn test_concurrent_get_and_invalidate() {
        let cache = Arc::new(cache(1000));
        cache.insert("index", "x".to_owned());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for _ in 0..200 {
                        if i % 2 == 0 {
                            cache.invalidate("index");
                        } else {
                            cache.insert("index", "x".to_owned());
                        }
                        // Racing a delete is a miss, never a panic.
                        let _ = cache.get("index");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_cache_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TemplateCache<String>>();
    }
}
