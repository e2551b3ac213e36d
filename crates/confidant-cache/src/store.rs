//! Key-value map with per-entry expiry and lazy eviction.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Entry stored in the map.
#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Compute `start + ttl`, saturating for absurdly large TTLs.
fn deadline(start: Instant, ttl: Duration) -> Instant {
    start
        .checked_add(ttl)
        .unwrap_or_else(|| start + Duration::from_secs(u32::MAX as u64))
}

/// Thread-safe map whose entries expire after a per-entry TTL.
///
/// By default an entry is gone once its deadline is reached. A store built
/// with [`with_inclusive_deadline`](Self::with_inclusive_deadline) keeps
/// entries through the deadline instant and drops them only after it.
///
/// Expired entries are never returned. They are removed lazily when read,
/// when [`size`](Self::size) compacts the map, or when the owner calls
/// [`purge_expired`](Self::purge_expired) (typically from a scheduled task).
///
/// All operations take a single lock scoped to this store. Cloning the store
/// yields another handle onto the same map.
pub struct ExpiringStore<K, V> {
    entries: Arc<Mutex<HashMap<K, Entry<V>>>>,
    default_ttl: Duration,
    inclusive_deadline: bool,
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash,
{
    /// Create an empty store whose entries default to `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            default_ttl,
            inclusive_deadline: false,
        }
    }

    /// Keep entries live at exactly their deadline.
    pub fn with_inclusive_deadline(mut self) -> Self {
        self.inclusive_deadline = true;
        self
    }

    /// TTL applied when [`set`](Self::set) is called without one.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Insert or overwrite `key`, expiring after `ttl` (or the default TTL).
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        self.set_from(key, value, Instant::now(), ttl.unwrap_or(self.default_ttl));
    }

    /// Insert or overwrite `key`, expiring `ttl` after `start`.
    ///
    /// Lets a value that records its own timestamp share it with the store.
    pub fn set_from(&self, key: K, value: V, start: Instant, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: deadline(start, ttl),
        };
        self.entries.lock().insert(key, entry);
    }

    /// Remove `key` regardless of its expiry. Returns whether it was present.
    pub fn delete<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.lock().remove(key).is_some()
    }

    /// Check whether `key` holds a live entry, evicting it if expired.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.with_live(key, |_, _| ()).is_some()
    }

    /// Number of live entries. Compacts the map as a side effect.
    pub fn size(&self) -> usize {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        entries.retain(|_, entry| self.is_live(entry, now));
        entries.len()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn raw_len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Remove every expired entry and return how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, entry| self.is_live(entry, now));
        let purged = before - entries.len();
        if purged > 0 {
            trace!(purged, remaining = entries.len(), "Purged expired entries");
        }
        purged
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Mutate a live entry in place without changing its expiry.
    pub fn update<Q, F, R>(&self, key: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&mut V) -> R,
    {
        self.with_live(key, |entry, _| f(&mut entry.value))
    }

    /// Mutate a live entry and restart its expiry.
    ///
    /// The closure receives the current instant and returns the TTL to apply
    /// from that instant.
    pub fn renew<Q, F>(&self, key: &Q, f: F) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&mut V, Instant) -> Duration,
    {
        self.with_live(key, |entry, now| {
            let ttl = f(&mut entry.value, now);
            entry.expires_at = deadline(now, ttl);
        })
        .is_some()
    }

    /// Apply `f` to every live entry, collecting the `Some` results.
    ///
    /// Read-only: expired entries are skipped but not evicted.
    pub fn filter_map_live<F, R>(&self, mut f: F) -> Vec<R>
    where
        F: FnMut(&K, &V) -> Option<R>,
    {
        let entries = self.entries.lock();
        let now = Instant::now();
        entries
            .iter()
            .filter(|(_, entry)| self.is_live(entry, now))
            .filter_map(|(key, entry)| f(key, &entry.value))
            .collect()
    }

    /// Remove live entries for which `keep` returns false and every expired
    /// entry. Returns the number of entries removed.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut entries = self.entries.lock();
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|key, entry| self.is_live(entry, now) && keep(key, &entry.value));
        before - entries.len()
    }

    fn is_live(&self, entry: &Entry<V>, now: Instant) -> bool {
        if self.inclusive_deadline {
            entry.expires_at >= now
        } else {
            entry.expires_at > now
        }
    }

    /// Run `f` on the entry for `key` if it is live; evict it if it expired.
    fn with_live<Q, F, R>(&self, key: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&mut Entry<V>, Instant) -> R,
    {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.get_mut(key) {
            Some(entry) if self.is_live(entry, now) => Some(f(entry, now)),
            Some(_) => {
                entries.remove(key);
                trace!("Evicted expired entry on access");
                None
            }
            None => None,
        }
    }
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Get a clone of the live value for `key`, evicting it if expired.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.with_live(key, |entry, _| entry.value.clone())
    }
}

impl<K, V> Clone for ExpiringStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            default_ttl: self.default_ttl,
            inclusive_deadline: self.inclusive_deadline,
        }
    }
}

impl<K, V> fmt::Debug for ExpiringStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringStore")
            .field("entries", &self.entries.lock().len())
            .field("default_ttl", &self.default_ttl)
            .field("inclusive_deadline", &self.inclusive_deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn store() -> ExpiringStore<String, u32> {
        ExpiringStore::new(Duration::from_secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_visible_until_ttl() {
        let store = store();
        store.set("k".to_string(), 7, Some(Duration::from_secs(10)));

        advance(Duration::from_millis(9_999)).await;
        assert_eq!(store.get("k"), Some(7));

        advance(Duration::from_millis(1)).await;
        assert_eq!(store.get("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inclusive_deadline_keeps_entry_at_ttl() {
        let store = store().with_inclusive_deadline();
        store.set("k".to_string(), 7, Some(Duration::from_secs(10)));

        advance(Duration::from_secs(10)).await;
        assert_eq!(store.get("k"), Some(7));
        assert_eq!(store.size(), 1);

        advance(Duration::from_millis(1)).await;
        assert_eq!(store.get("k"), None);
        assert_eq!(store.raw_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_from_measures_ttl_from_start() {
        let store = store();
        let start = Instant::now();
        advance(Duration::from_secs(4)).await;

        store.set_from("k".to_string(), 1, start, Duration::from_secs(5));
        assert!(store.contains("k"));

        advance(Duration::from_secs(1)).await;
        assert!(!store.contains("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_ttl_applies() {
        let store = store();
        store.set("k".to_string(), 1, None);

        advance(Duration::from_secs(59)).await;
        assert!(store.contains("k"));

        advance(Duration::from_secs(1)).await;
        assert!(!store.contains("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_read_evicts_entry() {
        let store = store();
        store.set("a".to_string(), 1, Some(Duration::from_secs(1)));
        store.set("b".to_string(), 2, Some(Duration::from_secs(100)));

        advance(Duration::from_secs(2)).await;
        assert_eq!(store.raw_len(), 2);

        assert_eq!(store.get("a"), None);
        assert_eq!(store.raw_len(), 1);
        assert_eq!(store.size(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_size_compacts() {
        let store = store();
        for i in 0..5 {
            store.set(format!("k{i}"), i, Some(Duration::from_secs(i as u64 + 1)));
        }

        advance(Duration::from_secs(3)).await;
        assert_eq!(store.size(), 2);
        assert_eq!(store.raw_len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_expiry() {
        let store = store();
        store.set("k".to_string(), 1, Some(Duration::from_secs(5)));
        advance(Duration::from_secs(4)).await;

        store.set("k".to_string(), 2, Some(Duration::from_secs(5)));
        advance(Duration::from_secs(4)).await;

        assert_eq!(store.get("k"), Some(2));
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let store = store();
        assert!(!store.delete("missing"));

        store.set("k".to_string(), 1, None);
        assert!(store.delete("k"));
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn test_zero_ttl_is_immediately_expired() {
        let store = store();
        store.set("k".to_string(), 1, Some(Duration::ZERO));
        assert_eq!(store.get("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_counts() {
        let store = store();
        store.set("a".to_string(), 1, Some(Duration::from_secs(1)));
        store.set("b".to_string(), 2, Some(Duration::from_secs(1)));
        store.set("c".to_string(), 3, Some(Duration::from_secs(10)));

        advance(Duration::from_secs(2)).await;
        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.purge_expired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_keeps_expiry() {
        let store = store();
        store.set("k".to_string(), 1, Some(Duration::from_secs(5)));
        advance(Duration::from_secs(3)).await;

        assert_eq!(store.update("k", |v| {
            *v += 1;
            *v
        }), Some(2));

        advance(Duration::from_secs(2)).await;
        assert_eq!(store.update("k", |v| *v), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renew_extends_expiry() {
        let store = store();
        store.set("k".to_string(), 1, Some(Duration::from_secs(5)));
        advance(Duration::from_secs(4)).await;

        assert!(store.renew("k", |_, _| Duration::from_secs(5)));
        advance(Duration::from_secs(4)).await;
        assert_eq!(store.get("k"), Some(1));

        advance(Duration::from_secs(1)).await;
        assert!(!store.renew("k", |_, _| Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_map_live_skips_expired() {
        let store = store();
        store.set("a".to_string(), 1, Some(Duration::from_secs(1)));
        store.set("b".to_string(), 2, Some(Duration::from_secs(10)));
        store.set("c".to_string(), 3, Some(Duration::from_secs(10)));

        advance(Duration::from_secs(2)).await;
        let mut odd: Vec<u32> = store.filter_map_live(|_, v| (v % 2 == 1).then_some(*v));
        odd.sort();
        assert_eq!(odd, vec![3]);
        assert_eq!(store.raw_len(), 3);
    }

    #[test]
    fn test_retain_removes_rejected() {
        let store = store();
        for i in 0..4 {
            store.set(format!("k{i}"), i, None);
        }

        assert_eq!(store.retain(|_, v| v % 2 == 0), 2);
        assert_eq!(store.size(), 2);
    }

    #[test]
    fn test_clones_share_entries() {
        let store = store();
        let other = store.clone();
        store.set("k".to_string(), 1, None);

        assert_eq!(other.get("k"), Some(1));
        other.clear();
        assert_eq!(store.size(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let store: ExpiringStore<String, usize> = ExpiringStore::new(Duration::from_secs(60));
        let mut handles = Vec::new();
        for worker in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    store.set(format!("{worker}-{i}"), i, None);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.size(), 400);
    }
}
