/// In-memory TTL cache shared by identity resolution and record fetches
///
/// Entries carry an absolute expiry assigned at write time and are evicted
/// lazily on read. There is no size bound and nothing is persisted.

use crate::identity::ResolvedIdentity;
use crate::record::{Document, Publication, RecordEnvelope};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Upper bound used when `now + ttl` would overflow the clock
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Generic key/value store with per-entry expiry
pub struct TtlCache<V> {
    store: DashMap<String, CacheEntry<V>>,
    default_ttl_ms: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache whose untimed writes expire after `default_ttl`
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            store: DashMap::new(),
            default_ttl_ms: AtomicU64::new(duration_millis(default_ttl)),
        }
    }

    /// Get a live value, evicting it first if it has expired
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        match self.store.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }

        // Only drop the entry if it is still the expired one; a concurrent
        // writer may have replaced it since the read above.
        if self.store.remove_if(key, |_, e| e.is_expired(now)).is_some() {
            debug!("Cache EXPIRED: {}", key);
        }
        None
    }

    /// Store a value under the current default TTL
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl());
    }

    /// Store a value with an explicit TTL, overwriting any existing entry
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + FAR_FUTURE);

        self.store.insert(key.into(), CacheEntry { value, expires_at });
    }

    pub fn delete(&self, key: &str) {
        self.store.remove(key);
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    /// Change the TTL used by future untimed writes; existing entries keep their expiry
    pub fn set_default_ttl(&self, ttl: Duration) {
        self.default_ttl_ms
            .store(duration_millis(ttl), Ordering::Relaxed);
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms.load(Ordering::Relaxed))
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Eagerly drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.store.len();
        self.store.retain(|_, e| !e.is_expired(now));
        before.saturating_sub(self.store.len())
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CACHE_TTL)
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Everything the reader stores in its shared cache
#[derive(Debug, Clone)]
pub enum CachedValue {
    Identity(ResolvedIdentity),
    Publication(Arc<RecordEnvelope<Publication>>),
    Publications(Arc<Vec<RecordEnvelope<Publication>>>),
    Document(Arc<RecordEnvelope<Document>>),
    Documents(Arc<Vec<RecordEnvelope<Document>>>),
}

/// The cache instance injected into the resolver and repository
pub type RecordCache = TtlCache<CachedValue>;

/// Cache key builders; every key is scoped by entity kind and DID
///
/// DIDs and record keys may both contain `:`, so each part is
/// percent-encoded before joining.
pub mod keys {
    use urlencoding::encode;

    pub fn identity(did: &str) -> String {
        format!("identity:{}", encode(did))
    }

    pub fn publication(did: &str, rkey: &str) -> String {
        format!("publication:{}:{}", encode(did), encode(rkey))
    }

    pub fn all_publications(did: &str) -> String {
        format!("publications:{}:all", encode(did))
    }

    pub fn document(did: &str, rkey: &str) -> String {
        format!("document:{}:{}", encode(did), encode(rkey))
    }

    pub fn all_documents(did: &str) -> String {
        format!("documents:{}:all", encode(did))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_get_before_and_after_expiry() {
        let cache: TtlCache<String> = TtlCache::new(Duration::from_secs(10));
        cache.set("k", "v".to_string());

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get("k").as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k"), None);
        // Lazy eviction removed the entry
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_is_immediately_absent() {
        let cache: TtlCache<u32> = TtlCache::default();
        cache.set_with_ttl("k", 7, Duration::ZERO);
        assert_eq!(cache.get("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_ttl_change_affects_only_future_writes() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60));
        cache.set("old", 1);

        cache.set_default_ttl(Duration::from_secs(5));
        assert_eq!(cache.default_ttl(), Duration::from_secs(5));
        cache.set("new", 2);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get("old"), Some(1));
        assert_eq!(cache.get("new"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_expiry() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(10));
        cache.set("k", 1);
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("k", 2);
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn test_delete_and_clear() {
        let cache: TtlCache<u32> = TtlCache::default();
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);

        cache.delete("a");
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("b"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(1));
        cache.set("short", 1);
        cache.set_with_ttl("long", 2, Duration::from_secs(100));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let cache: TtlCache<u32> = TtlCache::default();
        cache.set_with_ttl("k", 1, Duration::MAX);
        assert_eq!(cache.get("k"), Some(1));
    }

    #[test]
    fn test_keys_are_scoped() {
        assert_eq!(keys::identity("did:plc:a"), "identity:did%3Aplc%3Aa");
        assert_eq!(keys::publication("did:plc:a", "x"), "publication:did%3Aplc%3Aa:x");
        assert_eq!(keys::all_publications("did:plc:a"), "publications:did%3Aplc%3Aa:all");
        assert_eq!(keys::document("did:plc:a", "x"), "document:did%3Aplc%3Aa:x");
        assert_eq!(keys::all_documents("did:plc:a"), "documents:did%3Aplc%3Aa:all");
        assert_ne!(keys::publication("did:plc:a", "x"), keys::document("did:plc:a", "x"));
    }

    #[test]
    fn test_keys_do_not_collide_on_colons() {
        assert_ne!(
            keys::publication("did:web:example.com", "u:bob:self"),
            keys::publication("did:web:example.com:u:bob", "self")
        );
        assert_ne!(
            keys::document("did:web:example.com", "u:bob:self"),
            keys::document("did:web:example.com:u:bob", "self")
        );
        // A record key of "all" must not shadow the full listing
        assert_ne!(
            keys::publication("did:web:example.com", "all"),
            keys::all_publications("did:web:example.com")
        );
    }
}
