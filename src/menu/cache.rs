use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use tokio::sync::RwLock;

const MAX_TTL_SECONDS: u64 = 365 * 24 * 3600;

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

impl<T: Clone> CacheEntry<T> {
    fn new(value: T, ttl_seconds: u64) -> Self {
        let ttl = ttl_seconds.min(MAX_TTL_SECONDS) as i64;
        Self {
            value,
            expires_at: Utc::now() + chrono::Duration::seconds(ttl),
        }
    }

    /// A zero TTL entry is expired as soon as it is written.
    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Process local map whose entries expire after a fixed TTL.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl_seconds: u64,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    pub async fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.is_expired());
        entries.insert(key, CacheEntry::new(value, self.ttl_seconds));
    }

    pub async fn remove(&self, key: &K) {
        self.entries.write().await.remove(key);
    }

    pub async fn retain<F>(&self, mut keep: F)
    where
        F: FnMut(&K) -> bool,
    {
        self.entries.write().await.retain(|k, _| keep(k));
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|entry| !entry.is_expired()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
