use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::storage::Storage;
use crate::types::Video;

pub const DEFAULT_NAMESPACE: &str = "cms-cache";
pub const DEFAULT_TTL: Duration = Duration::from_secs(3 * 60 * 60);

/// Stored shape of one entry: `{ "data": [...], "expiry": <epoch ms> }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Vec<Video>,
    pub expiry: i64,
}

/// Time-boxed memoization of parsed results. Expiry is checked lazily on read;
/// write and removal failures are logged and swallowed.
#[derive(Clone)]
pub struct ResponseCache {
    storage: Arc<dyn Storage>,
    namespace: String,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_settings(storage, DEFAULT_NAMESPACE, DEFAULT_TTL)
    }

    pub fn with_settings(storage: Arc<dyn Storage>, namespace: impl Into<String>, ttl: Duration) -> Self {
        Self { storage, namespace: namespace.into(), ttl }
    }

    pub fn namespace(&self) -> &str { &self.namespace }
    pub fn ttl(&self) -> Duration { self.ttl }

    /// `<namespace>-<url>-<query>-<category>`, with the query normalized.
    pub fn key(&self, url: &str, query: Option<&str>, category: Option<&str>) -> String {
        format!(
            "{}-{}-{}-{}",
            self.namespace,
            url,
            query.map(norm_query).unwrap_or_default(),
            category.map(str::trim).unwrap_or_default()
        )
    }

    pub async fn get(&self, key: &str) -> Option<Vec<Video>> {
        let raw = match self.storage.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read failed for {}: {:#}", key, e);
                return None;
            }
        };
        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if current_epoch_ms() <= entry.expiry => {
                debug!("Cache hit: {}", key);
                Some(entry.data)
            }
            Ok(_) => {
                debug!("Cache entry expired: {}", key);
                self.discard(key).await;
                None
            }
            Err(e) => {
                warn!("Discarding corrupt cache entry {}: {}", key, e);
                self.discard(key).await;
                None
            }
        }
    }

    pub async fn put(&self, key: &str, data: &[Video]) {
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        self.put_with_ttl_ms(key, data, ttl_ms).await
    }

    // Negative lifetimes produce an entry that is already stale.
    pub(crate) async fn put_with_ttl_ms(&self, key: &str, data: &[Video], ttl_ms: i64) {
        let entry = CacheEntry { data: data.to_vec(), expiry: current_epoch_ms().saturating_add(ttl_ms) };
        let payload = match serde_json::to_string(&entry) {
            Ok(p) => p,
            Err(e) => {
                warn!("Failed to serialize cache entry {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.storage.set(key, &payload).await {
            warn!("Failed to write cache entry {}: {:#}", key, e);
        }
    }

    /// Remove every entry under this cache's namespace, optionally narrowed by
    /// a further prefix. Returns the number of keys removed.
    pub async fn clear(&self, prefix: Option<&str>) -> u64 {
        let full_prefix = match prefix {
            Some(p) if !p.is_empty() => format!("{}-{}", self.namespace, p),
            _ => format!("{}-", self.namespace),
        };
        let keys = match self.storage.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Failed to enumerate cache keys: {:#}", e);
                return 0;
            }
        };
        let mut removed = 0;
        for key in keys.iter().filter(|k| k.starts_with(&full_prefix)) {
            match self.storage.remove(key).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove cache entry {}: {:#}", key, e),
            }
        }
        removed
    }

    /// Bytes held by this cache's entries (keys plus stored payloads).
    pub async fn size_bytes(&self) -> u64 {
        let prefix = format!("{}-", self.namespace);
        let keys = match self.storage.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Failed to enumerate cache keys: {:#}", e);
                return 0;
            }
        };
        let mut total = 0u64;
        for key in keys.iter().filter(|k| k.starts_with(&prefix)) {
            if let Ok(Some(value)) = self.storage.get(key).await {
                total += (key.len() + value.len()) as u64;
            }
        }
        total
    }

    async fn discard(&self, key: &str) {
        if let Err(e) = self.storage.remove(key).await {
            warn!("Failed to remove cache entry {}: {:#}", key, e);
        }
    }
}

/// Trim and collapse inner whitespace runs to one space. Case is kept: the
/// normalized string is what gets sent upstream.
pub fn norm_query(q: &str) -> String {
    let mut out = String::with_capacity(q.len());
    let mut last_space = false;
    for ch in q.trim().chars() {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out
}

pub(crate) fn current_epoch_ms() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::types::{Episode, SourceKind};

    fn video(id: &str) -> Video {
        Video {
            id: id.to_string(),
            title: format!("Title {id}"),
            description: String::new(),
            thumbnail_url: String::new(),
            episodes: vec![Episode { name: "1".into(), url: "http://v/1.m3u8".into() }],
            remarks: "HD".into(),
            source_id: "s".into(),
            source_name: "S".into(),
            source_kind: SourceKind::CmsApi,
        }
    }

    #[tokio::test]
    async fn put_then_get_hits() {
        let cache = ResponseCache::new(Arc::new(MemoryStorage::new()));
        let key = cache.key("http://api", Some("Foo"), None);
        cache.put(&key, &[video("1"), video("2")]).await;
        let hit = cache.get(&key).await.unwrap();
        assert_eq!(hit.len(), 2);
        assert_eq!(hit[1].id, "2");
    }

    #[tokio::test]
    async fn stale_entry_is_a_miss_and_is_deleted() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = ResponseCache::new(storage.clone());
        let key = cache.key("http://api", Some("foo"), None);
        cache.put_with_ttl_ms(&key, &[video("1")], -1_000).await;
        assert!(storage.get(&key).await.unwrap().is_some());
        assert!(cache.get(&key).await.is_none());
        assert!(storage.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_miss_and_is_deleted() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = ResponseCache::new(storage.clone());
        storage.set("cms-cache-x--", "{oops").await.unwrap();
        assert!(cache.get("cms-cache-x--").await.is_none());
        assert!(storage.get("cms-cache-x--").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_leaves_foreign_keys_alone() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = ResponseCache::new(storage.clone());
        storage.set("vodmux-sources", "[]").await.unwrap();
        cache.put(&cache.key("http://a", None, Some("1")), &[]).await;
        cache.put(&cache.key("http://b", Some("q"), None), &[]).await;
        assert_eq!(cache.clear(Some("http://a")).await, 1);
        assert_eq!(cache.clear(None).await, 1);
        assert_eq!(storage.keys().await.unwrap(), vec!["vodmux-sources".to_string()]);
    }

    #[test]
    fn key_normalizes_whitespace_but_keeps_case() {
        let cache = ResponseCache::new(Arc::new(MemoryStorage::new()));
        assert_eq!(cache.key("http://a", Some("  Big   Show "), None), "cms-cache-http://a-Big Show-");
        assert_ne!(cache.key("http://a", Some("big show"), None), cache.key("http://a", Some("Big Show"), None));
        assert_eq!(cache.key("http://a", None, Some("2")), "cms-cache-http://a--2");
    }

    #[test]
    fn norm_query_collapses_runs() {
        assert_eq!(norm_query(" news \t 24 "), "news 24");
        assert_eq!(norm_query("News"), "News");
        assert_eq!(norm_query("   "), "");
    }

    #[tokio::test]
    async fn size_counts_only_cache_entries() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = ResponseCache::new(storage.clone());
        storage.set("vodmux-sources", "[1,2,3]").await.unwrap();
        assert_eq!(cache.size_bytes().await, 0);
        let key = cache.key("http://a", None, None);
        cache.put(&key, &[video("1")]).await;
        let stored = storage.get(&key).await.unwrap().unwrap();
        assert_eq!(cache.size_bytes().await, (key.len() + stored.len()) as u64);
        cache.clear(None).await;
        assert_eq!(cache.size_bytes().await, 0);
    }
}
