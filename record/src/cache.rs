//! Process-local read-through cache of decoded records.
//!
//! Entries are only ever removed by invalidation or capacity eviction; there
//! is no time-based expiry. Callers own coherence: see
//! [`RecordStore`](crate::store::RecordStore) for the locking that keeps fills and
//! writes of one key from interleaving.

use std::sync::Arc;

use moka::future::Cache;

use crate::config::CacheConfig;
use crate::model::FieldMap;

#[derive(Clone)]
pub(crate) struct RecordCache {
    entries: Cache<String, Arc<FieldMap>>,
}

impl RecordCache {
    pub fn new(config: &CacheConfig) -> Self {
        let mut builder = Cache::builder();
        if let Some(capacity) = config.max_capacity {
            builder = builder.max_capacity(capacity);
        }
        Self {
            entries: builder.build(),
        }
    }

    /// Returns the cached fields of `key`, if any.
    pub async fn get(&self, key: &str) -> Option<Arc<FieldMap>> {
        self.entries.get(key).await
    }

    /// Stores `fields` for `key`, replacing any previous entry.
    pub async fn put(&self, key: &str, fields: Arc<FieldMap>) {
        self.entries.insert(key.to_string(), fields).await;
    }

    /// Drops the entry for `key`. Takes effect before this returns.
    pub async fn invalidate(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    #[cfg(test)]
    pub(crate) async fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn fields(value: &'static str) -> Arc<FieldMap> {
        Arc::new(FieldMap::from([("f".to_string(), Bytes::from(value))]))
    }

    #[tokio::test]
    async fn should_miss_unknown_key() {
        // given
        let cache = RecordCache::new(&CacheConfig::default());

        // then
        assert!(cache.get("user1").await.is_none());
    }

    #[tokio::test]
    async fn should_return_put_entry() {
        // given
        let cache = RecordCache::new(&CacheConfig::default());

        // when
        cache.put("user1", fields("v1")).await;

        // then
        assert_eq!(cache.get("user1").await, Some(fields("v1")));
        assert_eq!(cache.entry_count().await, 1);
    }

    #[tokio::test]
    async fn should_overwrite_entry() {
        // given
        let cache = RecordCache::new(&CacheConfig::default());
        cache.put("user1", fields("v1")).await;

        // when
        cache.put("user1", fields("v2")).await;

        // then
        assert_eq!(cache.get("user1").await, Some(fields("v2")));
    }

    #[tokio::test]
    async fn should_forget_invalidated_entry() {
        // given
        let cache = RecordCache::new(&CacheConfig::default());
        cache.put("user1", fields("v1")).await;
        cache.put("user2", fields("v2")).await;

        // when
        cache.invalidate("user1").await;

        // then
        assert!(cache.get("user1").await.is_none());
        assert_eq!(cache.get("user2").await, Some(fields("v2")));
    }

    #[tokio::test]
    async fn should_share_entries_between_clones() {
        // given
        let cache = RecordCache::new(&CacheConfig::default());
        let other = cache.clone();

        // when
        cache.put("user1", fields("v1")).await;

        // then
        assert!(other.get("user1").await.is_some());
    }
}
