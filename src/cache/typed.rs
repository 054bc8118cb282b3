use std::hash::Hash;

use moka::sync::Cache;

use super::CacheConfig;

/// Moka cache with a fixed key/value type and a label for logs.
///
/// Clones share storage, so a repository can hand copies to spawned tasks.
pub struct TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    entries: Cache<K, V>,
    label: &'static str,
}

impl<K, V> Clone for TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            label: self.label,
        }
    }
}

impl<K, V> TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(label: &'static str, config: CacheConfig) -> Self {
        let mut builder = Cache::builder()
            .name(label)
            .max_capacity(config.max_capacity);
        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }
        if let Some(tti) = config.tti {
            builder = builder.time_to_idle(tti);
        }

        tracing::debug!(cache = label, ?config, "cache created");
        Self {
            entries: builder.build(),
            label,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    /// Live value for `key`; expired entries read as absent.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key)
    }

    /// Removes the entry and hands back what it held.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.invalidate(key);
    }
}

impl<K, V> std::fmt::Debug for TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedCache")
            .field("label", &self.label)
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_entries() {
        let cache: TypedCache<u64, String> = TypedCache::new("test", CacheConfig::new(16));
        let other = cache.clone();

        cache.insert(1, "one".into());
        assert_eq!(other.get(&1).as_deref(), Some("one"));

        assert_eq!(other.remove(&1).as_deref(), Some("one"));
        assert!(cache.get(&1).is_none());
    }

    #[test]
    fn test_invalidate_drops_entry() {
        let cache: TypedCache<(), Vec<i64>> = TypedCache::new("test", CacheConfig::dump_channels());
        cache.insert((), vec![-1001]);
        cache.invalidate(&());
        assert!(cache.get(&()).is_none());
    }
}
