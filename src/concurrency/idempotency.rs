use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Remembers one computed value per key, computing it at most once.
///
/// Each key gets a single `OnceCell`, inserted atomically on first use. Racing
/// first callers all await that same cell, so only one of them runs `compute`
/// and contention stays confined to the key being raced on. Entries are never
/// evicted.
pub struct IdempotencyCache<K, V> {
    entries: DashMap<K, Arc<OnceCell<V>>>,
}

impl<K, V> Default for IdempotencyCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K, V> IdempotencyCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored for `key`, computing it with `compute` if
    /// this is the first time the key is seen.
    pub async fn remember<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        // Clone the cell out so no map shard stays locked across the await.
        let cell = self.entries.entry(key.clone()).or_default().clone();
        cell.get_or_init(|| async move { compute(&key) })
            .await
            .clone()
    }

    /// Like `remember`, but the computation is async and may fail.
    ///
    /// A failed or abandoned computation leaves the key unbound, so the next
    /// caller computes again.
    pub async fn try_remember<F, Fut, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = self.entries.entry(key).or_default().clone();
        cell.get_or_try_init(compute).await.cloned()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .get(key)
            .and_then(|cell| cell.get().cloned())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
