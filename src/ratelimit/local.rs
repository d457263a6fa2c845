//! In-process counter store with fixed-window counting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use super::store::{window_delta, CounterStore, WindowCount};
use crate::error::Result;

/// A counter entry for one key's current window.
#[derive(Debug, Clone, Copy)]
struct CounterEntry {
    count: u64,
    reset_at: DateTime<Utc>,
}

/// Process-local counter store backed by a mutex-guarded map.
///
/// Fixed-window strategy: the counter resets entirely at window boundaries,
/// so a burst straddling a boundary can admit slightly more than the limit
/// across it. That is an accepted tradeoff for coarse abuse deterrence, not
/// a bug.
///
/// Expired entries are reclaimed lazily, overwritten on the next access to
/// the same key. Entries for keys that stop arriving persist until process
/// exit; this store is the single-process fallback, so that is acceptable.
/// The whole-map mutex makes each increment a single critical section, which
/// is what keeps concurrent callers from both observing a fresh window.
pub struct LocalCounterStore {
    entries: Mutex<HashMap<String, CounterEntry>>,
}

impl LocalCounterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of tracked keys, live or expired.
    pub fn entry_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Current count for a key, if its window is still live.
    pub fn current_count(&self, key: &str) -> Option<u64> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|entry| Utc::now() < entry.reset_at)
            .map(|entry| entry.count)
    }
}

impl Default for LocalCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for LocalCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount> {
        let now = Utc::now();
        let mut entries = self.entries.lock();

        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| CounterEntry {
                count: 0,
                reset_at: now + window_delta(window),
            });

        if now >= entry.reset_at {
            // Window expired; reclaim in place
            entry.count = 0;
            entry.reset_at = now + window_delta(window);
        }

        entry.count += 1;

        Ok(WindowCount {
            count: entry.count,
            reset_at: entry.reset_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_increment_starts_window() {
        let store = LocalCounterStore::new();
        let before = Utc::now();

        let result = store
            .increment("ip:203.0.113.5", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(result.count, 1);
        assert!(result.reset_at > before);
    }

    #[tokio::test]
    async fn test_increments_accumulate_within_window() {
        let store = LocalCounterStore::new();
        let window = Duration::from_secs(60);

        let first = store.increment("key", window).await.unwrap();
        let second = store.increment("key", window).await.unwrap();
        let third = store.increment("key", window).await.unwrap();

        assert_eq!(first.count, 1);
        assert_eq!(second.count, 2);
        assert_eq!(third.count, 3);
        // Reset time is fixed for the whole window
        assert_eq!(first.reset_at, third.reset_at);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_share_counters() {
        let store = LocalCounterStore::new();
        let window = Duration::from_secs(60);

        for _ in 0..5 {
            store.increment("ip:10.0.0.1", window).await.unwrap();
        }
        let other = store.increment("ip:10.0.0.2", window).await.unwrap();

        assert_eq!(other.count, 1);
        assert_eq!(store.current_count("ip:10.0.0.1"), Some(5));
    }

    #[tokio::test]
    async fn test_expired_window_resets_lazily() {
        let store = LocalCounterStore::new();
        let window = Duration::from_millis(50);

        let first = store.increment("key", window).await.unwrap();
        store.increment("key", window).await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;

        let fresh = store.increment("key", window).await.unwrap();
        assert_eq!(fresh.count, 1);
        assert!(fresh.reset_at > first.reset_at);
        // The entry was overwritten, not removed
        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(LocalCounterStore::new());
        let window = Duration::from_secs(60);

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..50 {
            let store = store.clone();
            tasks.spawn(async move { store.increment("key", window).await.unwrap().count });
        }

        let mut counts = Vec::new();
        while let Some(count) = tasks.join_next().await {
            counts.push(count.unwrap());
        }

        // Every increment observed a distinct count: no lost updates and no
        // double-observed "first request" state.
        counts.sort_unstable();
        let expected: Vec<u64> = (1..=50).collect();
        assert_eq!(counts, expected);
    }
}
