//! Redis-backed counter store shared across instances.

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;
use tracing::debug;

use super::store::{window_delta, CounterStore, WindowCount};
use crate::config::SharedStoreConfig;
use crate::error::{ProtectionError, Result};

/// Counter store delegating atomic increments to Redis.
///
/// The window lives server-side: `INCR` is atomic at the store, and the key
/// carries a TTL equal to the window duration, set when the count first
/// becomes 1. Every round-trip is bounded by the configured timeout; a
/// timeout is reported as a store error like any other, which the rate
/// limiter converts to a fail-open decision. There is no fallback to the
/// local store on error — counting some requests locally and some remotely
/// would double-admit across instances.
pub struct SharedCounterStore {
    client: redis::Client,
    timeout: Duration,
    key_prefix: String,
}

impl SharedCounterStore {
    /// Create a store from shared-store connection settings.
    pub fn new(config: &SharedStoreConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        Ok(Self {
            client,
            timeout: Duration::from_millis(config.timeout_ms),
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn increment_inner(&self, key: &str, window: Duration) -> Result<WindowCount> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let count: u64 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;

        if count == 1 {
            let _: () = redis::cmd("PEXPIRE")
                .arg(key)
                .arg(window.as_millis() as u64)
                .query_async(&mut conn)
                .await?;
        }

        // Derive the reset time from the key's remaining TTL so every
        // instance reports the same window boundary.
        let ttl_ms: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;
        let reset_at = if ttl_ms > 0 {
            Utc::now() + chrono::Duration::milliseconds(ttl_ms)
        } else {
            Utc::now() + window_delta(window)
        };

        Ok(WindowCount { count, reset_at })
    }
}

#[async_trait]
impl CounterStore for SharedCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount> {
        let key = self.namespaced(key);

        match tokio::time::timeout(self.timeout, self.increment_inner(&key, window)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(key = %key, timeout = ?self.timeout, "Shared store call timed out");
                Err(ProtectionError::StoreTimeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> SharedStoreConfig {
        SharedStoreConfig {
            // Discard port; nothing listens there
            url: "redis://127.0.0.1:9".to_string(),
            timeout_ms: 100,
            key_prefix: "parapet:rl:".to_string(),
        }
    }

    #[test]
    fn test_keys_are_namespaced() {
        let store = SharedCounterStore::new(&unreachable_config()).unwrap();
        assert_eq!(store.namespaced("ip:10.0.0.1"), "parapet:rl:ip:10.0.0.1");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config = SharedStoreConfig {
            url: "not-a-redis-url".to_string(),
            timeout_ms: 100,
            key_prefix: String::new(),
        };
        assert!(SharedCounterStore::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_store_reports_error() {
        let store = SharedCounterStore::new(&unreachable_config()).unwrap();

        let result = store.increment("key", Duration::from_secs(60)).await;

        // Connection failure or timeout, either way an error the limiter
        // turns into a fail-open decision.
        assert!(result.is_err());
    }
}
