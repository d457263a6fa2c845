//! Counter store trait for abstracting local and shared implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::Result;

/// Which counter store backs the rate limiter.
///
/// Selected once at startup from configuration and logged; there is no
/// per-request switching or fallback chaining between backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterStoreKind {
    /// In-process store, correct for a single-instance deployment
    Local,
    /// Externally hosted store, shared across instances
    Shared,
}

impl std::fmt::Display for CounterStoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CounterStoreKind::Local => write!(f, "local"),
            CounterStoreKind::Shared => write!(f, "shared"),
        }
    }
}

/// The count observed after an increment, with the window's reset time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Count after this increment, including it
    pub count: u64,
    /// When the current window expires
    pub reset_at: DateTime<Utc>,
}

/// Trait for window counter store implementations.
///
/// `increment` must be atomic with respect to concurrent callers on the same
/// key: two concurrent increments on a fresh or live window never both
/// observe count 1, and no increment is lost. The store increments
/// unconditionally; comparing the count against a limit is the rate
/// limiter's job.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `key`, initializing a fresh window of the
    /// given duration if none is live.
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount>;
}

/// Window duration as a chrono delta for wall-clock arithmetic.
pub(crate) fn window_delta(window: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(window.as_millis() as i64)
}
