//! Core rate limiter implementation.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use super::policy::RateLimitPolicy;
use super::store::{window_delta, CounterStore};
use crate::identity::Identifier;

/// The outcome of a single rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Requests left in the current window
    pub remaining: u64,
    /// When the current window expires
    pub reset_at: DateTime<Utc>,
    /// Whole seconds until retry is worthwhile; populated only when denied
    pub retry_after_secs: Option<u64>,
}

/// Policy engine over a counter store.
///
/// Owns its store explicitly — constructed once at startup and passed to the
/// guard, so tests get clean per-instance isolation instead of ambient
/// process state.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    /// Create a rate limiter over the given counter store.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Check whether `identifier` may perform another request under `policy`.
    ///
    /// Store failures fail open: an availability problem in the shared store
    /// must not become a denial of service for the application. The failure
    /// is logged as a warning and the request is admitted with a full
    /// remaining quota.
    pub async fn allow(&self, identifier: &Identifier, policy: &RateLimitPolicy) -> Decision {
        let now = Utc::now();

        match self.store.increment(identifier.as_str(), policy.window).await {
            Ok(window) => {
                let allowed = window.count <= policy.max_requests;
                let remaining = policy.max_requests.saturating_sub(window.count);

                if allowed {
                    Decision {
                        allowed: true,
                        remaining,
                        reset_at: window.reset_at,
                        retry_after_secs: None,
                    }
                } else {
                    debug!(
                        identifier = %identifier,
                        count = window.count,
                        limit = policy.max_requests,
                        "Rate limit exceeded"
                    );
                    Decision {
                        allowed: false,
                        remaining,
                        reset_at: window.reset_at,
                        retry_after_secs: Some(retry_after_secs(now, window.reset_at)),
                    }
                }
            }
            Err(err) => {
                warn!(
                    identifier = %identifier,
                    error = %err,
                    "Counter store unavailable, failing open"
                );
                Decision {
                    allowed: true,
                    remaining: policy.max_requests,
                    reset_at: now + window_delta(policy.window),
                    retry_after_secs: None,
                }
            }
        }
    }
}

/// Whole seconds until the window resets, rounded up, never below 1.
fn retry_after_secs(now: DateTime<Utc>, reset_at: DateTime<Utc>) -> u64 {
    let remaining_ms = (reset_at - now).num_milliseconds();
    if remaining_ms <= 0 {
        return 1;
    }
    ((remaining_ms as u64) + 999) / 1000
}
