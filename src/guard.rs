//! Protection middleware: the composition point for guard checks.

use chrono::{DateTime, Utc};
use http::{HeaderMap, Method};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ProtectionConfig;
use crate::csrf::{self, CsrfIssue, CsrfProtection};
use crate::error::Result;
use crate::identity;
use crate::ratelimit::{
    CounterStore, CounterStoreKind, Decision, LocalCounterStore, PolicySet, RateLimiter,
    SharedCounterStore,
};

/// The request facts this layer needs, extracted by the transport adapter.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub method: &'a Method,
    pub headers: &'a HeaderMap,
    /// Peer socket address, if the transport knows it
    pub peer_addr: Option<IpAddr>,
    /// Authenticated subject identifier, if the auth collaborator resolved one
    pub subject: Option<&'a str>,
}

/// Why a request was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Same-origin proof failed. Deliberately generic: the response must not
    /// reveal which part of the proof was missing or wrong.
    InvalidRequest,
    /// Quota exhausted. Carries the metadata for Retry-After and
    /// X-RateLimit-style response headers.
    TooManyRequests {
        retry_after_secs: u64,
        remaining: u64,
        reset_at: DateTime<Utc>,
    },
}

/// The outcome of a guard check: exactly proceed or reject, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Invoke the wrapped handler. The decision carries quota metadata for
    /// response headers.
    Proceed { decision: Decision },
    /// Do not invoke the handler.
    Reject(Rejection),
}

impl GuardOutcome {
    pub fn is_proceed(&self) -> bool {
        matches!(self, GuardOutcome::Proceed { .. })
    }
}

/// Wraps handlers with rate limiting and CSRF verification.
///
/// Constructed once at startup; owns its rate limiter, policy table, and
/// CSRF services explicitly so tests get isolated instances rather than
/// ambient process state.
pub struct Guard {
    limiter: RateLimiter,
    policies: PolicySet,
    csrf: CsrfProtection,
}

impl Guard {
    /// Build a guard from configuration, selecting the counter store from
    /// the presence of shared-store connection settings.
    pub fn from_config(config: ProtectionConfig) -> Result<Self> {
        config.validate()?;

        let (store, kind): (Arc<dyn CounterStore>, CounterStoreKind) = match &config.shared_store {
            Some(shared) => (
                Arc::new(SharedCounterStore::new(shared)?),
                CounterStoreKind::Shared,
            ),
            None => (Arc::new(LocalCounterStore::new()), CounterStoreKind::Local),
        };
        info!(backend = %kind, "Counter store selected");

        Self::with_store(config, store)
    }

    /// Build a guard over an explicit counter store.
    pub fn with_store(config: ProtectionConfig, store: Arc<dyn CounterStore>) -> Result<Self> {
        config.validate()?;
        let policies = PolicySet::from_config(&config.policies)?;
        let csrf = CsrfProtection::new(config.csrf);

        Ok(Self {
            limiter: RateLimiter::new(store),
            policies,
            csrf,
        })
    }

    /// Whether a policy with this name is configured. Route wiring should
    /// assert this at startup so typos surface before traffic does.
    pub fn has_policy(&self, name: &str) -> bool {
        self.policies.contains(name)
    }

    /// Issue a CSRF token for a page render.
    pub fn issue_csrf(&self, headers: &HeaderMap) -> CsrfIssue {
        self.csrf.issue(headers)
    }

    /// Decide whether the request may reach its handler.
    ///
    /// State-changing requests are CSRF-checked first, before any counter
    /// increment: a forged or non-browser caller does not get to consume
    /// quota. The check applies uniformly to every state-changing request
    /// routed through the guard; exempting a route is an explicit decision
    /// made by not routing it here. An unknown policy name fails open with
    /// a warning — see [`Guard::has_policy`].
    pub async fn check(&self, request: &RequestContext<'_>, policy_name: &str) -> GuardOutcome {
        if csrf::is_state_changing(request.method) && !self.csrf.validate_request(request.headers) {
            warn!(
                method = %request.method,
                policy = policy_name,
                "Rejecting state-changing request without same-origin proof"
            );
            return GuardOutcome::Reject(Rejection::InvalidRequest);
        }

        let identifier = identity::resolve(request);

        let Some(policy) = self.policies.get(policy_name) else {
            warn!(policy = policy_name, "Unknown rate limit policy, allowing request");
            return GuardOutcome::Proceed {
                decision: Decision {
                    allowed: true,
                    remaining: 0,
                    reset_at: Utc::now(),
                    retry_after_secs: None,
                },
            };
        };

        let decision = self.limiter.allow(&identifier, policy).await;
        if decision.allowed {
            GuardOutcome::Proceed { decision }
        } else {
            GuardOutcome::Reject(Rejection::TooManyRequests {
                retry_after_secs: decision.retry_after_secs.unwrap_or(1),
                remaining: decision.remaining,
                reset_at: decision.reset_at,
            })
        }
    }
}
