//! Rate limit policies and the named policy table.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::PolicyConfig;
use crate::error::{ProtectionError, Result};

/// An immutable rate limit: at most `max_requests` per `window`.
///
/// Policies are fixed at startup and never change at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Maximum requests allowed in the window
    pub max_requests: u64,
    /// Window duration
    pub window: Duration,
}

impl RateLimitPolicy {
    /// Create a policy, rejecting degenerate limits.
    pub fn new(max_requests: u64, window: Duration) -> Result<Self> {
        if max_requests == 0 {
            return Err(ProtectionError::Config(
                "max_requests must be greater than zero".to_string(),
            ));
        }
        if window.is_zero() {
            return Err(ProtectionError::Config(
                "window duration must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            max_requests,
            window,
        })
    }
}

/// Lookup table from route class name to its policy.
#[derive(Debug, Clone)]
pub struct PolicySet {
    policies: HashMap<String, RateLimitPolicy>,
}

impl PolicySet {
    /// Build the policy set from configuration, validating every entry.
    pub fn from_config(policies: &HashMap<String, PolicyConfig>) -> Result<Self> {
        if policies.is_empty() {
            return Err(ProtectionError::Config(
                "at least one rate limit policy is required".to_string(),
            ));
        }

        let mut table = HashMap::with_capacity(policies.len());
        for (name, config) in policies {
            let policy =
                RateLimitPolicy::new(config.max_requests, Duration::from_secs(config.window_secs))
                    .map_err(|e| {
                        ProtectionError::Config(format!("policy '{}' is invalid: {}", name, e))
                    })?;
            table.insert(name.clone(), policy);
        }

        Ok(Self { policies: table })
    }

    /// Look up a policy by route class name.
    pub fn get(&self, name: &str) -> Option<&RateLimitPolicy> {
        self.policies.get(name)
    }

    /// Whether a policy with the given name is configured.
    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_rejects_zero_max_requests() {
        assert!(RateLimitPolicy::new(0, Duration::from_secs(60)).is_err());
    }

    #[test]
    fn test_policy_rejects_zero_window() {
        assert!(RateLimitPolicy::new(5, Duration::ZERO).is_err());
    }

    #[test]
    fn test_policy_set_lookup() {
        let mut configs = HashMap::new();
        configs.insert(
            "login".to_string(),
            PolicyConfig {
                max_requests: 5,
                window_secs: 60,
            },
        );
        let set = PolicySet::from_config(&configs).unwrap();

        let policy = set.get("login").unwrap();
        assert_eq!(policy.max_requests, 5);
        assert_eq!(policy.window, Duration::from_secs(60));
        assert!(set.get("unknown").is_none());
        assert!(set.contains("login"));
    }

    #[test]
    fn test_policy_set_rejects_invalid_entry() {
        let mut configs = HashMap::new();
        configs.insert(
            "broken".to_string(),
            PolicyConfig {
                max_requests: 0,
                window_secs: 60,
            },
        );
        assert!(PolicySet::from_config(&configs).is_err());
    }

    #[test]
    fn test_empty_policy_set_rejected() {
        assert!(PolicySet::from_config(&HashMap::new()).is_err());
    }
}
