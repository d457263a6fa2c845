//! Configuration management for the protection layer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{ProtectionError, Result};

/// Main configuration for the protection layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectionConfig {
    /// Named rate limit policies, keyed by route class
    #[serde(default = "default_policies")]
    pub policies: HashMap<String, PolicyConfig>,

    /// Shared counter store connection settings. Presence selects the
    /// Redis-backed store at startup; absence selects the in-process store.
    #[serde(default)]
    pub shared_store: Option<SharedStoreConfig>,

    /// CSRF protection configuration
    #[serde(default)]
    pub csrf: CsrfConfig,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            policies: default_policies(),
            shared_store: None,
            csrf: CsrfConfig::default(),
        }
    }
}

/// A single named rate limit: at most `max_requests` per `window_secs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u64,
    /// Window duration in seconds
    pub window_secs: u64,
}

/// Connection settings for the shared (Redis) counter store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedStoreConfig {
    /// Redis connection URL
    pub url: String,

    /// Bound on each store round-trip, in milliseconds. On timeout the
    /// rate limiter fails open.
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,

    /// Namespace prefix for counter keys
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_store_timeout_ms() -> u64 {
    250
}

fn default_key_prefix() -> String {
    "parapet:rl:".to_string()
}

/// CSRF double-submit token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfConfig {
    /// Name of the protected (HttpOnly) cookie holding the session secret
    #[serde(default = "default_secret_cookie")]
    pub secret_cookie: String,

    /// Name of the readable cookie holding the issued signature
    #[serde(default = "default_signature_cookie")]
    pub signature_cookie: String,

    /// Request header the client echoes the token in
    #[serde(default = "default_token_header")]
    pub token_header: String,

    /// Lifetime of the secret cookie in seconds
    #[serde(default = "default_secret_max_age_secs")]
    pub secret_max_age_secs: u64,

    /// Secret length in bytes (256 bits minimum)
    #[serde(default = "default_secret_len")]
    pub secret_len: usize,

    /// Set the `Secure` attribute on issued cookies
    #[serde(default)]
    pub secure_cookies: bool,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            secret_cookie: default_secret_cookie(),
            signature_cookie: default_signature_cookie(),
            token_header: default_token_header(),
            secret_max_age_secs: default_secret_max_age_secs(),
            secret_len: default_secret_len(),
            secure_cookies: false,
        }
    }
}

fn default_secret_cookie() -> String {
    "csrf_secret".to_string()
}

fn default_signature_cookie() -> String {
    "csrf_sig".to_string()
}

fn default_token_header() -> String {
    "x-csrf-token".to_string()
}

fn default_secret_max_age_secs() -> u64 {
    7 * 24 * 3600
}

fn default_secret_len() -> usize {
    32
}

/// Built-in policies for the route classes the layer protects.
fn default_policies() -> HashMap<String, PolicyConfig> {
    let mut policies = HashMap::new();
    policies.insert(
        "login".to_string(),
        PolicyConfig {
            max_requests: 5,
            window_secs: 60,
        },
    );
    policies.insert(
        "register".to_string(),
        PolicyConfig {
            max_requests: 3,
            window_secs: 3600,
        },
    );
    policies.insert(
        "password_reset".to_string(),
        PolicyConfig {
            max_requests: 3,
            window_secs: 3600,
        },
    );
    policies.insert(
        "general_api".to_string(),
        PolicyConfig {
            max_requests: 100,
            window_secs: 60,
        },
    );
    policies.insert(
        "upload".to_string(),
        PolicyConfig {
            max_requests: 10,
            window_secs: 3600,
        },
    );
    policies.insert(
        "export".to_string(),
        PolicyConfig {
            max_requests: 5,
            window_secs: 3600,
        },
    );
    policies.insert(
        "profile_view".to_string(),
        PolicyConfig {
            max_requests: 60,
            window_secs: 60,
        },
    );
    policies
}

impl ProtectionConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading protection configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ProtectionConfig = serde_yaml::from_str(yaml)
            .map_err(|e| ProtectionError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration at startup.
    ///
    /// Misconfiguration is a startup failure, never a request-time one.
    pub fn validate(&self) -> Result<()> {
        if self.policies.is_empty() {
            return Err(ProtectionError::Config(
                "at least one rate limit policy is required".to_string(),
            ));
        }

        for (name, policy) in &self.policies {
            if policy.max_requests == 0 {
                return Err(ProtectionError::Config(format!(
                    "policy '{}' has max_requests of zero",
                    name
                )));
            }
            if policy.window_secs == 0 {
                return Err(ProtectionError::Config(format!(
                    "policy '{}' has a zero-length window",
                    name
                )));
            }
        }

        if let Some(ref shared) = self.shared_store {
            if shared.url.is_empty() {
                return Err(ProtectionError::Config(
                    "shared store URL must not be empty".to_string(),
                ));
            }
            if shared.timeout_ms == 0 {
                return Err(ProtectionError::Config(
                    "shared store timeout must be non-zero".to_string(),
                ));
            }
        }

        if self.csrf.secret_len < 32 {
            return Err(ProtectionError::Config(format!(
                "CSRF secret length {} is below the 32-byte minimum",
                self.csrf.secret_len
            )));
        }
        if self.csrf.secret_cookie.is_empty()
            || self.csrf.signature_cookie.is_empty()
            || self.csrf.token_header.is_empty()
        {
            return Err(ProtectionError::Config(
                "CSRF cookie and header names must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProtectionConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.shared_store.is_none());
    }

    #[test]
    fn test_default_policies_cover_route_classes() {
        let config = ProtectionConfig::default();
        for name in [
            "login",
            "register",
            "password_reset",
            "general_api",
            "upload",
            "export",
            "profile_view",
        ] {
            assert!(config.policies.contains_key(name), "missing policy {}", name);
        }
    }

    #[test]
    fn test_parse_yaml_config() {
        let yaml = r#"
policies:
  login:
    max_requests: 5
    window_secs: 60
shared_store:
  url: redis://127.0.0.1:6379
  timeout_ms: 100
"#;
        let config = ProtectionConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.policies["login"].max_requests, 5);
        let shared = config.shared_store.unwrap();
        assert_eq!(shared.timeout_ms, 100);
        assert_eq!(shared.key_prefix, "parapet:rl:");
    }

    #[test]
    fn test_zero_max_requests_rejected() {
        let yaml = r#"
policies:
  login:
    max_requests: 0
    window_secs: 60
"#;
        let err = ProtectionConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ProtectionError::Config(_)));
    }

    #[test]
    fn test_zero_window_rejected() {
        let yaml = r#"
policies:
  login:
    max_requests: 5
    window_secs: 0
"#;
        assert!(ProtectionConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_short_csrf_secret_rejected() {
        let mut config = ProtectionConfig::default();
        config.csrf.secret_len = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_policy_table_rejected() {
        let mut config = ProtectionConfig::default();
        config.policies.clear();
        assert!(config.validate().is_err());
    }
}
