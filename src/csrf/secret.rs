//! Per-session CSRF secret lifecycle.

use http::HeaderMap;
use rand::RngCore;

use super::cookie_value;
use crate::config::CsrfConfig;

/// A high-entropy per-session secret, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfSecret(String);

impl CsrfSecret {
    /// Generate a fresh secret of `len` random bytes.
    pub fn generate(len: usize) -> Self {
        let mut bytes = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Manages the protected cookie carrying the session secret.
pub struct SecretIssuer {
    config: CsrfConfig,
}

impl SecretIssuer {
    pub fn new(config: CsrfConfig) -> Self {
        Self { config }
    }

    /// The session's existing secret, if the request carries a well-formed
    /// one. Malformed or truncated values are treated as absent.
    pub fn existing(&self, headers: &HeaderMap) -> Option<CsrfSecret> {
        let value = cookie_value(headers, &self.config.secret_cookie)?;
        if value.len() != self.config.secret_len * 2 || hex::decode(value).is_err() {
            return None;
        }
        Some(CsrfSecret(value.to_string()))
    }

    /// The session's secret, minting one if absent.
    ///
    /// An existing secret is returned unchanged — rotating it mid-session
    /// would invalidate the tokens held by every open tab. The second return
    /// value is the `Set-Cookie` the transport must emit when a new secret
    /// was minted.
    pub fn get_or_create(&self, headers: &HeaderMap) -> (CsrfSecret, Option<String>) {
        if let Some(secret) = self.existing(headers) {
            return (secret, None);
        }

        let secret = CsrfSecret::generate(self.config.secret_len);
        let cookie = self.secret_cookie(&secret);
        (secret, Some(cookie))
    }

    /// Protected cookie: script-inaccessible, whole-origin, multi-day.
    fn secret_cookie(&self, secret: &CsrfSecret) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; SameSite=Lax; HttpOnly",
            self.config.secret_cookie,
            secret.as_str(),
            self.config.secret_max_age_secs
        );
        if self.config.secure_cookies {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
