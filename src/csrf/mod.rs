//! CSRF double-submit token protection.
//!
//! The server holds no per-token state. A long-lived random secret lives in
//! a protected cookie; each issued token is a fresh random value whose
//! HMAC signature under that secret is handed back through a readable
//! cookie. Only a same-origin page can read the token it was served and echo
//! it in a request header alongside the signature cookie, and the server
//! verifies the pair by recomputation alone.

mod secret;
mod token;

pub use secret::{CsrfSecret, SecretIssuer};
pub use token::{IssuedToken, TokenService};

use http::{HeaderMap, Method};
use tracing::warn;

use crate::config::CsrfConfig;

/// Whether a method changes state and therefore requires same-origin proof.
///
/// Safe, read-only methods bypass validation entirely; enforcing CSRF there
/// breaks normal navigation for no security benefit.
pub fn is_state_changing(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// Value of a named cookie from the request's `Cookie` headers.
pub(crate) fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    for header in headers.get_all(http::header::COOKIE) {
        let Ok(header) = header.to_str() else {
            continue;
        };
        for pair in header.split(';') {
            if let Some((key, value)) = pair.trim().split_once('=') {
                if key == name {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// A freshly issued token with the cookies the transport must set.
#[derive(Debug, Clone)]
pub struct CsrfIssue {
    /// Token to embed in the page and echo back in the request header
    pub token: IssuedToken,
    /// `Set-Cookie` values: the signature cookie, plus the secret cookie
    /// when a new secret was minted for this session
    pub set_cookies: Vec<String>,
}

/// The complete CSRF flow: secret lifecycle plus token issue/verify.
pub struct CsrfProtection {
    config: CsrfConfig,
    secrets: SecretIssuer,
    tokens: TokenService,
}

impl CsrfProtection {
    pub fn new(config: CsrfConfig) -> Self {
        let secrets = SecretIssuer::new(config.clone());
        let tokens = TokenService::new();
        Self {
            config,
            secrets,
            tokens,
        }
    }

    /// Issue a token for a page render, minting a session secret if the
    /// request does not carry one yet.
    pub fn issue(&self, headers: &HeaderMap) -> CsrfIssue {
        let (secret, secret_cookie) = self.secrets.get_or_create(headers);
        let token = self.tokens.issue(&secret);

        let mut set_cookies = Vec::with_capacity(2);
        if let Some(cookie) = secret_cookie {
            set_cookies.push(cookie);
        }
        set_cookies.push(self.signature_cookie(&token.signature));

        CsrfIssue { token, set_cookies }
    }

    /// Verify the same-origin proof carried by a state-changing request.
    ///
    /// Missing secret, missing token header, missing signature cookie, and
    /// signature mismatch all yield `false` uniformly so the response gives
    /// an attacker nothing to probe session state with.
    pub fn validate_request(&self, headers: &HeaderMap) -> bool {
        let Some(secret) = self.secrets.existing(headers) else {
            return false;
        };

        let token = headers
            .get(self.config.token_header.as_str())
            .and_then(|v| v.to_str().ok());
        let signature = cookie_value(headers, &self.config.signature_cookie);

        let valid = self.tokens.validate(token, signature, &secret);
        if !valid {
            // Log the rejection without echoing any submitted values
            warn!(
                token_present = token.is_some(),
                signature_present = signature.is_some(),
                "CSRF validation failed"
            );
        }
        valid
    }

    /// The readable signature cookie for an issued token.
    fn signature_cookie(&self, signature: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; SameSite=Lax",
            self.config.signature_cookie, signature, self.config.secret_max_age_secs
        );
        if self.config.secure_cookies {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
