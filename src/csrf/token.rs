//! Token issuance and timing-safe verification.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use super::secret::CsrfSecret;

type HmacSha256 = Hmac<Sha256>;

/// Token length in bytes before hex encoding.
const TOKEN_LEN: usize = 32;

/// A token and its signature under the session secret.
///
/// The token is embedded where the page can echo it back in a request
/// header; the signature travels in a readable cookie. Neither is stored
/// server-side — the secret alone suffices to re-verify any pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub signature: String,
}

/// Issues and verifies double-submit token pairs.
pub struct TokenService;

impl TokenService {
    pub fn new() -> Self {
        Self
    }

    /// Issue a fresh token signed under the session secret.
    pub fn issue(&self, secret: &CsrfSecret) -> IssuedToken {
        let mut bytes = [0u8; TOKEN_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        let signature = sign(secret, &token);

        IssuedToken { token, signature }
    }

    /// Verify an echoed token against its presented signature.
    ///
    /// The comparison is constant-time via the Mac verifier; a
    /// short-circuiting byte compare would leak the signature prefix length
    /// through response timing. All failure modes collapse to `false`.
    pub fn validate(
        &self,
        token: Option<&str>,
        signature: Option<&str>,
        secret: &CsrfSecret,
    ) -> bool {
        let (Some(token), Some(signature)) = (token, signature) else {
            return false;
        };
        let Ok(signature_bytes) = hex::decode(signature) else {
            return false;
        };

        let mut mac = mac_for(secret);
        mac.update(token.as_bytes());
        mac.verify_slice(&signature_bytes).is_ok()
    }
}

impl Default for TokenService {
    fn default() -> Self {
        Self::new()
    }
}

/// Hex HMAC-SHA256 of the token under the session secret.
fn sign(secret: &CsrfSecret, token: &str) -> String {
    let mut mac = mac_for(secret);
    mac.update(token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn mac_for(secret: &CsrfSecret) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_str().as_bytes())
        .expect("HMAC accepts keys of any length")
}
