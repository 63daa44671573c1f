//! PKCE verifier (RFC 7636) and state-token minting.
//!
//! State tokens have the shape `{platform}_{unix_millis}_{random}` so the
//! platform a callback belongs to can be recovered from the state alone.

use crate::types::Platform;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt;

const STATE_NONCE_LEN: usize = 16;

/// PKCE code verifier.
///
/// The verifier stays in memory for the lifetime of one pending login and is
/// sent only to the token endpoint. Only the derived challenge goes to the
/// authorization page.
#[derive(Clone)]
pub struct PkceVerifier {
    verifier: String,
}

impl PkceVerifier {
    /// Create a verifier from 32 random bytes (43 base64url characters).
    pub fn new() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill(&mut bytes);
        Self {
            verifier: URL_SAFE_NO_PAD.encode(bytes),
        }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// S256 challenge: BASE64URL(SHA256(code_verifier))
    pub fn challenge(&self) -> String {
        let hash = Sha256::digest(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hash)
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkceVerifier")
            .field("verifier", &"[REDACTED]")
            .finish()
    }
}

/// Mint a fresh state token for `platform`.
pub fn mint_state(platform: Platform, unix_millis: i64) -> String {
    let nonce: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_NONCE_LEN)
        .map(char::from)
        .collect();
    format!("{}_{}_{}", platform.as_str(), unix_millis, nonce)
}

/// Recover the platform embedded in a state token.
///
/// Returns `None` for anything not shaped like a minted state.
pub fn platform_of_state(state: &str) -> Option<Platform> {
    let mut parts = state.splitn(3, '_');
    let platform = parts.next()?.parse().ok()?;
    let millis = parts.next()?;
    let nonce = parts.next()?;

    if millis.is_empty() || !millis.bytes().all(|b| b.is_ascii_digit()) || nonce.is_empty() {
        return None;
    }

    Some(platform)
}
