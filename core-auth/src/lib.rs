//! # Authorization Module
//!
//! Per-platform OAuth 2.0 authorization and credential persistence.
//!
//! ## Overview
//!
//! This crate signs the user in to Facebook, Instagram, TikTok and YouTube,
//! keeps their tokens in the host's secure store and hands usable credentials
//! to the upload side through the [`CredentialProvider`] seam.
//!
//! ## Features
//!
//! - OAuth 2.0 authorization code flows with PKCE (S256)
//! - Concurrent logins correlated strictly by state token
//! - Callback URLs delivered through an `mpsc` channel
//! - Refresh-token grants serialized per platform
//! - Encrypted-at-rest credential records (host `SecureStore`)
//! - Auth state event emission

pub mod callback;
pub mod credential_store;
pub mod error;
pub mod manager;
pub mod oauth;
pub mod pkce;
pub mod provider;
pub mod types;

#[cfg(test)]
mod test_support;

pub use callback::{spawn_callback_listener, CallbackParams};
pub use credential_store::CredentialStore;
pub use error::{AuthError, Result};
pub use manager::AuthManager;
pub use oauth::{OAuthConfig, OAuthFlowManager, TokenGrant};
pub use pkce::PkceVerifier;
pub use provider::CredentialProvider;
pub use types::{
    AuthorizationRequest, AuxiliaryData, FacebookPage, InstagramAccount, PendingAuthorization,
    Platform, PlatformCredential, TokenFields,
};
