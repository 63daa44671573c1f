use crate::types::Platform;
use bridge_traits::NetworkError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// The callback's state matches no live pending login.
    #[error("Authorization state mismatch: no pending login matches this callback")]
    StateMismatch,

    #[error("No eligible {platform} account: {reason}")]
    NoEligibleAccount { platform: Platform, reason: String },

    #[error("{platform} requires re-authorization")]
    ReauthRequired { platform: Platform },

    #[error("Not authenticated with {platform}")]
    NotAuthenticated { platform: Platform },

    #[error("{platform} is not configured: {message}")]
    NotConfigured { platform: Platform, message: String },

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Invalid callback URL: {0}")]
    InvalidCallback(String),

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Failed to open the system browser: {0}")]
    BrowserLaunchFailed(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Stored credential for {platform} is corrupted")]
    CredentialCorrupted { platform: Platform },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("Authentication error: {0}")]
    Other(String),
}

impl AuthError {
    /// True when only an interactive login can recover.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            AuthError::ReauthRequired { .. } | AuthError::NotAuthenticated { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
