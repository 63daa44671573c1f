use bridge_traits::{BridgeError, NetworkError};
use core_auth::AuthError;
use std::path::PathBuf;
use thiserror::Error;

/// Input rejected before any platform is contacted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Video file not found: {}", path.display())]
    FileMissing { path: PathBuf },

    #[error("Video is {size} bytes; the limit is {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Unsupported video format '{extension}' (expected one of: {allowed})")]
    UnsupportedFormat { extension: String, allowed: String },

    #[error("Cannot inspect video file: {0}")]
    Unreadable(String),
}

/// Failures of a platform's asynchronous server-side processing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    #[error("Remote processing failed with status {status}")]
    RemoteProcessingFailed { status: String },

    #[error("Remote processing did not finish after {attempts} status checks")]
    ProcessingTimeout { attempts: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The hosted-URL flow needs the video at a public URL, which this core
    /// does not provide.
    #[error("This platform requires the video to be hosted at a public URL (set publicUrl)")]
    HostingRequired,

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),
}

/// Any failure of one platform's publish attempt.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Invalid upload state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

impl PublishError {
    /// True when the user must log in again before retrying.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, PublishError::Auth(e) if e.requires_reauth())
    }
}

pub type Result<T> = std::result::Result<T, PublishError>;

#[cfg(test)]
mod tests {
    use super::*;
    use core_auth::Platform;

    #[test]
    fn test_reauth_classification() {
        let reauth = PublishError::from(AuthError::ReauthRequired {
            platform: Platform::YouTube,
        });
        assert!(reauth.requires_reauth());

        let missing = PublishError::from(AuthError::NotAuthenticated {
            platform: Platform::TikTok,
        });
        assert!(missing.requires_reauth());

        let network = PublishError::from(NetworkError::transport("x", "reset"));
        assert!(!network.requires_reauth());
    }

    #[test]
    fn test_messages() {
        let err = ValidationError::FileTooLarge {
            size: 101,
            limit: 100,
        };
        assert_eq!(err.to_string(), "Video is 101 bytes; the limit is 100 bytes");

        let err = PublishError::from(UploadError::UnknownPlatform("myspace".to_string()));
        assert_eq!(err.to_string(), "Unknown platform: myspace");
    }
}
