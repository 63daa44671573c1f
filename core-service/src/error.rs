use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Validation error: {0}")]
    Validation(#[from] core_publish::ValidationError),

    #[error("Publish error: {0}")]
    Publish(#[from] core_publish::PublishError),
}

impl CoreError {
    /// True when the user must log in again.
    pub fn requires_reauth(&self) -> bool {
        match self {
            CoreError::Auth(e) => e.requires_reauth(),
            CoreError::Publish(e) => e.requires_reauth(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
