use crate::error::Result;
use crate::types::{Platform, PlatformCredential};
use async_trait::async_trait;

/// Source of usable credentials for the upload side.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return a usable credential, refreshing first when the stored one is stale.
    async fn valid_credential(&self, platform: Platform) -> Result<PlatformCredential>;

    /// Force a refresh and return the new access token.
    async fn refresh(&self, platform: Platform) -> Result<String>;
}
