//! External Browser Abstraction
//!
//! Authorization pages are always shown in the user's default browser, never
//! inside the application window.

use async_trait::async_trait;

use crate::error::Result;

/// Opens a URL with the host's default handler.
#[async_trait]
pub trait UrlLauncher: Send + Sync {
    /// Hand `url` to the system browser and return without waiting for the
    /// user to finish whatever the page asks of them.
    async fn open_url(&self, url: &str) -> Result<()>;
}
