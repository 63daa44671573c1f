//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `FileSystemAccess` using `tokio::fs`
//! - `SecureStore` as AES-256-GCM encrypted files in the application data directory
//! - `UrlLauncher` delegating to the platform's `open` command
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{EncryptedFileStore, ReqwestHttpClient, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), bridge_traits::BridgeError> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let fs = TokioFileSystem::new();
//!     let store = EncryptedFileStore::for_current_installation()?;
//!
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod browser;
mod filesystem;
mod http;
mod secure_store;

pub use browser::SystemBrowser;
pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use secure_store::EncryptedFileStore;

/// Directory name used under the platform data directory.
pub const APP_DIR_NAME: &str = "short-poster";
