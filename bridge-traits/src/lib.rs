//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the publishing core and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that the host provides.
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP with buffered and streamed bodies
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Reading local video files
//!
//! ### Security & Storage
//! - [`SecureStore`](storage::SecureStore) - Encrypted credential persistence
//!
//! ### Platform Integration
//! - [`UrlLauncher`](browser::UrlLauncher) - Open authorization pages in the system browser
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! Bridge operations return [`BridgeError`](error::BridgeError). Failures of a
//! remote platform API are described by [`NetworkError`](error::NetworkError),
//! which keeps the endpoint, status and the platform's own error payload.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so handles can be shared
//! across async tasks.

pub mod browser;
pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::{BridgeError, NetworkError};

// Re-export commonly used types
pub use browser::UrlLauncher;
pub use http::{ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::{FileMetadata, FileSystemAccess, SecureStore};
pub use time::{Clock, SystemClock};
