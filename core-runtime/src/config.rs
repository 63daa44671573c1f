//! # Core Configuration Module
//!
//! Provides configuration management for the publishing core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds every bridge the core needs plus the OAuth application
//! credentials and upload limits. It fails fast when a required bridge is
//! missing.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Platform API calls (desktop default: reqwest)
//! - `FileSystemAccess` - Reading the video file (desktop default: tokio fs)
//! - `SecureStore` - Credential persistence (desktop default: encrypted files)
//! - `UrlLauncher` - Opening authorization pages (desktop default: system browser)
//!
//! `Clock` defaults to the system clock everywhere.
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults are
//! injected automatically for any bridge not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{AuthSettings, CoreConfig};
//!
//! let config = CoreConfig::builder()
//!     .auth_settings(AuthSettings::from_env())
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Environment
//!
//! [`AuthSettings::from_env`] loads a `.env` file when present and reads:
//!
//! | Variable | Used for |
//! |---|---|
//! | `FACEBOOK_APP_ID` / `FACEBOOK_APP_SECRET` | Facebook and Instagram |
//! | `TIKTOK_CLIENT_KEY` / `TIKTOK_CLIENT_SECRET` | TikTok |
//! | `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET` | YouTube |
//! | `CUSTOM_URL_PROTOCOL` | Callback URL scheme (default `shortposter`) |

use crate::error::{Error, Result};
use bridge_traits::{Clock, FileSystemAccess, HttpClient, SecureStore, SystemClock, UrlLauncher};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default custom URL scheme registered by the desktop shell.
pub const DEFAULT_URL_SCHEME: &str = "shortposter";

/// Default ceiling on video size: 100 MiB.
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 100 * 1024 * 1024;

/// Client credentials of one registered OAuth application.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
}

impl OAuthClient {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Settings for the authorization flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    /// Custom URL scheme of the callback, shared by every platform.
    pub url_scheme: String,
    /// Meta application, shared by Facebook and Instagram.
    pub facebook_app: Option<OAuthClient>,
    pub tiktok_app: Option<OAuthClient>,
    /// Google application used for YouTube.
    pub google_app: Option<OAuthClient>,
    /// How long an unanswered login stays valid.
    pub pending_ttl: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            url_scheme: DEFAULT_URL_SCHEME.to_string(),
            facebook_app: None,
            tiktok_app: None,
            google_app: None,
            pending_ttl: Duration::from_secs(10 * 60),
        }
    }
}

impl AuthSettings {
    /// Read settings from the process environment, loading `.env` first.
    pub fn from_env() -> Self {
        // A missing .env file is normal in packaged builds.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let client = |id_key: &str, secret_key: &str| {
            Some(OAuthClient::new(non_empty(id_key)?, non_empty(secret_key)?))
        };

        Self {
            url_scheme: non_empty("CUSTOM_URL_PROTOCOL")
                .unwrap_or_else(|| DEFAULT_URL_SCHEME.to_string()),
            facebook_app: client("FACEBOOK_APP_ID", "FACEBOOK_APP_SECRET"),
            tiktok_app: client("TIKTOK_CLIENT_KEY", "TIKTOK_CLIENT_SECRET"),
            google_app: client("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
            ..Self::default()
        }
    }

    /// The redirect URI sent to every platform.
    pub fn redirect_uri(&self) -> String {
        format!("{}://auth/callback", self.url_scheme)
    }

    pub fn validate(&self) -> Result<()> {
        let scheme_ok = self
            .url_scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && self
                .url_scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !scheme_ok {
            return Err(Error::Config(format!(
                "Invalid callback URL scheme '{}'",
                self.url_scheme
            )));
        }

        if self.pending_ttl.is_zero() {
            return Err(Error::Config(
                "Pending authorization TTL must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Limits and pacing for the upload pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    /// Largest accepted video, in bytes.
    pub max_file_size_bytes: u64,
    /// Accepted file extensions, lowercase, without the dot.
    pub allowed_extensions: Vec<String>,
    /// Pause after each attempted platform except the last.
    pub inter_platform_delay: Duration,
    /// Interval between processing-status polls.
    pub processing_poll_interval: Duration,
    /// Maximum processing-status polls before giving up.
    pub processing_max_attempts: u32,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            allowed_extensions: vec!["mp4".to_string(), "mov".to_string()],
            inter_platform_delay: Duration::from_secs(2),
            processing_poll_interval: Duration::from_secs(2),
            processing_max_attempts: 30,
        }
    }
}

impl UploadSettings {
    /// Settings with every pause set to zero, for tests and batch tools.
    pub fn without_delays() -> Self {
        Self {
            inter_platform_delay: Duration::ZERO,
            processing_poll_interval: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_file_size_bytes == 0 {
            return Err(Error::Config(
                "Maximum file size must be greater than 0 bytes".to_string(),
            ));
        }

        if self.allowed_extensions.is_empty() {
            return Err(Error::Config(
                "At least one video extension must be allowed".to_string(),
            ));
        }

        if self.processing_max_attempts == 0 {
            return Err(Error::Config(
                "Processing poll attempts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Core configuration for the publishing core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    pub http_client: Arc<dyn HttpClient>,
    pub file_system: Arc<dyn FileSystemAccess>,
    pub secure_store: Arc<dyn SecureStore>,
    pub url_launcher: Arc<dyn UrlLauncher>,
    pub clock: Arc<dyn Clock>,
    pub auth: AuthSettings,
    pub upload: UploadSettings,
    /// Buffer size of the event bus channel.
    pub event_buffer_size: usize,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("url_launcher", &"UrlLauncher { ... }")
            .field("clock", &"Clock { ... }")
            .field("auth", &self.auth)
            .field("upload", &self.upload)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.auth.validate()?;
        self.upload.validate()?;

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, purpose: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required for {}. \
             Desktop: enable the 'desktop-shims' feature to use the default. \
             Other hosts: inject a platform-native adapter.",
            capability, purpose
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::new()
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing("HttpClient", "platform API calls"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(capability_missing("FileSystemAccess", "reading video files"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    let store = bridge_desktop::EncryptedFileStore::for_current_installation()
        .map_err(|e| Error::Internal(format!("Failed to create default SecureStore: {}", e)))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(capability_missing("SecureStore", "credential persistence"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_url_launcher() -> Result<Arc<dyn UrlLauncher>> {
    Ok(Arc::new(bridge_desktop::SystemBrowser::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_url_launcher() -> Result<Arc<dyn UrlLauncher>> {
    Err(capability_missing("UrlLauncher", "opening authorization pages"))
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    url_launcher: Option<Arc<dyn UrlLauncher>>,
    clock: Option<Arc<dyn Clock>>,
    auth: Option<AuthSettings>,
    upload: Option<UploadSettings>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the HTTP client implementation.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the file system access implementation.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Sets the secure store implementation.
    ///
    /// The secure store holds OAuth tokens and must encrypt them at rest.
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Sets the URL launcher implementation.
    pub fn url_launcher(mut self, launcher: Arc<dyn UrlLauncher>) -> Self {
        self.url_launcher = Some(launcher);
        self
    }

    /// Sets the time source. Default: [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets OAuth application credentials and callback settings.
    ///
    /// Default: no applications configured, scheme `shortposter`.
    pub fn auth_settings(mut self, settings: AuthSettings) -> Self {
        self.auth = Some(settings);
        self
    }

    /// Sets upload limits and pacing.
    pub fn upload_settings(mut self, settings: UploadSettings) -> Self {
        self.upload = Some(settings);
        self
    }

    /// Sets the event bus buffer size. Default: 100.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - `Error::CapabilityMissing` when a bridge is missing and no desktop
    ///   default is available
    /// - `Error::Config` when a setting is invalid
    pub fn build(self) -> Result<CoreConfig> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let url_launcher = match self.url_launcher {
            Some(launcher) => launcher,
            None => provide_default_url_launcher()?,
        };

        let config = CoreConfig {
            http_client,
            file_system,
            secure_store,
            url_launcher,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            auth: self.auth.unwrap_or_default(),
            upload: self.upload.unwrap_or_default(),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
