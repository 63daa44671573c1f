//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, filesystem,
//! secure storage, browser) into the authorization and publishing cores and
//! exposes them as one [`PosterService`]. Desktop apps typically enable the
//! `desktop-shims` feature, which fills every bridge the host does not inject
//! with the defaults from `bridge-desktop`.

pub mod error;

pub use error::{CoreError, Result};

pub use core_auth::{AuthorizationRequest, Platform, PlatformCredential};
pub use core_publish::{PublishReport, PublishResult, VideoMetadata};
pub use core_runtime::config::{AuthSettings, CoreConfig, UploadSettings};
pub use core_runtime::events::{AuthEvent, CoreEvent, UploadEvent};
pub use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};

use core_auth::{spawn_callback_listener, AuthManager};
use core_publish::UploadOrchestrator;
use core_runtime::events::EventBus;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

/// Buffered callback URLs awaiting the listener.
const CALLBACK_BUFFER: usize = 16;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct PosterService {
    event_bus: EventBus,
    auth: Arc<AuthManager>,
    orchestrator: Arc<UploadOrchestrator>,
}

impl PosterService {
    /// Create a service from a validated configuration.
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let auth = Arc::new(AuthManager::new(&config, event_bus.clone()));
        let orchestrator =
            UploadOrchestrator::with_default_adapters(&config, auth.clone(), event_bus.clone());

        info!(
            platforms = ?orchestrator.supported_platforms(),
            "Poster service initialized"
        );

        Ok(Self {
            event_bus,
            auth,
            orchestrator: Arc::new(orchestrator),
        })
    }

    /// Build a service from the environment with desktop bridges.
    ///
    /// ```no_run
    /// # async fn example() -> core_service::Result<()> {
    /// let service = core_service::PosterService::desktop()?;
    /// let request = service.login("youtube").await?;
    /// println!("Continue in the browser: {}", request.authorization_url);
    /// # Ok(())
    /// # }
    /// ```
    #[cfg(feature = "desktop-shims")]
    pub fn desktop() -> Result<Self> {
        let config = CoreConfig::builder()
            .auth_settings(AuthSettings::from_env())
            .build()?;
        Self::new(config)
    }

    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    /// Open the authorization page for `platform` in the browser.
    pub async fn login(&self, platform: &str) -> Result<AuthorizationRequest> {
        let platform: Platform = platform.parse()?;
        Ok(self.auth.login(platform).await?)
    }

    /// Complete a login from the custom-scheme URL the browser redirected to.
    pub async fn handle_callback_url(&self, url: &str) -> Result<PlatformCredential> {
        Ok(self.auth.handle_callback_url(url).await?)
    }

    pub async fn logout(&self, platform: &str) -> Result<()> {
        let platform: Platform = platform.parse()?;
        Ok(self.auth.logout(platform).await?)
    }

    /// Whether each platform currently has a stored credential.
    pub async fn status(&self) -> Result<BTreeMap<Platform, bool>> {
        Ok(self.auth.status().await?)
    }

    /// Publish the video at `file_path` to each of `platforms`, in order.
    pub async fn publish(
        &self,
        file_path: impl AsRef<Path>,
        metadata: &VideoMetadata,
        platforms: &[String],
    ) -> Result<PublishReport> {
        Ok(self
            .orchestrator
            .publish(file_path.as_ref(), metadata, platforms)
            .await?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    /// Start the task that completes logins from callback URLs.
    ///
    /// The host forwards every custom-scheme URL it receives to the returned
    /// sender. The task stops once all senders are dropped.
    pub fn start_callback_listener(&self) -> (mpsc::Sender<String>, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(CALLBACK_BUFFER);
        let handle = spawn_callback_listener(self.auth.clone(), receiver);
        (sender, handle)
    }
}
