//! # Upload Orchestrator
//!
//! Validates a video once, then publishes it to each requested platform in
//! caller order. One platform's failure never stops the others; every
//! outcome lands in the returned [`PublishReport`].
//!
//! ```text
//! validate ─┬─ platform 1: credential → adapter → result ─ pause
//!           ├─ platform 2: credential → adapter → result ─ pause
//!           └─ platform N: credential → adapter → result
//! ```

use crate::adapter::UploadAdapter;
use crate::adapters::{FacebookReelsAdapter, InstagramReelsAdapter, TikTokAdapter, YouTubeAdapter};
use crate::error::{PublishError, UploadError, ValidationError};
use crate::types::{PublishReport, PublishResult, PublishedMedia, UploadJob, VideoMetadata};
use crate::validation::validate_video;
use bridge_traits::FileSystemAccess;
use core_auth::{CredentialProvider, Platform};
use core_runtime::config::{CoreConfig, UploadSettings};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus, UploadEvent};
use core_runtime::logging::strip_path;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

pub struct UploadOrchestrator {
    adapters: HashMap<Platform, Arc<dyn UploadAdapter>>,
    credentials: Arc<dyn CredentialProvider>,
    file_system: Arc<dyn FileSystemAccess>,
    settings: UploadSettings,
    event_bus: EventBus,
}

impl UploadOrchestrator {
    /// An orchestrator with no adapters registered.
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        file_system: Arc<dyn FileSystemAccess>,
        settings: UploadSettings,
        event_bus: EventBus,
    ) -> Self {
        Self {
            adapters: HashMap::new(),
            credentials,
            file_system,
            settings,
            event_bus,
        }
    }

    /// An orchestrator with the four platform adapters wired to `config`.
    pub fn with_default_adapters(
        config: &CoreConfig,
        credentials: Arc<dyn CredentialProvider>,
        event_bus: EventBus,
    ) -> Self {
        let http = config.http_client.clone();
        let fs = config.file_system.clone();

        let mut orchestrator = Self::new(
            credentials.clone(),
            fs.clone(),
            config.upload.clone(),
            event_bus,
        );
        orchestrator.register(Arc::new(FacebookReelsAdapter::new(http.clone(), fs.clone())));
        orchestrator.register(Arc::new(InstagramReelsAdapter::new(
            http.clone(),
            config.upload.processing_poll_interval,
            config.upload.processing_max_attempts,
        )));
        orchestrator.register(Arc::new(TikTokAdapter::new(http.clone(), fs.clone())));
        orchestrator.register(Arc::new(YouTubeAdapter::new(http, fs, credentials)));
        orchestrator
    }

    /// Register `adapter` for its platform, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn UploadAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    pub fn supported_platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self.adapters.keys().copied().collect();
        platforms.sort();
        platforms
    }

    /// Publish the video at `file_path` to every platform in `platforms`.
    ///
    /// Fails only when validation rejects the file; per-platform failures
    /// are recorded in the report.
    #[instrument(skip_all, fields(file = %strip_path(&file_path.to_string_lossy())))]
    pub async fn publish(
        &self,
        file_path: &Path,
        metadata: &VideoMetadata,
        platforms: &[String],
    ) -> Result<PublishReport, ValidationError> {
        let video = validate_video(self.file_system.as_ref(), file_path, &self.settings).await?;

        let requested = resolve_platforms(platforms);
        let ids: Vec<String> = requested.iter().map(|(id, _)| id.clone()).collect();

        info!(
            platforms = ?ids,
            size = video.size,
            "Publishing video to {} platform(s)",
            requested.len()
        );
        let _ = self.event_bus.emit(CoreEvent::Upload(UploadEvent::Started {
            file_name: video.file_name(),
            platforms: ids,
        }));

        let mut report = PublishReport::new();
        for (index, (id, platform)) in requested.iter().enumerate() {
            let adapter = platform.and_then(|platform| {
                self.adapters
                    .get(&platform)
                    .map(|adapter| (platform, adapter.clone()))
            });

            let result = match adapter {
                None => {
                    let error = PublishError::from(UploadError::UnknownPlatform(id.clone()));
                    warn!(platform = %id, "No upload adapter for platform");
                    PublishResult::failed(id.as_str(), &error)
                }
                Some((platform, adapter)) => {
                    let result = self
                        .publish_to(platform, adapter.as_ref(), file_path, metadata)
                        .await;

                    if index + 1 < requested.len() && !self.settings.inter_platform_delay.is_zero() {
                        tokio::time::sleep(self.settings.inter_platform_delay).await;
                    }
                    result
                }
            };

            let _ = self
                .event_bus
                .emit(CoreEvent::Upload(UploadEvent::PlatformCompleted {
                    platform: result.platform.clone(),
                    success: result.success,
                    error: result.error.clone(),
                }));
            report.push(result);
        }

        let _ = self.event_bus.emit(CoreEvent::Upload(UploadEvent::Completed {
            succeeded: report.succeeded() as u32,
            failed: report.failed() as u32,
        }));
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Publishing finished"
        );

        Ok(report)
    }

    /// One platform attempt. Every error is caught and turned into a result.
    async fn publish_to(
        &self,
        platform: Platform,
        adapter: &dyn UploadAdapter,
        file_path: &Path,
        metadata: &VideoMetadata,
    ) -> PublishResult {
        let mut job = UploadJob::new(platform, file_path, metadata.clone())
            .with_events(self.event_bus.clone());
        job.emit_state();

        match self.attempt(&mut job, adapter).await {
            Ok(media) => {
                info!(platform = %platform, published_id = %media.published_id, "Platform publish succeeded");
                PublishResult::succeeded(platform.as_str(), media)
            }
            Err(e) => {
                error!(platform = %platform, error = %e, "Platform publish failed");
                job.fail(&e);
                PublishResult::failed(platform.as_str(), &e)
            }
        }
    }

    async fn attempt(
        &self,
        job: &mut UploadJob,
        adapter: &dyn UploadAdapter,
    ) -> Result<PublishedMedia, PublishError> {
        let platform = job.platform;
        let credential = self.credentials.valid_credential(platform).await?;

        adapter.publish(job, &credential).await.map_err(|e| {
            // Credential-step failures are announced by the auth manager.
            if e.requires_reauth() {
                let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::ReauthRequired {
                    platform: platform.as_str().to_string(),
                }));
            }
            e
        })
    }
}

/// Resolve requested ids, dropping repeats of an already-listed platform.
///
/// Known platforms are reported under their lowercase id; unknown ids keep
/// the caller's spelling and are deduplicated case-insensitively.
fn resolve_platforms(platforms: &[String]) -> Vec<(String, Option<Platform>)> {
    let mut seen = HashSet::new();
    platforms
        .iter()
        .map(|raw| {
            let raw = raw.trim();
            match raw.parse::<Platform>() {
                Ok(platform) => (platform.as_str().to_string(), Some(platform)),
                Err(_) => (raw.to_string(), None),
            }
        })
        .filter(|(id, _)| seen.insert(id.to_ascii_lowercase()))
        .collect()
}
