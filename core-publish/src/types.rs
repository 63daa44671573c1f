//! # Upload Job State Machine
//!
//! ```text
//! Validated → Initiated → Transferring → Processing → Published
//!     ↓           ↓            ↓             ↓    ↗
//!     └───────────┴────────────┴──→ Failed   └ (Processing is optional)
//! ```
//!
//! Jobs live for one publish call and are never persisted. Every transition
//! is logged and, when the job carries an event bus, emitted as
//! `UploadEvent::JobStateChanged`.

use crate::error::PublishError;
use core_auth::Platform;
use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Descriptive metadata of the video being published.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Public URL where the same video is already hosted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

impl VideoMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// Tags as hashtags: `#` plus the tag with all whitespace removed.
    pub fn hashtags(&self) -> Vec<String> {
        self.tags
            .iter()
            .map(|tag| tag.split_whitespace().collect::<String>())
            .filter(|tag| !tag.is_empty())
            .map(|tag| format!("#{}", tag))
            .collect()
    }

    /// Title, then description, then hashtags, separated by blank lines.
    ///
    /// ```
    /// use core_publish::VideoMetadata;
    ///
    /// let metadata = VideoMetadata {
    ///     title: "Sunset".to_string(),
    ///     description: Some("Golden hour".to_string()),
    ///     tags: vec!["travel vlog".to_string(), "beach".to_string()],
    ///     public_url: None,
    /// };
    /// assert_eq!(metadata.caption(), "Sunset\n\nGolden hour\n\n#travelvlog #beach");
    /// ```
    pub fn caption(&self) -> String {
        let mut caption = self.title.clone();
        if let Some(description) = self.description() {
            caption.push_str("\n\n");
            caption.push_str(description);
        }
        let hashtags = self.hashtags();
        if !hashtags.is_empty() {
            caption.push_str("\n\n");
            caption.push_str(&hashtags.join(" "));
        }
        caption
    }
}

/// Lifecycle state of one platform upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Validated,
    Initiated,
    Transferring,
    Processing,
    Published,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Validated => "validated",
            JobState::Initiated => "initiated",
            JobState::Transferring => "transferring",
            JobState::Processing => "processing",
            JobState::Published => "published",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Published | JobState::Failed)
    }

    fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Published | Failed, _) => false,
            (_, Failed) => true,
            (Validated, Initiated)
            | (Initiated, Transferring)
            | (Transferring, Processing)
            | (Transferring, Published)
            | (Processing, Published) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One platform's upload within a publish call.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub id: Uuid,
    pub platform: Platform,
    pub file_path: PathBuf,
    pub metadata: VideoMetadata,
    state: JobState,
    event_bus: Option<EventBus>,
}

impl UploadJob {
    pub fn new(platform: Platform, file_path: impl AsRef<Path>, metadata: VideoMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            platform,
            file_path: file_path.as_ref().to_path_buf(),
            metadata,
            state: JobState::Validated,
            event_bus: None,
        }
    }

    /// Emit every state change of this job on `event_bus`.
    pub fn with_events(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move to `next`, rejecting transitions the state machine forbids.
    pub fn advance(&mut self, next: JobState) -> Result<(), PublishError> {
        if !self.state.can_transition_to(next) {
            return Err(PublishError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }

        debug!(
            job_id = %self.id,
            platform = %self.platform,
            from = %self.state,
            to = %next,
            "Upload job state changed"
        );
        self.state = next;
        self.emit_state();
        Ok(())
    }

    /// Mark the job failed. No-op once terminal.
    pub fn fail(&mut self, error: &PublishError) {
        if self.state.is_terminal() {
            return;
        }
        warn!(
            job_id = %self.id,
            platform = %self.platform,
            from = %self.state,
            error = %error,
            "Upload job failed"
        );
        self.state = JobState::Failed;
        self.emit_state();
    }

    pub(crate) fn emit_state(&self) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Upload(UploadEvent::JobStateChanged {
                job_id: self.id.to_string(),
                platform: self.platform.as_str().to_string(),
                state: self.state.as_str().to_string(),
            }));
        }
    }
}

/// What a platform reports after a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMedia {
    pub published_id: String,
    pub url: Option<String>,
    /// Platform-reported status, when it reports one.
    pub status: Option<String>,
}

impl PublishedMedia {
    pub fn new(published_id: impl Into<String>) -> Self {
        Self {
            published_id: published_id.into(),
            url: None,
            status: None,
        }
    }
}

/// Outcome of one platform within a publish call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    pub platform: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub reauth_required: bool,
}

impl PublishResult {
    pub fn succeeded(platform: impl Into<String>, media: PublishedMedia) -> Self {
        Self {
            platform: platform.into(),
            success: true,
            published_id: Some(media.published_id),
            url: media.url,
            status: media.status,
            error: None,
            reauth_required: false,
        }
    }

    pub fn failed(platform: impl Into<String>, error: &PublishError) -> Self {
        Self {
            platform: platform.into(),
            success: false,
            published_id: None,
            url: None,
            status: None,
            error: Some(error.to_string()),
            reauth_required: error.requires_reauth(),
        }
    }
}

/// Per-platform results of one publish call, in call order.
///
/// Serializes as a JSON object keyed by platform id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    results: Vec<PublishResult>,
}

impl PublishReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, result: PublishResult) {
        self.results.push(result);
    }

    pub fn get(&self, platform: &str) -> Option<&PublishResult> {
        self.results.iter().find(|r| r.platform == platform)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PublishResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        !self.results.is_empty() && self.failed() == 0
    }

    /// Platforms that need a new login.
    pub fn reauth_required(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.reauth_required)
            .map(|r| r.platform.as_str())
            .collect()
    }
}

impl Serialize for PublishReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.results.len()))?;
        for result in &self.results {
            map.serialize_entry(&result.platform, result)?;
        }
        map.end()
    }
}

impl<'a> IntoIterator for &'a PublishReport {
    type Item = &'a PublishResult;
    type IntoIter = std::slice::Iter<'a, PublishResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
