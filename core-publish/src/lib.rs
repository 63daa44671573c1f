//! # Publishing Module
//!
//! Uploads one local video to several short-video platforms.
//!
//! ## Overview
//!
//! This module owns everything after authorization:
//! - Validating the video file (existence, size, container format)
//! - Running one upload job per platform with validated state transitions
//! - Talking to each platform's upload API through an adapter
//! - Collecting per-platform outcomes into a single report
//!
//! ## Components
//!
//! - **Upload Job State Machine** (`types`): Job lifecycle, metadata and results
//! - **Validation** (`validation`): Checks run before any network activity
//! - **Adapters** (`adapters`): Facebook, Instagram, TikTok and YouTube upload flows
//! - **Upload Orchestrator** (`orchestrator`): Sequences platforms and isolates failures

pub mod adapter;
pub mod adapters;
pub mod error;
pub mod orchestrator;
pub mod types;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use adapter::{video_mime_type, UploadAdapter};
pub use adapters::{FacebookReelsAdapter, InstagramReelsAdapter, TikTokAdapter, YouTubeAdapter};
pub use error::{ProcessingError, PublishError, Result, UploadError, ValidationError};
pub use orchestrator::UploadOrchestrator;
pub use types::{
    JobState, PublishReport, PublishResult, PublishedMedia, UploadJob, VideoMetadata,
};
pub use validation::{validate_video, VideoFile};
