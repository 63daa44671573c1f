//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the publishing core:
//! - Logging and tracing infrastructure
//! - Configuration management (bridges, OAuth app credentials, upload limits)
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its configuration types and
//! for broadcasting progress to the host UI.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
