//! Checks a video must pass before any platform is contacted.

use crate::adapter::video_mime_type;
use crate::error::ValidationError;
use bridge_traits::FileSystemAccess;
use core_runtime::config::UploadSettings;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A video that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFile {
    pub path: PathBuf,
    pub size: u64,
    /// Lowercase extension without the dot.
    pub extension: String,
    pub mime_type: &'static str,
}

impl VideoFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Validate existence, then size, then extension.
pub async fn validate_video(
    file_system: &dyn FileSystemAccess,
    path: &Path,
    settings: &UploadSettings,
) -> Result<VideoFile, ValidationError> {
    let missing = || ValidationError::FileMissing {
        path: path.to_path_buf(),
    };

    let exists = file_system
        .exists(path)
        .await
        .map_err(|e| ValidationError::Unreadable(e.to_string()))?;
    if !exists {
        return Err(missing());
    }

    let metadata = file_system
        .metadata(path)
        .await
        .map_err(|e| ValidationError::Unreadable(e.to_string()))?;
    if metadata.is_directory {
        return Err(missing());
    }

    if metadata.size > settings.max_file_size_bytes {
        return Err(ValidationError::FileTooLarge {
            size: metadata.size,
            limit: settings.max_file_size_bytes,
        });
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !settings.allowed_extensions.iter().any(|allowed| *allowed == extension) {
        return Err(ValidationError::UnsupportedFormat {
            extension,
            allowed: settings.allowed_extensions.join(", "),
        });
    }

    debug!(path = ?path, size = metadata.size, "Video passed validation");
    Ok(VideoFile {
        path: path.to_path_buf(),
        size: metadata.size,
        extension,
        mime_type: video_mime_type(path),
    })
}
