//! Upload adapter seam and the HTTP helpers the adapters share.

use crate::error::Result;
use crate::types::{PublishedMedia, UploadJob};
use async_trait::async_trait;
use bridge_traits::{HttpClient, HttpRequest, HttpResponse, NetworkError};
use core_auth::{Platform, PlatformCredential};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::warn;

/// Publishes a validated video to one platform.
///
/// Implementations move `job` through its states and return what the
/// platform reported. The orchestrator marks the job failed on error.
#[async_trait]
pub trait UploadAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    async fn publish(
        &self,
        job: &mut UploadJob,
        credential: &PlatformCredential,
    ) -> Result<PublishedMedia>;
}

/// MIME type sent for a video file.
pub fn video_mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("mov") => "video/quicktime",
        _ => "video/mp4",
    }
}

/// Send `request` and fail with a [`NetworkError`] on any non-2xx answer.
pub(crate) async fn send_checked(
    http: &dyn HttpClient,
    request: HttpRequest,
    endpoint: &str,
) -> Result<HttpResponse> {
    let response = http
        .execute(request)
        .await
        .map_err(|e| NetworkError::transport(endpoint, e))?;

    if !response.is_success() {
        let error = NetworkError::from_response(endpoint, response.status, &response.body);
        warn!(status = response.status, error = %error.message, "Request to {} failed", endpoint);
        return Err(error.into());
    }

    Ok(response)
}

/// [`send_checked`] plus JSON decoding of the body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    http: &dyn HttpClient,
    request: HttpRequest,
    endpoint: &str,
) -> Result<T> {
    let response = send_checked(http, request, endpoint).await?;
    let body = response
        .json()
        .map_err(|e| NetworkError::unexpected_body(endpoint, e))?;
    Ok(body)
}
