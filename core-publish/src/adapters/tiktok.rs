//! TikTok Content Posting API, direct post with a single-chunk file upload.

use crate::adapter::{send_checked, video_mime_type, UploadAdapter};
use crate::error::Result;
use crate::types::{JobState, PublishedMedia, UploadJob};
use async_trait::async_trait;
use bridge_traits::{FileSystemAccess, HttpClient, HttpMethod, HttpRequest, NetworkError};
use core_auth::{Platform, PlatformCredential};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};

const TIKTOK_API_BASE: &str = "https://open.tiktokapis.com/v2";

#[derive(Debug, Deserialize)]
struct InitData {
    publish_id: String,
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    #[serde(default)]
    status: Option<String>,
}

pub struct TikTokAdapter {
    http_client: Arc<dyn HttpClient>,
    file_system: Arc<dyn FileSystemAccess>,
}

impl TikTokAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, file_system: Arc<dyn FileSystemAccess>) -> Self {
        Self {
            http_client,
            file_system,
        }
    }

    /// Send and unwrap TikTok's `{data, error}` envelope.
    ///
    /// TikTok reports some failures with a 200 and `error.code != "ok"`.
    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        request: HttpRequest,
        endpoint: &str,
    ) -> Result<T> {
        let response = send_checked(self.http_client.as_ref(), request, endpoint).await?;
        let body: Value = response
            .json()
            .map_err(|e| NetworkError::unexpected_body(endpoint, e))?;

        let code = body
            .pointer("/error/code")
            .and_then(Value::as_str)
            .unwrap_or("ok");
        if code != "ok" {
            return Err(NetworkError::from_response(endpoint, response.status, &response.body).into());
        }

        let data = body.get("data").cloned().unwrap_or(Value::Null);
        let data = serde_json::from_value(data)
            .map_err(|e| NetworkError::unexpected_body(endpoint, e).with_payload(body))?;
        Ok(data)
    }

    async fn initiate(&self, job: &UploadJob, token: &str, video_size: u64) -> Result<InitData> {
        let endpoint = format!("{}/post/publish/video/init/", TIKTOK_API_BASE);
        let request = HttpRequest::new(HttpMethod::Post, endpoint.clone())
            .bearer_token(token)
            .json(&json!({
                "post_info": {
                    "title": job.metadata.title,
                    "privacy_level": "SELF_ONLY",
                    "disable_duet": false,
                    "disable_comment": false,
                    "disable_stitch": false,
                    "video_cover_timestamp_ms": 1000,
                },
                "source_info": {
                    "source": "FILE_UPLOAD",
                    "video_size": video_size,
                    "chunk_size": video_size,
                    "total_chunk_count": 1,
                },
            }))?;
        self.call(request, &endpoint).await
    }

    async fn transfer(&self, job: &UploadJob, upload_url: &str, bytes: bytes::Bytes) -> Result<()> {
        let size = bytes.len() as u64;
        let request = HttpRequest::new(HttpMethod::Put, upload_url)
            .header("Content-Type", video_mime_type(&job.file_path))
            .header(
                "Content-Range",
                format!("bytes 0-{}/{}", size.saturating_sub(1), size),
            )
            .body(bytes);
        send_checked(self.http_client.as_ref(), request, upload_url).await?;
        Ok(())
    }

    /// Current publish status. The upload already succeeded, so a failed
    /// lookup is logged and reported as unknown.
    async fn fetch_status(&self, token: &str, publish_id: &str) -> Option<String> {
        let endpoint = format!("{}/post/publish/status/fetch/", TIKTOK_API_BASE);
        let url = format!("{}?publish_id={}", endpoint, urlencoding::encode(publish_id));
        let request = HttpRequest::new(HttpMethod::Get, url).bearer_token(token);

        match self.call::<StatusData>(request, &endpoint).await {
            Ok(data) => data.status,
            Err(e) => {
                warn!(publish_id, error = %e, "Could not fetch TikTok publish status");
                None
            }
        }
    }
}

#[async_trait]
impl UploadAdapter for TikTokAdapter {
    fn platform(&self) -> Platform {
        Platform::TikTok
    }

    #[instrument(skip(self, job, credential), fields(job_id = %job.id))]
    async fn publish(
        &self,
        job: &mut UploadJob,
        credential: &PlatformCredential,
    ) -> Result<PublishedMedia> {
        let token = credential.access_token.as_str();
        let bytes = self.file_system.read_file(&job.file_path).await?;

        let init = self.initiate(job, token, bytes.len() as u64).await?;
        job.advance(JobState::Initiated)?;

        job.advance(JobState::Transferring)?;
        self.transfer(job, &init.upload_url, bytes).await?;

        let status = self.fetch_status(token, &init.publish_id).await;
        job.advance(JobState::Published)?;

        info!(publish_id = %init.publish_id, status = ?status, "Uploaded video to TikTok");
        Ok(PublishedMedia {
            status,
            ..PublishedMedia::new(init.publish_id)
        })
    }
}
