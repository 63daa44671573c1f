//! Facebook Reels: start a session on the Page, push the bytes to the
//! one-time upload URL, then finish and publish.

use crate::adapter::{send_checked, send_json, UploadAdapter};
use crate::error::Result;
use crate::types::{JobState, PublishedMedia, UploadJob};
use async_trait::async_trait;
use bridge_traits::{FileSystemAccess, HttpClient, HttpMethod, HttpRequest, NetworkError};
use core_auth::oauth::GRAPH_API_BASE;
use core_auth::{AuthError, FacebookPage, Platform, PlatformCredential};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Deserialize)]
struct StartResponse {
    video_id: String,
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct FinishResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    post_id: Option<String>,
}

pub struct FacebookReelsAdapter {
    http_client: Arc<dyn HttpClient>,
    file_system: Arc<dyn FileSystemAccess>,
}

impl FacebookReelsAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, file_system: Arc<dyn FileSystemAccess>) -> Self {
        Self {
            http_client,
            file_system,
        }
    }

    fn reels_endpoint(&self, page: &FacebookPage) -> String {
        format!("{}/{}/video_reels", GRAPH_API_BASE, page.id)
    }

    async fn initiate(&self, page: &FacebookPage) -> Result<StartResponse> {
        let endpoint = self.reels_endpoint(page);
        let request = HttpRequest::new(HttpMethod::Post, endpoint.clone()).json(&json!({
            "upload_phase": "start",
            "access_token": page.access_token,
        }))?;
        send_json(self.http_client.as_ref(), request, &endpoint).await
    }

    async fn transfer(&self, job: &UploadJob, page: &FacebookPage, upload_url: &str) -> Result<()> {
        let bytes = self.file_system.read_file(&job.file_path).await?;
        let request = HttpRequest::new(HttpMethod::Put, upload_url)
            .header("Authorization", format!("OAuth {}", page.access_token))
            .header("offset", "0")
            .header("file_size", bytes.len().to_string())
            .body(bytes);
        send_checked(self.http_client.as_ref(), request, upload_url).await?;
        Ok(())
    }

    async fn finish(&self, job: &UploadJob, page: &FacebookPage, video_id: &str) -> Result<String> {
        let endpoint = self.reels_endpoint(page);
        let metadata = &job.metadata;
        let request = HttpRequest::new(HttpMethod::Post, endpoint.clone()).json(&json!({
            "upload_phase": "finish",
            "video_id": video_id,
            "video_state": "PUBLISHED",
            "description": metadata.description().unwrap_or(metadata.title.as_str()),
            "title": metadata.title,
            "access_token": page.access_token,
        }))?;
        let response: FinishResponse =
            send_json(self.http_client.as_ref(), request, &endpoint).await?;

        Ok(response
            .id
            .or(response.post_id)
            .unwrap_or_else(|| video_id.to_string()))
    }
}

#[async_trait]
impl UploadAdapter for FacebookReelsAdapter {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    #[instrument(skip(self, job, credential), fields(job_id = %job.id))]
    async fn publish(
        &self,
        job: &mut UploadJob,
        credential: &PlatformCredential,
    ) -> Result<PublishedMedia> {
        let page = credential
            .facebook_pages()
            .first()
            .ok_or_else(|| AuthError::NoEligibleAccount {
                platform: Platform::Facebook,
                reason: "no Facebook Page is connected; reconnect Facebook".to_string(),
            })?;

        let session = self.initiate(page).await?;
        if session.upload_url.is_empty() {
            return Err(
                NetworkError::unexpected_body(self.reels_endpoint(page), "empty upload_url").into(),
            );
        }
        job.advance(JobState::Initiated)?;

        job.advance(JobState::Transferring)?;
        self.transfer(job, page, &session.upload_url).await?;

        let published_id = self.finish(job, page, &session.video_id).await?;
        job.advance(JobState::Published)?;

        info!(page = %page.name, "Published Facebook Reel");
        Ok(PublishedMedia::new(published_id))
    }
}
