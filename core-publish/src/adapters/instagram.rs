//! Instagram Reels via the Graph API content-publishing flow.
//!
//! Instagram fetches the video itself from a public URL, so this adapter
//! never reads the local file. It creates a media container, polls until
//! Instagram has processed it, then publishes the container.

use crate::adapter::{send_json, UploadAdapter};
use crate::error::{ProcessingError, Result, UploadError};
use crate::types::{JobState, PublishedMedia, UploadJob};
use async_trait::async_trait;
use bridge_traits::{HttpClient, HttpMethod, HttpRequest};
use core_auth::oauth::GRAPH_API_BASE;
use core_auth::{AuthError, InstagramAccount, Platform, PlatformCredential};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ContainerStatus {
    #[serde(default)]
    status_code: Option<String>,
}

pub struct InstagramReelsAdapter {
    http_client: Arc<dyn HttpClient>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl InstagramReelsAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            http_client,
            poll_interval,
            max_attempts,
        }
    }

    async fn create_container(
        &self,
        account: &InstagramAccount,
        video_url: &str,
        caption: &str,
    ) -> Result<String> {
        let endpoint = format!("{}/{}/media", GRAPH_API_BASE, account.instagram_account_id);
        let request = HttpRequest::new(HttpMethod::Post, endpoint.clone()).json(&json!({
            "media_type": "REELS",
            "video_url": video_url,
            "caption": caption,
            "access_token": account.page_access_token,
        }))?;
        let response: IdResponse = send_json(self.http_client.as_ref(), request, &endpoint).await?;
        Ok(response.id)
    }

    /// Poll the container until `FINISHED`, up to `max_attempts` checks.
    async fn wait_until_finished(&self, account: &InstagramAccount, container_id: &str) -> Result<()> {
        let endpoint = format!("{}/{}", GRAPH_API_BASE, container_id);
        let url = format!(
            "{}?fields=status_code&access_token={}",
            endpoint,
            urlencoding::encode(&account.page_access_token)
        );

        for attempt in 1..=self.max_attempts {
            let request = HttpRequest::new(HttpMethod::Get, url.clone());
            let status: ContainerStatus =
                send_json(self.http_client.as_ref(), request, &endpoint).await?;
            let code = status.status_code.unwrap_or_default();
            debug!(container_id, attempt, status = %code, "Instagram container status");

            match code.as_str() {
                "FINISHED" => return Ok(()),
                "ERROR" | "EXPIRED" => {
                    return Err(ProcessingError::RemoteProcessingFailed { status: code }.into())
                }
                _ => {}
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(ProcessingError::ProcessingTimeout {
            attempts: self.max_attempts,
        }
        .into())
    }

    async fn publish_container(&self, account: &InstagramAccount, container_id: &str) -> Result<String> {
        let endpoint = format!(
            "{}/{}/media_publish",
            GRAPH_API_BASE, account.instagram_account_id
        );
        let request = HttpRequest::new(HttpMethod::Post, endpoint.clone()).json(&json!({
            "creation_id": container_id,
            "access_token": account.page_access_token,
        }))?;
        let response: IdResponse = send_json(self.http_client.as_ref(), request, &endpoint).await?;
        Ok(response.id)
    }
}

#[async_trait]
impl UploadAdapter for InstagramReelsAdapter {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    #[instrument(skip(self, job, credential), fields(job_id = %job.id))]
    async fn publish(
        &self,
        job: &mut UploadJob,
        credential: &PlatformCredential,
    ) -> Result<PublishedMedia> {
        let account = credential
            .instagram_accounts()
            .first()
            .ok_or_else(|| AuthError::NoEligibleAccount {
                platform: Platform::Instagram,
                reason: "no Instagram Business account is linked to a Facebook Page".to_string(),
            })?;

        let video_url = job
            .metadata
            .public_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or(UploadError::HostingRequired)?;

        let container_id = self
            .create_container(account, &video_url, &job.metadata.caption())
            .await?;
        job.advance(JobState::Initiated)?;
        job.advance(JobState::Transferring)?;

        job.advance(JobState::Processing)?;
        self.wait_until_finished(account, &container_id).await?;

        let media_id = self.publish_container(account, &container_id).await?;
        job.advance(JobState::Published)?;

        info!(account = %account.instagram_account_id, media_id = %media_id, "Published Instagram Reel");
        Ok(PublishedMedia::new(media_id))
    }
}
