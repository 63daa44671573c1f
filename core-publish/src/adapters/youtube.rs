//! YouTube Data API v3 `videos.insert` as a single streamed
//! `multipart/related` request.

use crate::adapter::{video_mime_type, UploadAdapter};
use crate::error::Result;
use crate::types::{JobState, PublishedMedia, UploadJob};
use async_trait::async_trait;
use bridge_traits::{
    ByteStream, FileSystemAccess, HttpClient, HttpMethod, HttpRequest, HttpResponse, NetworkError,
};
use bytes::Bytes;
use core_auth::{AuthError, CredentialProvider, Platform, PlatformCredential};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const UPLOAD_ENDPOINT: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=multipart&part=snippet,status";
const DEFAULT_TITLE: &str = "Untitled Video";
/// "People & Blogs"
const CATEGORY_ID: &str = "22";

#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: String,
}

pub struct YouTubeAdapter {
    http_client: Arc<dyn HttpClient>,
    file_system: Arc<dyn FileSystemAccess>,
    credentials: Arc<dyn CredentialProvider>,
}

impl YouTubeAdapter {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        file_system: Arc<dyn FileSystemAccess>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            http_client,
            file_system,
            credentials,
        }
    }

    fn video_resource(job: &UploadJob) -> serde_json::Value {
        let metadata = &job.metadata;
        let title = match metadata.title.trim() {
            "" => DEFAULT_TITLE,
            title => title,
        };
        json!({
            "snippet": {
                "title": title,
                "description": metadata.description().unwrap_or_default(),
                "tags": metadata.tags,
                "categoryId": CATEGORY_ID,
            },
            "status": {
                "privacyStatus": "public",
                "selfDeclaredMadeForKids": false,
            },
        })
    }

    /// One insert attempt. The file is reopened every time since a stream
    /// can only be consumed once.
    async fn insert(&self, job: &UploadJob, token: &str) -> Result<HttpResponse> {
        let size = self.file_system.metadata(&job.file_path).await?.size;
        let reader = self.file_system.open_read_stream(&job.file_path).await?;

        let boundary = format!("shortposter-{}", Uuid::new_v4().simple());
        let preamble = format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{json}\r\n--{b}\r\nContent-Type: {mime}\r\n\r\n",
            b = boundary,
            json = Self::video_resource(job),
            mime = video_mime_type(&job.file_path),
        );
        let epilogue = format!("\r\n--{}--\r\n", boundary);
        let content_length = preamble.len() as u64 + size + epilogue.len() as u64;

        let body: ByteStream = Box::pin(
            stream::once(async move { Ok(Bytes::from(preamble)) })
                .chain(ReaderStream::new(reader))
                .chain(stream::once(async move { Ok(Bytes::from(epilogue)) })),
        );

        let request = HttpRequest::new(HttpMethod::Post, UPLOAD_ENDPOINT)
            .bearer_token(token)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", boundary),
            );

        let response = self
            .http_client
            .execute_stream(request, body, Some(content_length))
            .await
            .map_err(|e| NetworkError::transport(UPLOAD_ENDPOINT, e))?;
        Ok(response)
    }
}

#[async_trait]
impl UploadAdapter for YouTubeAdapter {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    #[instrument(skip(self, job, credential), fields(job_id = %job.id))]
    async fn publish(
        &self,
        job: &mut UploadJob,
        credential: &PlatformCredential,
    ) -> Result<PublishedMedia> {
        job.advance(JobState::Initiated)?;
        job.advance(JobState::Transferring)?;

        let mut response = self.insert(job, &credential.access_token).await?;

        if response.is_unauthorized() {
            warn!("YouTube rejected the access token; refreshing once");
            let token = self
                .credentials
                .refresh(Platform::YouTube)
                .await
                .map_err(|e| {
                    warn!(error = %e, "YouTube token refresh failed");
                    AuthError::ReauthRequired {
                        platform: Platform::YouTube,
                    }
                })?;

            response = self.insert(job, &token).await?;
            if response.is_unauthorized() {
                return Err(AuthError::ReauthRequired {
                    platform: Platform::YouTube,
                }
                .into());
            }
        }

        if !response.is_success() {
            return Err(
                NetworkError::from_response(UPLOAD_ENDPOINT, response.status, &response.body).into(),
            );
        }

        let inserted: InsertResponse = response
            .json()
            .map_err(|e| NetworkError::unexpected_body(UPLOAD_ENDPOINT, e))?;
        job.advance(JobState::Published)?;

        info!(video_id = %inserted.id, "Published YouTube video");
        Ok(PublishedMedia {
            url: Some(format!("https://www.youtube.com/watch?v={}", inserted.id)),
            ..PublishedMedia::new(inserted.id)
        })
    }
}
