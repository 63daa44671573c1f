//! Integration tests for the login-then-publish workflow
//!
//! These tests drive the service the way a desktop shell does:
//! - Starting logins and delivering callback URLs through the listener channel
//! - Persisting credentials in the secure store
//! - Publishing a real file on disk to several platforms in one call
//! - Reporting per-platform outcomes, including platforms needing a login

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{
    ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, SecureStore, UrlLauncher,
};
use core_runtime::config::OAuthClient;
use core_service::{
    AuthSettings, CoreConfig, CoreEvent, Platform, PosterService, UploadEvent, UploadSettings,
    VideoMetadata,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ============================================================================
// Fakes
// ============================================================================

/// Answers platform API calls by URL, the way the real services would.
#[derive(Default)]
struct FakePlatforms {
    log: Mutex<Vec<(HttpMethod, String)>>,
}

impl FakePlatforms {
    fn calls(&self) -> Vec<(HttpMethod, String)> {
        self.log.lock().unwrap().clone()
    }

    fn route(&self, request: &HttpRequest) -> (u16, String) {
        let url = request.url.as_str();
        let body = request
            .body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();

        if url.starts_with("https://graph.facebook.com/v18.0/oauth/access_token") {
            if url.contains("fb_exchange_token=") {
                return (200, r#"{"access_token":"fb-long","expires_in":5184000}"#.into());
            }
            return (200, r#"{"access_token":"fb-short","expires_in":3600}"#.into());
        }
        if url.starts_with("https://graph.facebook.com/v18.0/me/accounts") {
            return (
                200,
                r#"{"data":[{"id":"page-1","name":"Studio","access_token":"page-token"}]}"#.into(),
            );
        }
        if url == "https://graph.facebook.com/v18.0/page-1/video_reels" {
            if body.contains("\"start\"") {
                return (
                    200,
                    r#"{"video_id":"fb-vid","upload_url":"https://rupload.facebook.com/video-upload/v18.0/fb-vid"}"#
                        .into(),
                );
            }
            return (200, r#"{"success":true,"post_id":"page-1_post"}"#.into());
        }
        if url.starts_with("https://rupload.facebook.com/") {
            return (200, r#"{"success":true}"#.into());
        }
        if url == "https://open.tiktokapis.com/v2/oauth/token/" {
            return (
                200,
                r#"{"access_token":"tt-access","refresh_token":"tt-refresh","expires_in":86400,"open_id":"tt-user"}"#
                    .into(),
            );
        }
        if url == "https://open.tiktokapis.com/v2/post/publish/video/init/" {
            return (
                200,
                r#"{"data":{"publish_id":"tt-pub","upload_url":"https://open-upload.tiktokapis.com/video/?upload_id=9"},"error":{"code":"ok"}}"#
                    .into(),
            );
        }
        if url.starts_with("https://open-upload.tiktokapis.com/") {
            return (201, String::new());
        }
        if url.starts_with("https://open.tiktokapis.com/v2/post/publish/status/fetch/") {
            return (
                200,
                r#"{"data":{"status":"PROCESSING_UPLOAD"},"error":{"code":"ok"}}"#.into(),
            );
        }

        (404, r#"{"error":{"message":"no such route"}}"#.into())
    }
}

#[async_trait]
impl HttpClient for FakePlatforms {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.log
            .lock()
            .unwrap()
            .push((request.method, request.url.clone()));
        let (status, body) = self.route(&request);
        Ok(HttpResponse::new(status, body))
    }

    async fn execute_stream(
        &self,
        _request: HttpRequest,
        _body: ByteStream,
        _content_length: Option<u64>,
    ) -> BridgeResult<HttpResponse> {
        Err(BridgeError::NotAvailable("streamed uploads".to_string()))
    }
}

#[derive(Default)]
struct MemoryStore {
    secrets: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.secrets
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.secrets.lock().unwrap().get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.secrets.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.secrets.lock().unwrap().keys().cloned().collect())
    }
}

struct SilentBrowser;

#[async_trait]
impl UrlLauncher for SilentBrowser {
    async fn open_url(&self, _url: &str) -> BridgeResult<()> {
        Ok(())
    }
}

fn service(http: Arc<FakePlatforms>, store: Arc<MemoryStore>) -> PosterService {
    let config = CoreConfig::builder()
        .http_client(http)
        .file_system(Arc::new(TokioFileSystem::new()))
        .secure_store(store)
        .url_launcher(Arc::new(SilentBrowser))
        .auth_settings(AuthSettings {
            facebook_app: Some(OAuthClient::new("fb-app", "fb-secret")),
            tiktok_app: Some(OAuthClient::new("tt-key", "tt-secret")),
            ..AuthSettings::default()
        })
        .upload_settings(UploadSettings::without_delays())
        .build()
        .expect("config");

    PosterService::new(config).expect("service")
}

async fn sign_in(service: &PosterService, platforms: &[&str]) {
    let (sender, listener) = service.start_callback_listener();
    for platform in platforms {
        let request = service.login(platform).await.expect("login");
        sender
            .send(format!(
                "shortposter://auth/callback?code={}-code&state={}",
                platform, request.state
            ))
            .await
            .expect("listener alive");
    }
    drop(sender);
    listener.await.expect("listener task");
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_callbacks_complete_logins() {
    let http = Arc::new(FakePlatforms::default());
    let store = Arc::new(MemoryStore::default());
    let service = service(http.clone(), store.clone());

    sign_in(&service, &["facebook", "tiktok"]).await;

    let status = service.status().await.unwrap();
    assert_eq!(status[&Platform::Facebook], true);
    assert_eq!(status[&Platform::TikTok], true);
    assert_eq!(status[&Platform::Instagram], false);
    assert_eq!(status[&Platform::YouTube], false);
    assert_eq!(service.auth().pending_logins().await, 0);

    let mut keys = store.list_keys().await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["credentials:facebook", "credentials:tiktok"]);

    // Facebook keeps the long-lived token and the page list.
    let facebook = service
        .auth()
        .credential_store()
        .get(Platform::Facebook)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(facebook.access_token, "fb-long");
    assert_eq!(facebook.facebook_pages()[0].id, "page-1");
}

#[tokio::test]
async fn test_publish_to_signed_in_platforms() {
    let http = Arc::new(FakePlatforms::default());
    let service = service(http.clone(), Arc::new(MemoryStore::default()));
    sign_in(&service, &["facebook", "tiktok"]).await;

    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("launch.mp4");
    std::fs::write(&video, b"not really an mp4 but close enough").unwrap();

    let mut events = service.subscribe();
    let metadata = VideoMetadata {
        description: Some("Launch day".to_string()),
        tags: vec!["launch".to_string()],
        ..VideoMetadata::new("We shipped")
    };
    let platforms = ["facebook", "youtube", "tiktok"].map(String::from);

    let report = service.publish(&video, &metadata, &platforms).await.unwrap();

    let order: Vec<&str> = report.iter().map(|r| r.platform.as_str()).collect();
    assert_eq!(order, vec!["facebook", "youtube", "tiktok"]);

    let facebook = report.get("facebook").unwrap();
    assert!(facebook.success);
    assert_eq!(facebook.published_id.as_deref(), Some("page-1_post"));

    let youtube = report.get("youtube").unwrap();
    assert!(!youtube.success);
    assert!(youtube.reauth_required);

    let tiktok = report.get("tiktok").unwrap();
    assert!(tiktok.success);
    assert_eq!(tiktok.published_id.as_deref(), Some("tt-pub"));
    assert_eq!(tiktok.status.as_deref(), Some("PROCESSING_UPLOAD"));

    assert_eq!(report.reauth_required(), vec!["youtube"]);

    // YouTube never reached the network.
    assert!(http
        .calls()
        .iter()
        .all(|(_, url)| !url.contains("googleapis.com")));

    let mut completed = None;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Upload(UploadEvent::Completed { succeeded, failed }) = event {
            completed = Some((succeeded, failed));
        }
    }
    assert_eq!(completed, Some((2, 1)));
}

#[tokio::test]
async fn test_invalid_video_touches_no_platform() {
    let http = Arc::new(FakePlatforms::default());
    let service = service(http.clone(), Arc::new(MemoryStore::default()));
    sign_in(&service, &["facebook"]).await;
    let calls_after_login = http.calls().len();

    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("clip.avi");
    std::fs::write(&video, b"avi").unwrap();

    let err = service
        .publish(&video, &VideoMetadata::new("Clip"), &["facebook".to_string()])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Unsupported video format"));
    assert_eq!(http.calls().len(), calls_after_login);
}

#[tokio::test]
async fn test_logout_removes_credential() {
    let store = Arc::new(MemoryStore::default());
    let service = service(Arc::new(FakePlatforms::default()), store.clone());
    sign_in(&service, &["tiktok"]).await;

    service.logout("tiktok").await.unwrap();

    assert_eq!(service.status().await.unwrap()[&Platform::TikTok], false);
    assert!(store.list_keys().await.unwrap().is_empty());
}
