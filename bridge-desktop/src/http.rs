//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Reqwest-based HTTP client implementation
///
/// Each call is a single attempt. Uploads can take minutes, so the overall
/// timeout is generous and individual requests may override it.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(600))
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("short-poster-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        }
    }

    /// Build reqwest request from bridge request, without its body
    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    /// `url` must already be redacted; reqwest errors are stripped of theirs.
    async fn send(&self, url: &str, builder: reqwest::RequestBuilder) -> Result<HttpResponse> {
        let response = builder.send().await.map_err(|e| {
            let e = e.without_url();
            warn!(error = %e, url = %url, "HTTP request failed");
            if e.is_timeout() {
                BridgeError::OperationFailed(format!("Request to {} timed out", url))
            } else if e.is_connect() {
                BridgeError::OperationFailed(format!("Connection to {} failed: {}", url, e))
            } else {
                BridgeError::OperationFailed(format!("Request to {} failed: {}", url, e))
            }
        })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| {
                BridgeError::OperationFailed(format!(
                    "Reading response from {} failed: {}",
                    url,
                    e.without_url()
                ))
            })?;

        debug!(status = status, url = %url, size = body.len(), "HTTP response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.redacted_url();
        debug!(method = ?request.method, url = %url, "Executing HTTP request");

        let mut builder = self.build_request(&request);
        if let Some(body) = request.body.clone() {
            builder = builder.body(body);
        }

        self.send(&url, builder).await
    }

    async fn execute_stream(
        &self,
        request: HttpRequest,
        body: ByteStream,
        content_length: Option<u64>,
    ) -> Result<HttpResponse> {
        let url = request.redacted_url();
        debug!(
            method = ?request.method,
            url = %url,
            content_length = ?content_length,
            "Executing streamed HTTP request"
        );

        let mut builder = self
            .build_request(&request)
            .body(reqwest::Body::wrap_stream(body));
        if let Some(length) = content_length {
            builder = builder.header(reqwest::header::CONTENT_LENGTH, length);
        }

        self.send(&url, builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_creation() {
        assert!(ReqwestHttpClient::new().is_ok());
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Get),
            reqwest::Method::GET
        );
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Put),
            reqwest::Method::PUT
        );
    }

    #[test]
    fn test_build_request_copies_headers() {
        let client = ReqwestHttpClient::new().unwrap();
        let request = HttpRequest::new(HttpMethod::Post, "https://example.com/upload")
            .header("X-Upload-Content-Type", "video/mp4")
            .timeout(Duration::from_secs(5));

        let built = client.build_request(&request).build().unwrap();
        assert_eq!(built.method(), reqwest::Method::POST);
        assert_eq!(
            built.headers().get("x-upload-content-type").unwrap(),
            "video/mp4"
        );
        assert_eq!(built.timeout(), Some(&Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_connection_error_hides_query_secrets() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_secs(5)).unwrap();
        let request = HttpRequest::new(
            HttpMethod::Get,
            "http://127.0.0.1:1/v18.0/oauth/access_token?client_id=fb-app\
             &client_secret=APP-SECRET&code=AUTH-CODE&code_verifier=VERIFIER",
        );

        let message = client.execute(request).await.unwrap_err().to_string();

        assert!(message.contains("127.0.0.1:1/v18.0/oauth/access_token"));
        assert!(message.contains("client_id=fb-app"));
        for secret in ["APP-SECRET", "AUTH-CODE", "VERIFIER"] {
            assert!(!message.contains(secret), "{} leaked: {}", secret, message);
        }
    }

    #[tokio::test]
    async fn test_streamed_connection_error_hides_query_secrets() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_secs(5)).unwrap();
        let request = HttpRequest::new(
            HttpMethod::Put,
            "http://127.0.0.1:1/upload?upload_id=9&access_token=PAGE-TOKEN",
        );
        let body: ByteStream = Box::pin(futures_util::stream::once(async {
            Ok(bytes::Bytes::from_static(b"video"))
        }));

        let message = client
            .execute_stream(request, body, Some(5))
            .await
            .unwrap_err()
            .to_string();

        assert!(message.contains("upload_id=9"));
        assert!(!message.contains("PAGE-TOKEN"), "token leaked: {}", message);
    }
}
