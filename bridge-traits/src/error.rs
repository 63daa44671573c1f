use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// A failed exchange with a remote platform API.
///
/// Carries the endpoint that was called, the HTTP status when a response was
/// received, and the platform's own JSON error payload when it sent one.
#[derive(Debug, Clone, Error)]
#[error("{}", self.describe())]
pub struct NetworkError {
    pub endpoint: String,
    pub status: Option<u16>,
    pub message: String,
    pub payload: Option<Value>,
}

impl NetworkError {
    /// Failure before any response arrived (DNS, TLS, timeout, reset).
    pub fn transport(endpoint: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            endpoint: endpoint.into(),
            status: None,
            message: error.to_string(),
            payload: None,
        }
    }

    /// Build from a non-success response body, extracting the provider message.
    pub fn from_response(endpoint: impl Into<String>, status: u16, body: &[u8]) -> Self {
        let payload = serde_json::from_slice::<Value>(body).ok();
        let message = payload
            .as_ref()
            .and_then(extract_provider_message)
            .unwrap_or_else(|| {
                let text = String::from_utf8_lossy(body).trim().to_string();
                if text.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    text
                }
            });

        Self {
            endpoint: endpoint.into(),
            status: Some(status),
            message,
            payload,
        }
    }

    /// Response was 2xx but the body did not have the expected shape.
    pub fn unexpected_body(endpoint: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self {
            endpoint: endpoint.into(),
            status: None,
            message: format!("unexpected response body: {}", detail),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    fn describe(&self) -> String {
        match self.status {
            Some(status) => format!("{} ({}): {}", self.endpoint, status, self.message),
            None => format!("{}: {}", self.endpoint, self.message),
        }
    }
}

fn extract_provider_message(payload: &Value) -> Option<String> {
    let error = payload.get("error");

    // Graph API, TikTok and Google all nest a message object under "error".
    if let Some(message) = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
    {
        return Some(message.to_string());
    }

    if let Some(description) = payload.get("error_description").and_then(Value::as_str) {
        return Some(description.to_string());
    }

    error.and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_message_extracted() {
        let body = br#"{"error":{"message":"Invalid OAuth access token.","type":"OAuthException","code":190}}"#;
        let error = NetworkError::from_response("graph/me/accounts", 400, body);

        assert_eq!(error.message, "Invalid OAuth access token.");
        assert_eq!(error.status, Some(400));
        assert!(error.payload.is_some());
    }

    #[test]
    fn test_oauth_error_description_extracted() {
        let body = br#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#;
        let error = NetworkError::from_response("oauth2/token", 400, body);

        assert_eq!(error.message, "Token has been expired or revoked.");
    }

    #[test]
    fn test_plain_text_body_used_as_message() {
        let error = NetworkError::from_response("upload", 502, b"Bad Gateway");
        assert_eq!(error.message, "Bad Gateway");
        assert!(error.payload.is_none());

        let empty = NetworkError::from_response("upload", 401, b"");
        assert_eq!(empty.message, "HTTP 401");
        assert_eq!(empty.status, Some(401));
    }

    #[test]
    fn test_transport_error_has_no_status() {
        let error = NetworkError::transport("upload", "connection reset");
        assert_eq!(error.status, None);
        assert_eq!(error.to_string(), "upload: connection reset");
    }
}
