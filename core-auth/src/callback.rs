//! OS callback delivery.
//!
//! The desktop shell receives `{scheme}://auth/callback?...` URLs from the
//! operating system and pushes them, raw, into an `mpsc` channel. The
//! listener task drains the channel and hands each URL to the
//! [`AuthManager`], which correlates it with a pending login by state.

use crate::error::{AuthError, Result};
use crate::manager::AuthManager;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

const CALLBACK_HOST: &str = "auth";
const CALLBACK_PATH: &str = "/callback";

/// Query parameters of an authorization callback.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct CallbackParams {
    /// Platform hint appended by the redirect; reconciled against the state.
    pub platform: Option<String>,
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl std::fmt::Debug for CallbackParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackParams")
            .field("platform", &self.platform)
            .field("code", &self.code.as_ref().map(|_| "[REDACTED]"))
            .field("state", &self.state)
            .field("error", &self.error)
            .field("error_description", &self.error_description)
            .finish()
    }
}

impl CallbackParams {
    /// Parse a callback URL registered under `scheme`.
    pub fn parse(raw: &str, scheme: &str) -> Result<Self> {
        let url = Url::parse(raw.trim())
            .map_err(|e| AuthError::InvalidCallback(format!("not a URL: {}", e)))?;

        if !url.scheme().eq_ignore_ascii_case(scheme) {
            return Err(AuthError::InvalidCallback(format!(
                "unexpected scheme '{}'",
                url.scheme()
            )));
        }
        let path = url.path().trim_end_matches('/');
        if url.host_str() != Some(CALLBACK_HOST) || path != CALLBACK_PATH {
            return Err(AuthError::InvalidCallback(format!(
                "unexpected target '{}{}'",
                url.host_str().unwrap_or_default(),
                url.path()
            )));
        }

        let mut params = CallbackParams::default();
        for (key, value) in url.query_pairs() {
            let value = Some(value.into_owned()).filter(|v| !v.is_empty());
            match key.as_ref() {
                "platform" => params.platform = value,
                "code" => params.code = value,
                "state" => params.state = value,
                "error" => params.error = value,
                "error_description" => params.error_description = value,
                _ => {}
            }
        }

        Ok(params)
    }
}

/// Spawn the task that feeds callback URLs from `receiver` to `manager`.
///
/// The task ends when every sender is dropped.
pub fn spawn_callback_listener(
    manager: Arc<AuthManager>,
    mut receiver: mpsc::Receiver<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Callback listener started");
        while let Some(url) = receiver.recv().await {
            match manager.handle_callback_url(&url).await {
                Ok(credential) => {
                    info!(platform = %credential.platform, "Callback completed sign-in")
                }
                Err(e) => warn!(error = %e, "Callback rejected"),
            }
        }
        debug!("Callback listener stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success_callback() {
        let params = CallbackParams::parse(
            "shortposter://auth/callback?platform=tiktok&code=abc%2B1&state=tiktok_1_xyz",
            "shortposter",
        )
        .unwrap();

        assert_eq!(params.platform.as_deref(), Some("tiktok"));
        assert_eq!(params.code.as_deref(), Some("abc+1"));
        assert_eq!(params.state.as_deref(), Some("tiktok_1_xyz"));
        assert!(params.error.is_none());
    }

    #[test]
    fn test_parse_error_callback() {
        let params = CallbackParams::parse(
            "shortposter://auth/callback?error=access_denied&error_description=User+cancelled&state=s",
            "shortposter",
        )
        .unwrap();

        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.error_description.as_deref(), Some("User cancelled"));
    }

    #[test]
    fn test_rejects_foreign_urls() {
        assert!(matches!(
            CallbackParams::parse("https://auth/callback?code=1", "shortposter"),
            Err(AuthError::InvalidCallback(_))
        ));
        assert!(matches!(
            CallbackParams::parse("shortposter://other/callback?code=1", "shortposter"),
            Err(AuthError::InvalidCallback(_))
        ));
        assert!(matches!(
            CallbackParams::parse("shortposter://auth/elsewhere", "shortposter"),
            Err(AuthError::InvalidCallback(_))
        ));
        assert!(matches!(
            CallbackParams::parse("not a url", "shortposter"),
            Err(AuthError::InvalidCallback(_))
        ));
    }

    #[test]
    fn test_custom_scheme() {
        assert!(CallbackParams::parse("myposter://auth/callback/?code=1", "myposter").is_ok());
    }

    #[test]
    fn test_debug_hides_code() {
        let params =
            CallbackParams::parse("shortposter://auth/callback?code=secret-code", "shortposter")
                .unwrap();
        assert!(!format!("{:?}", params).contains("secret-code"));
    }
}
