//! OAuth 2.0 Authorization Flow Manager with PKCE Support
//!
//! Implements RFC 6749 (OAuth 2.0) and RFC 7636 (PKCE) against the four
//! publishing platforms.
//!
//! # Overview
//!
//! The flow manager handles:
//! - Building authorization URLs with a PKCE challenge
//! - Exchanging authorization codes for tokens
//! - Upgrading Meta short-lived tokens to long-lived ones
//! - Refreshing access tokens (TikTok, YouTube)
//! - Discovering the Pages and Instagram accounts behind a Meta login
//!
//! # Security
//!
//! Tokens, codes and verifiers are never logged.
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthConfig, OAuthFlowManager};
//! use core_auth::{PkceVerifier, Platform};
//! use core_runtime::config::{AuthSettings, OAuthClient};
//! use std::sync::Arc;
//!
//! # fn example() -> core_auth::Result<()> {
//! # use bridge_traits::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let settings = AuthSettings {
//!     tiktok_app: Some(OAuthClient::new("client-key", "client-secret")),
//!     ..AuthSettings::default()
//! };
//! let config = OAuthConfig::for_platform(Platform::TikTok, &settings)?;
//! let manager = OAuthFlowManager::new(config, http_client);
//! let url = manager.build_auth_url("tiktok_1_abc", &PkceVerifier::new())?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::pkce::PkceVerifier;
use crate::types::{AuxiliaryData, FacebookPage, InstagramAccount, Platform};
use bridge_traits::{HttpClient, HttpMethod, HttpRequest, HttpResponse, NetworkError};
use core_runtime::config::AuthSettings;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Graph API root shared by Facebook and Instagram.
pub const GRAPH_API_BASE: &str = "https://graph.facebook.com/v18.0";

const FACEBOOK_AUTH_URL: &str = "https://www.facebook.com/v18.0/dialog/oauth";
const TIKTOK_AUTH_URL: &str = "https://www.tiktok.com/v2/auth/authorize";
const TIKTOK_TOKEN_URL: &str = "https://open.tiktokapis.com/v2/oauth/token/";
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// How a platform's token endpoint expects its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRequestStyle {
    /// `GET` with parameters in the query string (Graph API).
    Query,
    /// `POST` with an `application/x-www-form-urlencoded` body.
    Form,
}

/// OAuth 2.0 configuration of one platform.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub platform: Platform,
    pub client_id: String,
    pub client_secret: String,
    /// Query parameter carrying the client id (`client_key` on TikTok).
    pub client_id_param: &'static str,
    pub redirect_uri: String,
    pub scopes: Vec<&'static str>,
    pub auth_url: String,
    pub token_url: String,
    pub token_style: TokenRequestStyle,
    /// Additional authorization parameters.
    pub extra_auth_params: Vec<(&'static str, &'static str)>,
}

impl OAuthConfig {
    /// Resolve the endpoints, scopes and client credentials of `platform`.
    ///
    /// Fails with [`AuthError::NotConfigured`] when the platform's application
    /// credentials are absent from `settings`.
    pub fn for_platform(platform: Platform, settings: &AuthSettings) -> Result<Self> {
        let (app, env_hint) = match platform {
            Platform::Facebook | Platform::Instagram => (
                settings.facebook_app.as_ref(),
                "FACEBOOK_APP_ID / FACEBOOK_APP_SECRET",
            ),
            Platform::TikTok => (
                settings.tiktok_app.as_ref(),
                "TIKTOK_CLIENT_KEY / TIKTOK_CLIENT_SECRET",
            ),
            Platform::YouTube => (
                settings.google_app.as_ref(),
                "GOOGLE_CLIENT_ID / GOOGLE_CLIENT_SECRET",
            ),
        };
        let app = app.ok_or_else(|| AuthError::NotConfigured {
            platform,
            message: format!("missing {}", env_hint),
        })?;

        let graph_token_url = format!("{}/oauth/access_token", GRAPH_API_BASE);
        let (auth_url, token_url, token_style, scopes, extra_auth_params) = match platform {
            Platform::Facebook => (
                FACEBOOK_AUTH_URL.to_string(),
                graph_token_url,
                TokenRequestStyle::Query,
                vec![
                    "pages_show_list",
                    "pages_read_engagement",
                    "pages_manage_posts",
                ],
                Vec::new(),
            ),
            Platform::Instagram => (
                FACEBOOK_AUTH_URL.to_string(),
                graph_token_url,
                TokenRequestStyle::Query,
                vec![
                    "instagram_basic",
                    "instagram_content_publish",
                    "pages_show_list",
                ],
                Vec::new(),
            ),
            Platform::TikTok => (
                TIKTOK_AUTH_URL.to_string(),
                TIKTOK_TOKEN_URL.to_string(),
                TokenRequestStyle::Form,
                vec!["video.publish", "video.upload"],
                Vec::new(),
            ),
            Platform::YouTube => (
                GOOGLE_AUTH_URL.to_string(),
                GOOGLE_TOKEN_URL.to_string(),
                TokenRequestStyle::Form,
                vec!["https://www.googleapis.com/auth/youtube.upload"],
                vec![("access_type", "offline"), ("prompt", "consent")],
            ),
        };

        Ok(Self {
            platform,
            client_id: app.client_id.clone(),
            client_secret: app.client_secret.clone(),
            client_id_param: if platform == Platform::TikTok {
                "client_key"
            } else {
                "client_id"
            },
            redirect_uri: settings.redirect_uri(),
            scopes,
            auth_url,
            token_url,
            token_style,
            extra_auth_params,
        })
    }
}

/// Token endpoint answer, normalised across platforms.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime in seconds, when reported.
    pub expires_in: Option<u64>,
    pub token_type: Option<String>,
    /// TikTok user id.
    pub open_id: Option<String>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .field("open_id", &self.open_id)
            .finish()
    }
}

/// Graph API `/me/accounts` entry.
#[derive(Debug, Deserialize)]
struct PageEntry {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    instagram_business_account: Option<LinkedAccount>,
}

#[derive(Debug, Deserialize)]
struct LinkedAccount {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PageList {
    #[serde(default)]
    data: Vec<PageEntry>,
}

/// OAuth 2.0 flow manager for one platform.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorization URL carrying `state` and the verifier's challenge.
    #[instrument(skip(self, state, verifier), fields(platform = %self.config.platform))]
    pub fn build_auth_url(&self, state: &str, verifier: &PkceVerifier) -> Result<String> {
        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::Other(format!("Invalid auth URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair(self.config.client_id_param, &self.config.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("scope", &self.config.scopes.join(","));
            query.append_pair("state", state);
            query.append_pair("code_challenge", &verifier.challenge());
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("response_type", "code");
            for (key, value) in &self.config.extra_auth_params {
                query.append_pair(key, value);
            }
        }

        debug!("Built authorization URL for {}", self.config.platform);

        Ok(url.to_string())
    }

    /// Exchange an authorization code (plus the stored verifier) for tokens.
    #[instrument(skip(self, code, verifier), fields(platform = %self.config.platform))]
    pub async fn exchange_code(&self, code: &str, verifier: &PkceVerifier) -> Result<TokenGrant> {
        let mut params = vec![
            (self.config.client_id_param, self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", verifier.verifier()),
        ];
        if self.config.token_style == TokenRequestStyle::Form {
            params.push(("grant_type", "authorization_code"));
        }

        let grant = self.token_request(&params).await?;
        info!(
            expires_in = ?grant.expires_in,
            has_refresh_token = grant.refresh_token.is_some(),
            "Exchanged authorization code"
        );
        Ok(grant)
    }

    /// Trade a short-lived Meta user token for a long-lived one.
    #[instrument(skip(self, short_lived_token), fields(platform = %self.config.platform))]
    pub async fn exchange_long_lived(&self, short_lived_token: &str) -> Result<TokenGrant> {
        if !self.config.platform.is_facebook_family() {
            return Err(AuthError::Other(format!(
                "{} has no long-lived token exchange",
                self.config.platform
            )));
        }

        let params = [
            ("grant_type", "fb_exchange_token"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("fb_exchange_token", short_lived_token),
        ];

        let grant = self.token_request(&params).await?;
        info!(expires_in = ?grant.expires_in, "Obtained long-lived token");
        Ok(grant)
    }

    /// Run the refresh-token grant.
    ///
    /// Errors are returned as-is; callers decide whether a rejection means
    /// the user must log in again.
    #[instrument(skip(self, refresh_token), fields(platform = %self.config.platform))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant> {
        if !self.config.platform.issues_refresh_token() {
            return Err(AuthError::ReauthRequired {
                platform: self.config.platform,
            });
        }

        let params = [
            (self.config.client_id_param, self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let grant = self.token_request(&params).await?;
        info!(expires_in = ?grant.expires_in, "Refreshed access token");
        Ok(grant)
    }

    /// Discover the Pages (Facebook) or linked business accounts (Instagram)
    /// reachable with a Meta user token.
    #[instrument(skip(self, user_token), fields(platform = %self.config.platform))]
    pub async fn fetch_linked_accounts(&self, user_token: &str) -> Result<AuxiliaryData> {
        let platform = self.config.platform;
        let mut url = Url::parse(&format!("{}/me/accounts", GRAPH_API_BASE))
            .map_err(|e| AuthError::Other(format!("Invalid Graph URL: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            if platform == Platform::Instagram {
                query.append_pair("fields", "instagram_business_account,access_token,name");
            }
            query.append_pair("access_token", user_token);
        }

        let endpoint = format!("{}/me/accounts", GRAPH_API_BASE);
        let response = self
            .send(HttpRequest::new(HttpMethod::Get, url.to_string()), &endpoint)
            .await?;
        let pages: PageList = response
            .json()
            .map_err(|e| NetworkError::unexpected_body(&endpoint, e))?;

        match platform {
            Platform::Facebook => {
                let pages: Vec<FacebookPage> = pages
                    .data
                    .into_iter()
                    .map(|page| FacebookPage {
                        id: page.id,
                        name: page.name,
                        access_token: page.access_token,
                    })
                    .collect();
                if pages.is_empty() {
                    warn!("Facebook login has no manageable Pages");
                }
                debug!(count = pages.len(), "Fetched Facebook Pages");
                Ok(AuxiliaryData::Pages { pages })
            }
            Platform::Instagram => {
                let accounts: Vec<InstagramAccount> = pages
                    .data
                    .into_iter()
                    .filter_map(|page| {
                        let linked = page.instagram_business_account?;
                        Some(InstagramAccount {
                            page_id: page.id,
                            page_name: page.name,
                            page_access_token: page.access_token,
                            instagram_account_id: linked.id,
                        })
                    })
                    .collect();
                if accounts.is_empty() {
                    return Err(AuthError::NoEligibleAccount {
                        platform,
                        reason: "no Facebook Page has a linked Instagram business account"
                            .to_string(),
                    });
                }
                debug!(count = accounts.len(), "Fetched Instagram business accounts");
                Ok(AuxiliaryData::InstagramAccounts { accounts })
            }
            _ => Err(AuthError::Other(format!(
                "{} has no linked accounts",
                platform
            ))),
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant> {
        let endpoint = self.config.token_url.clone();
        let request = match self.config.token_style {
            TokenRequestStyle::Query => {
                let mut url = Url::parse(&endpoint)
                    .map_err(|e| AuthError::Other(format!("Invalid token URL: {}", e)))?;
                url.query_pairs_mut().extend_pairs(params);
                HttpRequest::new(HttpMethod::Get, url.to_string())
            }
            TokenRequestStyle::Form => HttpRequest::new(HttpMethod::Post, endpoint.clone())
                .form(params)
                .map_err(|e| AuthError::Serialization(e.to_string()))?,
        };

        let response = self.send(request, &endpoint).await?;
        parse_token_grant(&endpoint, &response)
    }

    async fn send(&self, request: HttpRequest, endpoint: &str) -> Result<HttpResponse> {
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| NetworkError::transport(endpoint, e))?;

        if !response.is_success() {
            let error = NetworkError::from_response(endpoint, response.status, &response.body);
            warn!(
                status = response.status,
                error = %error.message,
                "Request to {} failed",
                endpoint
            );
            return Err(error.into());
        }

        Ok(response)
    }
}

fn parse_token_grant(endpoint: &str, response: &HttpResponse) -> Result<TokenGrant> {
    let body: Value = response
        .json()
        .map_err(|e| NetworkError::unexpected_body(endpoint, e))?;

    let text = |key: &str| {
        body.get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    // Some endpoints report errors inside a 200 body.
    let access_token = text("access_token").ok_or_else(|| {
        NetworkError::from_response(endpoint, response.status, &response.body)
    })?;

    let expires_in = body.get("expires_in").and_then(|value| {
        value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
    });

    Ok(TokenGrant {
        access_token,
        refresh_token: text("refresh_token"),
        expires_in,
        token_type: text("token_type"),
        open_id: text("open_id"),
    })
}
