//! # Authorization Manager
//!
//! Orchestrates the OAuth 2.0 + PKCE flows of every platform.
//!
//! ## Overview
//!
//! `login()` opens the platform's authorization page and returns at once; the
//! browser round trip ends with a callback URL delivered by the OS, which
//! `handle_callback_url()` correlates with its pending login by state token.
//! Successful exchanges are persisted in the [`CredentialStore`]. Refreshes are
//! serialized per platform, and every state change is emitted on the event bus.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{AuthManager, Platform};
//! use core_runtime::config::CoreConfig;
//! use core_runtime::events::EventBus;
//!
//! # async fn example(config: CoreConfig) -> core_auth::Result<()> {
//! let manager = AuthManager::new(&config, EventBus::new(100));
//! let request = manager.login(Platform::YouTube).await?;
//! println!("Waiting for callback with state {}", request.state);
//! # Ok(())
//! # }
//! ```

use crate::callback::CallbackParams;
use crate::credential_store::CredentialStore;
use crate::error::{AuthError, Result};
use crate::oauth::{OAuthConfig, OAuthFlowManager, TokenGrant};
use crate::pkce::{mint_state, platform_of_state, PkceVerifier};
use crate::provider::CredentialProvider;
use crate::types::{
    AuthorizationRequest, AuxiliaryData, PendingAuthorization, Platform, PlatformCredential,
    TokenFields,
};
use async_trait::async_trait;
use bridge_traits::{Clock, HttpClient, SecureStore, UrlLauncher};
use chrono::{DateTime, Utc};
use core_runtime::config::{AuthSettings, CoreConfig};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Unified authorization manager for all platforms.
pub struct AuthManager {
    credential_store: CredentialStore,
    event_bus: EventBus,
    http_client: Arc<dyn HttpClient>,
    url_launcher: Arc<dyn UrlLauncher>,
    clock: Arc<dyn Clock>,
    settings: AuthSettings,
    /// Logins awaiting their callback, keyed by state token.
    pending: Arc<Mutex<HashMap<String, PendingAuthorization>>>,
    /// Token refresh locks to prevent concurrent refreshes
    refresh_locks: Arc<Mutex<HashMap<Platform, Arc<Mutex<()>>>>>,
}

impl AuthManager {
    pub fn new(config: &CoreConfig, event_bus: EventBus) -> Self {
        Self::from_parts(
            config.auth.clone(),
            config.http_client.clone(),
            config.secure_store.clone(),
            config.url_launcher.clone(),
            config.clock.clone(),
            event_bus,
        )
    }

    pub fn from_parts(
        settings: AuthSettings,
        http_client: Arc<dyn HttpClient>,
        secure_store: Arc<dyn SecureStore>,
        url_launcher: Arc<dyn UrlLauncher>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            credential_store: CredentialStore::new(secure_store, clock.clone()),
            event_bus,
            http_client,
            url_launcher,
            clock,
            settings,
            pending: Arc::new(Mutex::new(HashMap::new())),
            refresh_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn credential_store(&self) -> &CredentialStore {
        &self.credential_store
    }

    /// Start an authorization flow and open its page in the browser.
    ///
    /// Returns as soon as the browser has been asked to open the page; the
    /// flow completes later through [`handle_callback_url`](Self::handle_callback_url).
    #[instrument(skip(self), fields(platform = %platform))]
    pub async fn login(&self, platform: Platform) -> Result<AuthorizationRequest> {
        let flow = match self.flow(platform) {
            Ok(flow) => flow,
            Err(e) => {
                self.emit_failure(Some(platform), &e);
                return Err(e);
            }
        };

        let now = self.clock.now();
        let verifier = PkceVerifier::new();
        let state = mint_state(platform, now.timestamp_millis());
        let authorization_url = flow.build_auth_url(&state, &verifier)?;

        {
            let mut pending = self.pending.lock().await;
            let before = pending.len();
            pending.retain(|_, entry| !self.is_stale(entry, now));
            if pending.len() < before {
                debug!(pruned = before - pending.len(), "Pruned expired logins");
            }
            pending.insert(
                state.clone(),
                PendingAuthorization {
                    platform,
                    verifier,
                    state: state.clone(),
                    created_at: now,
                },
            );
        }

        if let Err(e) = self.url_launcher.open_url(&authorization_url).await {
            self.pending.lock().await.remove(&state);
            let error = AuthError::BrowserLaunchFailed(e.to_string());
            self.emit_failure(Some(platform), &error);
            return Err(error);
        }

        info!("Opened authorization page");
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::LoginStarted {
            platform: platform.as_str().to_string(),
        }));

        Ok(AuthorizationRequest {
            platform,
            authorization_url,
            state,
        })
    }

    /// Exchange an authorization code for the login identified by `state`.
    ///
    /// The pending login is consumed whether or not the exchange succeeds.
    #[instrument(skip(self, code))]
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<PlatformCredential> {
        let pending = self.take_pending(state).await;
        let Some(pending) = pending else {
            warn!("Callback state matches no pending login");
            let error = AuthError::StateMismatch;
            self.emit_failure(platform_of_state(state), &error);
            return Err(error);
        };
        let platform = pending.platform;

        match self.complete_login(&pending, code).await {
            Ok(credential) => {
                info!(%platform, "Signed in");
                let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedIn {
                    platform: platform.as_str().to_string(),
                }));
                Ok(credential)
            }
            Err(e) => {
                warn!(%platform, error = %e, "Sign-in failed");
                self.emit_failure(Some(platform), &e);
                Err(e)
            }
        }
    }

    /// Handle a raw callback URL delivered by the operating system.
    #[instrument(skip(self, url))]
    pub async fn handle_callback_url(&self, url: &str) -> Result<PlatformCredential> {
        let params = match CallbackParams::parse(url, &self.settings.url_scheme) {
            Ok(params) => params,
            Err(e) => {
                self.emit_failure(None, &e);
                return Err(e);
            }
        };

        if let Some(error) = params.error {
            let platform = params.state.as_deref().and_then(platform_of_state);
            if let Some(state) = params.state.as_deref() {
                self.cancel_login(state).await;
            }
            let denial = AuthError::AuthorizationDenied(match params.error_description {
                Some(description) => format!("{}: {}", error, description),
                None => error,
            });
            self.emit_failure(platform, &denial);
            return Err(denial);
        }

        let (Some(code), Some(state)) = (params.code, params.state) else {
            let error =
                AuthError::InvalidCallback("callback carries neither code nor error".to_string());
            self.emit_failure(None, &error);
            return Err(error);
        };

        if let Some(hint) = params.platform.as_deref() {
            let hinted = hint.parse::<Platform>().ok();
            if hinted.is_none() || hinted != platform_of_state(&state) {
                warn!(hint, "Callback platform does not match its state");
                let error = AuthError::StateMismatch;
                self.emit_failure(hinted, &error);
                return Err(error);
            }
        }

        self.handle_callback(&code, &state).await
    }

    /// Refresh the access token of `platform` and return it.
    ///
    /// Facebook and Instagram have no refresh grant: an unexpired token is
    /// returned as-is and an expired one requires a new login.
    #[instrument(skip(self), fields(platform = %platform))]
    pub async fn refresh(&self, platform: Platform) -> Result<String> {
        self.refresh_locked(platform, true).await
    }

    /// Return a usable credential, refreshing first when it is stale.
    #[instrument(skip(self), fields(platform = %platform))]
    pub async fn valid_credential(&self, platform: Platform) -> Result<PlatformCredential> {
        let credential = self.stored(platform).await?;
        if credential.is_usable_at(self.clock.now()) {
            return Ok(credential);
        }

        debug!("Stored credential is stale");
        self.refresh_locked(platform, false).await?;

        let credential = self.stored(platform).await?;
        if !credential.is_usable_at(self.clock.now()) {
            return Err(self.reauth_required(platform));
        }
        Ok(credential)
    }

    /// Forget the credential and any pending logins of `platform`.
    #[instrument(skip(self), fields(platform = %platform))]
    pub async fn logout(&self, platform: Platform) -> Result<()> {
        self.pending
            .lock()
            .await
            .retain(|_, entry| entry.platform != platform);
        self.credential_store.remove(platform).await?;

        info!("Signed out");
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SignedOut {
            platform: platform.as_str().to_string(),
        }));
        Ok(())
    }

    /// Whether each platform has a stored credential.
    pub async fn status(&self) -> Result<BTreeMap<Platform, bool>> {
        let mut status = BTreeMap::new();
        for platform in Platform::ALL {
            let connected = match self.credential_store.has(platform).await {
                Ok(connected) => connected,
                Err(AuthError::CredentialCorrupted { .. }) => false,
                Err(e) => return Err(e),
            };
            status.insert(platform, connected);
        }
        Ok(status)
    }

    /// Drop a pending login. Returns whether it existed.
    pub async fn cancel_login(&self, state: &str) -> bool {
        self.pending.lock().await.remove(state).is_some()
    }

    pub async fn pending_logins(&self) -> usize {
        self.pending.lock().await.len()
    }

    fn flow(&self, platform: Platform) -> Result<OAuthFlowManager> {
        let config = OAuthConfig::for_platform(platform, &self.settings)?;
        Ok(OAuthFlowManager::new(config, self.http_client.clone()))
    }

    fn is_stale(&self, entry: &PendingAuthorization, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(entry.created_at);
        age.to_std()
            .map(|age| age > self.settings.pending_ttl)
            .unwrap_or(false)
    }

    /// Remove and return the live pending login for `state`.
    async fn take_pending(&self, state: &str) -> Option<PendingAuthorization> {
        let entry = self.pending.lock().await.remove(state)?;

        if self.is_stale(&entry, self.clock.now()) {
            debug!(platform = %entry.platform, "Pending login expired");
            return None;
        }
        if platform_of_state(state) != Some(entry.platform) {
            return None;
        }
        Some(entry)
    }

    async fn complete_login(
        &self,
        pending: &PendingAuthorization,
        code: &str,
    ) -> Result<PlatformCredential> {
        let platform = pending.platform;
        let flow = self.flow(platform)?;
        let grant = flow.exchange_code(code, &pending.verifier).await?;

        let credential = if platform.is_facebook_family() {
            let long_lived = flow.exchange_long_lived(&grant.access_token).await?;
            let linked = flow.fetch_linked_accounts(&long_lived.access_token).await?;
            let now = self.clock.now();
            PlatformCredential {
                expires_at: expiry(now, long_lived.expires_in),
                auxiliary_data: Some(linked),
                ..PlatformCredential::new(platform, long_lived.access_token, now)
            }
        } else {
            let now = self.clock.now();
            let auxiliary_data = auxiliary_from_grant(platform, &grant);
            PlatformCredential {
                refresh_token: grant.refresh_token,
                expires_at: expiry(now, grant.expires_in),
                auxiliary_data,
                ..PlatformCredential::new(platform, grant.access_token, now)
            }
        };

        self.credential_store.set(credential).await
    }

    async fn stored(&self, platform: Platform) -> Result<PlatformCredential> {
        self.credential_store
            .get(platform)
            .await?
            .ok_or(AuthError::NotAuthenticated { platform })
    }

    async fn refresh_locked(&self, platform: Platform, force: bool) -> Result<String> {
        let refresh_lock = {
            let mut locks = self.refresh_locks.lock().await;
            locks
                .entry(platform)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = refresh_lock.lock().await;

        let credential = self.stored(platform).await?;
        let now = self.clock.now();

        // Another caller may have refreshed while we waited for the lock.
        if !force && credential.is_usable_at(now) {
            return Ok(credential.access_token);
        }

        if platform.is_facebook_family() {
            if credential.is_expired_at(now) || credential.access_token.is_empty() {
                return Err(self.reauth_required(platform));
            }
            return Ok(credential.access_token);
        }

        let Some(refresh_token) = credential.refresh_token.filter(|t| !t.is_empty()) else {
            warn!("No refresh token stored");
            return Err(self.reauth_required(platform));
        };

        let flow = self.flow(platform)?;
        match flow.refresh_access_token(&refresh_token).await {
            Ok(grant) => {
                let expires_at = expiry(self.clock.now(), grant.expires_in);
                let updated = self
                    .credential_store
                    .update_token_fields(
                        platform,
                        TokenFields {
                            access_token: grant.access_token,
                            refresh_token: grant.refresh_token,
                            expires_at,
                        },
                    )
                    .await?;

                info!("Access token refreshed");
                let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::TokenRefreshed {
                    platform: platform.as_str().to_string(),
                    expires_at: expires_at.map(|at| at.timestamp()),
                }));
                Ok(updated.access_token)
            }
            // The server answered and refused: the grant is dead.
            Err(AuthError::Network(e)) if e.status.is_some_and(|status| status < 500) => {
                warn!(status = ?e.status, error = %e.message, "Refresh rejected");
                Err(self.reauth_required(platform))
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed");
                self.emit_failure(Some(platform), &e);
                Err(e)
            }
        }
    }

    fn reauth_required(&self, platform: Platform) -> AuthError {
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::ReauthRequired {
            platform: platform.as_str().to_string(),
        }));
        AuthError::ReauthRequired { platform }
    }

    fn emit_failure(&self, platform: Option<Platform>, error: &AuthError) {
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::AuthFailed {
            platform: platform.map(|p| p.as_str().to_string()),
            message: error.to_string(),
        }));
    }
}

#[async_trait]
impl CredentialProvider for AuthManager {
    async fn valid_credential(&self, platform: Platform) -> Result<PlatformCredential> {
        AuthManager::valid_credential(self, platform).await
    }

    async fn refresh(&self, platform: Platform) -> Result<String> {
        AuthManager::refresh(self, platform).await
    }
}

fn expiry(now: DateTime<Utc>, expires_in: Option<u64>) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(expires_in?).ok()?;
    now.checked_add_signed(chrono::Duration::try_seconds(seconds)?)
}

fn auxiliary_from_grant(platform: Platform, grant: &TokenGrant) -> Option<AuxiliaryData> {
    match platform {
        Platform::TikTok => grant
            .open_id
            .clone()
            .map(|open_id| AuxiliaryData::TikTok { open_id }),
        Platform::YouTube => Some(AuxiliaryData::Google {
            token_type: grant
                .token_type
                .clone()
                .unwrap_or_else(|| "Bearer".to_string()),
        }),
        _ => None,
    }
}
