//! Credential Storage
//!
//! Persists one [`PlatformCredential`] per platform in the host's
//! [`SecureStore`] under the key `credentials:{platform}`.
//!
//! ## Guarantees
//!
//! - Token values are never logged.
//! - Every operation on a platform runs under that platform's async mutex, so
//!   a read-modify-write never interleaves with another write to the same key.
//! - A record that no longer deserializes is deleted and reported as
//!   [`AuthError::CredentialCorrupted`].
//!
//! ## Persisted shape
//!
//! ```json
//! {
//!   "accessToken": "...",
//!   "refreshToken": "...",
//!   "expiresAt": "2024-05-01T12:00:00Z",
//!   "auxiliaryData": { "kind": "tikTok", "openId": "..." },
//!   "updatedAt": "2024-04-01T12:00:00Z"
//! }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{AuxiliaryData, Platform, PlatformCredential, TokenFields};
use bridge_traits::{Clock, SecureStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const KEY_PREFIX: &str = "credentials:";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCredential {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auxiliary_data: Option<AuxiliaryData>,
    updated_at: DateTime<Utc>,
}

impl StoredCredential {
    fn from_credential(credential: &PlatformCredential) -> Self {
        Self {
            access_token: credential.access_token.clone(),
            refresh_token: credential.refresh_token.clone(),
            expires_at: credential.expires_at,
            auxiliary_data: credential.auxiliary_data.clone(),
            updated_at: credential.updated_at,
        }
    }

    fn into_credential(self, platform: Platform) -> PlatformCredential {
        PlatformCredential {
            platform,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
            auxiliary_data: self.auxiliary_data,
            updated_at: self.updated_at,
        }
    }
}

/// Storage key of a platform's credential.
pub fn storage_key(platform: Platform) -> String {
    format!("{}{}", KEY_PREFIX, platform.as_str())
}

/// Per-platform credential persistence.
#[derive(Clone)]
pub struct CredentialStore {
    secure_store: Arc<dyn SecureStore>,
    clock: Arc<dyn Clock>,
    locks: Arc<Mutex<HashMap<Platform, Arc<Mutex<()>>>>>,
}

impl CredentialStore {
    pub fn new(secure_store: Arc<dyn SecureStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            secure_store,
            clock,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Store `credential`, stamping `updated_at` with the current time.
    pub async fn set(&self, mut credential: PlatformCredential) -> Result<PlatformCredential> {
        let platform = credential.platform;
        let lock = self.lock_for(platform).await;
        let _guard = lock.lock().await;

        credential.updated_at = self.clock.now();
        self.write(&credential).await?;
        info!(%platform, "Stored credential");
        Ok(credential)
    }

    pub async fn get(&self, platform: Platform) -> Result<Option<PlatformCredential>> {
        let lock = self.lock_for(platform).await;
        let _guard = lock.lock().await;
        self.read(platform).await
    }

    /// True only when a record exists with a non-empty access token.
    pub async fn has(&self, platform: Platform) -> Result<bool> {
        Ok(self
            .get(platform)
            .await?
            .is_some_and(|credential| !credential.access_token.is_empty()))
    }

    /// Delete the record. Returns whether one existed.
    pub async fn remove(&self, platform: Platform) -> Result<bool> {
        let lock = self.lock_for(platform).await;
        let _guard = lock.lock().await;

        let key = storage_key(platform);
        let existed = self
            .secure_store
            .has_secret(&key)
            .await
            .map_err(storage_error)?;
        self.secure_store
            .delete_secret(&key)
            .await
            .map_err(storage_error)?;

        if existed {
            info!(%platform, "Removed credential");
        }
        Ok(existed)
    }

    /// Atomically read, modify and write back a stored credential.
    ///
    /// Fails with [`AuthError::NotAuthenticated`] when nothing is stored.
    pub async fn update<F>(&self, platform: Platform, modify: F) -> Result<PlatformCredential>
    where
        F: FnOnce(&mut PlatformCredential) + Send,
    {
        let lock = self.lock_for(platform).await;
        let _guard = lock.lock().await;

        let mut credential = self
            .read(platform)
            .await?
            .ok_or(AuthError::NotAuthenticated { platform })?;
        modify(&mut credential);
        credential.platform = platform;
        credential.updated_at = self.clock.now();
        self.write(&credential).await?;

        debug!(%platform, "Updated credential");
        Ok(credential)
    }

    /// Merge refreshed token fields, keeping auxiliary data and the existing
    /// refresh token when none was rotated in.
    pub async fn update_token_fields(
        &self,
        platform: Platform,
        fields: TokenFields,
    ) -> Result<PlatformCredential> {
        self.update(platform, move |credential| {
            credential.access_token = fields.access_token;
            if let Some(refresh_token) = fields.refresh_token {
                credential.refresh_token = Some(refresh_token);
            }
            credential.expires_at = fields.expires_at;
        })
        .await
    }

    /// False when nothing is stored or no expiry is recorded.
    pub async fn is_expired(&self, platform: Platform) -> Result<bool> {
        let now = self.clock.now();
        Ok(self
            .get(platform)
            .await?
            .is_some_and(|credential| credential.is_expired_at(now)))
    }

    /// Platforms with a stored record.
    pub async fn platforms(&self) -> Result<Vec<Platform>> {
        let keys = self
            .secure_store
            .list_keys()
            .await
            .map_err(storage_error)?;

        let mut platforms: Vec<Platform> = keys
            .iter()
            .filter_map(|key| key.strip_prefix(KEY_PREFIX))
            .filter_map(|id| id.parse().ok())
            .collect();
        platforms.sort();
        platforms.dedup();
        Ok(platforms)
    }

    async fn lock_for(&self, platform: Platform) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(platform)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn read(&self, platform: Platform) -> Result<Option<PlatformCredential>> {
        let key = storage_key(platform);
        let Some(bytes) = self
            .secure_store
            .get_secret(&key)
            .await
            .map_err(storage_error)?
        else {
            return Ok(None);
        };

        match serde_json::from_slice::<StoredCredential>(&bytes) {
            Ok(stored) => Ok(Some(stored.into_credential(platform))),
            Err(e) => {
                warn!(%platform, error = %e, "Discarding unreadable credential");
                self.secure_store
                    .delete_secret(&key)
                    .await
                    .map_err(storage_error)?;
                Err(AuthError::CredentialCorrupted { platform })
            }
        }
    }

    async fn write(&self, credential: &PlatformCredential) -> Result<()> {
        let bytes = serde_json::to_vec(&StoredCredential::from_credential(credential))
            .map_err(|e| AuthError::Serialization(e.to_string()))?;
        self.secure_store
            .set_secret(&storage_key(credential.platform), &bytes)
            .await
            .map_err(storage_error)
    }
}

fn storage_error(error: bridge_traits::BridgeError) -> AuthError {
    AuthError::SecureStorageUnavailable(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FixedClock, MemoryStore};
    use crate::types::FacebookPage;
    use chrono::{Duration, TimeZone};

    fn fixture() -> (CredentialStore, Arc<MemoryStore>, Arc<FixedClock>) {
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap(),
        ));
        (
            CredentialStore::new(store.clone(), clock.clone()),
            store,
            clock,
        )
    }

    fn tiktok_credential(now: DateTime<Utc>) -> PlatformCredential {
        PlatformCredential {
            platform: Platform::TikTok,
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Some(now + Duration::hours(24)),
            auxiliary_data: Some(AuxiliaryData::TikTok {
                open_id: "open-1".to_string(),
            }),
            updated_at: now - Duration::days(3),
        }
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (store, _, clock) = fixture();
        let now = clock.now();

        let saved = store.set(tiktok_credential(now)).await.unwrap();
        assert_eq!(saved.updated_at, now);

        let loaded = store.get(Platform::TikTok).await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert!(store.has(Platform::TikTok).await.unwrap());
        assert!(!store.has(Platform::YouTube).await.unwrap());
    }

    #[tokio::test]
    async fn test_persisted_shape_is_camel_case() {
        let (store, memory, clock) = fixture();
        store.set(tiktok_credential(clock.now())).await.unwrap();

        let raw = memory.raw("credentials:tiktok").unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(json["accessToken"], "access");
        assert_eq!(json["refreshToken"], "refresh");
        assert_eq!(json["expiresAt"], "2024-04-02T12:00:00Z");
        assert_eq!(json["updatedAt"], "2024-04-01T12:00:00Z");
        assert_eq!(json["auxiliaryData"]["openId"], "open-1");
    }

    #[tokio::test]
    async fn test_has_requires_access_token() {
        let (store, _, clock) = fixture();
        let mut credential = tiktok_credential(clock.now());
        credential.access_token.clear();
        store.set(credential).await.unwrap();

        assert!(!store.has(Platform::TikTok).await.unwrap());
    }

    #[tokio::test]
    async fn test_is_expired() {
        let (store, _, clock) = fixture();
        assert!(!store.is_expired(Platform::TikTok).await.unwrap());

        let mut credential = tiktok_credential(clock.now());
        credential.expires_at = None;
        store.set(credential).await.unwrap();
        assert!(!store.is_expired(Platform::TikTok).await.unwrap());

        let now = clock.now();
        store
            .update(Platform::TikTok, |c| c.expires_at = Some(now))
            .await
            .unwrap();
        assert!(store.is_expired(Platform::TikTok).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_token_fields_preserves_auxiliary_data() {
        let (store, _, clock) = fixture();
        let original = store.set(tiktok_credential(clock.now())).await.unwrap();
        clock.advance(Duration::minutes(5));

        let new_expiry = clock.now() + Duration::hours(24);
        let updated = store
            .update_token_fields(
                Platform::TikTok,
                TokenFields {
                    access_token: "fresh".to_string(),
                    refresh_token: None,
                    expires_at: Some(new_expiry),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.access_token, "fresh");
        assert_eq!(updated.refresh_token, original.refresh_token);
        assert_eq!(updated.auxiliary_data, original.auxiliary_data);
        assert_eq!(updated.expires_at, Some(new_expiry));
        assert_eq!(updated.updated_at, clock.now());
    }

    #[tokio::test]
    async fn test_update_token_fields_rotates_refresh_token() {
        let (store, _, clock) = fixture();
        store.set(tiktok_credential(clock.now())).await.unwrap();

        let updated = store
            .update_token_fields(
                Platform::TikTok,
                TokenFields {
                    access_token: "fresh".to_string(),
                    refresh_token: Some("rotated".to_string()),
                    expires_at: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.refresh_token.as_deref(), Some("rotated"));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_authenticated() {
        let (store, _, _) = fixture();
        let err = store
            .update(Platform::YouTube, |c| c.access_token.clear())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::NotAuthenticated {
                platform: Platform::YouTube
            }
        ));
    }

    #[tokio::test]
    async fn test_corrupted_record_is_removed() {
        let (store, memory, _) = fixture();
        memory.put_raw("credentials:facebook", b"not json");

        let err = store.get(Platform::Facebook).await.unwrap_err();
        assert!(matches!(err, AuthError::CredentialCorrupted { .. }));
        assert!(memory.raw("credentials:facebook").is_none());
        assert!(store.get(Platform::Facebook).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_and_platforms() {
        let (store, memory, clock) = fixture();
        let now = clock.now();
        store.set(tiktok_credential(now)).await.unwrap();

        let mut facebook = PlatformCredential::new(Platform::Facebook, "long", now);
        facebook.auxiliary_data = Some(AuxiliaryData::Pages {
            pages: vec![FacebookPage {
                id: "1".to_string(),
                name: "Page".to_string(),
                access_token: "page".to_string(),
            }],
        });
        store.set(facebook).await.unwrap();
        memory.put_raw("unrelated", b"x");

        assert_eq!(
            store.platforms().await.unwrap(),
            vec![Platform::Facebook, Platform::TikTok]
        );

        assert!(store.remove(Platform::TikTok).await.unwrap());
        assert!(!store.remove(Platform::TikTok).await.unwrap());
        assert_eq!(store.platforms().await.unwrap(), vec![Platform::Facebook]);
    }

    #[tokio::test]
    async fn test_concurrent_updates_do_not_interleave() {
        let (store, _, clock) = fixture();
        let mut credential = tiktok_credential(clock.now());
        credential.access_token = "0".to_string();
        store.set(credential).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(Platform::TikTok, |c| {
                        let n: u32 = c.access_token.parse().unwrap();
                        c.access_token = (n + 1).to_string();
                    })
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let loaded = store.get(Platform::TikTok).await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "20");
    }
}
