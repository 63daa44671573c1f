use crate::error::AuthError;
use crate::pkce::PkceVerifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported publishing platforms.
///
/// # Examples
///
/// ```
/// use core_auth::Platform;
///
/// let platform: Platform = "tiktok".parse().unwrap();
/// assert_eq!(platform, Platform::TikTok);
/// assert_eq!(platform.as_str(), "tiktok");
/// assert!("myspace".parse::<Platform>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    TikTok,
    YouTube,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::TikTok,
        Platform::YouTube,
    ];

    /// Stable identifier used in URLs, storage keys and events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::TikTok => "tiktok",
            Platform::YouTube => "youtube",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::TikTok => "TikTok",
            Platform::YouTube => "YouTube",
        }
    }

    /// Facebook and Instagram share the Meta application and Graph API.
    /// Neither issues refresh tokens.
    pub fn is_facebook_family(&self) -> bool {
        matches!(self, Platform::Facebook | Platform::Instagram)
    }

    pub fn issues_refresh_token(&self) -> bool {
        matches!(self, Platform::TikTok | Platform::YouTube)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AuthError::UnknownPlatform(s.to_string()))
    }
}

/// A Facebook Page the user manages, with its page-scoped token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacebookPage {
    pub id: String,
    pub name: String,
    pub access_token: String,
}

impl fmt::Debug for FacebookPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacebookPage")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// A Page with a linked Instagram business account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstagramAccount {
    pub page_id: String,
    pub page_name: String,
    pub page_access_token: String,
    pub instagram_account_id: String,
}

impl fmt::Debug for InstagramAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstagramAccount")
            .field("page_id", &self.page_id)
            .field("page_name", &self.page_name)
            .field("page_access_token", &"[REDACTED]")
            .field("instagram_account_id", &self.instagram_account_id)
            .finish()
    }
}

/// Platform-specific data kept alongside the tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AuxiliaryData {
    Pages { pages: Vec<FacebookPage> },
    InstagramAccounts { accounts: Vec<InstagramAccount> },
    TikTok { open_id: String },
    Google { token_type: String },
}

/// Tokens and metadata for one platform.
///
/// Owned by the credential store; mutated only through its set/update
/// operations.
#[derive(Clone, PartialEq, Eq)]
pub struct PlatformCredential {
    pub platform: Platform,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub auxiliary_data: Option<AuxiliaryData>,
    pub updated_at: DateTime<Utc>,
}

impl PlatformCredential {
    pub fn new(platform: Platform, access_token: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            platform,
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            auxiliary_data: None,
            updated_at: now,
        }
    }

    /// A credential without an expiry never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired_at(now)
    }

    pub fn facebook_pages(&self) -> &[FacebookPage] {
        match &self.auxiliary_data {
            Some(AuxiliaryData::Pages { pages }) => pages,
            _ => &[],
        }
    }

    pub fn instagram_accounts(&self) -> &[InstagramAccount] {
        match &self.auxiliary_data {
            Some(AuxiliaryData::InstagramAccounts { accounts }) => accounts,
            _ => &[],
        }
    }
}

impl fmt::Debug for PlatformCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformCredential")
            .field("platform", &self.platform)
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("auxiliary_data", &self.auxiliary_data)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Token fields replaced by a refresh. Everything else is preserved.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenFields {
    pub access_token: String,
    /// `None` keeps the stored refresh token.
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for TokenFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenFields")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// An authorization started by `login()` and not yet answered.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub platform: Platform,
    pub verifier: PkceVerifier,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

/// Returned by `login()`: the page opened in the browser and the state
/// token the callback must echo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    pub platform: Platform,
    pub authorization_url: String,
    pub state: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_platform_parsing() {
        assert_eq!("facebook".parse::<Platform>().unwrap(), Platform::Facebook);
        assert_eq!("YouTube".parse::<Platform>().unwrap(), Platform::YouTube);
        assert!(matches!(
            "yt".parse::<Platform>(),
            Err(AuthError::UnknownPlatform(_))
        ));
    }

    #[test]
    fn test_platform_capabilities() {
        assert!(Platform::Instagram.is_facebook_family());
        assert!(!Platform::TikTok.is_facebook_family());
        assert!(Platform::YouTube.issues_refresh_token());
        assert!(!Platform::Facebook.issues_refresh_token());
    }

    #[test]
    fn test_platform_serde_ids() {
        assert_eq!(
            serde_json::to_string(&Platform::TikTok).unwrap(),
            "\"tiktok\""
        );
        assert_eq!(
            serde_json::from_str::<Platform>("\"youtube\"").unwrap(),
            Platform::YouTube
        );
    }

    #[test]
    fn test_expiry_rules() {
        let now = Utc::now();
        let mut credential = PlatformCredential::new(Platform::TikTok, "token", now);

        assert!(!credential.is_expired_at(now));

        credential.expires_at = Some(now);
        assert!(credential.is_expired_at(now));
        assert!(!credential.is_usable_at(now));

        credential.expires_at = Some(now + Duration::seconds(1));
        assert!(credential.is_usable_at(now));

        credential.access_token.clear();
        assert!(!credential.is_usable_at(now));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let mut credential = PlatformCredential::new(Platform::Facebook, "user-token", Utc::now());
        credential.auxiliary_data = Some(AuxiliaryData::Pages {
            pages: vec![FacebookPage {
                id: "1".to_string(),
                name: "Page".to_string(),
                access_token: "page-token".to_string(),
            }],
        });

        let rendered = format!("{:?}", credential);
        assert!(!rendered.contains("user-token"));
        assert!(!rendered.contains("page-token"));
        assert!(rendered.contains("Page"));
    }

    #[test]
    fn test_auxiliary_data_shape() {
        let data = AuxiliaryData::TikTok {
            open_id: "open-1".to_string(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["kind"], "tikTok");
        assert_eq!(json["openId"], "open-1");

        let parsed: AuxiliaryData = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, data);
    }
}
