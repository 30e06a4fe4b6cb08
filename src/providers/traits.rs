use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::platform::Platform;

/// A set of tokens returned from an OAuth provider after code exchange or refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

impl TokenSet {
    /// Absolute expiry for `expires_in`. A lifetime too large to represent is treated as no expiry.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.expires_in?).ok()?;
        TimeDelta::try_seconds(secs).and_then(|d| now.checked_add_signed(d))
    }
}

/// The fixed identity record every provider maps its profile response into.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformIdentity {
    pub account_id: String,
    pub account_name: String,
    pub profile_image_url: Option<String>,
    /// Profile response as received, kept as the connection's snapshot.
    pub raw: serde_json::Value,
}

impl PlatformIdentity {
    /// Build an identity, or `None` when the provider returned no usable account id.
    /// The display name falls back to the account id.
    pub fn from_parts(
        account_id: Option<String>,
        account_name: Option<String>,
        profile_image_url: Option<String>,
        raw: serde_json::Value,
    ) -> Option<Self> {
        let account_id = account_id.filter(|id| !id.trim().is_empty())?;
        let account_name = account_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| account_id.clone());
        Some(Self {
            account_id,
            account_name,
            profile_image_url,
            raw,
        })
    }
}

/// Endpoint set for one provider. Defaults point at production; tests override them.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorize: String,
    pub token: String,
    pub profile: String,
    pub revoke: String,
}

/// Capability set every platform family implements.
///
/// The callback state machine is written once against this trait; each
/// implementation only carries the provider's endpoint and payload quirks.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Canonical platform this adapter links.
    fn platform(&self) -> Platform;

    /// Scopes requested at authorization.
    fn scopes(&self) -> Vec<String>;

    /// Build the hosted authorization URL.
    ///
    /// - `ticket`: the single-use anti-forgery ticket, sent as `state`.
    /// - `redirect_uri`: the callback URL registered with the provider.
    /// - `code_challenge`: S256 PKCE challenge, present when [`supports_pkce`](Self::supports_pkce).
    fn authorization_url(
        &self,
        ticket: &str,
        redirect_uri: &str,
        code_challenge: Option<&str>,
    ) -> String;

    /// Exchange a one-time authorization code for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenSet, AuthError>;

    /// Fetch the linked account. `Ok(None)` means the grant has no linkable
    /// account (e.g. a Google login without a YouTube channel).
    async fn fetch_identity(&self, tokens: &TokenSet) -> Result<Option<PlatformIdentity>, AuthError>;

    /// Refresh an expired access token using a refresh token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AuthError>;

    /// Revoke an access token. Not all providers support this.
    async fn revoke(&self, _token: &str) -> Result<(), AuthError> {
        Ok(())
    }

    fn supports_pkce(&self) -> bool {
        false
    }
}
