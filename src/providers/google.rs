use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::traits::{OAuthProvider, PlatformIdentity, ProviderEndpoints, TokenSet};
use super::{ensure_success, http_client, urlencoding};
use crate::error::AuthError;
use crate::platform::Platform;

/// Google OAuth 2.0 provider, linking a YouTube channel.
///
/// Token lifetime: 1 hour.
/// Refresh: Supported (requires `access_type=offline` and `prompt=consent`).
/// A Google account without a channel has nothing to link, so identity
/// resolution reads `channels?mine=true` rather than the userinfo endpoint.
pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
    endpoints: ProviderEndpoints,
}

// Raw token response from Google's token endpoint
#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    token_type: String,
    expires_in: Option<u64>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelList {
    #[serde(default)]
    items: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: Option<String>,
    snippet: Option<ChannelSnippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelSnippet {
    title: Option<String>,
    custom_url: Option<String>,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

impl GoogleProvider {
    pub fn new(client_id: String, client_secret: String, timeout: Duration) -> Self {
        Self {
            client_id,
            client_secret,
            http: http_client(timeout),
            endpoints: ProviderEndpoints {
                authorize: "https://accounts.google.com/o/oauth2/v2/auth".into(),
                token: "https://oauth2.googleapis.com/token".into(),
                profile: "https://www.googleapis.com/youtube/v3/channels".into(),
                revoke: "https://oauth2.googleapis.com/revoke".into(),
            },
        }
    }

    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn to_token_set(resp: GoogleTokenResponse) -> TokenSet {
        TokenSet {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            token_type: resp.token_type,
            expires_in: resp.expires_in,
            scope: resp.scope,
        }
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    fn scopes(&self) -> Vec<String> {
        vec![
            "https://www.googleapis.com/auth/youtube.readonly".into(),
            "https://www.googleapis.com/auth/youtube.upload".into(),
        ]
    }

    fn authorization_url(
        &self,
        ticket: &str,
        redirect_uri: &str,
        _code_challenge: Option<&str>,
    ) -> String {
        let scope_str = self.scopes().join(" ");
        format!(
            "{base}?\
             client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &response_type=code\
             &scope={scope}\
             &state={state}\
             &access_type=offline\
             &include_granted_scopes=true\
             &prompt=consent",
            base = self.endpoints.authorize,
            client_id = urlencoding(&self.client_id),
            redirect_uri = urlencoding(redirect_uri),
            scope = urlencoding(&scope_str),
            state = urlencoding(ticket),
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        _code_verifier: Option<&str>,
    ) -> Result<TokenSet, AuthError> {
        let resp = self
            .http
            .post(&self.endpoints.token)
            .form(&[
                ("code", code),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::upstream("google", e))?;
        let resp = ensure_success(resp, "Google token exchange").await?;

        let token_resp: GoogleTokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::ProviderError(format!("Failed to parse token response: {e}")))?;

        Ok(Self::to_token_set(token_resp))
    }

    async fn fetch_identity(&self, tokens: &TokenSet) -> Result<Option<PlatformIdentity>, AuthError> {
        let resp = self
            .http
            .get(&self.endpoints.profile)
            .query(&[("part", "snippet"), ("mine", "true")])
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| AuthError::upstream("google", e))?;
        let resp = ensure_success(resp, "YouTube channel lookup").await?;

        let raw: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AuthError::ProviderError(format!("Failed to parse channel list: {e}")))?;
        let list: ChannelList = serde_json::from_value(raw.clone())
            .map_err(|e| AuthError::ProviderError(format!("Unexpected channel list shape: {e}")))?;

        let Some(channel) = list.items.into_iter().next() else {
            return Ok(None);
        };
        let snippet = channel.snippet;
        let name = snippet
            .as_ref()
            .and_then(|s| s.title.clone().or_else(|| s.custom_url.clone()));
        let image = snippet
            .and_then(|s| s.thumbnails)
            .and_then(|t| t.default)
            .and_then(|t| t.url);

        Ok(PlatformIdentity::from_parts(channel.id, name, image, raw))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        let resp = self
            .http
            .post(&self.endpoints.token)
            .form(&[
                ("refresh_token", refresh_token),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::upstream("google", e))?;
        let resp = ensure_success(resp, "Google refresh").await?;

        let token_resp: GoogleTokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::ProviderError(format!("Failed to parse refresh response: {e}")))?;

        // Google doesn't always return a new refresh token on refresh
        Ok(Self::to_token_set(token_resp))
    }

    async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let resp = self
            .http
            .post(&self.endpoints.revoke)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| AuthError::upstream("google", e))?;
        ensure_success(resp, "Google revoke").await?;
        Ok(())
    }
}
