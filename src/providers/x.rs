use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::traits::{OAuthProvider, PlatformIdentity, ProviderEndpoints, TokenSet};
use super::{ensure_success, http_client, urlencoding};
use crate::error::AuthError;
use crate::platform::Platform;

/// X (Twitter) OAuth 2.0 provider.
///
/// Quirks:
/// - Uses OAuth 2.0 with PKCE (required); the verifier rides in the ticket.
/// - Refresh tokens only with `offline.access`; access tokens expire in 2 hours.
/// - Token endpoint requires Basic auth (client_id:client_secret base64).
/// - Scopes use dot notation: tweet.read, users.read, etc.
pub struct XProvider {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
    endpoints: ProviderEndpoints,
}

#[derive(Debug, Deserialize)]
struct XTokenResponse {
    access_token: String,
    token_type: String,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XUserEnvelope {
    data: Option<XUser>,
}

#[derive(Debug, Deserialize)]
struct XUser {
    id: Option<String>,
    username: Option<String>,
    profile_image_url: Option<String>,
}

impl XProvider {
    pub fn new(client_id: String, client_secret: String, timeout: Duration) -> Self {
        Self {
            client_id,
            client_secret,
            http: http_client(timeout),
            endpoints: ProviderEndpoints {
                authorize: "https://twitter.com/i/oauth2/authorize".into(),
                token: "https://api.twitter.com/2/oauth2/token".into(),
                profile: "https://api.twitter.com/2/users/me".into(),
                revoke: "https://api.twitter.com/2/oauth2/revoke".into(),
            },
        }
    }

    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    async fn token_request(&self, form: &[(&str, &str)], what: &str) -> Result<TokenSet, AuthError> {
        let resp = self
            .http
            .post(&self.endpoints.token)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::upstream("x", e))?;
        let resp = ensure_success(resp, what).await?;

        let token_resp: XTokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::ProviderError(format!("Failed to parse {what} response: {e}")))?;

        Ok(TokenSet {
            access_token: token_resp.access_token,
            refresh_token: token_resp.refresh_token,
            token_type: token_resp.token_type,
            expires_in: token_resp.expires_in,
            scope: token_resp.scope,
        })
    }
}

#[async_trait]
impl OAuthProvider for XProvider {
    fn platform(&self) -> Platform {
        Platform::X
    }

    fn scopes(&self) -> Vec<String> {
        vec![
            "tweet.read".into(),
            "tweet.write".into(),
            "users.read".into(),
            "media.write".into(),
            "offline.access".into(),
        ]
    }

    fn authorization_url(
        &self,
        ticket: &str,
        redirect_uri: &str,
        code_challenge: Option<&str>,
    ) -> String {
        let scope_str = self.scopes().join(" ");
        let mut url = format!(
            "{base}?\
             client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &response_type=code\
             &scope={scope}\
             &state={state}",
            base = self.endpoints.authorize,
            client_id = urlencoding(&self.client_id),
            redirect_uri = urlencoding(redirect_uri),
            scope = urlencoding(&scope_str),
            state = urlencoding(ticket),
        );
        if let Some(challenge) = code_challenge {
            url.push_str(&format!(
                "&code_challenge={}&code_challenge_method=S256",
                urlencoding(challenge)
            ));
        }
        url
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenSet, AuthError> {
        let verifier = code_verifier
            .ok_or_else(|| AuthError::ProviderError("X token exchange requires a PKCE verifier".into()))?;

        self.token_request(
            &[
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
                ("client_id", self.client_id.as_str()),
                ("code_verifier", verifier),
            ],
            "X token exchange",
        )
        .await
    }

    async fn fetch_identity(&self, tokens: &TokenSet) -> Result<Option<PlatformIdentity>, AuthError> {
        let resp = self
            .http
            .get(&self.endpoints.profile)
            .query(&[("user.fields", "profile_image_url")])
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| AuthError::upstream("x", e))?;
        let resp = ensure_success(resp, "X users/me").await?;

        let raw: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AuthError::ProviderError(format!("Failed to parse users/me: {e}")))?;
        let envelope: XUserEnvelope = serde_json::from_value(raw.clone())
            .map_err(|e| AuthError::ProviderError(format!("Unexpected users/me shape: {e}")))?;

        let Some(user) = envelope.data else {
            return Ok(None);
        };
        Ok(PlatformIdentity::from_parts(
            user.id,
            user.username,
            user.profile_image_url,
            raw,
        ))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        self.token_request(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
            ],
            "X refresh",
        )
        .await
    }

    async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let resp = self
            .http
            .post(&self.endpoints.revoke)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("token", token), ("token_type_hint", "access_token")])
            .send()
            .await
            .map_err(|e| AuthError::upstream("x", e))?;
        ensure_success(resp, "X revoke").await?;
        Ok(())
    }

    fn supports_pkce(&self) -> bool {
        true
    }
}
