use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::traits::{OAuthProvider, PlatformIdentity, ProviderEndpoints, TokenSet};
use super::{ensure_success, http_client, urlencoding};
use crate::error::AuthError;
use crate::platform::Platform;

const GRAPH: &str = "https://graph.facebook.com/v19.0";

/// Meta Graph API provider. One instance per platform: Facebook or Instagram.
///
/// Quirks:
/// - Token exchange is a GET with query parameters, not a form POST.
/// - Scopes are comma-separated.
/// - No refresh tokens; user tokens are re-obtained by reconnecting.
/// - Instagram publishing needs an Instagram business account attached to one
///   of the user's Pages; a login without one has nothing to link.
/// - Facebook and Instagram share one app grant, so revoking is per permission
///   (`DELETE /me/permissions/{name}`) and skips anything the sibling platform
///   also requested. `DELETE /me/permissions` would unlink both.
pub struct MetaProvider {
    platform: Platform,
    app_id: String,
    app_secret: String,
    http: reqwest::Client,
    endpoints: ProviderEndpoints,
}

#[derive(Debug, Deserialize)]
struct MetaTokenResponse {
    access_token: String,
    token_type: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FacebookUser {
    id: Option<String>,
    name: Option<String>,
    picture: Option<FacebookPicture>,
}

#[derive(Debug, Deserialize)]
struct FacebookPicture {
    data: Option<FacebookPictureData>,
}

#[derive(Debug, Deserialize)]
struct FacebookPictureData {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageList {
    #[serde(default)]
    data: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    instagram_business_account: Option<InstagramAccount>,
}

#[derive(Debug, Deserialize)]
struct InstagramAccount {
    id: Option<String>,
    username: Option<String>,
    profile_picture_url: Option<String>,
}

const FACEBOOK_SCOPES: &[&str] = &[
    "public_profile",
    "pages_show_list",
    "pages_manage_posts",
    "pages_read_engagement",
];

const INSTAGRAM_SCOPES: &[&str] = &[
    "instagram_basic",
    "instagram_content_publish",
    "pages_show_list",
    "business_management",
];

/// Baseline login permission; Meta refuses to revoke it on its own.
const LOGIN_SCOPE: &str = "public_profile";

fn scopes_for(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::Instagram => INSTAGRAM_SCOPES,
        _ => FACEBOOK_SCOPES,
    }
}

impl MetaProvider {
    pub fn facebook(app_id: String, app_secret: String, timeout: Duration) -> Self {
        Self::new(Platform::Facebook, app_id, app_secret, timeout, "/me")
    }

    pub fn instagram(app_id: String, app_secret: String, timeout: Duration) -> Self {
        Self::new(Platform::Instagram, app_id, app_secret, timeout, "/me/accounts")
    }

    fn new(
        platform: Platform,
        app_id: String,
        app_secret: String,
        timeout: Duration,
        profile_path: &str,
    ) -> Self {
        Self {
            platform,
            app_id,
            app_secret,
            http: http_client(timeout),
            endpoints: ProviderEndpoints {
                authorize: "https://www.facebook.com/v19.0/dialog/oauth".into(),
                token: format!("{GRAPH}/oauth/access_token"),
                profile: format!("{GRAPH}{profile_path}"),
                revoke: format!("{GRAPH}/me/permissions"),
            },
        }
    }

    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Permissions only this platform asked for.
    fn exclusive_scopes(&self) -> Vec<&'static str> {
        let sibling = match self.platform {
            Platform::Instagram => FACEBOOK_SCOPES,
            _ => INSTAGRAM_SCOPES,
        };
        scopes_for(self.platform)
            .iter()
            .copied()
            .filter(|scope| *scope != LOGIN_SCOPE && !sibling.contains(scope))
            .collect()
    }

    async fn get_profile(&self, access_token: &str, fields: &str) -> Result<serde_json::Value, AuthError> {
        let resp = self
            .http
            .get(&self.endpoints.profile)
            .query(&[("fields", fields)])
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::upstream("meta", e))?;
        let resp = ensure_success(resp, "Meta profile lookup").await?;

        resp.json()
            .await
            .map_err(|e| AuthError::ProviderError(format!("Failed to parse Meta profile: {e}")))
    }
}

#[async_trait]
impl OAuthProvider for MetaProvider {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn scopes(&self) -> Vec<String> {
        scopes_for(self.platform).iter().map(|s| s.to_string()).collect()
    }

    fn authorization_url(
        &self,
        ticket: &str,
        redirect_uri: &str,
        _code_challenge: Option<&str>,
    ) -> String {
        let scope_str = self.scopes().join(",");
        format!(
            "{base}?\
             client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &response_type=code\
             &scope={scope}\
             &state={state}",
            base = self.endpoints.authorize,
            client_id = urlencoding(&self.app_id),
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
            .get(&self.endpoints.token)
            .query(&[
                ("client_id", self.app_id.as_str()),
                ("client_secret", self.app_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| AuthError::upstream("meta", e))?;
        let resp = ensure_success(resp, "Meta token exchange").await?;

        let token_resp: MetaTokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::ProviderError(format!("Failed to parse token response: {e}")))?;

        Ok(TokenSet {
            access_token: token_resp.access_token,
            refresh_token: None,
            token_type: token_resp.token_type.unwrap_or_else(|| "bearer".into()),
            expires_in: token_resp.expires_in,
            scope: None,
        })
    }

    async fn fetch_identity(&self, tokens: &TokenSet) -> Result<Option<PlatformIdentity>, AuthError> {
        match self.platform {
            Platform::Instagram => {
                let raw = self
                    .get_profile(
                        &tokens.access_token,
                        "name,instagram_business_account{id,username,profile_picture_url}",
                    )
                    .await?;
                let pages: PageList = serde_json::from_value(raw.clone()).map_err(|e| {
                    AuthError::ProviderError(format!("Unexpected page list shape: {e}"))
                })?;

                // First page with a linked business account wins
                let Some(account) = pages
                    .data
                    .into_iter()
                    .find_map(|p| p.instagram_business_account)
                else {
                    return Ok(None);
                };
                Ok(PlatformIdentity::from_parts(
                    account.id,
                    account.username,
                    account.profile_picture_url,
                    raw,
                ))
            }
            _ => {
                let raw = self
                    .get_profile(&tokens.access_token, "id,name,picture{url}")
                    .await?;
                let user: FacebookUser = serde_json::from_value(raw.clone()).map_err(|e| {
                    AuthError::ProviderError(format!("Unexpected profile shape: {e}"))
                })?;
                let image = user.picture.and_then(|p| p.data).and_then(|d| d.url);
                Ok(PlatformIdentity::from_parts(user.id, user.name, image, raw))
            }
        }
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenSet, AuthError> {
        Err(AuthError::ProviderError(
            "Meta user tokens cannot be refreshed; reconnect the account".into(),
        ))
    }

    async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let mut failed = Vec::new();
        for scope in self.exclusive_scopes() {
            let url = format!("{}/{scope}", self.endpoints.revoke.trim_end_matches('/'));
            let result = match self.http.delete(&url).bearer_auth(token).send().await {
                Ok(resp) => ensure_success(resp, "Meta revoke").await.map(|_| ()),
                Err(e) => Err(AuthError::upstream("meta", e)),
            };
            if let Err(e) = result {
                failed.push(format!("{scope}: {e}"));
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(AuthError::ProviderError(format!(
                "Meta revoke incomplete: {}",
                failed.join("; ")
            )))
        }
    }
}
