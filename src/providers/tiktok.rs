use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::traits::{OAuthProvider, PlatformIdentity, ProviderEndpoints, TokenSet};
use super::{ensure_success, http_client, urlencoding};
use crate::error::AuthError;
use crate::platform::Platform;

/// TikTok Login Kit (v2) provider.
///
/// Quirks:
/// - The app identifier is `client_key`, not `client_id`.
/// - Scopes are comma-separated.
/// - The token endpoint can answer 200 with an `error` field instead of tokens.
/// - User info wraps the profile in `data.user` and reports failures in `error.code`.
/// - Access tokens live 24 hours; refresh tokens 365 days.
pub struct TikTokProvider {
    client_key: String,
    client_secret: String,
    http: reqwest::Client,
    endpoints: ProviderEndpoints,
}

#[derive(Debug, Deserialize)]
struct TikTokTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfoEnvelope {
    data: Option<UserInfoData>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct UserInfoData {
    user: Option<TikTokUser>,
}

#[derive(Debug, Deserialize)]
struct TikTokUser {
    open_id: Option<String>,
    display_name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<String>,
    message: Option<String>,
}

impl TikTokProvider {
    pub fn new(client_key: String, client_secret: String, timeout: Duration) -> Self {
        Self {
            client_key,
            client_secret,
            http: http_client(timeout),
            endpoints: ProviderEndpoints {
                authorize: "https://www.tiktok.com/v2/auth/authorize/".into(),
                token: "https://open.tiktokapis.com/v2/oauth/token/".into(),
                profile: "https://open.tiktokapis.com/v2/user/info/".into(),
                revoke: "https://open.tiktokapis.com/v2/oauth/revoke/".into(),
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
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::upstream("tiktok", e))?;
        let resp = ensure_success(resp, what).await?;

        let token_resp: TikTokTokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::ProviderError(format!("Failed to parse {what} response: {e}")))?;

        if let Some(error) = token_resp.error {
            return Err(AuthError::ProviderError(format!(
                "{what} failed: {error} {}",
                token_resp.error_description.unwrap_or_default()
            )));
        }

        Ok(TokenSet {
            access_token: token_resp
                .access_token
                .ok_or_else(|| AuthError::ProviderError("no access_token in response".into()))?,
            refresh_token: token_resp.refresh_token,
            token_type: token_resp.token_type.unwrap_or_else(|| "Bearer".into()),
            expires_in: token_resp.expires_in,
            scope: token_resp.scope,
        })
    }
}

#[async_trait]
impl OAuthProvider for TikTokProvider {
    fn platform(&self) -> Platform {
        Platform::Tiktok
    }

    fn scopes(&self) -> Vec<String> {
        vec![
            "user.info.basic".into(),
            "video.upload".into(),
            "video.publish".into(),
        ]
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
             client_key={client_key}\
             &redirect_uri={redirect_uri}\
             &response_type=code\
             &scope={scope}\
             &state={state}",
            base = self.endpoints.authorize,
            client_key = urlencoding(&self.client_key),
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
        self.token_request(
            &[
                ("client_key", self.client_key.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
            ],
            "TikTok token exchange",
        )
        .await
    }

    async fn fetch_identity(&self, tokens: &TokenSet) -> Result<Option<PlatformIdentity>, AuthError> {
        let resp = self
            .http
            .get(&self.endpoints.profile)
            .query(&[("fields", "open_id,union_id,avatar_url,display_name")])
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| AuthError::upstream("tiktok", e))?;
        let resp = ensure_success(resp, "TikTok user info").await?;

        let raw: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AuthError::ProviderError(format!("Failed to parse user info: {e}")))?;
        let envelope: UserInfoEnvelope = serde_json::from_value(raw.clone())
            .map_err(|e| AuthError::ProviderError(format!("Unexpected user info shape: {e}")))?;

        if let Some(err) = envelope.error {
            let code = err.code.unwrap_or_default();
            if code != "ok" && !code.is_empty() {
                return Err(AuthError::ProviderError(format!(
                    "TikTok user info failed: {code} {}",
                    err.message.unwrap_or_default()
                )));
            }
        }

        let Some(user) = envelope.data.and_then(|d| d.user) else {
            return Ok(None);
        };
        Ok(PlatformIdentity::from_parts(
            user.open_id,
            user.display_name,
            user.avatar_url,
            raw,
        ))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        self.token_request(
            &[
                ("client_key", self.client_key.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
            "TikTok refresh",
        )
        .await
    }

    async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let resp = self
            .http
            .post(&self.endpoints.revoke)
            .form(&[
                ("client_key", self.client_key.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("token", token),
            ])
            .send()
            .await
            .map_err(|e| AuthError::upstream("tiktok", e))?;
        ensure_success(resp, "TikTok revoke").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> TikTokProvider {
        TikTokProvider::new("tkey".into(), "tsecret".into(), Duration::from_secs(2)).with_endpoints(
            ProviderEndpoints {
                authorize: format!("{}/v2/auth/authorize/", server.uri()),
                token: format!("{}/v2/oauth/token/", server.uri()),
                profile: format!("{}/v2/user/info/", server.uri()),
                revoke: format!("{}/v2/oauth/revoke/", server.uri()),
            },
        )
    }

    #[test]
    fn test_authorization_url_uses_client_key() {
        let p = TikTokProvider::new("tkey".into(), "ts".into(), Duration::from_secs(2));
        let url = p.authorization_url("tkt", "https://app/cb", None);
        assert!(url.contains("client_key=tkey"));
        assert!(!url.contains("client_id="));
        assert!(url.contains("scope=user.info.basic%2Cvideo.upload"));
    }

    #[tokio::test]
    async fn test_error_in_200_body_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/oauth/token/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Authorization code is expired."
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .exchange_code("c", "https://app/cb", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ProviderError(ref m) if m.contains("invalid_grant")));
    }

    #[tokio::test]
    async fn test_exchange_and_identity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/oauth/token/"))
            .and(body_string_contains("client_key=tkey"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "act.1",
                "expires_in": 86400,
                "open_id": "oid-1",
                "refresh_token": "rft.1",
                "refresh_expires_in": 31536000,
                "scope": "user.info.basic,video.upload",
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/user/info/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"user": {
                    "open_id": "oid-1",
                    "display_name": "ada dances",
                    "avatar_url": "https://tt/avatar.jpg"
                }},
                "error": {"code": "ok", "message": ""}
            })))
            .mount(&server)
            .await;

        let p = provider(&server);
        let tokens = p.exchange_code("c", "https://app/cb", None).await.unwrap();
        assert_eq!(tokens.refresh_token.as_deref(), Some("rft.1"));

        let identity = p.fetch_identity(&tokens).await.unwrap().unwrap();
        assert_eq!(identity.account_id, "oid-1");
        assert_eq!(identity.account_name, "ada dances");
    }

    #[tokio::test]
    async fn test_user_info_error_code_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/user/info/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {},
                "error": {"code": "access_token_invalid", "message": "expired"}
            })))
            .mount(&server)
            .await;

        let tokens = TokenSet {
            access_token: "act.1".into(),
            refresh_token: None,
            token_type: "Bearer".into(),
            expires_in: None,
            scope: None,
        };
        assert!(provider(&server).fetch_identity(&tokens).await.is_err());
    }
}
