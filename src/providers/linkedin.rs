use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::traits::{OAuthProvider, PlatformIdentity, ProviderEndpoints, TokenSet};
use super::{ensure_success, http_client, urlencoding};
use crate::error::AuthError;
use crate::platform::Platform;

/// LinkedIn OAuth 2.0 provider.
///
/// Quirks:
/// - Uses OpenID Connect (OIDC) for profile scopes; identity comes from `/v2/userinfo`.
/// - Access tokens expire in 60 days.
/// - Refresh tokens available with special partner approval.
/// - Token exchange uses standard form-encoded POST.
/// - Revocation endpoint is separate from token endpoint.
pub struct LinkedInProvider {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
    endpoints: ProviderEndpoints,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct LinkedInTokenResponse {
    access_token: String,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
    refresh_token_expires_in: Option<u64>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl LinkedInProvider {
    pub fn new(client_id: String, client_secret: String, timeout: Duration) -> Self {
        Self {
            client_id,
            client_secret,
            http: http_client(timeout),
            endpoints: ProviderEndpoints {
                authorize: "https://www.linkedin.com/oauth/v2/authorization".into(),
                token: "https://www.linkedin.com/oauth/v2/accessToken".into(),
                profile: "https://api.linkedin.com/v2/userinfo".into(),
                revoke: "https://www.linkedin.com/oauth/v2/revoke".into(),
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
            .map_err(|e| AuthError::upstream("linkedin", e))?;
        let resp = ensure_success(resp, what).await?;

        let token_resp: LinkedInTokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::ProviderError(format!("Failed to parse {what} response: {e}")))?;

        Ok(TokenSet {
            access_token: token_resp.access_token,
            refresh_token: token_resp.refresh_token,
            token_type: "Bearer".into(),
            expires_in: token_resp.expires_in,
            scope: token_resp.scope,
        })
    }
}

#[async_trait]
impl OAuthProvider for LinkedInProvider {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    fn scopes(&self) -> Vec<String> {
        // Sign In with LinkedIn (OIDC) + Share on LinkedIn
        vec![
            "openid".into(),
            "profile".into(),
            "email".into(),
            "w_member_social".into(),
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
             &state={state}",
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
        self.token_request(
            &[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ],
            "LinkedIn token exchange",
        )
        .await
    }

    async fn fetch_identity(&self, tokens: &TokenSet) -> Result<Option<PlatformIdentity>, AuthError> {
        let resp = self
            .http
            .get(&self.endpoints.profile)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .map_err(|e| AuthError::upstream("linkedin", e))?;
        let resp = ensure_success(resp, "LinkedIn userinfo").await?;

        let raw: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AuthError::ProviderError(format!("Failed to parse userinfo: {e}")))?;
        let info: UserInfo = serde_json::from_value(raw.clone())
            .map_err(|e| AuthError::ProviderError(format!("Unexpected userinfo shape: {e}")))?;

        Ok(PlatformIdentity::from_parts(info.sub, info.name, info.picture, raw))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        self.token_request(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ],
            "LinkedIn refresh",
        )
        .await
    }

    async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let resp = self
            .http
            .post(&self.endpoints.revoke)
            .form(&[
                ("token", token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::upstream("linkedin", e))?;
        ensure_success(resp, "LinkedIn revoke").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> LinkedInProvider {
        LinkedInProvider::new("lid".into(), "lsecret".into(), Duration::from_secs(2)).with_endpoints(
            ProviderEndpoints {
                authorize: format!("{}/authorization", server.uri()),
                token: format!("{}/accessToken", server.uri()),
                profile: format!("{}/v2/userinfo", server.uri()),
                revoke: format!("{}/revoke", server.uri()),
            },
        )
    }

    #[tokio::test]
    async fn test_exchange_and_identity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accessToken"))
            .and(body_string_contains("client_secret=lsecret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "AQV",
                "expires_in": 5184000,
                "scope": "openid,profile,w_member_social"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "782bbtaQ",
                "name": "Ada Lovelace",
                "picture": "https://media.licdn.com/ada.jpg",
                "email": "ada@example.com"
            })))
            .mount(&server)
            .await;

        let p = provider(&server);
        let tokens = p.exchange_code("code", "https://app/cb", None).await.unwrap();
        assert_eq!(tokens.token_type, "Bearer");
        assert_eq!(tokens.expires_in, Some(5184000));

        let identity = p.fetch_identity(&tokens).await.unwrap().unwrap();
        assert_eq!(identity.account_id, "782bbtaQ");
        assert_eq!(identity.account_name, "Ada Lovelace");
        assert_eq!(identity.raw["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn test_userinfo_without_sub_has_no_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Nobody"})))
            .mount(&server)
            .await;

        let tokens = TokenSet {
            access_token: "AQV".into(),
            refresh_token: None,
            token_type: "Bearer".into(),
            expires_in: None,
            scope: None,
        };
        assert!(provider(&server).fetch_identity(&tokens).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/revoke"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(provider(&server).revoke("AQV").await.is_err());
    }
}
