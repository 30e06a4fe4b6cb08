mod google;
mod linkedin;
mod meta;
mod registry;
mod tiktok;
mod traits;
mod x;

pub use google::GoogleProvider;
pub use linkedin::LinkedInProvider;
pub use meta::MetaProvider;
pub use registry::ProviderRegistry;
pub use tiktok::TikTokProvider;
pub use traits::{OAuthProvider, PlatformIdentity, ProviderEndpoints, TokenSet};
pub use x::XProvider;

use std::time::Duration;

use crate::config::Config;
use crate::error::AuthError;

/// Register every platform adapter that has credentials configured.
pub fn register_defaults(registry: &mut ProviderRegistry, config: &Config) {
    let timeout = config.http_timeout;

    if let (Some(id), Some(secret)) = (&config.google_client_id, &config.google_client_secret) {
        registry.register(Box::new(GoogleProvider::new(id.clone(), secret.clone(), timeout)));
    }

    if let (Some(id), Some(secret)) = (&config.meta_app_id, &config.meta_app_secret) {
        registry.register(Box::new(MetaProvider::facebook(id.clone(), secret.clone(), timeout)));
        registry.register(Box::new(MetaProvider::instagram(id.clone(), secret.clone(), timeout)));
    }

    if let (Some(id), Some(secret)) = (&config.linkedin_client_id, &config.linkedin_client_secret) {
        registry.register(Box::new(LinkedInProvider::new(id.clone(), secret.clone(), timeout)));
    }

    if let (Some(id), Some(secret)) = (&config.x_client_id, &config.x_client_secret) {
        registry.register(Box::new(XProvider::new(id.clone(), secret.clone(), timeout)));
    }

    if let (Some(key), Some(secret)) = (&config.tiktok_client_key, &config.tiktok_client_secret) {
        registry.register(Box::new(TikTokProvider::new(key.clone(), secret.clone(), timeout)));
    }
}

/// HTTP client with the bounded outbound timeout.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Falling back to default HTTP client: {e}");
            reqwest::Client::new()
        })
}

/// Turn a non-2xx response into a provider error carrying the body.
pub(crate) async fn ensure_success(
    resp: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, AuthError> {
    ensure_success_as(resp, what, AuthError::ProviderError).await
}

/// Like [`ensure_success`], with the error variant chosen by the caller.
pub(crate) async fn ensure_success_as(
    resp: reqwest::Response,
    what: &str,
    wrap: fn(String) -> AuthError,
) -> Result<reqwest::Response, AuthError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(wrap(format!("{what} failed ({status}): {body}")))
}

pub(crate) fn urlencoding(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;

    #[test]
    fn test_register_defaults_skips_unconfigured() {
        let mut config = Config::for_tests();
        config.google_client_id = Some("gid".into());
        config.google_client_secret = Some("gsecret".into());
        config.meta_app_id = Some("mid".into());
        config.meta_app_secret = Some("msecret".into());
        // only half of the X credentials
        config.x_client_id = Some("xid".into());

        let mut registry = ProviderRegistry::new();
        register_defaults(&mut registry, &config);

        assert_eq!(
            registry.list(),
            vec![Platform::Youtube, Platform::Facebook, Platform::Instagram]
        );
        assert!(!registry.contains(Platform::X));
    }

    #[tokio::test]
    async fn test_error_status_uses_callers_variant() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;
        let http = http_client(Duration::from_secs(2));

        let resp = http.get(server.uri()).send().await.unwrap();
        let err = ensure_success(resp, "Lookup").await.unwrap_err();
        assert!(matches!(err, AuthError::ProviderError(ref m) if m.contains("503") && m.contains("down")));

        let resp = http.get(server.uri()).send().await.unwrap();
        let err = ensure_success_as(resp, "Lookup", AuthError::Aggregator).await.unwrap_err();
        assert!(matches!(err, AuthError::Aggregator(ref m) if m.starts_with("Lookup failed (503")));
    }
}
