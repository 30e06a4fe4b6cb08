use serde::Serialize;
use tracing::info;

use super::resolve_platform;
use crate::crypto::{pkce_challenge, random_token};
use crate::error::AuthError;
use crate::AppState;

/// Where to send the user to link a platform.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub authorization_url: String,
    /// `false` when the URL belongs to the aggregator's hosted flow.
    pub uses_direct_oauth: bool,
}

/// Start linking `platform` for `user_id`.
///
/// A configured direct adapter always wins; the aggregator is the fallback
/// and never sees a ticket. `return_url` only applies to the aggregator flow,
/// since direct callbacks always land on the configured return page.
pub async fn initiate(
    state: &AppState,
    user_id: &str,
    platform: &str,
    return_url: Option<&str>,
) -> Result<Authorization, AuthError> {
    let platform = resolve_platform(platform)?;

    if let Some(provider) = state.providers.get(platform) {
        let verifier = provider.supports_pkce().then(random_token);
        let challenge = verifier.as_deref().map(pkce_challenge);

        let ticket = state.tickets.issue(user_id, platform, verifier).await?;
        let authorization_url = provider.authorization_url(
            &ticket.token,
            &state.config.callback_url(platform),
            challenge.as_deref(),
        );

        info!("Initiated direct {platform} linking for user {user_id}");
        return Ok(Authorization {
            authorization_url,
            uses_direct_oauth: true,
        });
    }

    if let Some(aggregator) = &state.aggregator {
        let return_url = return_url.unwrap_or(&state.config.return_url);
        let authorization_url = aggregator
            .fetch_connect_url(user_id, platform, return_url)
            .await?;

        info!("Initiated aggregator {platform} linking for user {user_id}");
        return Ok(Authorization {
            authorization_url,
            uses_direct_oauth: false,
        });
    }

    Err(AuthError::NotConfigured(platform.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linking::testing::{state, with_provider, StubAggregator, StubProvider};
    use crate::platform::Platform;
    use crate::providers::ProviderRegistry;
    use crate::store::MemoryTokenVault;
    use std::sync::Arc;

    fn ticket_from(url: &str) -> String {
        let parsed = url::Url::parse(url).unwrap();
        parsed
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[tokio::test]
    async fn test_direct_initiate_mints_live_ticket() {
        let s = state(
            with_provider(StubProvider::new(Platform::Youtube)),
            None,
            Arc::new(MemoryTokenVault::new()),
        );

        let auth = initiate(&s, "u1", "youtube", None).await.unwrap();
        assert!(auth.uses_direct_oauth);
        assert!(auth
            .authorization_url
            .contains("redirect_uri=http://localhost:8430/v1/social/callback/youtube"));

        let ticket = ticket_from(&auth.authorization_url);
        assert!(s.tickets.contains(&ticket).await.unwrap());
    }

    #[tokio::test]
    async fn test_alias_resolves_to_canonical_adapter() {
        let s = state(
            with_provider(StubProvider::new(Platform::X)),
            None,
            Arc::new(MemoryTokenVault::new()),
        );

        let auth = initiate(&s, "u1", "Twitter", None).await.unwrap();
        assert!(auth.authorization_url.contains("/callback/x"));
    }

    #[tokio::test]
    async fn test_pkce_adapter_gets_challenge_and_ticket_keeps_verifier() {
        let mut provider = StubProvider::new(Platform::X);
        provider.pkce = true;
        let s = state(with_provider(provider), None, Arc::new(MemoryTokenVault::new()));

        let auth = initiate(&s, "u1", "x", None).await.unwrap();
        let ticket = s
            .tickets
            .take(&ticket_from(&auth.authorization_url))
            .await
            .unwrap()
            .unwrap();
        let verifier = ticket.pkce_verifier.unwrap();
        assert!(auth
            .authorization_url
            .contains(&format!("code_challenge={}", pkce_challenge(&verifier))));
        assert!(!auth.authorization_url.contains(&verifier));
    }

    #[tokio::test]
    async fn test_reinitiate_invalidates_previous_ticket() {
        let s = state(
            with_provider(StubProvider::new(Platform::Linkedin)),
            None,
            Arc::new(MemoryTokenVault::new()),
        );

        let first = initiate(&s, "u1", "linkedin", None).await.unwrap();
        let second = initiate(&s, "u1", "linkedin", None).await.unwrap();
        assert!(!s.tickets.contains(&ticket_from(&first.authorization_url)).await.unwrap());
        assert!(s.tickets.contains(&ticket_from(&second.authorization_url)).await.unwrap());
    }

    #[tokio::test]
    async fn test_falls_back_to_aggregator() {
        let s = state(
            ProviderRegistry::new(),
            Some(Arc::new(StubAggregator::default())),
            Arc::new(MemoryTokenVault::new()),
        );

        let auth = initiate(&s, "u1", "tiktok", Some("https://app/back")).await.unwrap();
        assert!(!auth.uses_direct_oauth);
        assert_eq!(auth.authorization_url, "https://agg.example/u1/tiktok?back=https://app/back");
    }

    #[tokio::test]
    async fn test_unconfigured_platform() {
        let s = state(ProviderRegistry::new(), None, Arc::new(MemoryTokenVault::new()));
        let err = initiate(&s, "u1", "facebook", None).await.unwrap_err();
        assert!(matches!(err, AuthError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_unknown_platform() {
        let s = state(ProviderRegistry::new(), None, Arc::new(MemoryTokenVault::new()));
        let err = initiate(&s, "u1", "myspace", None).await.unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedPlatform(_)));
    }
}
