use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{AggregatorAccountView, AggregatorGateway};
use crate::config::Config;
use crate::error::AuthError;
use crate::platform::Platform;
use crate::providers::{ensure_success_as, http_client};

/// REST client for the aggregator's profile API.
pub struct HttpAggregator {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    accounts: Vec<AccountEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountEntry {
    platform: String,
    username: Option<String>,
    profile_image_url: Option<String>,
    linked_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectUrlResponse {
    url: String,
}

impl HttpAggregator {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http: http_client(timeout),
        }
    }

    /// Build the client when both the base URL and API key are configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        match (&config.aggregator_base_url, &config.aggregator_api_key) {
            (Some(base), Some(key)) => Some(Self::new(base.clone(), key.clone(), config.http_timeout)),
            _ => None,
        }
    }

    fn profile_url(&self, user_id: &str, leaf: &str) -> Result<Url, AuthError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AuthError::Aggregator(format!("Invalid aggregator base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| AuthError::Aggregator("Aggregator base URL cannot hold a path".into()))?
            .pop_if_empty()
            .extend(["profiles", user_id, leaf]);
        Ok(url)
    }
}

fn upstream(e: reqwest::Error) -> AuthError {
    AuthError::upstream_as("aggregator", e, AuthError::Aggregator)
}

#[async_trait]
impl AggregatorGateway for HttpAggregator {
    async fn fetch_linked_platforms(
        &self,
        user_id: &str,
    ) -> Result<Vec<AggregatorAccountView>, AuthError> {
        let resp = self
            .http
            .get(self.profile_url(user_id, "accounts")?)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(upstream)?;
        let resp = ensure_success_as(resp, "Account listing", AuthError::Aggregator).await?;

        let body: AccountsResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Aggregator(format!("Failed to parse account listing: {e}")))?;

        let mut seen = HashSet::new();
        let mut views = Vec::new();
        for entry in body.accounts {
            let Some(platform) = Platform::canonicalize(&entry.platform) else {
                debug!("Dropping aggregator account on unknown platform '{}'", entry.platform);
                continue;
            };
            if !seen.insert(platform) {
                continue;
            }
            views.push(AggregatorAccountView {
                platform,
                username: entry.username,
                profile_image_url: entry.profile_image_url,
                linked_at: entry
                    .linked_at
                    .as_deref()
                    .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                    .map(|at| at.with_timezone(&Utc)),
            });
        }
        Ok(views)
    }

    async fn fetch_connect_url(
        &self,
        user_id: &str,
        platform: Platform,
        return_url: &str,
    ) -> Result<String, AuthError> {
        let resp = self
            .http
            .post(self.profile_url(user_id, "connect-url")?)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "platform": platform.as_str(),
                "redirectUrl": return_url,
            }))
            .send()
            .await
            .map_err(upstream)?;
        let resp = ensure_success_as(resp, "Connect URL request", AuthError::Aggregator).await?;

        let body: ConnectUrlResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Aggregator(format!("Failed to parse connect URL: {e}")))?;
        Ok(body.url)
    }
}
