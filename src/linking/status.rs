use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::aggregator::AggregatorAccountView;
use crate::connections::SocialConnection;
use crate::error::AuthError;
use crate::platform::Platform;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Active,
    /// Direct credential past its expiry with no way to refresh it.
    Expired,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusSource {
    Direct,
    Aggregator,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStatus {
    pub platform: Platform,
    pub connected: bool,
    pub username: Option<String>,
    pub status: ConnectionStatus,
    pub connected_at: Option<DateTime<Utc>>,
    pub source: Option<StatusSource>,
}

/// Per-platform connection status for `user_id`, one entry per known platform.
///
/// The registry and the aggregator are queried concurrently. An aggregator
/// failure degrades to "no aggregator links"; a registry failure fails the call.
pub async fn collect(state: &AppState, user_id: &str) -> Result<Vec<PlatformStatus>, AuthError> {
    let aggregated = async {
        match &state.aggregator {
            Some(aggregator) => aggregator
                .fetch_linked_platforms(user_id)
                .await
                .unwrap_or_else(|e| {
                    warn!("Aggregator status lookup failed for user {user_id}: {e}");
                    Vec::new()
                }),
            None => Vec::new(),
        }
    };

    let (direct, aggregated) = tokio::join!(state.connections.list(user_id), aggregated);
    Ok(merge(&direct?, &aggregated, Utc::now()))
}

/// Direct connections outrank aggregator links for the same platform.
pub fn merge(
    direct: &[SocialConnection],
    aggregated: &[AggregatorAccountView],
    now: DateTime<Utc>,
) -> Vec<PlatformStatus> {
    Platform::ALL
        .into_iter()
        .map(|platform| {
            if let Some(conn) = direct.iter().find(|c| c.platform == platform) {
                let status = if conn.is_expired(now) && conn.refresh_token.is_none() {
                    ConnectionStatus::Expired
                } else {
                    ConnectionStatus::Active
                };
                return PlatformStatus {
                    platform,
                    connected: true,
                    username: Some(conn.account_name.clone()),
                    status,
                    connected_at: Some(conn.connected_at),
                    source: Some(StatusSource::Direct),
                };
            }

            if let Some(view) = aggregated.iter().find(|v| v.platform == platform) {
                return PlatformStatus {
                    platform,
                    connected: true,
                    username: view.username.clone(),
                    status: ConnectionStatus::Active,
                    connected_at: view.linked_at,
                    source: Some(StatusSource::Aggregator),
                };
            }

            PlatformStatus {
                platform,
                connected: false,
                username: None,
                status: ConnectionStatus::Disconnected,
                connected_at: None,
                source: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linking::testing::{state, StubAggregator};
    use crate::providers::ProviderRegistry;
    use crate::store::MemoryTokenVault;
    use std::sync::Arc;

    fn direct(platform: Platform, name: &str) -> SocialConnection {
        SocialConnection {
            platform,
            account_id: format!("{name}-id"),
            account_name: name.into(),
            access_token: "at".into(),
            refresh_token: None,
            expires_at: None,
            profile: None,
            connected_at: Utc::now(),
        }
    }

    fn view(platform: Platform, name: &str) -> AggregatorAccountView {
        AggregatorAccountView {
            platform,
            username: Some(name.into()),
            profile_image_url: None,
            linked_at: None,
        }
    }

    fn entry(statuses: &[PlatformStatus], platform: Platform) -> &PlatformStatus {
        statuses.iter().find(|s| s.platform == platform).unwrap()
    }

    #[test]
    fn test_every_platform_is_reported_in_order() {
        let statuses = merge(&[], &[], Utc::now());
        let platforms: Vec<Platform> = statuses.iter().map(|s| s.platform).collect();
        assert_eq!(platforms, Platform::ALL.to_vec());
        assert!(statuses
            .iter()
            .all(|s| !s.connected && s.status == ConnectionStatus::Disconnected && s.source.is_none()));
    }

    #[test]
    fn test_direct_outranks_aggregator() {
        let statuses = merge(
            &[direct(Platform::Youtube, "Registry Channel")],
            &[view(Platform::Youtube, "agg-name"), view(Platform::X, "agg-x")],
            Utc::now(),
        );

        let yt = entry(&statuses, Platform::Youtube);
        assert_eq!(yt.source, Some(StatusSource::Direct));
        assert_eq!(yt.username.as_deref(), Some("Registry Channel"));

        let x = entry(&statuses, Platform::X);
        assert_eq!(x.source, Some(StatusSource::Aggregator));
        assert_eq!(x.username.as_deref(), Some("agg-x"));
    }

    #[test]
    fn test_expired_without_refresh_is_expired() {
        let now = Utc::now();
        let mut stale = direct(Platform::Linkedin, "li");
        stale.expires_at = Some(now - chrono::Duration::hours(1));
        let mut refreshable = direct(Platform::Youtube, "yt");
        refreshable.expires_at = Some(now - chrono::Duration::hours(1));
        refreshable.refresh_token = Some("rt".into());

        let statuses = merge(&[stale, refreshable], &[], now);
        assert_eq!(entry(&statuses, Platform::Linkedin).status, ConnectionStatus::Expired);
        assert!(entry(&statuses, Platform::Linkedin).connected);
        assert_eq!(entry(&statuses, Platform::Youtube).status, ConnectionStatus::Active);
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let statuses = merge(&[direct(Platform::Tiktok, "tt")], &[], Utc::now());
        let json = serde_json::to_value(entry(&statuses, Platform::Tiktok)).unwrap();
        assert_eq!(json["platform"], "tiktok");
        assert_eq!(json["status"], "active");
        assert_eq!(json["source"], "direct");
        assert!(json.get("connectedAt").is_some());
    }

    #[tokio::test]
    async fn test_aggregator_failure_does_not_fail_status() {
        let s = state(
            ProviderRegistry::new(),
            Some(Arc::new(StubAggregator {
                accounts: vec![],
                fail: true,
            })),
            Arc::new(MemoryTokenVault::new()),
        );
        s.connections
            .upsert("u1", &direct(Platform::Facebook, "Page"))
            .await
            .unwrap();

        let statuses = collect(&s, "u1").await.unwrap();
        assert_eq!(statuses.len(), Platform::ALL.len());
        assert!(entry(&statuses, Platform::Facebook).connected);
        assert!(!entry(&statuses, Platform::Instagram).connected);
    }

    #[tokio::test]
    async fn test_collect_merges_both_sources() {
        let s = state(
            ProviderRegistry::new(),
            Some(Arc::new(StubAggregator {
                accounts: vec![view(Platform::Instagram, "ig_user")],
                fail: false,
            })),
            Arc::new(MemoryTokenVault::new()),
        );
        s.connections
            .upsert("u1", &direct(Platform::Facebook, "Page"))
            .await
            .unwrap();

        let statuses = collect(&s, "u1").await.unwrap();
        assert_eq!(entry(&statuses, Platform::Facebook).source, Some(StatusSource::Direct));
        assert_eq!(
            entry(&statuses, Platform::Instagram).source,
            Some(StatusSource::Aggregator)
        );
    }
}
