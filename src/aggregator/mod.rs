//! External publishing aggregator that runs its own linking flow.
//!
//! Consulted for platforms without a direct adapter, and merged into the
//! status view for platforms linked through it.

mod client;

pub use client::HttpAggregator;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AuthError;
use crate::platform::Platform;

/// A platform link as reported by the aggregator. Never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorAccountView {
    pub platform: Platform,
    pub username: Option<String>,
    pub profile_image_url: Option<String>,
    pub linked_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait AggregatorGateway: Send + Sync {
    /// Platforms the user has linked through the aggregator.
    async fn fetch_linked_platforms(
        &self,
        user_id: &str,
    ) -> Result<Vec<AggregatorAccountView>, AuthError>;

    /// Hosted linking URL for the platform; the aggregator sends the user back to `return_url`.
    async fn fetch_connect_url(
        &self,
        user_id: &str,
        platform: Platform,
        return_url: &str,
    ) -> Result<String, AuthError>;
}
