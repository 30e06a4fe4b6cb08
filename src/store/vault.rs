use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AuthError;

/// One persisted connection row. `platform` is the tag as written, which for
/// rows from older deployments may be an alias rather than the canonical tag.
#[derive(Debug, Clone)]
pub struct StoredConnection {
    pub platform: String,
    pub account_id: String,
    pub account_name: String,
    /// AES-256-GCM ciphertext.
    pub access_token: String,
    /// AES-256-GCM ciphertext.
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub profile: Option<serde_json::Value>,
    pub connected_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait TokenVault: Send + Sync {
    /// Atomically delete every row of `user_id` tagged with any of `tags` and
    /// write `row` in their place.
    async fn replace(
        &self,
        user_id: &str,
        tags: &[&str],
        row: &StoredConnection,
    ) -> Result<(), AuthError>;

    /// Rows of `user_id` tagged with any of `tags`, newest first.
    async fn find(&self, user_id: &str, tags: &[&str]) -> Result<Vec<StoredConnection>, AuthError>;

    /// Every row of `user_id`, newest first.
    async fn list(&self, user_id: &str) -> Result<Vec<StoredConnection>, AuthError>;

    /// Delete every row of `user_id` tagged with any of `tags`. Returns rows removed.
    async fn delete(&self, user_id: &str, tags: &[&str]) -> Result<u64, AuthError>;

    /// Swap in refreshed credentials. A `None` refresh token keeps the stored one.
    async fn update_credentials(
        &self,
        user_id: &str,
        platform: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), AuthError>;
}
