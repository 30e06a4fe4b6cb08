use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::crypto::CryptoEngine;
use crate::error::AuthError;
use crate::platform::Platform;
use crate::providers::OAuthProvider;
use crate::store::{StoredConnection, TokenVault};

/// A direct connection with its credentials in plaintext.
#[derive(Debug, Clone)]
pub struct SocialConnection {
    pub platform: Platform,
    pub account_id: String,
    pub account_name: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub profile: Option<serde_json::Value>,
    pub connected_at: DateTime<Utc>,
}

impl SocialConnection {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Result of [`ConnectionRegistry::valid_credential`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidCredential {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub refreshed: bool,
}

/// Encrypting facade over the token vault.
///
/// Every read canonicalizes stored tags, so rows written under an alias by an
/// older deployment surface as the canonical platform. Every write replaces
/// the canonical row and all alias rows at once.
pub struct ConnectionRegistry {
    vault: Arc<dyn TokenVault>,
    crypto: CryptoEngine,
}

impl ConnectionRegistry {
    pub fn new(vault: Arc<dyn TokenVault>, crypto: CryptoEngine) -> Self {
        Self { vault, crypto }
    }

    pub async fn upsert(&self, user_id: &str, conn: &SocialConnection) -> Result<(), AuthError> {
        let now = Utc::now();
        let row = StoredConnection {
            platform: conn.platform.as_str().to_string(),
            account_id: conn.account_id.clone(),
            account_name: conn.account_name.clone(),
            access_token: self.crypto.encrypt(&conn.access_token)?,
            refresh_token: conn
                .refresh_token
                .as_deref()
                .map(|rt| self.crypto.encrypt(rt))
                .transpose()?,
            expires_at: conn.expires_at,
            profile: conn.profile.clone(),
            connected_at: conn.connected_at,
            updated_at: now,
        };

        self.vault
            .replace(user_id, &conn.platform.stored_tags(), &row)
            .await?;
        info!(
            "Stored {} connection {} for user {user_id}",
            conn.platform, conn.account_id
        );
        Ok(())
    }

    /// Delete the connection under its canonical tag and every alias. Returns rows removed.
    pub async fn remove(&self, user_id: &str, platform: Platform) -> Result<u64, AuthError> {
        let removed = self.vault.delete(user_id, &platform.stored_tags()).await?;
        if removed > 0 {
            info!("Removed {removed} {platform} row(s) for user {user_id}");
        }
        Ok(removed)
    }

    /// Newest connection for the platform, alias rows included.
    pub async fn get(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<SocialConnection>, AuthError> {
        match self.newest_row(user_id, platform).await? {
            Some(row) => Ok(Some(self.decode(platform, &row)?)),
            None => Ok(None),
        }
    }

    /// One connection per canonical platform, newest row winning.
    pub async fn list(&self, user_id: &str) -> Result<Vec<SocialConnection>, AuthError> {
        let rows = self.vault.list(user_id).await?;

        let mut seen = HashSet::new();
        let mut connections = Vec::new();
        for row in rows {
            let Some(platform) = Platform::canonicalize(&row.platform) else {
                warn!(
                    "Skipping connection with unrecognized platform tag '{}' for user {user_id}",
                    row.platform
                );
                continue;
            };
            if !seen.insert(platform) {
                continue;
            }
            match self.decode(platform, &row) {
                Ok(conn) => connections.push(conn),
                Err(e) => warn!("Skipping unreadable {platform} connection for user {user_id}: {e}"),
            }
        }
        Ok(connections)
    }

    /// Decrypted access token for downstream callers, refreshed first if it has expired.
    pub async fn valid_credential(
        &self,
        user_id: &str,
        platform: Platform,
        provider: Option<&dyn OAuthProvider>,
    ) -> Result<ValidCredential, AuthError> {
        let row = self
            .newest_row(user_id, platform)
            .await?
            .ok_or_else(|| AuthError::NotConnected(platform.to_string()))?;
        let conn = self.decode(platform, &row)?;

        if !conn.is_expired(Utc::now()) {
            return Ok(ValidCredential {
                access_token: conn.access_token,
                expires_at: conn.expires_at,
                refreshed: false,
            });
        }

        let (Some(refresh_token), Some(provider)) = (conn.refresh_token.as_deref(), provider) else {
            return Err(AuthError::ProviderError(format!(
                "{platform} credential expired and cannot be refreshed"
            )));
        };

        let tokens = provider.refresh_token(refresh_token).await.map_err(|e| {
            if e.is_timeout() {
                e
            } else {
                AuthError::ProviderError(format!("token refresh failed: {e}"))
            }
        })?;

        let expires_at = tokens.expires_at(Utc::now());
        let access_ct = self.crypto.encrypt(&tokens.access_token)?;
        let refresh_ct = tokens
            .refresh_token
            .as_deref()
            .map(|rt| self.crypto.encrypt(rt))
            .transpose()?;

        self.vault
            .update_credentials(
                user_id,
                &row.platform,
                &access_ct,
                refresh_ct.as_deref(),
                expires_at,
            )
            .await?;
        info!("Refreshed {platform} credential for user {user_id}");

        Ok(ValidCredential {
            access_token: tokens.access_token,
            expires_at,
            refreshed: true,
        })
    }

    async fn newest_row(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<StoredConnection>, AuthError> {
        let rows = self.vault.find(user_id, &platform.stored_tags()).await?;
        Ok(rows.into_iter().next())
    }

    fn decode(&self, platform: Platform, row: &StoredConnection) -> Result<SocialConnection, AuthError> {
        Ok(SocialConnection {
            platform,
            account_id: row.account_id.clone(),
            account_name: row.account_name.clone(),
            access_token: self.crypto.decrypt(&row.access_token)?,
            refresh_token: row
                .refresh_token
                .as_deref()
                .map(|rt| self.crypto.decrypt(rt))
                .transpose()?,
            expires_at: row.expires_at,
            profile: row.profile.clone(),
            connected_at: row.connected_at,
        })
    }
}
