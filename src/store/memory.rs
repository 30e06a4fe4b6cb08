use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;

use super::vault::{StoredConnection, TokenVault};
use crate::error::AuthError;
use crate::platform::normalize_tag;

/// In-process vault for local development and tests.
///
/// Optionally restricted to a set of known users, mirroring a foreign key on
/// the users table.
#[derive(Default)]
pub struct MemoryTokenVault {
    rows: DashMap<String, Vec<StoredConnection>>,
    known_users: Option<HashSet<String>>,
}

impl MemoryTokenVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_known_users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: DashMap::new(),
            known_users: Some(users.into_iter().map(Into::into).collect()),
        }
    }

    /// Write a row verbatim, bypassing replacement. Used to seed legacy rows.
    pub fn insert_raw(&self, user_id: &str, row: StoredConnection) {
        self.rows.entry(user_id.to_string()).or_default().push(row);
    }
}

/// Whether the row's tag, however it was spelled when written, is one of `tags`.
fn tagged(row: &StoredConnection, tags: &[&str]) -> bool {
    let tag = normalize_tag(&row.platform);
    tags.contains(&tag.as_str())
}

fn newest_first(mut rows: Vec<StoredConnection>) -> Vec<StoredConnection> {
    rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    rows
}

#[async_trait]
impl TokenVault for MemoryTokenVault {
    async fn replace(
        &self,
        user_id: &str,
        tags: &[&str],
        row: &StoredConnection,
    ) -> Result<(), AuthError> {
        if let Some(known) = &self.known_users {
            if !known.contains(user_id) {
                return Err(AuthError::UserNotFound(user_id.to_string()));
            }
        }

        let mut entry = self.rows.entry(user_id.to_string()).or_default();
        entry.retain(|r| !tagged(r, tags) && r.platform != row.platform);
        entry.push(row.clone());
        Ok(())
    }

    async fn find(&self, user_id: &str, tags: &[&str]) -> Result<Vec<StoredConnection>, AuthError> {
        let rows = self
            .rows
            .get(user_id)
            .map(|rows| {
                rows.iter()
                    .filter(|r| tagged(r, tags))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(newest_first(rows))
    }

    async fn list(&self, user_id: &str) -> Result<Vec<StoredConnection>, AuthError> {
        let rows = self
            .rows
            .get(user_id)
            .map(|rows| rows.value().clone())
            .unwrap_or_default();
        Ok(newest_first(rows))
    }

    async fn delete(&self, user_id: &str, tags: &[&str]) -> Result<u64, AuthError> {
        let Some(mut rows) = self.rows.get_mut(user_id) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !tagged(r, tags));
        Ok((before - rows.len()) as u64)
    }

    async fn update_credentials(
        &self,
        user_id: &str,
        platform: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), AuthError> {
        let mut rows = self
            .rows
            .get_mut(user_id)
            .ok_or_else(|| AuthError::Internal(format!("no {platform} connection to update")))?;
        let row = rows
            .iter_mut()
            .find(|r| r.platform == platform)
            .ok_or_else(|| AuthError::Internal(format!("no {platform} connection to update")))?;

        row.access_token = access_token.to_string();
        if let Some(rt) = refresh_token {
            row.refresh_token = Some(rt.to_string());
        }
        row.expires_at = expires_at;
        row.updated_at = Utc::now();
        Ok(())
    }
}
