use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::time::Duration;
use tracing::{debug, info};

use super::{AuthorizationTicket, TicketStore};
use crate::crypto::random_token;
use crate::error::AuthError;
use crate::platform::Platform;

/// In-process ticket store.
///
/// `tickets` is keyed by token; `outstanding` maps (user, platform) to the
/// single live token for that pair so re-initiation can invalidate it.
pub struct MemoryTicketStore {
    ttl: Duration,
    tickets: DashMap<String, AuthorizationTicket>,
    outstanding: DashMap<(String, Platform), String>,
}

impl MemoryTicketStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tickets: DashMap::new(),
            outstanding: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    fn forget(&self, ticket: &AuthorizationTicket) {
        self.outstanding.remove_if(
            &(ticket.user_id.clone(), ticket.platform),
            |_, token| *token == ticket.token,
        );
    }

    fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .tickets
            .iter()
            .filter(|entry| entry.value().is_expired(self.ttl, now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut swept = 0;
        for token in expired {
            // remove_if re-checks under the shard lock; a concurrent take may have won
            if let Some((_, ticket)) = self
                .tickets
                .remove_if(&token, |_, t| t.is_expired(self.ttl, now))
            {
                self.forget(&ticket);
                swept += 1;
            }
        }
        swept
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn issue(
        &self,
        user_id: &str,
        platform: Platform,
        pkce_verifier: Option<String>,
    ) -> Result<AuthorizationTicket, AuthError> {
        self.sweep_expired();

        let ticket = AuthorizationTicket {
            token: random_token(),
            user_id: user_id.to_string(),
            platform,
            issued_at: Utc::now(),
            pkce_verifier,
        };

        // Insert first, then swap the index: of two racing issues only the last swap survives.
        self.tickets.insert(ticket.token.clone(), ticket.clone());
        if let Some(previous) = self
            .outstanding
            .insert((user_id.to_string(), platform), ticket.token.clone())
        {
            if self.tickets.remove(&previous).is_some() {
                info!("Invalidated earlier {platform} ticket for user {user_id}");
            }
        }

        debug!("Issued {platform} ticket for user {user_id}");
        Ok(ticket)
    }

    async fn take(&self, token: &str) -> Result<Option<AuthorizationTicket>, AuthError> {
        let Some((_, ticket)) = self.tickets.remove(token) else {
            return Ok(None);
        };
        self.forget(&ticket);

        if ticket.is_expired(self.ttl, Utc::now()) {
            info!(
                "Rejected expired {} ticket for user {}",
                ticket.platform, ticket.user_id
            );
            return Ok(None);
        }

        Ok(Some(ticket))
    }

    async fn contains(&self, token: &str) -> Result<bool, AuthError> {
        Ok(self
            .tickets
            .get(token)
            .map(|t| !t.is_expired(self.ttl, Utc::now()))
            .unwrap_or(false))
    }

    async fn sweep(&self) -> Result<usize, AuthError> {
        Ok(self.sweep_expired())
    }
}
