//! Pending-authorization tickets (the OAuth `state` parameter).
//!
//! A ticket is minted at initiate, survives the browser round trip to the
//! identity provider, and is consumed exactly once by the callback. Expired
//! tickets are evicted by [`sweep_daemon`] and lazily on every insert.

pub mod memory;
pub mod sweep;

pub use memory::MemoryTicketStore;
pub use sweep::sweep_daemon;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::AuthError;
use crate::platform::Platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationTicket {
    pub token: String,
    pub user_id: String,
    pub platform: Platform,
    pub issued_at: DateTime<Utc>,
    /// PKCE verifier for providers that require it. Never leaves the server.
    pub pkce_verifier: Option<String>,
}

impl AuthorizationTicket {
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        now - self.issued_at >= ttl
    }
}

/// Keyed, TTL-bounded, take-once store of authorization tickets.
///
/// `take` must be a single atomic check-and-remove: of two concurrent takes
/// (or a take racing the sweep) exactly one observes the ticket.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Mint a ticket for (user, platform), invalidating any earlier outstanding one.
    async fn issue(
        &self,
        user_id: &str,
        platform: Platform,
        pkce_verifier: Option<String>,
    ) -> Result<AuthorizationTicket, AuthError>;

    /// Atomically remove and return the ticket. Expired tickets are removed and reported as absent.
    async fn take(&self, token: &str) -> Result<Option<AuthorizationTicket>, AuthError>;

    /// Whether a live ticket exists. Does not consume it.
    async fn contains(&self, token: &str) -> Result<bool, AuthError>;

    /// Evict every expired ticket. Returns how many were removed.
    async fn sweep(&self) -> Result<usize, AuthError>;
}
