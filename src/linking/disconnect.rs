use tracing::{info, warn};

use super::resolve_platform;
use crate::error::AuthError;
use crate::AppState;

/// Unlink `platform` for `user_id`, revoking the provider grant when possible.
///
/// Idempotent: a platform that was never connected still succeeds. Returns the
/// number of stored rows removed.
pub async fn disconnect(state: &AppState, user_id: &str, platform: &str) -> Result<u64, AuthError> {
    let platform = resolve_platform(platform)?;

    if let Some(provider) = state.providers.get(platform) {
        match state.connections.get(user_id, platform).await {
            Ok(Some(conn)) => {
                if let Err(e) = provider.revoke(&conn.access_token).await {
                    warn!("Failed to revoke {platform} grant for user {user_id}: {e}");
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Could not load {platform} connection to revoke: {e}"),
        }
    }

    let removed = state.connections.remove(user_id, platform).await?;
    info!("Disconnected {platform} for user {user_id} ({removed} row(s))");
    Ok(removed)
}
