//! Background eviction of expired tickets.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use super::TicketStore;

/// Start the sweep loop. Runs until the process exits.
pub async fn sweep_daemon(store: Arc<dyn TicketStore>, interval: Duration) {
    info!("Ticket sweep daemon started (interval: {}s)", interval.as_secs());

    let mut ticker = tokio::time::interval(interval);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        match store.sweep().await {
            Ok(0) => {}
            Ok(n) => debug!("Swept {n} expired tickets"),
            Err(e) => error!("Ticket sweep error: {e}"),
        }
    }
}
