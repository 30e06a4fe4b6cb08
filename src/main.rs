use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use social_connect::aggregator::{AggregatorGateway, HttpAggregator};
use social_connect::connections::ConnectionRegistry;
use social_connect::crypto::CryptoEngine;
use social_connect::providers::{self, ProviderRegistry};
use social_connect::store::PgTokenVault;
use social_connect::tickets::{sweep_daemon, MemoryTicketStore, TicketStore};
use social_connect::{api, AppState, Config, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "social_connect=info".into()),
        )
        .init();

    // Load config
    let config = Config::from_env()?;
    info!("social-connect v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}:{}", config.host, config.port);

    // Initialize components
    let crypto = CryptoEngine::new(&config.master_key)?;
    let vault = PgTokenVault::new(&config.database_url).await?;
    vault.migrate().await?;
    info!("Database connected and migrated");

    let mut registry = ProviderRegistry::new();
    providers::register_defaults(&mut registry, &config);
    info!("Registered {} direct OAuth adapters", registry.count());

    let aggregator: Option<Arc<dyn AggregatorGateway>> = match HttpAggregator::from_config(&config) {
        Some(client) => {
            info!("Aggregator fallback enabled");
            Some(Arc::new(client))
        }
        None => {
            warn!("No aggregator configured; platforms without a direct adapter cannot be linked");
            None
        }
    };

    let tickets: Arc<dyn TicketStore> = Arc::new(MemoryTicketStore::new(config.ticket_ttl));

    // Build shared state
    let state: SharedState = Arc::new(AppState {
        config: config.clone(),
        tickets: tickets.clone(),
        connections: ConnectionRegistry::new(Arc::new(vault), crypto),
        providers: registry,
        aggregator,
    });

    // Start ticket sweep daemon
    tokio::spawn(sweep_daemon(tickets, config.ticket_sweep_interval));

    // Build router
    let app = api::router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server ready");
    axum::serve(listener, app).await?;

    Ok(())
}
