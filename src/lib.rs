pub mod aggregator;
pub mod api;
pub mod config;
pub mod connections;
pub mod crypto;
pub mod error;
pub mod linking;
pub mod platform;
pub mod providers;
pub mod store;
pub mod tickets;

pub use config::Config;
pub use error::AuthError;
pub use platform::Platform;

use std::sync::Arc;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub tickets: Arc<dyn tickets::TicketStore>,
    pub connections: connections::ConnectionRegistry,
    pub providers: providers::ProviderRegistry,
    /// `None` when no aggregator is configured.
    pub aggregator: Option<Arc<dyn aggregator::AggregatorGateway>>,
}

pub type SharedState = Arc<AppState>;
