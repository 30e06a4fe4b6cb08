//! Token vault: durable storage of platform credentials keyed by (user, platform).
//!
//! Rows hold ciphertext only; encryption happens in the connection registry.

pub mod db;
pub mod memory;
pub mod vault;

pub use db::PgTokenVault;
pub use memory::MemoryTokenVault;
pub use vault::{StoredConnection, TokenVault};
