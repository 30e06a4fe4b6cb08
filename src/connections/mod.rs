//! Direct connections: one decrypted view per (user, canonical platform).

mod registry;

pub use registry::{ConnectionRegistry, SocialConnection, ValidCredential};
