//! The account-linking flows: initiate, callback, status and disconnect.
//!
//! Handlers here take the shared [`AppState`](crate::AppState) and return
//! plain values; the HTTP layer in `api` only extracts and serializes.

pub mod callback;
pub mod disconnect;
pub mod initiate;
pub mod status;

pub use callback::{CallbackFailure, CallbackOutcome, CallbackParams};
pub use disconnect::disconnect;
pub use initiate::{initiate, Authorization};
pub use status::{collect as collect_status, ConnectionStatus, PlatformStatus, StatusSource};

use crate::error::AuthError;
use crate::platform::Platform;

pub(crate) fn resolve_platform(raw: &str) -> Result<Platform, AuthError> {
    Platform::canonicalize(raw).ok_or_else(|| AuthError::UnsupportedPlatform(raw.to_string()))
}
