use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the social-connect service.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // ── Caller Errors ───────────────────────────────────────────────────
    #[error("Authentication required")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("No {0} connection")]
    NotConnected(String),

    // ── Configuration ───────────────────────────────────────────────────
    #[error("{0} is not configured")]
    NotConfigured(String),

    // ── Upstream Errors ─────────────────────────────────────────────────
    #[error("OAuth provider error: {0}")]
    ProviderError(String),

    #[error("{service} did not respond in time")]
    UpstreamTimeout { service: String },

    #[error("Aggregator error: {0}")]
    Aggregator(String),

    // ── Storage / Crypto ────────────────────────────────────────────────
    #[error("User {0} not found")]
    UserNotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Crypto error: {0}")]
    CryptoError(String),

    // ── Internal ────────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Classify a transport error from an outbound call.
    pub fn upstream(service: &str, e: reqwest::Error) -> Self {
        Self::upstream_as(service, e, AuthError::ProviderError)
    }

    /// Classify a transport failure. Timeouts stay distinguishable; anything else goes through `wrap`.
    pub fn upstream_as(service: &str, e: reqwest::Error, wrap: fn(String) -> AuthError) -> Self {
        if e.is_timeout() {
            AuthError::UpstreamTimeout {
                service: service.to_string(),
            }
        } else {
            wrap(format!("{service} request failed: {e}"))
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AuthError::UpstreamTimeout { .. })
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        // 23503: foreign_key_violation, the owning user row is gone
        if let sqlx::Error::Database(db) = &e {
            if db.code().as_deref() == Some("23503") {
                return AuthError::UserNotFound(db.message().to_string());
            }
        }
        tracing::error!("Database error: {e}");
        AuthError::Database(e.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        AuthError::Internal(e.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AuthError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AuthError::UnsupportedPlatform(_) => (StatusCode::NOT_FOUND, "unsupported_platform"),
            AuthError::NotConnected(_) => (StatusCode::NOT_FOUND, "not_connected"),
            AuthError::NotConfigured(_) => (StatusCode::SERVICE_UNAVAILABLE, "not_configured"),
            AuthError::ProviderError(_) => (StatusCode::BAD_GATEWAY, "provider_error"),
            AuthError::UpstreamTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout"),
            AuthError::Aggregator(_) => (StatusCode::BAD_GATEWAY, "aggregator_error"),
            AuthError::UserNotFound(_) => (StatusCode::NOT_FOUND, "user_not_found"),
            AuthError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AuthError::Encryption(_) => (StatusCode::INTERNAL_SERVER_ERROR, "encryption_error"),
            AuthError::Decryption(_) => (StatusCode::INTERNAL_SERVER_ERROR, "decryption_error"),
            AuthError::CryptoError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "crypto_error"),
            AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
