//! OAuth callback: redeem the ticket, exchange the code, resolve the linked
//! account and commit it. Every outcome is a redirect back to the client app.

use chrono::Utc;
use serde::Deserialize;
use std::time::Instant;
use tracing::{info, warn};

use crate::connections::SocialConnection;
use crate::error::AuthError;
use crate::platform::Platform;
use crate::AppState;

/// Query parameters the identity provider appends to the redirect.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackFailure {
    /// The user or provider declined; carries the provider's error code.
    Denied(String),
    MissingParameters,
    InvalidState,
    TokenExchangeFailed,
    NoChannel,
    UserNotFound,
    CallbackFailed,
}

impl CallbackFailure {
    pub fn code(&self) -> &str {
        match self {
            CallbackFailure::Denied(code) => code,
            CallbackFailure::MissingParameters => "missing_parameters",
            CallbackFailure::InvalidState => "invalid_state",
            CallbackFailure::TokenExchangeFailed => "token_exchange_failed",
            CallbackFailure::NoChannel => "no_channel",
            CallbackFailure::UserNotFound => "user_not_found",
            CallbackFailure::CallbackFailed => "callback_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Connected {
        platform: Platform,
        account_name: String,
    },
    Failed {
        /// Canonical tag when the route platform resolved, the raw segment otherwise.
        platform: String,
        failure: CallbackFailure,
    },
}

impl CallbackOutcome {
    /// Client-app URL for this outcome, carrying the result as query parameters.
    pub fn redirect_url(&self, return_url: &str) -> String {
        let pairs: Vec<(&str, &str)> = match self {
            CallbackOutcome::Connected {
                platform,
                account_name,
            } => vec![("connected", platform.as_str()), ("account", account_name.as_str())],
            CallbackOutcome::Failed { platform, failure } => {
                vec![("error", failure.code()), ("platform", platform.as_str())]
            }
        };

        match url::Url::parse(return_url) {
            Ok(mut url) => {
                url.query_pairs_mut().extend_pairs(pairs);
                url.to_string()
            }
            Err(_) => {
                let query: String = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs)
                    .finish();
                let sep = if return_url.contains('?') { '&' } else { '?' };
                format!("{return_url}{sep}{query}")
            }
        }
    }
}

/// Run the callback for the route segment `platform`.
pub async fn handle(state: &AppState, platform: &str, params: CallbackParams) -> CallbackOutcome {
    let Some(canonical) = Platform::canonicalize(platform) else {
        return fail(platform, CallbackFailure::CallbackFailed);
    };

    match run(state, canonical, params).await {
        Ok(account_name) => CallbackOutcome::Connected {
            platform: canonical,
            account_name,
        },
        Err(failure) => fail(canonical.as_str(), failure),
    }
}

fn fail(platform: &str, failure: CallbackFailure) -> CallbackOutcome {
    warn!("{platform} callback failed: {}", failure.code());
    CallbackOutcome::Failed {
        platform: platform.to_string(),
        failure,
    }
}

async fn run(
    state: &AppState,
    platform: Platform,
    params: CallbackParams,
) -> Result<String, CallbackFailure> {
    // The only consumption point: whatever happens next, this ticket is spent.
    let ticket = match params.state.as_deref() {
        Some(token) => state.tickets.take(token).await.map_err(|e| {
            warn!("Ticket lookup failed: {e}");
            CallbackFailure::CallbackFailed
        })?,
        None => None,
    };

    if let Some(error) = params.error {
        info!(
            "{platform} authorization denied: {error} {}",
            params.error_description.as_deref().unwrap_or_default()
        );
        let code = if error.trim().is_empty() {
            "access_denied".to_string()
        } else {
            error
        };
        return Err(CallbackFailure::Denied(code));
    }

    let (Some(code), Some(_)) = (params.code, params.state) else {
        return Err(CallbackFailure::MissingParameters);
    };

    let ticket = ticket.ok_or(CallbackFailure::InvalidState)?;
    if ticket.platform != platform {
        warn!(
            "Ticket issued for {} presented on the {platform} callback",
            ticket.platform
        );
        return Err(CallbackFailure::InvalidState);
    }

    let provider = state.providers.get(platform).ok_or_else(|| {
        warn!("No {platform} adapter configured for callback");
        CallbackFailure::CallbackFailed
    })?;
    let redirect_uri = state.config.callback_url(platform);

    let started = Instant::now();
    let tokens = provider
        .exchange_code(&code, &redirect_uri, ticket.pkce_verifier.as_deref())
        .await
        .map_err(|e| {
            log_upstream_error("token exchange", platform, &e, started);
            CallbackFailure::TokenExchangeFailed
        })?;

    let started = Instant::now();
    let identity = provider
        .fetch_identity(&tokens)
        .await
        .map_err(|e| {
            log_upstream_error("identity lookup", platform, &e, started);
            CallbackFailure::CallbackFailed
        })?
        .ok_or(CallbackFailure::NoChannel)?;

    let now = Utc::now();
    let expires_at = tokens.expires_at(now);
    let connection = SocialConnection {
        platform,
        account_id: identity.account_id,
        account_name: identity.account_name,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_at,
        profile: Some(identity.raw),
        connected_at: now,
    };

    state
        .connections
        .upsert(&ticket.user_id, &connection)
        .await
        .map_err(|e| match e {
            AuthError::UserNotFound(_) => CallbackFailure::UserNotFound,
            other => {
                warn!("Failed to store {platform} connection: {other}");
                CallbackFailure::CallbackFailed
            }
        })?;

    info!(
        "Linked {platform} account {} for user {}",
        connection.account_id, ticket.user_id
    );
    Ok(connection.account_name)
}

fn log_upstream_error(step: &str, platform: Platform, e: &AuthError, started: Instant) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if e.is_timeout() {
        warn!(elapsed_ms, "{platform} {step} timed out");
    } else {
        warn!(elapsed_ms, "{platform} {step} failed: {e}");
    }
}
