//! API route handlers for social-connect.
//!
//! All handlers receive `SharedState` via Axum state extraction. Every route
//! except the callback and health check is called service-to-service and
//! authenticated with the shared internal secret plus the acting user's id.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::crypto::secrets_match;
use crate::error::AuthError;
use crate::linking::{self, CallbackParams};
use crate::platform::Platform;
use crate::SharedState;

// =============================================================================
// V1 Router
// =============================================================================

pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        // ── Health ───────────────────────────────────────────────────────
        .route("/status", get(status))
        // ── Social linking ───────────────────────────────────────────────
        .route("/social/platforms", get(social_platforms))
        .route("/social/connect/{platform}", post(social_connect))
        .route("/social/callback/{platform}", get(social_callback))
        .route("/social/status", get(social_status))
        .route("/social/connections/{platform}", delete(social_disconnect))
        .route("/social/token/{platform}", get(social_token))
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "social-connect",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// Caller identity
// =============================================================================

/// Check the internal secret and return the acting user id.
fn require_user(state: &SharedState, headers: &HeaderMap) -> Result<String, AuthError> {
    let provided = headers
        .get("x-internal-secret")
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Unauthorized)?;

    if !secrets_match(provided, &state.config.auth_service_secret) {
        return Err(AuthError::Unauthorized);
    }

    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AuthError::BadRequest("x-user-id header is required".into()))
}

// =============================================================================
// Social Endpoints
// =============================================================================

/// GET /v1/social/platforms: Every known platform and whether it links directly.
async fn social_platforms(State(state): State<SharedState>) -> impl IntoResponse {
    let platforms: Vec<serde_json::Value> = Platform::ALL
        .into_iter()
        .map(|p| {
            json!({
                "platform": p,
                "name": p.display_name(),
                "directOAuth": state.providers.contains(p),
                "aliases": p.aliases(),
            })
        })
        .collect();
    Json(json!({ "data": platforms }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectBody {
    return_url: Option<String>,
}

/// POST /v1/social/connect/:platform: Start linking a platform.
async fn social_connect(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(platform): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AuthError> {
    let user_id = require_user(&state, &headers)?;

    // The body is optional; an empty one means "use the default return page".
    let body: Option<ConnectBody> = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(
            serde_json::from_slice(&body)
                .map_err(|e| AuthError::BadRequest(format!("invalid body: {e}")))?,
        )
    };
    let return_url = body.and_then(|b| b.return_url);

    let authorization =
        linking::initiate(&state, &user_id, &platform, return_url.as_deref()).await?;
    Ok(Json(json!({ "data": authorization })))
}

/// GET /v1/social/callback/:platform: Provider redirect target. Always redirects back to the app.
async fn social_callback(
    State(state): State<SharedState>,
    Path(platform): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let outcome = linking::callback::handle(&state, &platform, params).await;
    Redirect::temporary(&outcome.redirect_url(&state.config.return_url))
}

/// GET /v1/social/status: Per-platform connection status for the caller.
async fn social_status(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AuthError> {
    let user_id = require_user(&state, &headers)?;
    let statuses = linking::collect_status(&state, &user_id).await?;
    Ok(Json(json!({ "data": statuses })))
}

/// DELETE /v1/social/connections/:platform: Unlink a platform.
async fn social_disconnect(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(platform): Path<String>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let user_id = require_user(&state, &headers)?;
    linking::disconnect(&state, &user_id, &platform).await?;
    Ok(Json(json!({ "data": { "success": true } })))
}

/// GET /v1/social/token/:platform: A usable access token (auto-refreshes if expired).
async fn social_token(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(platform): Path<String>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let user_id = require_user(&state, &headers)?;
    let platform = Platform::canonicalize(&platform)
        .ok_or_else(|| AuthError::UnsupportedPlatform(platform.clone()))?;

    let credential = state
        .connections
        .valid_credential(&user_id, platform, state.providers.get(platform))
        .await?;
    Ok(Json(json!({ "data": credential })))
}
