//! End-to-end linking scenarios driven through the HTTP router, with the
//! identity provider and aggregator replaced by mock servers.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::Engine as _;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use social_connect::aggregator::{AggregatorGateway, HttpAggregator};
use social_connect::connections::ConnectionRegistry;
use social_connect::crypto::CryptoEngine;
use social_connect::providers::{GoogleProvider, ProviderEndpoints, ProviderRegistry};
use social_connect::store::MemoryTokenVault;
use social_connect::tickets::MemoryTicketStore;
use social_connect::{api, AppState, Config, SharedState};

const USER: &str = "user-42";

fn engine() -> CryptoEngine {
    let key = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
    CryptoEngine::new(&key).unwrap()
}

async fn google_mock() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=good-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.live",
            "refresh_token": "1//refresh",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/channels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": "UC-ada",
                "snippet": {"title": "Cooking With Ada"}
            }]
        })))
        .mount(&server)
        .await;
    server
}

fn google(server: &MockServer) -> GoogleProvider {
    GoogleProvider::new("gid".into(), "gsecret".into(), Duration::from_secs(2)).with_endpoints(
        ProviderEndpoints {
            authorize: format!("{}/auth", server.uri()),
            token: format!("{}/token", server.uri()),
            profile: format!("{}/youtube/v3/channels", server.uri()),
            revoke: format!("{}/revoke", server.uri()),
        },
    )
}

fn build_state(
    providers: ProviderRegistry,
    aggregator: Option<Arc<dyn AggregatorGateway>>,
    ticket_ttl: Duration,
) -> SharedState {
    let config = Config::for_tests();
    Arc::new(AppState {
        tickets: Arc::new(MemoryTicketStore::new(ticket_ttl)),
        connections: ConnectionRegistry::new(Arc::new(MemoryTokenVault::new()), engine()),
        config,
        providers,
        aggregator,
    })
}

fn authed(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-internal-secret", "test-secret")
        .header("x-user-id", USER)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn callback(app: &Router, platform: &str, query: &str) -> String {
    let resp = app
        .clone()
        .oneshot(
            Request::get(format!("/v1/social/callback/{platform}?{query}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    resp.headers()[header::LOCATION].to_str().unwrap().to_string()
}

async fn initiate_ticket(app: &Router, platform: &str) -> String {
    let (status, body) = json_body(
        app,
        authed(Method::POST, &format!("/v1/social/connect/{platform}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["usesDirectOAuth"], true);

    let url = url::Url::parse(body["data"]["authorizationUrl"].as_str().unwrap()).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

fn status_of<'a>(body: &'a Value, platform: &str) -> &'a Value {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["platform"] == platform)
        .unwrap()
}

#[tokio::test]
async fn youtube_forged_then_genuine_then_replayed() {
    let server = google_mock().await;
    let mut providers = ProviderRegistry::new();
    providers.register(Box::new(google(&server)));
    let state = build_state(providers, None, Duration::from_secs(600));
    let app = api::router(state.clone());

    let ticket = initiate_ticket(&app, "youtube").await;
    assert!(state.tickets.contains(&ticket).await.unwrap());

    // Forged ticket: rejected, genuine ticket untouched
    let location = callback(&app, "youtube", "code=good-code&state=not-a-real-ticket").await;
    assert!(location.ends_with("?error=invalid_state&platform=youtube"));
    assert!(state.tickets.contains(&ticket).await.unwrap());

    // Genuine ticket: linked and consumed
    let location = callback(&app, "youtube", &format!("code=good-code&state={ticket}")).await;
    assert!(location.ends_with("?connected=youtube&account=Cooking+With+Ada"));
    assert!(!state.tickets.contains(&ticket).await.unwrap());

    let (status, body) = json_body(&app, authed(Method::GET, "/v1/social/status")).await;
    assert_eq!(status, StatusCode::OK);
    let yt = status_of(&body, "youtube");
    assert_eq!(yt["connected"], true);
    assert_eq!(yt["source"], "direct");
    assert_eq!(yt["status"], "active");
    assert_eq!(yt["username"], "Cooking With Ada");

    // Replay of the consumed ticket
    let location = callback(&app, "youtube", &format!("code=good-code&state={ticket}")).await;
    assert!(location.contains("error=invalid_state"));

    // The stored credential is usable downstream
    let (status, body) = json_body(&app, authed(Method::GET, "/v1/social/token/yt")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["accessToken"], "ya29.live");
    assert_eq!(body["data"]["refreshed"], false);
}

#[tokio::test]
async fn rejected_exchange_reports_token_exchange_failed() {
    let server = google_mock().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;
    let mut providers = ProviderRegistry::new();
    providers.register(Box::new(google(&server)));
    let state = build_state(providers, None, Duration::from_secs(600));
    let app = api::router(state);

    let ticket = initiate_ticket(&app, "youtube").await;
    let location = callback(&app, "youtube", &format!("code=stale-code&state={ticket}")).await;
    assert!(location.contains("error=token_exchange_failed"));
}

#[tokio::test]
async fn expired_ticket_is_rejected() {
    let server = google_mock().await;
    let mut providers = ProviderRegistry::new();
    providers.register(Box::new(google(&server)));
    let state = build_state(providers, None, Duration::from_millis(50));
    let app = api::router(state);

    let ticket = initiate_ticket(&app, "youtube").await;
    tokio::time::sleep(Duration::from_millis(120)).await;

    let location = callback(&app, "youtube", &format!("code=good-code&state={ticket}")).await;
    assert!(location.contains("error=invalid_state"));
}

#[tokio::test]
async fn disconnect_never_connected_platform() {
    let state = build_state(ProviderRegistry::new(), None, Duration::from_secs(600));
    let app = api::router(state);

    let (status, body) = json_body(
        &app,
        authed(Method::DELETE, "/v1/social/connections/tiktok"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["success"], true);

    let (_, body) = json_body(&app, authed(Method::GET, "/v1/social/status")).await;
    let tiktok = status_of(&body, "tiktok");
    assert_eq!(tiktok["connected"], false);
    assert_eq!(tiktok["status"], "disconnected");
    assert!(tiktok["source"].is_null());
}

#[tokio::test]
async fn direct_connection_outranks_aggregator() {
    let google_server = google_mock().await;
    let aggregator_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/profiles/{USER}/accounts")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accounts": [
                {"platform": "youtube", "username": "agg-youtube"},
                {"platform": "ig", "username": "agg-insta", "linkedAt": "2024-05-01T12:00:00Z"}
            ]
        })))
        .mount(&aggregator_server)
        .await;

    let mut providers = ProviderRegistry::new();
    providers.register(Box::new(google(&google_server)));
    let aggregator = HttpAggregator::new(aggregator_server.uri(), "agg-key".into(), Duration::from_secs(2));
    let state = build_state(providers, Some(Arc::new(aggregator)), Duration::from_secs(600));
    let app = api::router(state);

    let ticket = initiate_ticket(&app, "youtube").await;
    callback(&app, "youtube", &format!("code=good-code&state={ticket}")).await;

    let (_, body) = json_body(&app, authed(Method::GET, "/v1/social/status")).await;
    let yt = status_of(&body, "youtube");
    assert_eq!(yt["source"], "direct");
    assert_eq!(yt["username"], "Cooking With Ada");

    let ig = status_of(&body, "instagram");
    assert_eq!(ig["connected"], true);
    assert_eq!(ig["source"], "aggregator");
    assert_eq!(ig["username"], "agg-insta");
    assert!(ig["connectedAt"].is_string());
}

#[tokio::test]
async fn aggregator_handles_platforms_without_adapter() {
    let aggregator_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/profiles/{USER}/connect-url")))
        .and(body_string_contains("\"platform\":\"linkedin\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": "https://agg.example/link/li"})))
        .mount(&aggregator_server)
        .await;

    let aggregator = HttpAggregator::new(aggregator_server.uri(), "agg-key".into(), Duration::from_secs(2));
    let state = build_state(ProviderRegistry::new(), Some(Arc::new(aggregator)), Duration::from_secs(600));
    let app = api::router(state);

    let (status, body) = json_body(&app, authed(Method::POST, "/v1/social/connect/linkedin")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["usesDirectOAuth"], false);
    assert_eq!(body["data"]["authorizationUrl"], "https://agg.example/link/li");
}
