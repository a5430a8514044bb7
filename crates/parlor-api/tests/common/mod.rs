//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::TimeZone;
use http_body_util::BodyExt;
use parlor_api::routes;
use parlor_api::state::AppState;
use parlor_engine::GameConfig;
use parlor_runtime::{DeliveryPolicy, RuntimeDeps, SessionRegistry};
use parlor_test_support::{FixedClock, InMemoryStore, MockRng, ScriptedGateway};
use tower::ServiceExt;

/// The app router plus direct handles on its in-memory collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
}

/// Build the full app router over in-memory collaborators with a
/// deterministic clock and RNG. Uses the same route structure as
/// `main.rs`.
pub fn build_test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let gateway = Arc::new(ScriptedGateway::new(vec![]));
    let clock = Arc::new(FixedClock(
        chrono::Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));
    let deps = RuntimeDeps {
        store: store.clone(),
        gateway: gateway.clone(),
        clock: clock.clone(),
        rng_factory: Arc::new(|| Box::new(MockRng)),
        game: GameConfig::default(),
        delivery: DeliveryPolicy::default(),
    };
    let registry = Arc::new(SessionRegistry::new(deps));
    let state = AppState::new(registry, store.clone(), clock);

    TestApp {
        router: routes::app(state),
        store,
        gateway,
    }
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    router: &Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

/// Send a GET request and return the response.
pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

/// Creates a session owned by user 1 and returns its id as a string.
pub async fn create_session(router: &Router) -> String {
    let (status, json) = post_json(
        router,
        "/api/v1/sessions",
        &serde_json::json!({ "kind": "group", "owner": 1, "owner_name": "alice" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_str().unwrap().to_owned()
}

/// Joins user 2 and starts the game as user 1.
pub async fn start_two_player_game(router: &Router, id: &str) {
    let uri = format!("/api/v1/sessions/{id}/events");
    let (status, _) = post_json(
        router,
        &uri,
        &serde_json::json!({ "type": "join", "actor": 2, "name": "bob" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = post_json(
        router,
        &uri,
        &serde_json::json!({ "type": "start", "actor": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
