//! Integration tests for the session routes: lifecycle, gameplay flow,
//! and error mapping.

mod common;

use axum::http::StatusCode;
use parlor_core::model::{Category, Level};
use serde_json::json;

#[tokio::test]
async fn test_create_session_returns_lobby_view() {
    let app = common::build_test_app();

    let (status, view) = common::post_json(
        &app.router,
        "/api/v1/sessions",
        &json!({ "kind": "group", "owner": 1, "owner_name": "alice" }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(view["status"], "lobby");
    assert_eq!(view["phase"], "lobby");
    assert_eq!(view["owner"], 1);
    assert_eq!(view["participants"].as_array().unwrap().len(), 1);
    assert_eq!(view["participants"][0]["name"], "alice");
}

#[tokio::test]
async fn test_join_and_start_make_the_owner_current() {
    let app = common::build_test_app();
    let id = common::create_session(&app.router).await;

    common::start_two_player_game(&app.router, &id).await;

    let (status, view) =
        common::get_json(&app.router, &format!("/api/v1/sessions/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "running");
    assert_eq!(view["phase"], "choose");
    assert_eq!(view["current_participant"], 1);
    assert_eq!(view["participants"][0]["turns"], 1);
}

#[tokio::test]
async fn test_pick_done_confirm_round_trip() {
    let app = common::build_test_app();
    app.store
        .seed_question(Category::Truth, Level::Normal, "What is your worst habit?");
    let id = common::create_session(&app.router).await;
    common::start_two_player_game(&app.router, &id).await;
    let uri = format!("/api/v1/sessions/{id}/events");

    let (status, view) = common::post_json(
        &app.router,
        &uri,
        &json!({ "type": "pick", "actor": 1, "category": "truth", "level": "normal" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["phase"], "question");
    assert_eq!(view["last_question"]["text"], "What is your worst habit?");

    let (status, view) = common::post_json(
        &app.router,
        &uri,
        &json!({ "type": "done", "actor": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["phase"], "wait_confirm");

    let (status, view) = common::post_json(
        &app.router,
        &uri,
        &json!({ "type": "confirm", "actor": 2, "accepted": false }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["phase"], "choose");
    assert_eq!(view["current_participant"], 2);
    assert_eq!(view["participants"][0]["penalties"], 1);
}

#[tokio::test]
async fn test_start_by_non_owner_is_forbidden() {
    let app = common::build_test_app();
    let id = common::create_session(&app.router).await;
    let uri = format!("/api/v1/sessions/{id}/events");
    common::post_json(
        &app.router,
        &uri,
        &json!({ "type": "join", "actor": 2, "name": "bob" }),
    )
    .await;

    let (status, body) = common::post_json(
        &app.router,
        &uri,
        &json!({ "type": "start", "actor": 2 }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_pick_with_empty_bank_is_conflict() {
    let app = common::build_test_app();
    let id = common::create_session(&app.router).await;
    common::start_two_player_game(&app.router, &id).await;

    let (status, body) = common::post_json(
        &app.router,
        &format!("/api/v1/sessions/{id}/events"),
        &json!({ "type": "pick", "actor": 1, "category": "truth", "level": "normal" }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "resource_exhausted");
}

#[tokio::test]
async fn test_mature_pick_with_flag_off_is_conflict() {
    let app = common::build_test_app();
    let id = common::create_session(&app.router).await;
    common::start_two_player_game(&app.router, &id).await;
    let uri = format!("/api/v1/sessions/{id}/events");

    let (status, _) = common::post_json(
        &app.router,
        &uri,
        &json!({ "type": "configure", "actor": 1, "toggle": "mature_content" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = common::post_json(
        &app.router,
        &uri,
        &json!({ "type": "pick", "actor": 1, "category": "dare", "level": "mature" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "config_disabled");
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = common::build_test_app();

    let (status, body) = common::post_json(
        &app.router,
        &format!("/api/v1/sessions/{}/events", uuid::Uuid::new_v4()),
        &json!({ "type": "start", "actor": 1 }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_events_after_end_are_gone() {
    let app = common::build_test_app();
    let id = common::create_session(&app.router).await;
    let uri = format!("/api/v1/sessions/{id}/events");

    let (status, view) = common::post_json(
        &app.router,
        &uri,
        &json!({ "type": "end", "actor": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "ended");

    let (status, body) = common::post_json(
        &app.router,
        &uri,
        &json!({ "type": "join", "actor": 5, "name": "late" }),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["error"], "session_ended");
}

#[tokio::test]
async fn test_timeout_events_are_not_accepted_from_outside() {
    let app = common::build_test_app();
    let id = common::create_session(&app.router).await;

    let (status, body) = common::post_json(
        &app.router,
        &format!("/api/v1/sessions/{id}/events"),
        &json!({ "type": "timeout", "participant": 1 }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}
