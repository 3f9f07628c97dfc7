//! Mini App API tests against the axum router
//!
//! Run with: cargo test --test webapp_test

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{init_data_for, manager_with, ScriptedBank, TEST_BOT_TOKEN};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use mathgame::game::MemoryScoreStore;
use mathgame::telegram::webapp::{create_webapp_router, WebAppState};

const HEADER: &str = "X-Telegram-Init-Data";

fn app() -> (TempDir, Router) {
    let static_dir = tempfile::tempdir().unwrap();
    std::fs::write(static_dir.path().join("index.html"), "<h1>quiz</h1>").unwrap();

    let (manager, _reports) = manager_with(ScriptedBank::numbered(5), Arc::new(MemoryScoreStore::new()));
    let state = WebAppState::new(manager, TEST_BOT_TOKEN).static_dir(static_dir.path());
    (static_dir, create_webapp_router(state))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post(uri: &str, init_data: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(init_data) = init_data {
        builder = builder.header(HEADER, init_data);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let (_static, app) = app();
    let (status, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_sessions"], 0);
}

#[tokio::test]
async fn test_game_endpoints_require_init_data() {
    let (_static, app) = app();

    let (status, body) = send(&app, post("/api/play", None, json!({ "topic": "school_easy" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("Missing"));

    let tampered = init_data_for(42, "Ada").replace("%22id%22%3A42", "%22id%22%3A43");
    let (status, _) = send(&app, post("/api/play", Some(&tampered), json!({ "topic": "school_easy" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get("/api/session")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_full_game_over_http() {
    let (_static, app) = app();
    let auth = init_data_for(42, "Ada");

    let (status, body) = send(&app, post("/api/play", Some(&auth), json!({ "topic": "school_easy" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "started");
    assert_eq!(body["question"]["seq"], 1);
    assert_eq!(body["question"]["prompt"], "q1 = ?");
    assert_eq!(body["question"]["time_limit_secs"], 15);

    // Playing again resumes the same session
    let (_, body) = send(&app, post("/api/play", Some(&auth), json!({ "topic": "school_medium" }))).await;
    assert_eq!(body["status"], "resumed");
    assert_eq!(body["question"]["topic"], "school_easy");

    let (_, body) = send(&app, post("/api/answer", Some(&auth), json!({ "seq": 1, "answer": 1 }))).await;
    assert_eq!(body["status"], "correct");
    assert_eq!(body["points"], 1);
    assert_eq!(body["question"]["seq"], 2);

    let (_, body) = send(&app, post("/api/answer", Some(&auth), json!({ "seq": 1, "answer": 2 }))).await;
    assert_eq!(body, json!({ "status": "ignored", "reason": "stale_question" }));

    // initData may also come in the query string
    let session_uri = format!("/api/session?initData={}", urlencoding::encode(&auth));
    let (_, body) = send(&app, get(&session_uri)).await;
    assert_eq!(body["status"], "active");
    assert_eq!(body["question"]["score"], 1);

    let (status, body) = send(&app, post("/api/stop", Some(&auth), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "completed");
    assert_eq!(body["score"], 1);
    assert_eq!(body["commit"], json!({ "status": "committed", "total": 1, "best": 1 }));

    let (status, _) = send(&app, post("/api/stop", Some(&auth), json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, get(&session_uri)).await;
    assert_eq!(body["status"], "finished");
    assert_eq!(body["report"]["score"], 1);

    let (status, body) = send(&app, get("/api/leaderboard?level=school")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "player": 42, "username": "Ada", "score": 1 }]));
}

#[tokio::test]
async fn test_wrong_answer_ends_the_game() {
    let (_static, app) = app();
    let auth = init_data_for(7, "Bob");

    send(&app, post("/api/play", Some(&auth), json!({ "topic": "uni_calculus" }))).await;
    let (_, body) = send(&app, post("/api/answer", Some(&auth), json!({ "seq": 1, "answer": 100 }))).await;

    assert_eq!(body["status"], "finished");
    assert_eq!(body["report"]["state"], "failed");
    assert_eq!(body["report"]["missed_answer"], 1);

    let (_, body) = send(&app, post("/api/answer", Some(&auth), json!({ "seq": 2, "answer": 2 }))).await;
    assert_eq!(body, json!({ "status": "ignored", "reason": "no_session" }));
}

#[tokio::test]
async fn test_long_first_name_is_shortened_on_registration() {
    let (_static, app) = app();
    let long_name = "A".repeat(40);
    let auth = init_data_for(77, &long_name);

    let (status, body) = send(&app, post("/api/play", Some(&auth), json!({ "topic": "school_easy" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "started");

    let (status, _) = send(&app, post("/api/stop", Some(&auth), json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/api/leaderboard?level=school")).await;
    assert_eq!(body[0]["player"], 77);
    assert_eq!(body[0]["username"], "A".repeat(32));
}

#[tokio::test]
async fn test_bad_requests() {
    let (_static, app) = app();
    let auth = init_data_for(9, "Cy");

    let (status, _) = send(&app, post("/api/play", Some(&auth), json!({ "topic": "mixed" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(&app, get("/api/leaderboard?level=kindergarten")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("kindergarten"));

    let (status, body) = send(&app, get("/api/leaderboard?level=uni_linalg&limit=0")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_static_files_are_served() {
    let (_static, app) = app();
    let response = app.clone().oneshot(get("/index.html")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"<h1>quiz</h1>");
}
