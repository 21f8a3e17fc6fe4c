// Admin API Integration Test
// Drives the full router (auth middleware, role gate, handlers) over the
// seeded in-memory store

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use prepaid_meter_api::config::Config;
use prepaid_meter_api::database::seed::seed_demo_data;
use prepaid_meter_api::database::MemoryStore;
use prepaid_meter_api::router::build_router;
use prepaid_meter_api::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Helper to build the router over a freshly seeded store
async fn test_app() -> Router {
    let store = Arc::new(MemoryStore::default());
    seed_demo_data(store.as_ref(), 4).await.unwrap();

    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
    build_router(AppState::from_store(store, Config::default(), metrics_handle))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("x-session-token", token);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn login_returns_token_and_profile() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "admin@example.com", "password": "admin" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token"].as_str().unwrap().len(), 64);
    assert!(body["expiresAt"].is_string());
    assert_eq!(body["user"]["role"], "ADMIN");
    assert!(body["user"].get("password_hash").is_none());
    assert!(body["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn login_missing_fields_is_bad_request() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "admin@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "password");

    let (status, _) = send(&app, Method::POST, "/api/auth/login", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_failures_share_one_message() {
    let app = test_app().await;

    let (wrong_status, wrong) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "budi@example.com", "password": "nope" })),
    )
    .await;
    let (unknown_status, unknown) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "ghost@example.com", "password": "nope" })),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong["error"]["message"], unknown["error"]["message"]);
}

#[tokio::test]
async fn admin_routes_require_session_and_role() {
    let app = test_app().await;

    let (status, _) = send(&app, Method::GET, "/api/admin/monitoring", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/admin/monitoring",
        Some("deadbeef"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let user_token = login(&app, "budi@example.com", "user").await;
    let (status, _) = send(
        &app,
        Method::GET,
        "/api/admin/monitoring",
        Some(&user_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Non-admins can still see themselves
    let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "budi@example.com");
}

#[tokio::test]
async fn monitoring_reports_fleet_totals() {
    let app = test_app().await;
    let token = login(&app, "admin@example.com", "admin").await;

    let (status, body) = send(&app, Method::GET, "/api/admin/monitoring", Some(&token), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalKwh"].as_f64(), Some(218.8));
    assert_eq!(body["todayKwh"].as_f64(), Some(7.3));
    assert_eq!(body["activeMeterCount"], 2);
    assert_eq!(body["list"].as_array().unwrap().len(), 2);
    assert_eq!(body["list"][0]["name"], "Budi Budiman");
}

#[tokio::test]
async fn tokens_listing_is_wrapped_in_data() {
    let app = test_app().await;
    let token = login(&app, "admin@example.com", "admin").await;

    let (status, body) = send(&app, Method::GET, "/api/admin/tokens", Some(&token), None).await;

    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["meterId"], 1);
    assert_eq!(data[0]["email"], "budi@example.com");
    assert_eq!(data[1]["token"].as_f64(), Some(75000.0));
}

#[tokio::test]
async fn update_kwh_validates_and_applies() {
    let app = test_app().await;
    let token = login(&app, "admin@example.com", "admin").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/update-kwh",
        Some(&token),
        Some(json!({ "deltaKwh": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "meterId");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/admin/update-kwh",
        Some(&token),
        Some(json!({ "meterId": 1, "deltaKwh": "lots" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/admin/update-kwh",
        Some(&token),
        Some(json!({ "meterId": 1, "deltaKwh": -2 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, meter) = send(&app, Method::GET, "/api/admin/meters/1", Some(&token), None).await;
    assert_eq!(meter["currentKwh"].as_f64(), Some(120.5));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/update-kwh",
        Some(&token),
        Some(json!({ "meterId": 1, "deltaKwh": 0.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);
    assert_eq!(body["currentKwh"].as_f64(), Some(121.0));
    assert!(body["lastUpdate"].is_string());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/admin/update-kwh",
        Some(&token),
        Some(json!({ "meterId": 77, "deltaKwh": 0.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_kwh_can_record_usage() {
    let app = test_app().await;
    let token = login(&app, "admin@example.com", "admin").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/admin/update-kwh",
        Some(&token),
        Some(json!({ "meterId": 2, "deltaKwh": 0.9, "recordUsage": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, Method::GET, "/api/admin/monitoring", Some(&token), None).await;
    assert_eq!(body["todayKwh"].as_f64(), Some(8.2));
    assert_eq!(body["totalKwh"].as_f64(), Some(219.7));
}

#[tokio::test]
async fn top_up_and_history() {
    let app = test_app().await;
    let token = login(&app, "admin@example.com", "admin").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/meters/1/top-up",
        Some(&token),
        Some(json!({ "kwhAdded": 1.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["meter"]["tokenBalance"].as_f64(), Some(46500.0));
    let serial = body["token"]["tokenNumber"].as_str().unwrap().to_string();
    assert_eq!(serial.len(), 20);

    let (status, body) = send(&app, Method::GET, "/api/admin/meters/1/tokens", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["tokenNumber"], serial.as_str());
    assert_eq!(body["data"][1]["tokenNumber"], "TOKBUD1");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/admin/meters/1/top-up",
        Some(&token),
        Some(json!({ "kwhAdded": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/api/admin/meters/9/tokens", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn usage_append_and_window() {
    let app = test_app().await;
    let token = login(&app, "admin@example.com", "admin").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/meters/2/usage",
        Some(&token),
        Some(json!({ "kwhUsed": "0.4" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["kwhUsed"].as_f64(), Some(4.5));

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/admin/meters/2/usage?days=2",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["kwhUsed"].as_f64(), Some(3.7));

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/admin/meters/2/usage?days=0",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = test_app().await;
    let token = login(&app, "admin@example.com", "admin").await;

    let (status, _) = send(&app, Method::POST, "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_and_metrics_are_public() {
    let app = test_app().await;

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn oversized_quantities_are_rejected() {
    let app = test_app().await;
    let token = login(&app, "admin@example.com", "admin").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/meters/1/top-up",
        Some(&token),
        Some(json!({ "kwhAdded": 1e28 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "kwhAdded");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/update-kwh",
        Some(&token),
        Some(json!({ "meterId": 1, "deltaKwh": "79228162514264337593543950335" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "deltaKwh");

    let (_, meter) = send(&app, Method::GET, "/api/admin/meters/1", Some(&token), None).await;
    assert_eq!(meter["currentKwh"].as_f64(), Some(120.5));
    assert_eq!(meter["tokenBalance"].as_f64(), Some(45000.0));
}

#[tokio::test]
async fn error_body_echoes_request_id() {
    let app = test_app().await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/admin/monitoring")
        .header("x-request-id", "req-7f3a")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["x-request-id"], "req-7f3a");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["request_id"], "req-7f3a");
}
