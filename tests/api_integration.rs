use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use offgrid_controller::{
    api,
    config::Config,
    controller::AppState,
    hardware::SimulatedRelayTransport,
    repo::Repositories,
};

const CONFIG: &str = r#"
    [server]
    host = "127.0.0.1"
    port = 5000

    [power]
    battery_capacity_wh = 100.0
    duration_minutes = 60
    battery_protection_threshold = 20

    [power.channels]
    A = 50
    B = 30
    C = 20
    D = 10
"#;

fn app_with_token(token: &str) -> Router {
    let mut cfg = Config::from_toml_str(CONFIG).unwrap();
    cfg.auth.token = token.to_string();
    let state = AppState::from_parts(
        cfg,
        Repositories::in_memory(),
        Arc::new(SimulatedRelayTransport::new()),
        None,
    );
    api::router(state)
}

fn app() -> Router {
    app_with_token("")
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn post_reading(app: &Router, soc: f64, solar_w: f64) {
    let (status, _) = call(
        app,
        Method::POST,
        "/api/data/solar",
        Some(json!({"soc": soc, "solar_w": solar_w, "lux": 1200.0})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn healthz_is_open() {
    let app = app_with_token("s3cret");
    let (status, body) = call(&app, Method::GET, "/api/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn bearer_token_guards_api() {
    let app = app_with_token("s3cret");
    let (status, _) = call(&app, Method::GET, "/api/relay/status", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/api/relay/status")
        .header(header::AUTHORIZATION, "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

fn ws_handshake(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::CONNECTION, "upgrade")
        .header(header::UPGRADE, "websocket")
        .header(header::SEC_WEBSOCKET_VERSION, "13")
        .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn live_feed_accepts_query_token() {
    let app = app_with_token("s3cret");

    let resp = app.clone().oneshot(ws_handshake("/api/ws")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .clone()
        .oneshot(ws_handshake("/api/ws?access_token=s3cret"))
        .await
        .unwrap();
    assert_ne!(resp.status(), StatusCode::UNAUTHORIZED);

    // plain requests still need the header
    let (status, _) = call(&app, Method::GET, "/api/relay/status?access_token=s3cret", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ingest_rejects_missing_field() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/data/solar",
        Some(json!({"soc": 80.0, "lux": 300.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("solar_w"));
}

#[tokio::test]
async fn latest_reading_round_trip() {
    let app = app();
    let (status, _) = call(&app, Method::GET, "/api/data/latest", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    post_reading(&app, 64.0, 210.0).await;
    let (status, body) = call(&app, Method::GET, "/api/data/latest", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["soc"], json!(64.0));
    assert_eq!(body["solar_w"], json!(210.0));
}

#[tokio::test]
async fn decisions_without_data_are_not_found() {
    let app = app();
    let (status, _) = call(&app, Method::POST, "/api/channels/optimal", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, Method::POST, "/api/channels/available", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn optimal_combination_for_full_battery() {
    let app = app();
    post_reading(&app, 100.0, 0.0).await;

    let (status, body) = call(&app, Method::POST, "/api/channels/optimal", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channels"], json!(["A", "B", "C"]));
    assert_eq!(body["total_power_w"], json!(100.0));
}

#[tokio::test]
async fn optimal_combination_nothing_fits() {
    let app = app();
    post_reading(&app, 5.0, 0.0).await;

    let (status, body) = call(&app, Method::POST, "/api/channels/optimal", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channels"], json!([]));
    assert_eq!(body["total_power_w"], json!(0.0));
}

#[tokio::test]
async fn low_battery_denies_every_channel() {
    let app = app();
    post_reading(&app, 5.0, 500.0).await;

    let (status, body) = call(&app, Method::POST, "/api/channels/available", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"A": false, "B": false, "C": false, "D": false}));
}

#[tokio::test]
async fn threshold_override_lifts_veto() {
    let app = app();
    post_reading(&app, 5.0, 40.0).await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/channels/available?battery_protection_threshold=5",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // 5 Wh over 60 min plus 40 W of solar
    assert_eq!(body, json!({"A": false, "B": true, "C": true, "D": true}));
}

#[tokio::test]
async fn invalid_overrides_are_bad_requests() {
    let app = app();
    post_reading(&app, 80.0, 0.0).await;

    for uri in [
        "/api/channels/optimal?duration_minutes=0",
        "/api/channels/available?battery_protection_threshold=150",
        "/api/channels/available?duration_minutes=abc",
    ] {
        let (status, _) = call(&app, Method::POST, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn optimal_combination_refuses_threshold_override() {
    let app = app();
    post_reading(&app, 100.0, 0.0).await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/channels/optimal?battery_protection_threshold=5",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/channels/optimal?duration_minutes=120",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // 100 Wh over two hours leaves 50 W
    assert_eq!(body["channels"], json!(["B", "C"]));
    assert_eq!(body["total_power_w"], json!(50.0));
}

#[tokio::test]
async fn relay_control_updates_status_and_ledger() {
    let app = app();

    let (status, body) = call(&app, Method::GET, "/api/relay/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"A": false, "B": false, "C": false, "D": false}));

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/relay/control",
        Some(json!({"A": true, "B": false})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/relay/control",
        Some(json!({"A": false, "B": true, "C": true, "D": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "success");

    let (_, body) = call(&app, Method::GET, "/api/relay/status", None).await;
    assert_eq!(body, json!({"A": false, "B": true, "C": true, "D": false}));

    let (status, body) = call(&app, Method::GET, "/api/data/history?user_id=3", None).await;
    assert_eq!(status, StatusCode::OK);
    let trades = body.as_array().unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0]["buyer_id"], 3);
    assert_eq!(trades[0]["amount"], json!(20.0));

    let (status, body) = call(&app, Method::POST, "/api/relay/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!({"A": false, "B": false, "C": false, "D": false}));

    let (_, body) = call(&app, Method::GET, "/api/data/history", None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn active_relays_reduce_availability() {
    let app = app();
    post_reading(&app, 100.0, 0.0).await;
    call(
        &app,
        Method::POST,
        "/api/relay/control",
        Some(json!({"A": true, "B": true, "C": true, "D": false})),
    )
    .await;

    let (_, body) = call(&app, Method::POST, "/api/channels/available", None).await;
    assert_eq!(body, json!({"A": false, "B": false, "C": false, "D": false}));
}

#[tokio::test]
async fn history_rejects_bad_date() {
    let app = app();
    let (status, _) = call(&app, Method::GET, "/api/data/history?date=yesterday", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn forecast_without_model_is_unavailable() {
    let app = app();
    post_reading(&app, 80.0, 120.0).await;
    let (status, body) = call(&app, Method::POST, "/api/energy/predict", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "ServiceUnavailable");
}
