pub mod channels;
pub mod data;
pub mod energy;
pub mod error;
pub mod health;
pub mod live;
pub mod relay;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{auth::BearerToken, controller::AppState};

pub fn router(state: AppState) -> Router {
    let cfg = state.cfg.clone();
    let token = BearerToken::new(&cfg.auth.token);

    let api = Router::new()
        .route("/data/solar", post(data::ingest_solar))
        .route("/data/latest", get(data::latest))
        .route("/data/history", get(data::history))
        .route("/channels/available", post(channels::available))
        .route("/channels/optimal", post(channels::optimal))
        .route("/relay/status", get(relay::status))
        .route("/relay/control", post(relay::control))
        .route("/relay/reset", post(relay::reset))
        .route("/energy/predict", post(energy::predict))
        .route("/ws", get(live::subscribe))
        .route_layer(axum::middleware::from_fn_with_state(
            token,
            crate::auth::require_bearer,
        ))
        .route("/healthz", get(health::healthz))
        .with_state(state);

    let mut router = Router::new().nest("/api", api);

    if cfg.server.enable_cors {
        use tower_http::cors::Any;
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ]);
        router = router.layer(cors);
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    Duration::from_secs(cfg.server.request_timeout_secs),
                )),
        )
        .layer(TraceLayer::new_for_http())
}
