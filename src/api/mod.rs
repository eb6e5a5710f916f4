pub mod error;
pub mod health;
pub mod response;
pub mod schedule;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use parking_lot::Mutex;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    clock::Clock, config::Config, history::TelemetryStore, optimizer::worker::SharedState,
};

/// Read-only handles the API serves from.
#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<Mutex<SharedState>>,
    pub telemetry: Arc<dyn TelemetryStore>,
    pub clock: Arc<dyn Clock>,
}

pub fn router(state: AppState, cfg: &Config) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness_check))
        .nest(
            "/api/v1",
            Router::new()
                .route("/schedule/query", post(schedule::query_schedule))
                .route("/schedule/current", get(schedule::get_current_schedule)),
        )
        .with_state(state);

    if cfg.server.enable_cors {
        use tower_http::cors::{Any, CorsLayer};
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE]);
        router = router.layer(cors);
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    cfg.server.request_timeout_secs,
                ))),
        )
        .layer(TraceLayer::new_for_http())
}
