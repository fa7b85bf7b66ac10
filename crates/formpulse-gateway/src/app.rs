use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use formpulse_core::config::FormpulseConfig;
use formpulse_hub::Hub;
use std::sync::Arc;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: FormpulseConfig,
    pub hub: Hub,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: FormpulseConfig, hub: Hub) -> Self {
        Self {
            config,
            hub,
            started_at: Utc::now(),
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/ws/forms/{form_id}", get(crate::ws::connection::ws_handler))
        .route(
            "/forms/{form_id}/events",
            post(crate::http::forms::publish_handler),
        )
        .route(
            "/forms/{form_id}/connections",
            get(crate::http::forms::connections_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
