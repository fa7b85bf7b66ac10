use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health — liveness probe, returns hub counters.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let hub = &state.hub;
    Json(json!({
        "status": if hub.is_running() { "ok" } else { "stopping" },
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": state.started_at.to_rfc3339(),
        "rooms": hub.room_count(),
        "connections": hub.total_connections(),
        "broadcasts_dispatched": hub.stats().dispatched(),
        "broadcasts_dropped": hub.stats().dropped(),
        "slow_consumers": hub.stats().slow_consumers(),
        "mailbox_capacity": state.config.hub.mailbox_capacity,
    }))
}
