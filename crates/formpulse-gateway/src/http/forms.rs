//! Collaborator endpoints for an out-of-process analytics pipeline.
//!
//! `POST /forms/{form_id}/events` pushes one update into the form's room;
//! `GET /forms/{form_id}/connections` reports how many clients are watching.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use formpulse_core::error::FormpulseError;
use formpulse_hub::RoomKey;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

type ApiError = (StatusCode, Json<Value>);

/// POST /forms/{form_id}/events
///
/// Returns 202 once the update is queued, 400 for a malformed id or empty
/// type, 503 when the hub is saturated or stopped.
pub async fn publish_handler(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
    Json(req): Json<PublishRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let key = RoomKey::normalize(&form_id).map_err(|e| api_error(&e))?;

    let kind = req.kind.trim();
    if kind.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "event type must not be empty"})),
        ));
    }

    state
        .hub
        .try_broadcast(key.as_str(), kind, &req.data)
        .map_err(|e| {
            warn!(form_id = %key, kind, error = %e, "event not published");
            api_error(&e)
        })?;

    debug!(form_id = %key, kind, "event queued");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({"ok": true, "formId": key.as_str()})),
    ))
}

/// GET /forms/{form_id}/connections — 0 for unknown or malformed ids.
pub async fn connections_handler(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
) -> Json<Value> {
    let canonical = RoomKey::normalize(&form_id)
        .map(|key| key.to_string())
        .unwrap_or(form_id);
    Json(json!({
        "formId": canonical,
        "connections": state.hub.room_size(&canonical),
    }))
}

pub(crate) fn api_error(e: &FormpulseError) -> ApiError {
    let status = match e {
        FormpulseError::InvalidIdentifier { .. } => StatusCode::BAD_REQUEST,
        FormpulseError::EventQueueSaturated { .. } | FormpulseError::HubStopped => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({"error": e.to_string(), "code": e.code()})),
    )
}
