use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use formpulse_core::config::MAX_INBOUND_FRAME_BYTES;
use formpulse_hub::{Client, RoomKey};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::ws::transport;

/// Axum handler — upgrades HTTP to WebSocket at GET /ws/forms/{form_id}.
///
/// The form id is validated before the upgrade so a malformed id never costs
/// a socket: 400 for a bad id, 426 when the request is not an upgrade.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let room_key = match RoomKey::normalize(&form_id) {
        Ok(key) => key,
        Err(e) => {
            warn!(form_id = %form_id, "rejecting connection with malformed form id");
            return crate::http::forms::api_error(&e).into_response();
        }
    };

    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            debug!(form_id = %room_key, %rejection, "not a websocket upgrade");
            return (
                StatusCode::UPGRADE_REQUIRED,
                Json(json!({"error": "websocket upgrade required"})),
            )
                .into_response();
        }
    };

    ws.max_message_size(MAX_INBOUND_FRAME_BYTES)
        .on_upgrade(move |socket| run_connection(socket, room_key, state))
}

/// Hand the upgraded socket to the hub; the pumps take it from there.
async fn run_connection(socket: WebSocket, room_key: RoomKey, state: Arc<AppState>) {
    let client = Client::new(room_key, transport::from_socket(socket));
    let client_id = client.id();
    let form_id = client.room_key().clone();

    match state.hub.register(client).await {
        Ok(_) => info!(client_id = %client_id, form_id = %form_id, "new WS connection"),
        // dropping the client closes the socket
        Err(e) => warn!(client_id = %client_id, form_id = %form_id, error = %e, "hub refused connection"),
    }
}
