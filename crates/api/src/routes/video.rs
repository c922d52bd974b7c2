use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use robolink_services::RegistryRoom;
use robolink_services::video::{RoomSummary, SignalRequest, VideoConfig, VideoRoom, signaling};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::ApiError, state::AppState, ws};

#[derive(Debug, Default, Deserialize)]
pub struct CreateRoomRequest {
    pub room_id: Option<String>,
    pub config: Option<VideoConfig>,
    pub recovery_config: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub workspace_id: String,
    pub room_id: String,
}

pub async fn create(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    body: Bytes,
) -> Result<Json<CreateRoomResponse>, ApiError> {
    let body: CreateRoomRequest = if body.is_empty() {
        CreateRoomRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?
    };

    let CreateRoomRequest {
        room_id,
        config,
        recovery_config,
    } = body;

    let room = state.video.create_with(Some(workspace_id), room_id, |w, r| {
        VideoRoom::with_config(w, r, config, recovery_config)
    })?;

    Ok(Json(CreateRoomResponse {
        workspace_id: room.workspace_id().to_string(),
        room_id: room.room_id().to_string(),
    }))
}

pub async fn list(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
) -> Json<serde_json::Value> {
    let rooms: Vec<RoomSummary> = state
        .video
        .list(&workspace_id)
        .iter()
        .map(|room| room.summary())
        .collect();

    Json(serde_json::json!({
        "workspace_id": workspace_id,
        "rooms": rooms,
        "total": rooms.len(),
    }))
}

pub async fn info(
    State(state): State<AppState>,
    Path((workspace_id, room_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let room = state
        .video
        .get(&workspace_id, &room_id)
        .ok_or_else(|| ApiError::NotFound(format!("Room {room_id} not found")))?;

    Ok(Json(serde_json::json!({ "room": room.summary() })))
}

pub async fn room_state(
    State(state): State<AppState>,
    Path((workspace_id, room_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let room = state
        .video
        .get(&workspace_id, &room_id)
        .ok_or_else(|| ApiError::NotFound(format!("Room {room_id} not found")))?;

    Ok(Json(serde_json::json!({ "state": room.state() })))
}

pub async fn remove(
    State(state): State<AppState>,
    Path((workspace_id, room_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.delete_video_room(&workspace_id, &room_id).await {
        Ok(Json(serde_json::json!({
            "success": true,
            "message": format!("Room {room_id} deleted"),
        })))
    } else {
        Err(ApiError::NotFound(format!("Room {room_id} not found")))
    }
}

/// WebRTC signaling ingress: address-forwards the payload to the named
/// counterpart's channel. A vanished target is dropped without informing
/// the sender; negotiations routinely race reconnects.
pub async fn signal(
    State(state): State<AppState>,
    Path((workspace_id, room_id)): Path<(String, String)>,
    Json(body): Json<SignalRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let room = state
        .video
        .get(&workspace_id, &room_id)
        .ok_or_else(|| ApiError::NotFound(format!("Room {room_id} not found")))?;

    room.touch();

    if let Some((target, record)) = signaling::route_signal(&room, &body.client_id, body.message)? {
        let targets = [target];
        let failed = ws::dispatcher::broadcast(&state.video_conns, &targets, &record).await;
        ws::evict_unreachable(
            &state.video_conns,
            room.as_ref(),
            failed,
            ws::video::participant_left,
        )
        .await;
    }

    Ok(Json(serde_json::json!({ "success": true })))
}
