use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use chrono::Utc;
use robolink_services::RegistryRoom;
use robolink_services::robotics::{JointData, RoboticsRoom, RoboticsServerMessage, RoomSummary};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, state::AppState, ws};

#[derive(Debug, Default, Deserialize)]
pub struct CreateRoomRequest {
    pub room_id: Option<String>,
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
    // The body is optional; an absent or empty one means "generate the id".
    let body: CreateRoomRequest = if body.is_empty() {
        CreateRoomRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?
    };

    let room = state
        .robotics
        .create_with(Some(workspace_id), body.room_id, RoboticsRoom::new)?;

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
        .robotics
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
        .robotics
        .get(&workspace_id, &room_id)
        .ok_or_else(|| ApiError::NotFound(format!("Room {room_id} not found")))?;

    Ok(Json(serde_json::json!({ "room": room.summary() })))
}

pub async fn room_state(
    State(state): State<AppState>,
    Path((workspace_id, room_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let room = state
        .robotics
        .get(&workspace_id, &room_id)
        .ok_or_else(|| ApiError::NotFound(format!("Room {room_id} not found")))?;

    Ok(Json(serde_json::json!({ "state": room.state() })))
}

pub async fn remove(
    State(state): State<AppState>,
    Path((workspace_id, room_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.delete_robotics_room(&workspace_id, &room_id).await {
        Ok(Json(serde_json::json!({
            "success": true,
            "message": format!("Room {room_id} deleted"),
        })))
    } else {
        Err(ApiError::NotFound(format!("Room {room_id} not found")))
    }
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub joints: Vec<JointData>,
}

/// Out-of-band joint injection for operational tooling. Bypasses the
/// producer-role check by design but runs the same state-delta path, so
/// consumers cannot tell the source apart by behavior.
pub async fn command(
    State(state): State<AppState>,
    Path((workspace_id, room_id)): Path<(String, String)>,
    Json(body): Json<CommandRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let room = state
        .robotics
        .get(&workspace_id, &room_id)
        .ok_or_else(|| ApiError::NotFound(format!("Room {room_id} not found")))?;

    let delta = room.apply_joint_update(&body.joints);
    let changed = delta.len();

    if !delta.is_empty() {
        let update = RoboticsServerMessage::JointUpdate {
            data: delta,
            source: "api".to_string(),
            timestamp: Utc::now(),
        };
        let failed =
            ws::dispatcher::broadcast(&state.robotics_conns, &room.consumers(), &update).await;
        ws::evict_unreachable(
            &state.robotics_conns,
            room.as_ref(),
            failed,
            ws::robotics::participant_left,
        )
        .await;
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "joints_changed": changed,
    })))
}
