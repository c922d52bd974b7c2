use axum::{
    extract::{Path, State, WebSocketUpgrade, ws::{Message, WebSocket}},
    response::Response,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use robolink_services::ParticipantRole;
use robolink_services::membership::JoinRequest;
use robolink_services::robotics::{RoboticsClientMessage, RoboticsRoom, RoboticsServerMessage};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::state::AppState;

use super::dispatcher;
use super::storage::WsSender;

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Path((workspace_id, room_id)): Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, workspace_id, room_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, workspace_id: String, room_id: String) {
    let (sender, mut receiver) = socket.split();
    let sender: WsSender = Arc::new(Mutex::new(sender));

    // Handshake: the first frame must be the type-less Join record.
    let Some(first) = next_text_frame(&mut receiver).await else {
        return;
    };

    let join: JoinRequest = match serde_json::from_str(&first) {
        Ok(join) => join,
        Err(e) => {
            debug!(%e, "malformed join message");
            dispatcher::send_raw(
                &sender,
                &RoboticsServerMessage::error("Invalid join message", Some("INVALID_JOIN")),
            )
            .await;
            dispatcher::close_channel(&sender).await;
            return;
        }
    };

    if join.participant_id.is_empty() {
        dispatcher::send_raw(
            &sender,
            &RoboticsServerMessage::error("Invalid join message", Some("INVALID_JOIN")),
        )
        .await;
        dispatcher::close_channel(&sender).await;
        return;
    }

    let Some(room) = state.robotics.get(&workspace_id, &room_id) else {
        dispatcher::send_raw(
            &sender,
            &RoboticsServerMessage::error("Room not found", Some("NOT_FOUND")),
        )
        .await;
        dispatcher::close_channel(&sender).await;
        return;
    };

    let participant_id = join.participant_id.clone();
    let role = join.role;

    if let Err(e) = room.join(&participant_id, role) {
        warn!(%workspace_id, %room_id, %participant_id, %e, "join rejected");
        dispatcher::send_raw(
            &sender,
            &RoboticsServerMessage::error("Cannot join room", Some("JOIN_REJECTED")),
        )
        .await;
        dispatcher::close_channel(&sender).await;
        return;
    }

    if !state.robotics_conns.insert(
        &participant_id,
        Arc::clone(&sender),
        &workspace_id,
        &room_id,
        role,
    ) {
        // The id is live elsewhere in the service; undo the room join.
        room.leave(&participant_id);
        warn!(%participant_id, "participant id already connected");
        dispatcher::send_raw(
            &sender,
            &RoboticsServerMessage::error("Cannot join room", Some("JOIN_REJECTED")),
        )
        .await;
        dispatcher::close_channel(&sender).await;
        return;
    }

    info!(%workspace_id, %room_id, %participant_id, role = role.as_str(), "robotics participant connected");

    // Consumers get the authoritative snapshot before anything else.
    if role == ParticipantRole::Consumer {
        let sync = RoboticsServerMessage::StateSync {
            data: room.joints_snapshot(),
            timestamp: Utc::now(),
        };
        dispatcher::send_to(&state.robotics_conns, &participant_id, &sync).await;
    }

    let joined = RoboticsServerMessage::Joined {
        workspace_id: workspace_id.clone(),
        room_id: room_id.clone(),
        role,
        timestamp: Utc::now(),
    };
    dispatcher::send_to(&state.robotics_conns, &participant_id, &joined).await;

    let announcement = RoboticsServerMessage::ParticipantJoined {
        participant_id: participant_id.clone(),
        role,
        timestamp: Utc::now(),
    };
    let failed = dispatcher::broadcast(
        &state.robotics_conns,
        &room.peers_except(&participant_id),
        &announcement,
    )
    .await;
    super::evict_unreachable(&state.robotics_conns, room.as_ref(), failed, participant_left).await;

    // Message loop.
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                state.robotics_conns.touch(&participant_id);
                handle_message(&state, &room, &participant_id, role, &text).await;
            }
            Ok(Message::Ping(data)) => {
                let mut guard = sender.lock().await;
                let _ = guard.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!(%participant_id, %e, "websocket error");
                break;
            }
            _ => {}
        }
    }

    // Cleanup runs for every exit path: detach, free the slot, tell peers.
    state.robotics_conns.remove(&participant_id);
    if let Some(role) = room.leave(&participant_id) {
        let left = participant_left(&participant_id, role);
        let failed =
            dispatcher::broadcast(&state.robotics_conns, &room.all_participants(), &left).await;
        super::evict_unreachable(&state.robotics_conns, room.as_ref(), failed, participant_left)
            .await;
    }

    info!(%workspace_id, %room_id, %participant_id, "robotics participant disconnected");
}

async fn handle_message(
    state: &AppState,
    room: &Arc<RoboticsRoom>,
    participant_id: &str,
    role: ParticipantRole,
    text: &str,
) {
    let msg: RoboticsClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(%participant_id, %e, "unrecognized robotics message");
            dispatcher::send_to(
                &state.robotics_conns,
                participant_id,
                &RoboticsServerMessage::error("Unknown message type", Some("INVALID_MESSAGE")),
            )
            .await;
            return;
        }
    };

    match msg {
        RoboticsClientMessage::JointUpdate { data } => {
            if role != ParticipantRole::Producer {
                warn!(%participant_id, "joint update from non-producer rejected");
                dispatcher::send_to(
                    &state.robotics_conns,
                    participant_id,
                    &RoboticsServerMessage::error(
                        "Only the producer can send joint updates",
                        Some("FORBIDDEN"),
                    ),
                )
                .await;
                return;
            }

            let delta = room.apply_joint_update(&data);
            if delta.is_empty() {
                return;
            }

            let update = RoboticsServerMessage::JointUpdate {
                data: delta,
                source: participant_id.to_string(),
                timestamp: Utc::now(),
            };
            let failed =
                dispatcher::broadcast(&state.robotics_conns, &room.consumers(), &update).await;
            super::evict_unreachable(&state.robotics_conns, room.as_ref(), failed, participant_left)
                .await;
        }

        RoboticsClientMessage::Heartbeat => {
            dispatcher::send_to(
                &state.robotics_conns,
                participant_id,
                &RoboticsServerMessage::HeartbeatAck {
                    timestamp: Utc::now(),
                },
            )
            .await;
        }

        RoboticsClientMessage::EmergencyStop { reason } => {
            warn!(%participant_id, ?reason, "emergency stop");
            room.touch();
            let stop = RoboticsServerMessage::EmergencyStop {
                reason,
                source: participant_id.to_string(),
                timestamp: Utc::now(),
            };
            // Producer and every consumer, the sender included.
            let failed =
                dispatcher::broadcast(&state.robotics_conns, &room.all_participants(), &stop).await;
            super::evict_unreachable(&state.robotics_conns, room.as_ref(), failed, participant_left)
                .await;
        }
    }
}

pub(crate) fn participant_left(participant_id: &str, role: ParticipantRole) -> RoboticsServerMessage {
    RoboticsServerMessage::ParticipantLeft {
        participant_id: participant_id.to_string(),
        role,
        timestamp: Utc::now(),
    }
}

/// Reads frames until the first text payload; control frames are skipped.
/// Returns `None` when the peer goes away first.
async fn next_text_frame(
    receiver: &mut futures::stream::SplitStream<WebSocket>,
) -> Option<String> {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => return Some(text.to_string()),
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => return None,
        }
    }
    None
}
