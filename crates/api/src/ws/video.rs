use axum::{
    extract::{Path, State, WebSocketUpgrade, ws::{Message, WebSocket}},
    response::Response,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use robolink_services::ParticipantRole;
use robolink_services::membership::JoinRequest;
use robolink_services::video::{VideoClientMessage, VideoRoom, VideoServerMessage};
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

    let Some(first) = next_text_frame(&mut receiver).await else {
        return;
    };

    let join: JoinRequest = match serde_json::from_str(&first) {
        Ok(join) => join,
        Err(e) => {
            debug!(%e, "malformed join message");
            dispatcher::send_raw(
                &sender,
                &VideoServerMessage::error("Invalid join message", Some("INVALID_JOIN")),
            )
            .await;
            dispatcher::close_channel(&sender).await;
            return;
        }
    };

    if join.participant_id.is_empty() {
        dispatcher::send_raw(
            &sender,
            &VideoServerMessage::error("Invalid join message", Some("INVALID_JOIN")),
        )
        .await;
        dispatcher::close_channel(&sender).await;
        return;
    }

    let Some(room) = state.video.get(&workspace_id, &room_id) else {
        dispatcher::send_raw(
            &sender,
            &VideoServerMessage::error("Room not found", Some("NOT_FOUND")),
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
            &VideoServerMessage::error("Cannot join room", Some("JOIN_REJECTED")),
        )
        .await;
        dispatcher::close_channel(&sender).await;
        return;
    }

    if !state.video_conns.insert(
        &participant_id,
        Arc::clone(&sender),
        &workspace_id,
        &room_id,
        role,
    ) {
        room.leave(&participant_id);
        warn!(%participant_id, "participant id already connected");
        dispatcher::send_raw(
            &sender,
            &VideoServerMessage::error("Cannot join room", Some("JOIN_REJECTED")),
        )
        .await;
        dispatcher::close_channel(&sender).await;
        return;
    }

    info!(%workspace_id, %room_id, %participant_id, role = role.as_str(), "video participant connected");

    let joined = VideoServerMessage::Joined {
        workspace_id: workspace_id.clone(),
        room_id: room_id.clone(),
        role,
        timestamp: Utc::now(),
    };
    dispatcher::send_to(&state.video_conns, &participant_id, &joined).await;

    let announcement = VideoServerMessage::ParticipantJoined {
        participant_id: participant_id.clone(),
        role,
        timestamp: Utc::now(),
    };
    let failed = dispatcher::broadcast(
        &state.video_conns,
        &room.peers_except(&participant_id),
        &announcement,
    )
    .await;
    super::evict_unreachable(&state.video_conns, room.as_ref(), failed, participant_left).await;

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                state.video_conns.touch(&participant_id);
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

    state.video_conns.remove(&participant_id);
    if let Some(role) = room.leave(&participant_id) {
        let left = participant_left(&participant_id, role);
        let failed =
            dispatcher::broadcast(&state.video_conns, &room.all_participants(), &left).await;
        super::evict_unreachable(&state.video_conns, room.as_ref(), failed, participant_left).await;
    }

    info!(%workspace_id, %room_id, %participant_id, "video participant disconnected");
}

async fn handle_message(
    state: &AppState,
    room: &Arc<VideoRoom>,
    participant_id: &str,
    role: ParticipantRole,
    text: &str,
) {
    let msg: VideoClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(%participant_id, %e, "unrecognized video message");
            dispatcher::send_to(
                &state.video_conns,
                participant_id,
                &VideoServerMessage::error("Unknown message type", Some("INVALID_MESSAGE")),
            )
            .await;
            return;
        }
    };

    match msg {
        VideoClientMessage::Heartbeat => {
            dispatcher::send_to(
                &state.video_conns,
                participant_id,
                &VideoServerMessage::HeartbeatAck {
                    timestamp: Utc::now(),
                },
            )
            .await;
        }

        VideoClientMessage::StreamStarted { config } => {
            if role != ParticipantRole::Producer {
                deny(state, participant_id, "Only the producer can start a stream").await;
                return;
            }
            room.touch();
            broadcast_to_others(
                state,
                room,
                participant_id,
                &VideoServerMessage::StreamStarted {
                    config,
                    timestamp: Utc::now(),
                },
            )
            .await;
        }

        VideoClientMessage::StreamStopped { reason } => {
            if role != ParticipantRole::Producer {
                deny(state, participant_id, "Only the producer can stop a stream").await;
                return;
            }
            room.touch();
            broadcast_to_others(
                state,
                room,
                participant_id,
                &VideoServerMessage::StreamStopped {
                    reason,
                    timestamp: Utc::now(),
                },
            )
            .await;
        }

        VideoClientMessage::VideoConfigUpdate { config } => {
            // Only the producer's update lands in room state; everyone's is
            // relayed with its partial-merge semantics intact.
            if role == ParticipantRole::Producer {
                room.update_config(&config);
            }
            broadcast_to_others(
                state,
                room,
                participant_id,
                &VideoServerMessage::VideoConfigUpdate {
                    config,
                    timestamp: Utc::now(),
                },
            )
            .await;
        }

        VideoClientMessage::StatusUpdate { fields } => {
            broadcast_to_others(
                state,
                room,
                participant_id,
                &VideoServerMessage::status_update(fields),
            )
            .await;
        }

        VideoClientMessage::StreamStats { fields } => {
            broadcast_to_others(
                state,
                room,
                participant_id,
                &VideoServerMessage::stream_stats(fields),
            )
            .await;
        }

        VideoClientMessage::RecoveryTriggered { policy, reason } => {
            broadcast_to_others(
                state,
                room,
                participant_id,
                &VideoServerMessage::RecoveryTriggered {
                    policy,
                    reason,
                    timestamp: Utc::now(),
                },
            )
            .await;
        }

        VideoClientMessage::EmergencyStop { reason } => {
            warn!(%participant_id, ?reason, "emergency stop");
            room.touch();
            let stop = VideoServerMessage::EmergencyStop {
                reason,
                source: participant_id.to_string(),
                timestamp: Utc::now(),
            };
            let failed =
                dispatcher::broadcast(&state.video_conns, &room.all_participants(), &stop).await;
            super::evict_unreachable(&state.video_conns, room.as_ref(), failed, participant_left)
                .await;
        }
    }
}

async fn broadcast_to_others(
    state: &AppState,
    room: &Arc<VideoRoom>,
    sender_id: &str,
    message: &VideoServerMessage,
) {
    let failed =
        dispatcher::broadcast(&state.video_conns, &room.peers_except(sender_id), message).await;
    super::evict_unreachable(&state.video_conns, room.as_ref(), failed, participant_left).await;
}

async fn deny(state: &AppState, participant_id: &str, message: &str) {
    warn!(%participant_id, message, "rejected video message");
    dispatcher::send_to(
        &state.video_conns,
        participant_id,
        &VideoServerMessage::error(message, Some("FORBIDDEN")),
    )
    .await;
}

pub(crate) fn participant_left(participant_id: &str, role: ParticipantRole) -> VideoServerMessage {
    VideoServerMessage::ParticipantLeft {
        participant_id: participant_id.to_string(),
        role,
        timestamp: Utc::now(),
    }
}

/// Reads frames until the first text payload; control frames are skipped.
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
