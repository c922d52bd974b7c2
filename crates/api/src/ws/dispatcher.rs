use axum::extract::ws::Message;
use futures::SinkExt;
use serde::Serialize;
use tracing::{debug, warn};

use super::storage::{ConnectionTable, WsSender};

/// Sends a message to each listed participant. Returns the ids whose channel
/// was present but whose write failed; callers run the eviction discipline
/// on those. Ids with no live channel are skipped silently (already evicted
/// or racing a disconnect).
pub async fn broadcast(
    table: &ConnectionTable,
    participant_ids: &[String],
    message: &impl Serialize,
) -> Vec<String> {
    let text = serde_json::to_string(message).unwrap_or_default();
    let mut failed = Vec::new();

    for participant_id in participant_ids {
        let Some(sender) = table.get_channel(participant_id) else {
            continue;
        };
        let mut guard = sender.lock().await;
        if let Err(e) = guard.send(Message::text(text.clone())).await {
            warn!(%participant_id, %e, "failed to send ws message");
            failed.push(participant_id.clone());
        } else {
            debug!(%participant_id, "ws message sent");
        }
    }

    failed
}

/// Sends to a single participant through the table. True when delivered.
pub async fn send_to(
    table: &ConnectionTable,
    participant_id: &str,
    message: &impl Serialize,
) -> bool {
    let Some(sender) = table.get_channel(participant_id) else {
        return false;
    };
    send_raw(&sender, message).await
}

/// Sends on a channel handle directly — used during the handshake, before
/// the participant is registered in the table.
pub async fn send_raw(sender: &WsSender, message: &impl Serialize) -> bool {
    let text = serde_json::to_string(message).unwrap_or_default();
    let mut guard = sender.lock().await;
    guard.send(Message::text(text)).await.is_ok()
}

/// Closes a channel handle, ignoring errors on an already-dead peer.
pub async fn close_channel(sender: &WsSender) {
    let mut guard = sender.lock().await;
    let _ = guard.send(Message::Close(None)).await;
}
