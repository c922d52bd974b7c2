pub mod dispatcher;
pub mod robotics;
pub mod storage;
pub mod video;

use robolink_services::{ParticipantRole, RegistryRoom};
use serde::Serialize;
use tracing::warn;

use self::storage::ConnectionTable;

/// Runs the send-failure discipline for every id in `failed`: drop the
/// connection, free its room slot, tell the survivors. A notification that
/// itself fails feeds back into the queue, so a cascade of dead peers drains
/// in one pass. Lock order is table first, then room.
pub(crate) async fn evict_unreachable<R, M, F>(
    table: &ConnectionTable,
    room: &R,
    mut failed: Vec<String>,
    make_left: F,
) where
    R: RegistryRoom,
    M: Serialize,
    F: Fn(&str, ParticipantRole) -> M,
{
    while let Some(participant_id) = failed.pop() {
        if table.remove(&participant_id).is_none() {
            continue;
        }
        let Some(role) = room.remove_participant(&participant_id) else {
            continue;
        };
        warn!(
            %participant_id,
            room_id = room.room_id(),
            "evicted unreachable participant"
        );
        let peers = room.peer_ids_except(&participant_id);
        let more = dispatcher::broadcast(table, &peers, &make_left(&participant_id, role)).await;
        failed.extend(more);
    }
}
