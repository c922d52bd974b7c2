use robolink_config::Settings;
use robolink_services::registry::{Registry, RegistryRoom};
use robolink_services::robotics::RoboticsRegistry;
use robolink_services::video::VideoRegistry;
use std::sync::Arc;
use tracing::info;

use crate::ws::dispatcher;
use crate::ws::storage::ConnectionTable;

/// Process-wide singletons, one registry and one connection table per
/// service, initialized eagerly at startup.
#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub robotics: Arc<RoboticsRegistry>,
    pub video: Arc<VideoRegistry>,
    pub robotics_conns: Arc<ConnectionTable>,
    pub video_conns: Arc<ConnectionTable>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            robotics: Arc::new(RoboticsRegistry::new()),
            video: Arc::new(VideoRegistry::new()),
            robotics_conns: Arc::new(ConnectionTable::new()),
            video_conns: Arc::new(ConnectionTable::new()),
        }
    }

    pub async fn delete_robotics_room(&self, workspace_id: &str, room_id: &str) -> bool {
        delete_room(&self.robotics, &self.robotics_conns, workspace_id, room_id).await
    }

    pub async fn delete_video_room(&self, workspace_id: &str, room_id: &str) -> bool {
        delete_room(&self.video, &self.video_conns, workspace_id, room_id).await
    }
}

/// The one room-deletion path, shared by the DELETE route and the sweeper.
/// Detaches every participant (closing its channel, no graceful wait), then
/// the room is gone.
async fn delete_room<R: RegistryRoom>(
    registry: &Registry<R>,
    table: &ConnectionTable,
    workspace_id: &str,
    room_id: &str,
) -> bool {
    let Some(room) = registry.remove(workspace_id, room_id) else {
        return false;
    };

    let participants = room.participant_ids();
    for participant_id in &participants {
        if let Some(sender) = table.remove(participant_id) {
            dispatcher::close_channel(&sender).await;
        }
        room.remove_participant(participant_id);
    }

    info!(
        %workspace_id,
        %room_id,
        participants = participants.len(),
        "room deleted"
    );
    true
}
