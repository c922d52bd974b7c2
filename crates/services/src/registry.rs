use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::CoreError;
use crate::membership::ParticipantRole;

/// What the registry, the send-failure eviction path and the lifecycle
/// sweeper need from any room, independent of its service payload.
pub trait RegistryRoom: Send + Sync + 'static {
    fn workspace_id(&self) -> &str;
    fn room_id(&self) -> &str;
    fn last_activity(&self) -> DateTime<Utc>;
    /// Producer (if any) plus consumers, in deterministic order.
    fn participant_ids(&self) -> Vec<String>;
    fn peer_ids_except(&self, excluded: &str) -> Vec<String>;
    fn remove_participant(&self, participant_id: &str) -> Option<ParticipantRole>;
}

/// Two-level Workspace -> Room map. Workspaces are created implicitly with
/// their first room and removed when their last room goes away. The outer
/// map is only held for lookup; rooms are shared out as `Arc` and mutated
/// under their own locks.
pub struct Registry<R> {
    workspaces: DashMap<String, DashMap<String, Arc<R>>>,
}

impl<R: RegistryRoom> Registry<R> {
    pub fn new() -> Self {
        Self {
            workspaces: DashMap::new(),
        }
    }

    /// Creates a room, generating UUIDs for any omitted identifier. Fails
    /// with `RoomExists` when the (workspace, room) pair is already taken.
    pub fn create_with<F>(
        &self,
        workspace_id: Option<String>,
        room_id: Option<String>,
        build: F,
    ) -> Result<Arc<R>, CoreError>
    where
        F: FnOnce(String, String) -> R,
    {
        let workspace_id = workspace_id.unwrap_or_else(generate_id);
        let room_id = room_id.unwrap_or_else(generate_id);

        let rooms = self
            .workspaces
            .entry(workspace_id.clone())
            .or_insert_with(DashMap::new);

        match rooms.entry(room_id.clone()) {
            Entry::Occupied(_) => Err(CoreError::RoomExists {
                workspace_id,
                room_id,
            }),
            Entry::Vacant(slot) => {
                let room = Arc::new(build(workspace_id.clone(), room_id.clone()));
                slot.insert(Arc::clone(&room));
                info!(%workspace_id, %room_id, "room created");
                Ok(room)
            }
        }
    }

    pub fn get(&self, workspace_id: &str, room_id: &str) -> Option<Arc<R>> {
        self.workspaces
            .get(workspace_id)
            .and_then(|rooms| rooms.get(room_id).map(|r| Arc::clone(r.value())))
    }

    /// Snapshot of all rooms in one workspace. Unknown workspaces yield an
    /// empty list, not an error.
    pub fn list(&self, workspace_id: &str) -> Vec<Arc<R>> {
        self.workspaces
            .get(workspace_id)
            .map(|rooms| rooms.iter().map(|r| Arc::clone(r.value())).collect())
            .unwrap_or_default()
    }

    /// Detaches a room from the registry. The caller owns participant
    /// teardown; the returned `Arc` is the last registry reference.
    pub fn remove(&self, workspace_id: &str, room_id: &str) -> Option<Arc<R>> {
        let removed = self
            .workspaces
            .get(workspace_id)
            .and_then(|rooms| rooms.remove(room_id))
            .map(|(_, room)| room);

        if removed.is_some() {
            self.workspaces
                .remove_if(workspace_id, |_, rooms| rooms.is_empty());
            debug!(%workspace_id, %room_id, "room removed");
        }
        removed
    }

    /// Snapshot across every workspace, for the sweeper scan.
    pub fn all_rooms(&self) -> Vec<Arc<R>> {
        let mut out = Vec::new();
        for ws in self.workspaces.iter() {
            for room in ws.value().iter() {
                out.push(Arc::clone(room.value()));
            }
        }
        out
    }

    pub fn room_count(&self) -> usize {
        self.workspaces.iter().map(|ws| ws.value().len()).sum()
    }
}

impl<R: RegistryRoom> Default for Registry<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical UUIDv4 textual form, used whenever callers omit an identifier.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
