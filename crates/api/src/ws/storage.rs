use axum::extract::ws::{Message, WebSocket};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::stream::SplitSink;
use robolink_services::ParticipantRole;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Bookkeeping for one live connection. Rooms never see this record; they
/// reference participants by identifier only.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    pub workspace_id: String,
    pub room_id: String,
    pub role: ParticipantRole,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: u64,
}

struct ConnectionEntry {
    sender: WsSender,
    meta: ConnectionMetadata,
}

/// Tracks all live connections of one service by participant id. Owns the
/// write half of every channel; every send path goes through here so that a
/// failed write can evict the participant from this table and its room
/// without dangling references.
pub struct ConnectionTable {
    connections: DashMap<String, ConnectionEntry>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Registers a connection. Fails when the identifier is already live
    /// anywhere in this service — participant ids are globally unique while
    /// connected.
    pub fn insert(
        &self,
        participant_id: &str,
        sender: WsSender,
        workspace_id: &str,
        room_id: &str,
        role: ParticipantRole,
    ) -> bool {
        match self.connections.entry(participant_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let now = Utc::now();
                slot.insert(ConnectionEntry {
                    sender,
                    meta: ConnectionMetadata {
                        workspace_id: workspace_id.to_string(),
                        room_id: room_id.to_string(),
                        role,
                        connected_at: now,
                        last_activity: now,
                        message_count: 0,
                    },
                });
                true
            }
        }
    }

    pub fn remove(&self, participant_id: &str) -> Option<WsSender> {
        self.connections
            .remove(participant_id)
            .map(|(_, entry)| entry.sender)
    }

    pub fn get_channel(&self, participant_id: &str) -> Option<WsSender> {
        self.connections
            .get(participant_id)
            .map(|entry| Arc::clone(&entry.sender))
    }

    pub fn get_metadata(&self, participant_id: &str) -> Option<ConnectionMetadata> {
        self.connections
            .get(participant_id)
            .map(|entry| entry.meta.clone())
    }

    /// Records inbound traffic: bumps the message counter and refreshes the
    /// activity timestamp the sweeper reads.
    pub fn touch(&self, participant_id: &str) {
        if let Some(mut entry) = self.connections.get_mut(participant_id) {
            entry.meta.last_activity = Utc::now();
            entry.meta.message_count += 1;
        }
    }

    pub fn contains(&self, participant_id: &str) -> bool {
        self.connections.contains_key(participant_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}
