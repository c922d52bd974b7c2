pub mod messages;
pub mod signaling;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::CoreError;
use crate::membership::{Membership, ParticipantRole, ParticipantsSummary};
use crate::registry::{Registry, RegistryRoom};

pub use self::messages::{VideoClientMessage, VideoConfig, VideoServerMessage};
pub use self::signaling::{SignalMessage, SignalRequest};

pub type VideoRegistry = Registry<VideoRoom>;

/// A video brokering context. The server only brokers membership, stream
/// events and WebRTC signaling; media flows peer-to-peer and never touches
/// this state.
pub struct VideoRoom {
    workspace_id: String,
    id: String,
    inner: Mutex<RoomInner>,
}

struct RoomInner {
    members: Membership,
    config: VideoConfig,
    /// Opaque option bag handed through to clients untouched.
    recovery_config: Value,
    frame_count: u64,
    total_bytes: u64,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl VideoRoom {
    pub fn new(workspace_id: String, id: String) -> Self {
        Self::with_config(workspace_id, id, None, None)
    }

    pub fn with_config(
        workspace_id: String,
        id: String,
        config: Option<VideoConfig>,
        recovery_config: Option<Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            workspace_id,
            id,
            inner: Mutex::new(RoomInner {
                members: Membership::default(),
                config: config.unwrap_or_default(),
                recovery_config: recovery_config.unwrap_or(Value::Null),
                frame_count: 0,
                total_bytes: 0,
                created_at: now,
                last_activity: now,
            }),
        }
    }

    pub fn join(&self, participant_id: &str, role: ParticipantRole) -> Result<(), CoreError> {
        let mut inner = self.inner.lock();
        inner.members.join(participant_id, role)?;
        inner.last_activity = Utc::now();
        debug!(
            workspace_id = %self.workspace_id,
            room_id = %self.id,
            %participant_id,
            role = role.as_str(),
            "participant joined video room"
        );
        Ok(())
    }

    pub fn leave(&self, participant_id: &str) -> Option<ParticipantRole> {
        let mut inner = self.inner.lock();
        let role = inner.members.leave(participant_id);
        if role.is_some() {
            inner.last_activity = Utc::now();
        }
        role
    }

    pub fn role_of(&self, participant_id: &str) -> Option<ParticipantRole> {
        self.inner.lock().members.role_of(participant_id)
    }

    pub fn peers_except(&self, excluded: &str) -> Vec<String> {
        self.inner.lock().members.ids_except(excluded)
    }

    pub fn all_participants(&self) -> Vec<String> {
        self.inner.lock().members.all_ids()
    }

    /// Overwrites the subfields present in `update`, leaving the rest as-is.
    pub fn update_config(&self, update: &VideoConfig) {
        let mut inner = self.inner.lock();
        inner.config.merge(update);
        inner.last_activity = Utc::now();
    }

    pub fn config(&self) -> VideoConfig {
        self.inner.lock().config.clone()
    }

    pub fn recovery_config(&self) -> Value {
        self.inner.lock().recovery_config.clone()
    }

    pub fn touch(&self) {
        self.inner.lock().last_activity = Utc::now();
    }

    pub fn summary(&self) -> RoomSummary {
        let inner = self.inner.lock();
        RoomSummary {
            id: self.id.clone(),
            workspace_id: self.workspace_id.clone(),
            participants: inner.members.summary(),
            config: inner.config.clone(),
            has_producer: inner.members.producer().is_some(),
            active_consumers: inner.members.consumers().len(),
            frame_count: inner.frame_count,
            total_bytes: inner.total_bytes,
            created_at: inner.created_at,
            last_activity: inner.last_activity,
        }
    }

    pub fn state(&self) -> RoomState {
        let inner = self.inner.lock();
        RoomState {
            room_id: self.id.clone(),
            workspace_id: self.workspace_id.clone(),
            participants: inner.members.summary(),
            config: inner.config.clone(),
            recovery_config: inner.recovery_config.clone(),
            frame_count: inner.frame_count,
            total_bytes: inner.total_bytes,
            timestamp: Utc::now(),
        }
    }
}

impl RegistryRoom for VideoRoom {
    fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    fn room_id(&self) -> &str {
        &self.id
    }

    fn last_activity(&self) -> DateTime<Utc> {
        self.inner.lock().last_activity
    }

    fn participant_ids(&self) -> Vec<String> {
        self.all_participants()
    }

    fn peer_ids_except(&self, excluded: &str) -> Vec<String> {
        self.peers_except(excluded)
    }

    fn remove_participant(&self, participant_id: &str) -> Option<ParticipantRole> {
        self.leave(participant_id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub id: String,
    pub workspace_id: String,
    pub participants: ParticipantsSummary,
    pub config: VideoConfig,
    pub has_producer: bool,
    pub active_consumers: usize,
    pub frame_count: u64,
    pub total_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomState {
    pub room_id: String,
    pub workspace_id: String,
    pub participants: ParticipantsSummary,
    pub config: VideoConfig,
    pub recovery_config: Value,
    pub frame_count: u64,
    pub total_bytes: u64,
    pub timestamp: DateTime<Utc>,
}
