pub mod messages;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::error::CoreError;
use crate::membership::{Membership, ParticipantRole, ParticipantsSummary};
use crate::registry::{Registry, RegistryRoom};

pub use self::messages::{JointData, RoboticsClientMessage, RoboticsServerMessage};

pub type RoboticsRegistry = Registry<RoboticsRoom>;

/// A robotics brokering context: one producer, many consumers, and the
/// authoritative cumulative joint map. All interior state sits behind one
/// lock; every mutation is finite work and never spans a network write.
#[derive(Debug)]
pub struct RoboticsRoom {
    workspace_id: String,
    id: String,
    inner: Mutex<RoomInner>,
}

#[derive(Debug)]
struct RoomInner {
    members: Membership,
    joints: HashMap<String, f64>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl RoboticsRoom {
    pub fn new(workspace_id: String, id: String) -> Self {
        let now = Utc::now();
        Self {
            workspace_id,
            id,
            inner: Mutex::new(RoomInner {
                members: Membership::default(),
                joints: HashMap::new(),
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
            "participant joined robotics room"
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

    pub fn consumers(&self) -> Vec<String> {
        self.inner.lock().members.consumers().to_vec()
    }

    pub fn peers_except(&self, excluded: &str) -> Vec<String> {
        self.inner.lock().members.ids_except(excluded)
    }

    pub fn all_participants(&self) -> Vec<String> {
        self.inner.lock().members.all_ids()
    }

    /// Applies an update against the authoritative map and returns only the
    /// records that changed a stored value. Comparison is strict `f64`
    /// equality on the stored value; the server transports, it does not
    /// filter. The optional `speed` is echoed in the delta but never stored.
    pub fn apply_joint_update(&self, updates: &[JointData]) -> Vec<JointData> {
        let mut inner = self.inner.lock();
        let mut delta = Vec::new();
        for update in updates {
            match inner.joints.get(&update.name) {
                Some(current) if *current == update.value => {}
                _ => {
                    inner.joints.insert(update.name.clone(), update.value);
                    delta.push(update.clone());
                }
            }
        }
        inner.last_activity = Utc::now();
        delta
    }

    pub fn joints_snapshot(&self) -> HashMap<String, f64> {
        self.inner.lock().joints.clone()
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
            joints_count: inner.joints.len(),
            has_producer: inner.members.producer().is_some(),
            active_consumers: inner.members.consumers().len(),
            created_at: inner.created_at,
            last_activity: inner.last_activity,
        }
    }

    pub fn state(&self) -> RoomState {
        let inner = self.inner.lock();
        RoomState {
            room_id: self.id.clone(),
            workspace_id: self.workspace_id.clone(),
            joints: inner.joints.clone(),
            participants: inner.members.summary(),
            timestamp: Utc::now(),
        }
    }
}

impl RegistryRoom for RoboticsRoom {
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

/// Per-room projection returned by the listing and info endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub id: String,
    pub workspace_id: String,
    pub participants: ParticipantsSummary,
    pub joints_count: usize,
    pub has_producer: bool,
    pub active_consumers: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Authoritative snapshot returned by the state endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RoomState {
    pub room_id: String,
    pub workspace_id: String,
    pub joints: HashMap<String, f64>,
    pub participants: ParticipantsSummary,
    pub timestamp: DateTime<Utc>,
}
