use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::membership::ParticipantRole;

/// One joint record on the wire. `speed` rides along in deltas but is never
/// part of the authoritative state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointData {
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Client -> server robotics messages. Unknown tags fail deserialization and
/// are answered with an error record without closing the channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoboticsClientMessage {
    JointUpdate {
        data: Vec<JointData>,
    },
    Heartbeat,
    EmergencyStop {
        #[serde(default)]
        reason: Option<String>,
    },
}

/// Server -> client robotics messages. Every frame is stamped with the
/// server clock at send time.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoboticsServerMessage {
    Joined {
        workspace_id: String,
        room_id: String,
        role: ParticipantRole,
        timestamp: DateTime<Utc>,
    },
    StateSync {
        data: HashMap<String, f64>,
        timestamp: DateTime<Utc>,
    },
    JointUpdate {
        data: Vec<JointData>,
        source: String,
        timestamp: DateTime<Utc>,
    },
    HeartbeatAck {
        timestamp: DateTime<Utc>,
    },
    EmergencyStop {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        source: String,
        timestamp: DateTime<Utc>,
    },
    ParticipantJoined {
        participant_id: String,
        role: ParticipantRole,
        timestamp: DateTime<Utc>,
    },
    ParticipantLeft {
        participant_id: String,
        role: ParticipantRole,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl RoboticsServerMessage {
    pub fn error(message: impl Into<String>, code: Option<&str>) -> Self {
        RoboticsServerMessage::Error {
            message: message.into(),
            code: code.map(str::to_string),
            timestamp: Utc::now(),
        }
    }
}
