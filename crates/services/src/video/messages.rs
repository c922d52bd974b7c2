use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::membership::ParticipantRole;

/// Stream parameters. Every field is optional; a partial update overwrites
/// only what it carries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framerate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl VideoConfig {
    pub fn merge(&mut self, update: &VideoConfig) {
        if update.encoding.is_some() {
            self.encoding = update.encoding.clone();
        }
        if update.resolution.is_some() {
            self.resolution = update.resolution;
        }
        if update.framerate.is_some() {
            self.framerate = update.framerate;
        }
        if update.bitrate.is_some() {
            self.bitrate = update.bitrate;
        }
        if update.quality.is_some() {
            self.quality = update.quality;
        }
    }
}

/// An SDP body as exchanged by the peers. Opaque to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: String,
    pub sdp: String,
}

/// Client -> server video messages. The signaling envelopes travel over the
/// request surface, not this channel; an inbound `webrtc_*` tag falls out of
/// this closed set and gets the unknown-type error reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VideoClientMessage {
    Heartbeat,
    StreamStarted {
        #[serde(default)]
        config: Option<VideoConfig>,
    },
    StreamStopped {
        #[serde(default)]
        reason: Option<String>,
    },
    VideoConfigUpdate {
        config: VideoConfig,
    },
    StatusUpdate {
        #[serde(flatten)]
        fields: Map<String, Value>,
    },
    StreamStats {
        #[serde(flatten)]
        fields: Map<String, Value>,
    },
    RecoveryTriggered {
        #[serde(default)]
        policy: Option<String>,
        #[serde(default)]
        reason: Option<String>,
    },
    EmergencyStop {
        #[serde(default)]
        reason: Option<String>,
    },
}

/// Server -> client video messages, each stamped at send time.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VideoServerMessage {
    Joined {
        workspace_id: String,
        room_id: String,
        role: ParticipantRole,
        timestamp: DateTime<Utc>,
    },
    HeartbeatAck {
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
    StreamStarted {
        #[serde(skip_serializing_if = "Option::is_none")]
        config: Option<VideoConfig>,
        timestamp: DateTime<Utc>,
    },
    StreamStopped {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },
    VideoConfigUpdate {
        config: VideoConfig,
        timestamp: DateTime<Utc>,
    },
    StatusUpdate {
        #[serde(flatten)]
        fields: Map<String, Value>,
        timestamp: DateTime<Utc>,
    },
    StreamStats {
        #[serde(flatten)]
        fields: Map<String, Value>,
        timestamp: DateTime<Utc>,
    },
    RecoveryTriggered {
        #[serde(skip_serializing_if = "Option::is_none")]
        policy: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },
    EmergencyStop {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        source: String,
        timestamp: DateTime<Utc>,
    },
    WebrtcOffer {
        offer: SessionDescription,
        from_producer: String,
        timestamp: DateTime<Utc>,
    },
    WebrtcAnswer {
        answer: SessionDescription,
        from_consumer: String,
        timestamp: DateTime<Utc>,
    },
    WebrtcIce {
        candidate: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        from_producer: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        from_consumer: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl VideoServerMessage {
    pub fn error(message: impl Into<String>, code: Option<&str>) -> Self {
        VideoServerMessage::Error {
            message: message.into(),
            code: code.map(str::to_string),
            timestamp: Utc::now(),
        }
    }

    /// Rebroadcast envelope for a `status_update`. The client payload is
    /// passed through except for the `type` and `timestamp` keys, which are
    /// the server's — leaving them in would duplicate keys in the output.
    pub fn status_update(fields: Map<String, Value>) -> Self {
        VideoServerMessage::StatusUpdate {
            fields: strip_envelope_keys(fields),
            timestamp: Utc::now(),
        }
    }

    /// Rebroadcast envelope for `stream_stats`, same key discipline.
    pub fn stream_stats(fields: Map<String, Value>) -> Self {
        VideoServerMessage::StreamStats {
            fields: strip_envelope_keys(fields),
            timestamp: Utc::now(),
        }
    }
}

fn strip_envelope_keys(mut fields: Map<String, Value>) -> Map<String, Value> {
    fields.remove("type");
    fields.remove("timestamp");
    fields
}
