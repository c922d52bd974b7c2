use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::CoreError;
use crate::membership::ParticipantRole;

use super::VideoRoom;
use super::messages::{SessionDescription, VideoServerMessage};

/// Request-surface envelope: `client_id` is the sender; `message` is the
/// tagged signaling payload.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalRequest {
    pub client_id: String,
    pub message: SignalMessage,
}

/// The three signaling payloads the relay forwards. SDP and candidates are
/// carried verbatim and never parsed.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalMessage {
    Offer {
        sdp: String,
        target_consumer: String,
    },
    Answer {
        sdp: String,
        target_producer: String,
    },
    Ice {
        candidate: Value,
        #[serde(default)]
        target_consumer: Option<String>,
        #[serde(default)]
        target_producer: Option<String>,
    },
}

/// Address-forwards one signaling message inside a room.
///
/// Returns the target participant and the record to deliver, or `None` when
/// the target has left the room — negotiations routinely race reconnects, so
/// a missing target is dropped without informing the sender.
pub fn route_signal(
    room: &VideoRoom,
    client_id: &str,
    message: SignalMessage,
) -> Result<Option<(String, VideoServerMessage)>, CoreError> {
    let sender_role = room
        .role_of(client_id)
        .ok_or_else(|| CoreError::NotAMember(client_id.to_string()))?;

    let (target, record) = match message {
        SignalMessage::Offer {
            sdp,
            target_consumer,
        } => {
            if sender_role != ParticipantRole::Producer {
                return Err(CoreError::NotAllowed(
                    "only the producer can send an offer".to_string(),
                ));
            }
            (
                target_consumer,
                VideoServerMessage::WebrtcOffer {
                    offer: SessionDescription {
                        kind: "offer".to_string(),
                        sdp,
                    },
                    from_producer: client_id.to_string(),
                    timestamp: Utc::now(),
                },
            )
        }
        SignalMessage::Answer {
            sdp,
            target_producer,
        } => {
            if sender_role != ParticipantRole::Consumer {
                return Err(CoreError::NotAllowed(
                    "only a consumer can send an answer".to_string(),
                ));
            }
            (
                target_producer,
                VideoServerMessage::WebrtcAnswer {
                    answer: SessionDescription {
                        kind: "answer".to_string(),
                        sdp,
                    },
                    from_consumer: client_id.to_string(),
                    timestamp: Utc::now(),
                },
            )
        }
        SignalMessage::Ice {
            candidate,
            target_consumer,
            target_producer,
        } => match sender_role {
            ParticipantRole::Producer => {
                let target = target_consumer.ok_or_else(|| {
                    CoreError::InvalidSignal("ice from producer requires target_consumer".into())
                })?;
                (
                    target,
                    VideoServerMessage::WebrtcIce {
                        candidate,
                        from_producer: Some(client_id.to_string()),
                        from_consumer: None,
                        timestamp: Utc::now(),
                    },
                )
            }
            ParticipantRole::Consumer => {
                let target = target_producer.ok_or_else(|| {
                    CoreError::InvalidSignal("ice from consumer requires target_producer".into())
                })?;
                (
                    target,
                    VideoServerMessage::WebrtcIce {
                        candidate,
                        from_producer: None,
                        from_consumer: Some(client_id.to_string()),
                        timestamp: Utc::now(),
                    },
                )
            }
        },
    };

    if room.role_of(&target).is_none() {
        debug!(%client_id, %target, "signaling target absent, dropping");
        return Ok(None);
    }

    Ok(Some((target, record)))
}
