use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Role of a live connection within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Producer,
    Consumer,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Producer => "producer",
            ParticipantRole::Consumer => "consumer",
        }
    }
}

/// First inbound frame on a new channel, for both services. Deliberately
/// carries no `type` tag.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinRequest {
    pub participant_id: String,
    pub role: ParticipantRole,
}

/// Participant slots of a room: at most one producer, an ordered set of
/// consumers. Consumer order is insertion order, kept for deterministic
/// fan-out iteration.
#[derive(Debug, Default)]
pub struct Membership {
    producer: Option<String>,
    consumers: Vec<String>,
}

impl Membership {
    /// Admits a participant. Rejects a second producer and any identifier
    /// already present in either slot, regardless of role.
    pub fn join(&mut self, participant_id: &str, role: ParticipantRole) -> Result<(), CoreError> {
        if self.producer.as_deref() == Some(participant_id)
            || self.consumers.iter().any(|c| c == participant_id)
        {
            return Err(CoreError::DuplicateParticipant(participant_id.to_string()));
        }

        match role {
            ParticipantRole::Producer => {
                if self.producer.is_some() {
                    return Err(CoreError::ProducerSlotTaken);
                }
                self.producer = Some(participant_id.to_string());
            }
            ParticipantRole::Consumer => {
                self.consumers.push(participant_id.to_string());
            }
        }
        Ok(())
    }

    /// Removes a participant. Absent identifiers are a no-op.
    pub fn leave(&mut self, participant_id: &str) -> Option<ParticipantRole> {
        if self.producer.as_deref() == Some(participant_id) {
            self.producer = None;
            return Some(ParticipantRole::Producer);
        }
        let before = self.consumers.len();
        self.consumers.retain(|c| c != participant_id);
        if self.consumers.len() < before {
            return Some(ParticipantRole::Consumer);
        }
        None
    }

    pub fn role_of(&self, participant_id: &str) -> Option<ParticipantRole> {
        if self.producer.as_deref() == Some(participant_id) {
            Some(ParticipantRole::Producer)
        } else if self.consumers.iter().any(|c| c == participant_id) {
            Some(ParticipantRole::Consumer)
        } else {
            None
        }
    }

    pub fn producer(&self) -> Option<&str> {
        self.producer.as_deref()
    }

    pub fn consumers(&self) -> &[String] {
        &self.consumers
    }

    /// Producer (if any) followed by consumers in join order.
    pub fn all_ids(&self) -> Vec<String> {
        let mut ids = Vec::with_capacity(self.consumers.len() + 1);
        if let Some(p) = &self.producer {
            ids.push(p.clone());
        }
        ids.extend(self.consumers.iter().cloned());
        ids
    }

    pub fn ids_except(&self, excluded: &str) -> Vec<String> {
        self.all_ids().into_iter().filter(|id| id != excluded).collect()
    }

    pub fn len(&self) -> usize {
        self.consumers.len() + usize::from(self.producer.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> ParticipantsSummary {
        ParticipantsSummary {
            producer: self.producer.clone(),
            consumers: self.consumers.clone(),
            total: self.len(),
        }
    }
}

/// Projection of the participant slots reported by the request surface.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantsSummary {
    pub producer: Option<String>,
    pub consumers: Vec<String>,
    pub total: usize,
}
