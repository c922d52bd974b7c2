use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("room {room_id} already exists in workspace {workspace_id}")]
    RoomExists {
        workspace_id: String,
        room_id: String,
    },

    #[error("room already has a producer")]
    ProducerSlotTaken,

    #[error("participant {0} is already connected")]
    DuplicateParticipant(String),

    #[error("client {0} is not a participant of this room")]
    NotAMember(String),

    #[error("{0}")]
    NotAllowed(String),

    #[error("invalid signaling message: {0}")]
    InvalidSignal(String),
}
