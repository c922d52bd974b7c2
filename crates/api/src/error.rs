use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use robolink_services::CoreError;
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Forbidden(String),
    Conflict(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::RoomExists { .. } => ApiError::Conflict(err.to_string()),
            CoreError::ProducerSlotTaken | CoreError::DuplicateParticipant(_) => {
                ApiError::Conflict(err.to_string())
            }
            CoreError::NotAMember(_) | CoreError::NotAllowed(_) => {
                ApiError::Forbidden(err.to_string())
            }
            CoreError::InvalidSignal(_) => ApiError::BadRequest(err.to_string()),
        }
    }
}
