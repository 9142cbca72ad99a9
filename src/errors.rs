use crate::services::parking_service::ParkingError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Map the engine's error taxonomy onto HTTP: conflicts are 409 and safe to
/// surface verbatim, retry-exhausted contention is 503 (retryable by the
/// client), storage failures stay opaque 500s.
impl From<ParkingError> for AppError {
    fn from(err: ParkingError) -> Self {
        let status = match &err {
            ParkingError::LotNotFound(_) | ParkingError::NoActiveBooking => StatusCode::NOT_FOUND,
            ParkingError::DuplicateLotName(_)
            | ParkingError::AlreadyBooked(_)
            | ParkingError::LotFull(_)
            | ParkingError::InsufficientRemovableSpots { .. }
            | ParkingError::LotHasOccupiedSpots(_) => StatusCode::CONFLICT,
            ParkingError::InvalidCapacity(_) | ParkingError::InvalidPrice(_) => {
                StatusCode::BAD_REQUEST
            }
            ParkingError::Contended(_) | ParkingError::StoreTimeout(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ParkingError::Sqlx(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}
