//! HTTP handlers. A thin translation layer over the engine: authentication
//! and authorization are resolved upstream, so user identity arrives here as
//! an opaque UUID in the `x-user-id` header.

pub mod booking_handlers;
pub mod dashboard_handlers;
pub mod export_handlers;
pub mod health_handlers;
pub mod lot_handlers;

use crate::errors::AppError;
use axum::http::HeaderMap;
use uuid::Uuid;

pub(crate) const USER_ID_HEADER: &str = "x-user-id";

/// Pull the caller's identity out of the header the auth layer set.
pub(crate) fn require_user_id(headers: &HeaderMap) -> Result<Uuid, AppError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::bad_request("missing x-user-id header"))?;
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request("x-user-id must be a UUID"))
}
