//! HTTP handlers for booking, releasing, and reading bookings.
//! Delegates every decision to `ParkingService`; this layer only translates
//! JSON and headers.

use crate::{
    errors::AppError,
    handlers::require_user_id,
    models::booking::Booking,
    services::parking_service::{HistoryCursor, HistoryParams, ParkingService},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_HISTORY_PAGE: usize = 50;

/// Query params accepted by the history listing.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub bookings: Vec<Booking>,
    pub is_truncated: bool,
    pub next_token: Option<String>,
}

/// Admin query for the export/report pull path.
#[derive(Debug, Deserialize)]
pub struct BookingsQuery {
    pub user_id: Uuid,
    pub since: Option<DateTime<Utc>>,
}

/// POST `/api/book/{lot_id}` — claim the lowest-numbered free spot in a lot.
pub async fn book(
    State(parking): State<ParkingService>,
    Path(lot_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let user_id = require_user_id(&headers)?;
    let booking = parking.book(lot_id, user_id).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// POST `/api/release` — close the caller's open booking, return the receipt.
pub async fn release(
    State(parking): State<ParkingService>,
    headers: HeaderMap,
) -> Result<Json<Booking>, AppError> {
    let user_id = require_user_id(&headers)?;
    Ok(Json(parking.release(user_id).await?))
}

/// GET `/api/booking/active` — the caller's open booking, 404 if none.
pub async fn active_booking(
    State(parking): State<ParkingService>,
    headers: HeaderMap,
) -> Result<Json<Booking>, AppError> {
    let user_id = require_user_id(&headers)?;
    Ok(Json(parking.active_booking(user_id).await?))
}

/// GET `/api/history?limit=&token=` — closed bookings, most recent first.
pub async fn history(
    State(parking): State<ParkingService>,
    Query(q): Query<HistoryQuery>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>, AppError> {
    let user_id = require_user_id(&headers)?;
    let params = HistoryParams {
        cursor: q.token.as_deref().and_then(decode_history_token),
        max_items: q.limit.unwrap_or(DEFAULT_HISTORY_PAGE),
    };

    let page = parking.booking_history(user_id, params).await?;
    Ok(Json(HistoryResponse {
        bookings: page.bookings,
        is_truncated: page.is_truncated,
        next_token: page.next_cursor.map(encode_history_token),
    }))
}

/// GET `/admin/bookings?user_id=&since=` — pull query used by export and
/// report tooling.
pub async fn list_bookings_for_user(
    State(parking): State<ParkingService>,
    Query(q): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(parking.bookings_for_user(q.user_id, q.since).await?))
}

fn encode_history_token(cursor: HistoryCursor) -> String {
    general_purpose::STANDARD.encode(format!(
        "{}|{}",
        cursor.before_end.to_rfc3339(),
        cursor.before_id
    ))
}

/// Tokens are opaque to clients; anything unparseable restarts the listing
/// from the top rather than erroring.
fn decode_history_token(token: &str) -> Option<HistoryCursor> {
    let bytes = general_purpose::STANDARD.decode(token).ok()?;
    let raw = String::from_utf8(bytes).ok()?;
    let (end, id) = raw.split_once('|')?;
    Some(HistoryCursor {
        before_end: DateTime::parse_from_rfc3339(end).ok()?.with_timezone(&Utc),
        before_id: Uuid::parse_str(id).ok()?,
    })
}
