//! Dashboard handlers — read-only rollups for users and admins.

use crate::{
    errors::AppError,
    handlers::require_user_id,
    models::dashboard::{LotOccupancy, SystemSummary, UserSummary},
    services::parking_service::ParkingService,
};
use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use uuid::Uuid;

/// GET `/api/dashboard/summary` — the caller's booking count, spend, and
/// most recent booking.
pub async fn user_dashboard(
    State(parking): State<ParkingService>,
    headers: HeaderMap,
) -> Result<Json<UserSummary>, AppError> {
    let user_id = require_user_id(&headers)?;
    Ok(Json(parking.user_summary(user_id).await?))
}

/// GET `/admin/dashboard/summary` — system totals plus per-lot occupancy.
pub async fn system_dashboard(
    State(parking): State<ParkingService>,
) -> Result<Json<SystemSummary>, AppError> {
    Ok(Json(parking.system_summary().await?))
}

/// GET `/admin/lots/{lot_id}/summary` — occupancy counts for one lot.
pub async fn lot_dashboard(
    State(parking): State<ParkingService>,
    Path(lot_id): Path<Uuid>,
) -> Result<Json<LotOccupancy>, AppError> {
    Ok(Json(parking.lot_summary(lot_id).await?))
}
