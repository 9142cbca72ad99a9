//! HTTP handlers for lot administration: create, edit, resize, delete, and
//! the spot-status monitoring view.

use crate::{
    errors::AppError,
    models::{
        lot::{Lot, LotAvailability, LotUpdate, NewLot},
        spot::SpotStatusView,
    },
    services::parking_service::ParkingService,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    pub new_capacity: i64,
}

/// POST `/admin/lots` — create a lot and fan out its spots.
pub async fn create_lot(
    State(parking): State<ParkingService>,
    Json(body): Json<NewLot>,
) -> Result<impl IntoResponse, AppError> {
    let lot = parking.create_lot(body).await?;
    Ok((StatusCode::CREATED, Json(lot)))
}

/// GET `/api/lots` and `/admin/lots` — lots with live availability.
pub async fn list_lots(
    State(parking): State<ParkingService>,
) -> Result<Json<Vec<LotAvailability>>, AppError> {
    Ok(Json(parking.list_lots().await?))
}

/// GET `/admin/lots/{lot_id}` — fetch one lot.
pub async fn get_lot(
    State(parking): State<ParkingService>,
    Path(lot_id): Path<Uuid>,
) -> Result<Json<Lot>, AppError> {
    Ok(Json(parking.get_lot(lot_id).await?))
}

/// PUT `/admin/lots/{lot_id}` — edit fields and/or change capacity.
pub async fn update_lot(
    State(parking): State<ParkingService>,
    Path(lot_id): Path<Uuid>,
    Json(body): Json<LotUpdate>,
) -> Result<Json<Lot>, AppError> {
    Ok(Json(parking.update_lot(lot_id, body).await?))
}

/// POST `/admin/lots/{lot_id}/resize` — capacity change only.
pub async fn resize_lot(
    State(parking): State<ParkingService>,
    Path(lot_id): Path<Uuid>,
    Json(body): Json<ResizeRequest>,
) -> Result<Json<Lot>, AppError> {
    Ok(Json(parking.resize_lot(lot_id, body.new_capacity).await?))
}

/// DELETE `/admin/lots/{lot_id}` — remove an empty lot and its history.
pub async fn delete_lot(
    State(parking): State<ParkingService>,
    Path(lot_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    parking.delete_lot(lot_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/admin/spots/status` — every spot with its occupant, if any.
pub async fn spot_statuses(
    State(parking): State<ParkingService>,
) -> Result<Json<Vec<SpotStatusView>>, AppError> {
    Ok(Json(parking.spot_statuses().await?))
}
