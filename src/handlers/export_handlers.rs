//! Handlers for triggering booking-history exports and polling their status.

use crate::{
    errors::AppError,
    handlers::require_user_id,
    services::export_service::{ExportJobStatus, ExportJobs},
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ExportAccepted {
    pub task_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub task_id: Uuid,
    #[serde(flatten)]
    pub state: ExportJobStatus,
}

/// POST `/api/export/csv` — queue a CSV export of the caller's history.
pub async fn trigger_csv_export(
    State(exports): State<ExportJobs>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let user_id = require_user_id(&headers)?;
    let task_id = exports.enqueue_history_export(user_id).await;
    Ok((StatusCode::ACCEPTED, Json(ExportAccepted { task_id })))
}

/// GET `/api/task/{task_id}` — poll an export job.
pub async fn task_status(
    State(exports): State<ExportJobs>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskStatusResponse>, AppError> {
    let state = exports
        .status(task_id)
        .ok_or_else(|| AppError::not_found(format!("task `{task_id}` not found")))?;
    Ok(Json(TaskStatusResponse { task_id, state }))
}
