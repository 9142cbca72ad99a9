//! Shared application state handed to the router.

use axum::extract::FromRef;

use crate::services::{export_service::ExportJobs, parking_service::ParkingService};

#[derive(Clone)]
pub struct AppState {
    pub parking: ParkingService,
    pub exports: ExportJobs,
}

impl FromRef<AppState> for ParkingService {
    fn from_ref(state: &AppState) -> Self {
        state.parking.clone()
    }
}

impl FromRef<AppState> for ExportJobs {
    fn from_ref(state: &AppState) -> Self {
        state.exports.clone()
    }
}
