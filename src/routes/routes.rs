//! Defines routes for booking, lot administration, dashboards, and exports.
//!
//! ## Structure
//! - **User endpoints** (identity via the `x-user-id` header)
//!   - `GET  /api/lots` — lots with live availability
//!   - `POST /api/book/{lot_id}` — book the lowest-numbered free spot
//!   - `POST /api/release` — release, priced by the hour rounded up
//!   - `GET  /api/booking/active` — current open booking
//!   - `GET  /api/history` — closed bookings (paginated by token)
//!   - `GET  /api/dashboard/summary` — personal rollup
//!   - `POST /api/export/csv` + `GET /api/task/{task_id}` — history export
//!
//! - **Admin endpoints** (role resolved upstream)
//!   - `POST   /admin/lots` / `GET /admin/lots` — create / list
//!   - `PUT    /admin/lots/{lot_id}` — edit fields and/or capacity
//!   - `POST   /admin/lots/{lot_id}/resize` — capacity only
//!   - `DELETE /admin/lots/{lot_id}` — delete an empty lot
//!   - `GET    /admin/lots/{lot_id}/summary` — occupancy for one lot
//!   - `GET    /admin/spots/status` — every spot with its occupant
//!   - `GET    /admin/dashboard/summary` — system totals
//!   - `GET    /admin/bookings` — pull query for exports/reports

use crate::{
    handlers::{
        booking_handlers::{active_booking, book, history, list_bookings_for_user, release},
        dashboard_handlers::{lot_dashboard, system_dashboard, user_dashboard},
        export_handlers::{task_status, trigger_csv_export},
        health_handlers::{healthz, readyz},
        lot_handlers::{
            create_lot, delete_lot, get_lot, list_lots, resize_lot, spot_statuses, update_lot,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build and return the router for the whole API surface.
///
/// The router carries shared state (`AppState`) to all handlers; the engine
/// and the export worker are both reachable from it.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // user-facing routes
        .route("/api/lots", get(list_lots))
        .route("/api/book/{lot_id}", post(book))
        .route("/api/release", post(release))
        .route("/api/booking/active", get(active_booking))
        .route("/api/history", get(history))
        .route("/api/dashboard/summary", get(user_dashboard))
        .route("/api/export/csv", post(trigger_csv_export))
        .route("/api/task/{task_id}", get(task_status))
        // admin routes
        .route("/admin/lots", post(create_lot).get(list_lots))
        .route(
            "/admin/lots/{lot_id}",
            get(get_lot).put(update_lot).delete(delete_lot),
        )
        .route("/admin/lots/{lot_id}/resize", post(resize_lot))
        .route("/admin/lots/{lot_id}/summary", get(lot_dashboard))
        .route("/admin/spots/status", get(spot_statuses))
        .route("/admin/dashboard/summary", get(system_dashboard))
        .route("/admin/bookings", get(list_bookings_for_user))
}
