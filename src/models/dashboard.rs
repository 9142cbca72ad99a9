//! Read-side rollup records served by the dashboard endpoints.
//!
//! All counts here are computed from live spot/booking state at query time.
//! Nothing in this module is ever written back to the store.

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::booking::Booking;

/// Occupancy counts for one lot.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct LotOccupancy {
    pub lot_id: Uuid,
    pub lot_name: String,
    pub total_spots: i64,
    pub occupied_spots: i64,
    pub available_spots: i64,
}

/// System-wide totals plus a per-lot occupancy breakdown.
#[derive(Serialize, Clone, Debug)]
pub struct SystemSummary {
    pub total_lots: i64,
    pub total_spots: i64,
    pub occupied_spots: i64,
    pub available_spots: i64,
    pub lot_occupancy: Vec<LotOccupancy>,
}

/// Per-user spend rollup for the personal dashboard.
#[derive(Serialize, Clone, Debug)]
pub struct UserSummary {
    pub total_bookings: i64,

    /// Sum of closed-booking costs; open bookings count as zero.
    pub total_spent: f64,

    /// The user's most recent booking (open or closed), if any.
    pub recent_booking: Option<Booking>,
}
