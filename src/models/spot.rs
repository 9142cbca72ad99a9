//! Represents a single allocatable spot within a lot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Whether a spot is free or currently held by an open booking.
///
/// The column is denormalized for fast filtering but is only ever flipped in
/// the same transaction as the booking row it mirrors, so it never drifts
/// from "has an open booking".
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, sqlx::Type)]
pub enum SpotStatus {
    Available,
    Occupied,
}

/// One unit of parking inventory.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Spot {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Foreign key linking to the owning lot.
    pub lot_id: Uuid,

    /// Number within the lot, assigned at creation. Numbers stay unique per
    /// lot but are not necessarily contiguous after a shrink.
    pub spot_number: i64,

    /// Current status, kept transactionally in step with bookings.
    pub status: SpotStatus,
}

/// Admin monitoring view: a spot joined with its lot and, when occupied,
/// the open booking holding it.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct SpotStatusView {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub lot_name: String,
    pub spot_number: i64,
    pub status: SpotStatus,

    /// Open booking on this spot, if any.
    pub booking_id: Option<Uuid>,
    pub occupant_user_id: Option<Uuid>,
    pub occupied_since: Option<DateTime<Utc>>,
}
