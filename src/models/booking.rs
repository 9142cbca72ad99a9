//! Represents a booking — a time-bounded occupancy of one spot by one user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A booking as the service exposes it: the stored row joined with the spot
/// number and lot details a caller needs to act on it (find the car, read
/// the receipt). Rows are inserted open by the allocator and closed exactly
/// once by the ledger, which fills `end_time` and `cost`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Booking {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// The user holding (or who held) the spot. Identity is resolved
    /// upstream; the engine treats it as opaque.
    pub user_id: Uuid,

    /// The spot this booking occupies.
    pub spot_id: Uuid,

    /// Number of the spot within its lot.
    pub spot_number: i64,

    /// Name of the lot the spot belongs to.
    pub lot_name: String,

    /// Address of the lot, for the receipt.
    pub lot_address: String,

    /// When the user parked. Immutable after creation.
    pub start_time: DateTime<Utc>,

    /// When the user left. `None` while the booking is open.
    pub end_time: Option<DateTime<Utc>>,

    /// Cost computed at release; `None` while the booking is open.
    pub cost: Option<f64>,
}

impl Booking {
    /// True while the booking has not been released.
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}
