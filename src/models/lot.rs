//! Represents a parking lot — a facility owning a numbered set of spots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A parking lot in the system.
///
/// Lots are created with a declared capacity; the matching spot rows are
/// fanned out in the same transaction, so `capacity` always equals the number
/// of live spot rows.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Lot {
    /// Unique identifier for this lot (UUID for internal DB use).
    pub id: Uuid,

    /// Globally unique lot name.
    pub name: String,

    /// Street address of the facility.
    pub address: String,

    /// Postal code of the facility.
    pub pin_code: String,

    /// Hourly price charged while a spot is held. Always positive.
    pub price_per_hour: f64,

    /// Declared spot count. Kept in step with the spot rows by the resizer.
    pub capacity: i64,

    /// When this lot was created.
    pub created_at: DateTime<Utc>,
}

/// A lot together with its live available-spot count, as shown to users
/// picking where to park. The count is computed from spot state on every
/// read, never cached.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct LotAvailability {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub lot: Lot,

    /// Number of spots currently free in this lot.
    pub available_spots: i64,
}

/// Request body for creating a lot.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLot {
    pub name: String,
    pub address: String,
    pub pin_code: String,
    pub price_per_hour: f64,
    pub capacity: i64,
}

/// Partial update for a lot. Absent fields are left unchanged; a capacity
/// change goes through the resize rules (grow freely, shrink only across
/// available spots).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LotUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub pin_code: Option<String>,
    pub price_per_hour: Option<f64>,
    pub capacity: Option<i64>,
}
