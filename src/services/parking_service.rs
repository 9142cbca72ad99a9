//! src/services/parking_service.rs
//!
//! ParkingService — the spot-allocation and booking-lifecycle engine backed
//! by SQLite. The store is the single source of truth: there is no in-process
//! cache of spot state, and every mutation (book, release, lot create/resize/
//! delete) runs inside one transaction so spot status and booking rows can
//! never drift apart.
//!
//! SQLite transactions are serializable; a losing writer surfaces
//! `SQLITE_BUSY`, which the service retries a bounded number of times with
//! backoff before reporting the operation as contended. Read-side queries
//! (availability listings, dashboards, history, exports) run outside any
//! transaction and take no write locks.

use crate::models::{
    booking::Booking,
    dashboard::{LotOccupancy, SystemSummary, UserSummary},
    lot::{Lot, LotAvailability, LotUpdate, NewLot},
    spot::{Spot, SpotStatus, SpotStatusView},
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, SqlitePool, Transaction, sqlite::Sqlite};
use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::debug;
use uuid::Uuid;

/// Cursor into a user's closed-booking history: everything strictly before
/// this (end time, id) pair in the most-recent-first ordering.
#[derive(Clone, Copy, Debug)]
pub struct HistoryCursor {
    pub before_end: DateTime<Utc>,
    pub before_id: Uuid,
}

#[derive(Clone, Copy, Debug)]
pub struct HistoryParams {
    pub cursor: Option<HistoryCursor>,
    pub max_items: usize,
}

#[derive(Debug)]
pub struct HistoryPage {
    pub bookings: Vec<Booking>,
    pub is_truncated: bool,
    pub next_cursor: Option<HistoryCursor>,
}

#[derive(Debug, Error)]
pub enum ParkingError {
    #[error("lot `{0}` not found")]
    LotNotFound(Uuid),
    #[error("a lot named `{0}` already exists")]
    DuplicateLotName(String),
    #[error("capacity must be a positive integer, got {0}")]
    InvalidCapacity(i64),
    #[error("price per hour must be positive, got {0}")]
    InvalidPrice(f64),
    #[error("user `{0}` already has an active booking")]
    AlreadyBooked(Uuid),
    #[error("no available spots in lot `{0}`")]
    LotFull(Uuid),
    #[error("no active booking for this user")]
    NoActiveBooking,
    #[error("cannot shrink lot: {needed} spot(s) must go but only {removable} are available")]
    InsufficientRemovableSpots { needed: i64, removable: i64 },
    #[error("cannot delete lot: {0} spot(s) are currently occupied")]
    LotHasOccupiedSpots(i64),
    #[error("`{0}` kept conflicting with concurrent writes, try again")]
    Contended(&'static str),
    #[error("`{0}` timed out against the store")]
    StoreTimeout(&'static str),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type ParkingResult<T> = Result<T, ParkingError>;

impl ParkingError {
    /// True for serialization conflicts and pool exhaustion — failures a
    /// fresh attempt can succeed on.
    fn is_retryable(&self) -> bool {
        match self {
            ParkingError::Sqlx(sqlx::Error::PoolTimedOut) => true,
            ParkingError::Sqlx(sqlx::Error::Database(db_err)) => {
                let msg = db_err.message().to_ascii_lowercase();
                msg.contains("locked") || msg.contains("busy")
            }
            _ => false,
        }
    }
}

const MAX_WRITE_ATTEMPTS: u32 = 5;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(25);
const STORE_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Rows per INSERT batch when fanning out spots, to stay well below the
/// SQLite bind-parameter limit.
const SPOT_INSERT_CHUNK: usize = 200;

const MAX_HISTORY_PAGE: usize = 100;

/// Booking rows joined with spot number and lot details.
const BOOKING_VIEW: &str = "SELECT b.id, b.user_id, b.spot_id, s.spot_number, \
     l.name AS lot_name, l.address AS lot_address, b.start_time, b.end_time, b.cost \
     FROM bookings b \
     JOIN spots s ON s.id = b.spot_id \
     JOIN lots l ON l.id = s.lot_id";

/// ParkingService provides the booking engine and its admin surface:
/// - Book a spot (atomically claims the lowest-numbered free spot)
/// - Release it (computes cost, frees the spot)
/// - Create / edit / resize / delete lots
/// - Read-only dashboards and history
///
/// This struct intentionally keeps a minimal surface area so it is easy to
/// test and reason about; the HTTP layer above it is a thin shell.
#[derive(Clone)]
pub struct ParkingService {
    /// Shared SQLite connection pool. All state lives here.
    pub db: Arc<SqlitePool>,
}

impl ParkingService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    // ── Spot allocator ──────────────────────────────────────────────

    /// Book the lowest-numbered available spot in `lot_id` for `user_id`.
    ///
    /// Rejects with `AlreadyBooked` if the user already holds an open booking
    /// anywhere, `LotFull` if the lot has no free spot. The status flip and
    /// the booking insert commit together; under concurrent calls no two
    /// users can be handed the same spot, and the partial unique index on
    /// open bookings backstops the one-active-booking-per-user check.
    pub async fn book(&self, lot_id: Uuid, user_id: Uuid) -> ParkingResult<Booking> {
        self.write_with_retry("book", || self.try_book(lot_id, user_id))
            .await
    }

    async fn try_book(&self, lot_id: Uuid, user_id: Uuid) -> ParkingResult<Booking> {
        let mut tx = self.db.begin().await?;

        let lot = lot_by_id(&mut *tx, lot_id).await?;

        let open: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM bookings WHERE user_id = ? AND end_time IS NULL")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if open.is_some() {
            return Err(ParkingError::AlreadyBooked(user_id));
        }

        let spot = sqlx::query_as::<_, Spot>(
            "SELECT id, lot_id, spot_number, status FROM spots \
             WHERE lot_id = ? AND status = 'Available' \
             ORDER BY spot_number ASC LIMIT 1",
        )
        .bind(lot_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ParkingError::LotFull(lot_id))?;

        let claimed =
            sqlx::query("UPDATE spots SET status = 'Occupied' WHERE id = ? AND status = 'Available'")
                .bind(spot.id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        if claimed == 0 {
            return Err(ParkingError::Contended("book"));
        }

        let booking_id = Uuid::new_v4();
        let start_time = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO bookings (id, user_id, spot_id, start_time, end_time, cost) \
             VALUES (?, ?, ?, ?, NULL, NULL)",
        )
        .bind(booking_id)
        .bind(user_id)
        .bind(spot.id)
        .bind(start_time)
        .execute(&mut *tx)
        .await;
        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(ParkingError::AlreadyBooked(user_id));
            }
            Err(err) => return Err(err.into()),
        }

        tx.commit().await?;

        debug!(
            "user {} booked spot {} in lot {}",
            user_id, spot.spot_number, lot.name
        );

        Ok(Booking {
            id: booking_id,
            user_id,
            spot_id: spot.id,
            spot_number: spot.spot_number,
            lot_name: lot.name,
            lot_address: lot.address,
            start_time,
            end_time: None,
            cost: None,
        })
    }

    // ── Booking ledger ──────────────────────────────────────────────

    /// Close the caller's open booking: stamp the end time, charge
    /// `ceil(hours) * price_per_hour`, and free the spot, all in one
    /// transaction. A second call finds nothing open and gets
    /// `NoActiveBooking` — never a duplicate charge.
    pub async fn release(&self, user_id: Uuid) -> ParkingResult<Booking> {
        self.write_with_retry("release", || self.try_release(user_id))
            .await
    }

    async fn try_release(&self, user_id: Uuid) -> ParkingResult<Booking> {
        let mut tx = self.db.begin().await?;

        let open = sqlx::query_as::<_, OpenBookingRow>(
            "SELECT b.id, b.spot_id, s.spot_number, l.name AS lot_name, \
                    l.address AS lot_address, l.price_per_hour, b.start_time \
             FROM bookings b \
             JOIN spots s ON s.id = b.spot_id \
             JOIN lots l ON l.id = s.lot_id \
             WHERE b.user_id = ? AND b.end_time IS NULL",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ParkingError::NoActiveBooking)?;

        let end_time = Utc::now();
        let cost = booking_cost(open.start_time, end_time, open.price_per_hour);

        let closed =
            sqlx::query("UPDATE bookings SET end_time = ?, cost = ? WHERE id = ? AND end_time IS NULL")
                .bind(end_time)
                .bind(cost)
                .bind(open.id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        if closed == 0 {
            return Err(ParkingError::NoActiveBooking);
        }

        sqlx::query("UPDATE spots SET status = 'Available' WHERE id = ?")
            .bind(open.spot_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            "user {} released spot {} in lot {} for {:.2}",
            user_id, open.spot_number, open.lot_name, cost
        );

        Ok(Booking {
            id: open.id,
            user_id,
            spot_id: open.spot_id,
            spot_number: open.spot_number,
            lot_name: open.lot_name,
            lot_address: open.lot_address,
            start_time: open.start_time,
            end_time: Some(end_time),
            cost: Some(cost),
        })
    }

    /// The caller's open booking, or `NoActiveBooking`.
    pub async fn active_booking(&self, user_id: Uuid) -> ParkingResult<Booking> {
        let sql = format!("{BOOKING_VIEW} WHERE b.user_id = ? AND b.end_time IS NULL");
        sqlx::query_as::<_, Booking>(&sql)
            .bind(user_id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(ParkingError::NoActiveBooking)
    }

    /// Closed bookings for a user, most recently ended first, paginated by
    /// an (end time, id) cursor so a page boundary never skips or repeats a
    /// row even while new bookings close.
    pub async fn booking_history(
        &self,
        user_id: Uuid,
        params: HistoryParams,
    ) -> ParkingResult<HistoryPage> {
        let max_items = params.max_items.clamp(1, MAX_HISTORY_PAGE);
        let fetch_limit = max_items + 1;

        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("{BOOKING_VIEW} WHERE b.user_id = "));
        builder.push_bind(user_id);
        builder.push(" AND b.end_time IS NOT NULL");

        if let Some(cursor) = params.cursor {
            builder.push(" AND (b.end_time < ");
            builder.push_bind(cursor.before_end);
            builder.push(" OR (b.end_time = ");
            builder.push_bind(cursor.before_end);
            builder.push(" AND b.id < ");
            builder.push_bind(cursor.before_id);
            builder.push("))");
        }

        builder.push(" ORDER BY b.end_time DESC, b.id DESC LIMIT ");
        builder.push_bind(fetch_limit as i64);

        let mut rows: Vec<Booking> = builder.build_query_as().fetch_all(&*self.db).await?;

        let mut is_truncated = false;
        if rows.len() == fetch_limit {
            rows.pop();
            is_truncated = true;
        }
        let next_cursor = if is_truncated {
            rows.last().map(|b| HistoryCursor {
                before_end: b.end_time.unwrap_or(b.start_time),
                before_id: b.id,
            })
        } else {
            None
        };

        Ok(HistoryPage {
            bookings: rows,
            is_truncated,
            next_cursor,
        })
    }

    /// Pull-style query for export/report jobs: every booking for a user,
    /// newest first, optionally only those started at or after `since`.
    /// Plain read, no transaction — safe to run while booking traffic flows.
    pub async fn bookings_for_user(
        &self,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> ParkingResult<Vec<Booking>> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("{BOOKING_VIEW} WHERE b.user_id = "));
        builder.push_bind(user_id);
        if let Some(since) = since {
            builder.push(" AND b.start_time >= ");
            builder.push_bind(since);
        }
        builder.push(" ORDER BY b.start_time DESC");

        Ok(builder.build_query_as().fetch_all(&*self.db).await?)
    }

    // ── Lot management / capacity resizer ───────────────────────────

    /// Create a lot and fan out its spot rows (numbered 1..=capacity) in the
    /// same transaction.
    pub async fn create_lot(&self, new_lot: NewLot) -> ParkingResult<Lot> {
        ensure_capacity_valid(new_lot.capacity)?;
        ensure_price_valid(new_lot.price_per_hour)?;
        self.write_with_retry("create_lot", || self.try_create_lot(&new_lot))
            .await
    }

    async fn try_create_lot(&self, new_lot: &NewLot) -> ParkingResult<Lot> {
        let lot = Lot {
            id: Uuid::new_v4(),
            name: new_lot.name.clone(),
            address: new_lot.address.clone(),
            pin_code: new_lot.pin_code.clone(),
            price_per_hour: new_lot.price_per_hour,
            capacity: new_lot.capacity,
            created_at: Utc::now(),
        };

        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO lots (id, name, address, pin_code, price_per_hour, capacity, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(lot.id)
        .bind(&lot.name)
        .bind(&lot.address)
        .bind(&lot.pin_code)
        .bind(lot.price_per_hour)
        .bind(lot.capacity)
        .bind(lot.created_at)
        .execute(&mut *tx)
        .await;
        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(ParkingError::DuplicateLotName(new_lot.name.clone()));
            }
            Err(err) => return Err(err.into()),
        }

        insert_spots(&mut tx, lot.id, 1, lot.capacity).await?;
        tx.commit().await?;

        debug!("created lot {} with {} spots", lot.name, lot.capacity);
        Ok(lot)
    }

    pub async fn get_lot(&self, lot_id: Uuid) -> ParkingResult<Lot> {
        lot_by_id(&*self.db, lot_id).await
    }

    /// All lots with their live available-spot counts, ordered by name.
    pub async fn list_lots(&self) -> ParkingResult<Vec<LotAvailability>> {
        Ok(sqlx::query_as::<_, LotAvailability>(
            "SELECT l.id, l.name, l.address, l.pin_code, l.price_per_hour, l.capacity, l.created_at, \
                    COALESCE(SUM(CASE WHEN s.status = 'Available' THEN 1 ELSE 0 END), 0) AS available_spots \
             FROM lots l \
             LEFT JOIN spots s ON s.lot_id = l.id \
             GROUP BY l.id ORDER BY l.name",
        )
        .fetch_all(&*self.db)
        .await?)
    }

    /// Edit lot fields and/or capacity. Field edits and the resize commit as
    /// one unit; a name collision surfaces as `DuplicateLotName`.
    pub async fn update_lot(&self, lot_id: Uuid, update: LotUpdate) -> ParkingResult<Lot> {
        if let Some(capacity) = update.capacity {
            ensure_capacity_valid(capacity)?;
        }
        if let Some(price) = update.price_per_hour {
            ensure_price_valid(price)?;
        }
        self.write_with_retry("update_lot", || self.try_update_lot(lot_id, &update))
            .await
    }

    async fn try_update_lot(&self, lot_id: Uuid, update: &LotUpdate) -> ParkingResult<Lot> {
        let mut tx = self.db.begin().await?;
        let lot = lot_by_id(&mut *tx, lot_id).await?;

        let name = update.name.clone().unwrap_or_else(|| lot.name.clone());
        let address = update.address.clone().unwrap_or_else(|| lot.address.clone());
        let pin_code = update.pin_code.clone().unwrap_or_else(|| lot.pin_code.clone());
        let price = update.price_per_hour.unwrap_or(lot.price_per_hour);

        let updated = sqlx::query(
            "UPDATE lots SET name = ?, address = ?, pin_code = ?, price_per_hour = ? WHERE id = ?",
        )
        .bind(&name)
        .bind(&address)
        .bind(&pin_code)
        .bind(price)
        .bind(lot_id)
        .execute(&mut *tx)
        .await;
        match updated {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(ParkingError::DuplicateLotName(name));
            }
            Err(err) => return Err(err.into()),
        }

        if let Some(capacity) = update.capacity {
            apply_capacity(&mut tx, &lot, capacity).await?;
        }

        let fresh = lot_by_id(&mut *tx, lot_id).await?;
        tx.commit().await?;
        Ok(fresh)
    }

    /// Grow or shrink a lot's spot set. Growing adds available spots above
    /// the current highest number; shrinking always cuts the highest-numbered
    /// spots so low-numbered spots stay stable, and refuses
    /// (`InsufficientRemovableSpots`) if any spot in that range is occupied —
    /// an occupied spot is never vacated. Equal capacity is a no-op. All
    /// spot churn for one resize commits atomically.
    pub async fn resize_lot(&self, lot_id: Uuid, new_capacity: i64) -> ParkingResult<Lot> {
        ensure_capacity_valid(new_capacity)?;
        self.write_with_retry("resize_lot", || self.try_resize_lot(lot_id, new_capacity))
            .await
    }

    async fn try_resize_lot(&self, lot_id: Uuid, new_capacity: i64) -> ParkingResult<Lot> {
        let mut tx = self.db.begin().await?;
        let lot = lot_by_id(&mut *tx, lot_id).await?;
        apply_capacity(&mut tx, &lot, new_capacity).await?;
        let fresh = lot_by_id(&mut *tx, lot_id).await?;
        tx.commit().await?;
        Ok(fresh)
    }

    /// Delete a lot, its spots, and their booking history. Refused while any
    /// spot is occupied; nothing is touched in that case.
    pub async fn delete_lot(&self, lot_id: Uuid) -> ParkingResult<()> {
        self.write_with_retry("delete_lot", || self.try_delete_lot(lot_id))
            .await
    }

    async fn try_delete_lot(&self, lot_id: Uuid) -> ParkingResult<()> {
        let mut tx = self.db.begin().await?;
        let lot = lot_by_id(&mut *tx, lot_id).await?;

        let occupied: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM spots WHERE lot_id = ? AND status = 'Occupied'")
                .bind(lot_id)
                .fetch_one(&mut *tx)
                .await?;
        if occupied > 0 {
            return Err(ParkingError::LotHasOccupiedSpots(occupied));
        }

        sqlx::query("DELETE FROM bookings WHERE spot_id IN (SELECT id FROM spots WHERE lot_id = ?)")
            .bind(lot_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM spots WHERE lot_id = ?")
            .bind(lot_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM lots WHERE id = ?")
            .bind(lot_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!("deleted lot {} and its booking history", lot.name);
        Ok(())
    }

    // ── Dashboard aggregator ────────────────────────────────────────
    //
    // Pure read-side rollups. Always computed from current spot/booking
    // state, never from separately maintained counters.

    pub async fn lot_summary(&self, lot_id: Uuid) -> ParkingResult<LotOccupancy> {
        let lot = lot_by_id(&*self.db, lot_id).await?;
        let (total, occupied): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'Occupied' THEN 1 ELSE 0 END), 0) \
             FROM spots WHERE lot_id = ?",
        )
        .bind(lot_id)
        .fetch_one(&*self.db)
        .await?;

        Ok(LotOccupancy {
            lot_id,
            lot_name: lot.name,
            total_spots: total,
            occupied_spots: occupied,
            available_spots: total - occupied,
        })
    }

    pub async fn system_summary(&self) -> ParkingResult<SystemSummary> {
        let total_lots: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lots")
            .fetch_one(&*self.db)
            .await?;

        let lot_occupancy: Vec<LotOccupancy> = sqlx::query_as(
            "SELECT l.id AS lot_id, l.name AS lot_name, COUNT(s.id) AS total_spots, \
                    COALESCE(SUM(CASE WHEN s.status = 'Occupied' THEN 1 ELSE 0 END), 0) AS occupied_spots, \
                    COALESCE(SUM(CASE WHEN s.status = 'Available' THEN 1 ELSE 0 END), 0) AS available_spots \
             FROM lots l \
             LEFT JOIN spots s ON s.lot_id = l.id \
             GROUP BY l.id, l.name ORDER BY l.name",
        )
        .fetch_all(&*self.db)
        .await?;

        Ok(SystemSummary {
            total_lots,
            total_spots: lot_occupancy.iter().map(|l| l.total_spots).sum(),
            occupied_spots: lot_occupancy.iter().map(|l| l.occupied_spots).sum(),
            available_spots: lot_occupancy.iter().map(|l| l.available_spots).sum(),
            lot_occupancy,
        })
    }

    pub async fn user_summary(&self, user_id: Uuid) -> ParkingResult<UserSummary> {
        let (total_bookings, total_spent): (i64, f64) = sqlx::query_as(
            "SELECT COUNT(*), CAST(COALESCE(SUM(COALESCE(cost, 0)), 0) AS REAL) \
             FROM bookings WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&*self.db)
        .await?;

        let sql = format!("{BOOKING_VIEW} WHERE b.user_id = ? ORDER BY b.start_time DESC LIMIT 1");
        let recent_booking = sqlx::query_as::<_, Booking>(&sql)
            .bind(user_id)
            .fetch_optional(&*self.db)
            .await?;

        Ok(UserSummary {
            total_bookings,
            total_spent,
            recent_booking,
        })
    }

    /// Every spot with its lot name and, when occupied, the open booking
    /// holding it. Admin monitoring view.
    pub async fn spot_statuses(&self) -> ParkingResult<Vec<SpotStatusView>> {
        Ok(sqlx::query_as::<_, SpotStatusView>(
            "SELECT s.id, s.lot_id, l.name AS lot_name, s.spot_number, s.status, \
                    b.id AS booking_id, b.user_id AS occupant_user_id, b.start_time AS occupied_since \
             FROM spots s \
             JOIN lots l ON l.id = s.lot_id \
             LEFT JOIN bookings b ON b.spot_id = s.id AND b.end_time IS NULL \
             ORDER BY l.name, s.spot_number",
        )
        .fetch_all(&*self.db)
        .await?)
    }

    // ── Retry machinery ─────────────────────────────────────────────

    /// Run a transactional write, retrying serialization conflicts with
    /// doubling backoff. Each attempt is bounded by `STORE_OP_TIMEOUT`; a
    /// timed-out attempt rolls back via transaction drop, so no half-applied
    /// write is ever visible. Exhausted retries surface as `Contended`.
    async fn write_with_retry<T, F, Fut>(&self, op: &'static str, run: F) -> ParkingResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ParkingResult<T>>,
    {
        let mut delay = RETRY_BASE_DELAY;
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            match timeout(STORE_OP_TIMEOUT, run()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("{op}: write conflict on attempt {attempt}, retrying: {err}");
                    sleep(delay).await;
                    delay *= 2;
                }
                Ok(Err(err)) if err.is_retryable() => return Err(ParkingError::Contended(op)),
                Ok(Err(err)) => return Err(err),
                Err(_) => return Err(ParkingError::StoreTimeout(op)),
            }
        }
        Err(ParkingError::Contended(op))
    }
}

/// Open-booking row joined with everything release needs to price and
/// describe it.
#[derive(FromRow)]
struct OpenBookingRow {
    id: Uuid,
    spot_id: Uuid,
    spot_number: i64,
    lot_name: String,
    lot_address: String,
    price_per_hour: f64,
    start_time: DateTime<Utc>,
}

async fn lot_by_id<'e, E>(executor: E, lot_id: Uuid) -> ParkingResult<Lot>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Lot>(
        "SELECT id, name, address, pin_code, price_per_hour, capacity, created_at \
         FROM lots WHERE id = ?",
    )
    .bind(lot_id)
    .fetch_optional(executor)
    .await?
    .ok_or(ParkingError::LotNotFound(lot_id))
}

/// Insert `count` available spots numbered from `first_number`, in batches.
async fn insert_spots(
    tx: &mut Transaction<'_, Sqlite>,
    lot_id: Uuid,
    first_number: i64,
    count: i64,
) -> ParkingResult<()> {
    let numbers: Vec<i64> = (first_number..first_number + count).collect();
    for chunk in numbers.chunks(SPOT_INSERT_CHUNK) {
        let mut builder =
            QueryBuilder::<Sqlite>::new("INSERT INTO spots (id, lot_id, spot_number, status) ");
        builder.push_values(chunk.iter(), |mut row, number| {
            row.push_bind(Uuid::new_v4())
                .push_bind(lot_id)
                .push_bind(*number)
                .push_bind(SpotStatus::Available);
        });
        builder.build().execute(&mut **tx).await?;
    }
    Ok(())
}

/// Apply a capacity change inside an open transaction.
///
/// Grow numbers new spots above the current maximum. Shrink always removes
/// the `needed` highest-numbered spots, so low-numbered spots are never
/// renumbered, and bails out if any spot in that range is occupied. Closed
/// bookings on the removed spots go with them; no open booking is ever
/// touched.
async fn apply_capacity(
    tx: &mut Transaction<'_, Sqlite>,
    lot: &Lot,
    new_capacity: i64,
) -> ParkingResult<()> {
    let current: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM spots WHERE lot_id = ?")
        .bind(lot.id)
        .fetch_one(&mut **tx)
        .await?;

    if new_capacity > current {
        let max_number: Option<i64> =
            sqlx::query_scalar("SELECT MAX(spot_number) FROM spots WHERE lot_id = ?")
                .bind(lot.id)
                .fetch_one(&mut **tx)
                .await?;
        insert_spots(tx, lot.id, max_number.unwrap_or(0) + 1, new_capacity - current).await?;
    } else if new_capacity < current {
        let needed = current - new_capacity;
        let tail: Vec<(Uuid, SpotStatus)> = sqlx::query_as(
            "SELECT id, status FROM spots WHERE lot_id = ? \
             ORDER BY spot_number DESC LIMIT ?",
        )
        .bind(lot.id)
        .bind(needed)
        .fetch_all(&mut **tx)
        .await?;

        let removable = tail
            .iter()
            .filter(|(_, status)| *status == SpotStatus::Available)
            .count() as i64;
        if removable < needed {
            return Err(ParkingError::InsufficientRemovableSpots { needed, removable });
        }
        let removable: Vec<Uuid> = tail.into_iter().map(|(id, _)| id).collect();

        let mut bookings = QueryBuilder::<Sqlite>::new("DELETE FROM bookings WHERE spot_id IN (");
        let mut ids = bookings.separated(", ");
        for id in &removable {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");
        bookings.build().execute(&mut **tx).await?;

        let mut spots = QueryBuilder::<Sqlite>::new("DELETE FROM spots WHERE id IN (");
        let mut ids = spots.separated(", ");
        for id in &removable {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");
        spots.build().execute(&mut **tx).await?;
    }

    sqlx::query("UPDATE lots SET capacity = ? WHERE id = ?")
        .bind(new_capacity)
        .bind(lot.id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

fn ensure_capacity_valid(capacity: i64) -> ParkingResult<()> {
    if capacity <= 0 {
        return Err(ParkingError::InvalidCapacity(capacity));
    }
    Ok(())
}

fn ensure_price_valid(price: f64) -> ParkingResult<()> {
    if !(price > 0.0) || !price.is_finite() {
        return Err(ParkingError::InvalidPrice(price));
    }
    Ok(())
}

/// Time-based cost: partial hours always round up to the next whole hour,
/// never down, never pro-rated. A zero-length stay costs nothing.
fn booking_cost(start: DateTime<Utc>, end: DateTime<Utc>, price_per_hour: f64) -> f64 {
    let millis = (end - start).num_milliseconds().max(0);
    let hours = (millis as f64 / 3_600_000.0).ceil();
    hours * price_per_hour
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
