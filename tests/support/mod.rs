//! Shared test scaffolding: a file-backed SQLite database (so several pool
//! connections observe one store, as in production) with the schema applied.
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use parking_system::models::lot::{Lot, NewLot};
use parking_system::services::parking_service::ParkingService;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::{sync::Arc, time::Duration};
use tempfile::TempDir;
use uuid::Uuid;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Fresh service over a fresh database. Keep the returned `TempDir` alive
/// for the duration of the test.
pub async fn test_service() -> (ParkingService, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("parking.db"))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(opts)
        .await
        .expect("open test database");

    for stmt in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(stmt).execute(&pool).await.expect("apply schema");
    }

    (ParkingService::new(Arc::new(pool)), dir)
}

pub fn new_lot(name: &str, capacity: i64, price: f64) -> NewLot {
    NewLot {
        name: name.to_string(),
        address: "12 Harbor Road".to_string(),
        pin_code: "560001".to_string(),
        price_per_hour: price,
        capacity,
    }
}

pub async fn create_lot(service: &ParkingService, name: &str, capacity: i64, price: f64) -> Lot {
    service
        .create_lot(new_lot(name, capacity, price))
        .await
        .expect("create lot")
}

/// Rewrite a booking's start time so duration-based cost is deterministic.
pub async fn backdate_booking(service: &ParkingService, booking_id: Uuid, start: DateTime<Utc>) {
    sqlx::query("UPDATE bookings SET start_time = ? WHERE id = ?")
        .bind(start)
        .bind(booking_id)
        .execute(&*service.db)
        .await
        .expect("backdate booking");
}

/// Rewrite a closed booking's whole window, for deterministic history order.
pub async fn set_booking_window(
    service: &ParkingService,
    booking_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) {
    sqlx::query("UPDATE bookings SET start_time = ?, end_time = ? WHERE id = ?")
        .bind(start)
        .bind(end)
        .bind(booking_id)
        .execute(&*service.db)
        .await
        .expect("rewrite booking window");
}

pub async fn spot_numbers(service: &ParkingService, lot_id: Uuid) -> Vec<i64> {
    sqlx::query_scalar("SELECT spot_number FROM spots WHERE lot_id = ? ORDER BY spot_number")
        .bind(lot_id)
        .fetch_all(&*service.db)
        .await
        .expect("list spot numbers")
}
