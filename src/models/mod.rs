//! Core data models for the parking reservation service.
//!
//! These entities represent lots, the spots they own, and the bookings that
//! tie a user to a spot for a span of time. They map cleanly to database
//! tables via `sqlx::FromRow` and serialize naturally as JSON via `serde`.

pub mod booking;
pub mod dashboard;
pub mod lot;
pub mod spot;
