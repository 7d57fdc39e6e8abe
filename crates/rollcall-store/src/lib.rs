//! rollcall-store — SQLite persistence for users, attendance, and face data.
//!
//! The attendance table carries a `UNIQUE(user_id, date)` constraint; that
//! constraint, not application logic, is the authoritative once-per-day
//! guard and is what concurrent sessions rely on.

mod db;
mod error;

pub use db::{AttendanceRecord, Database, ReportRow, Status, TrainSummary, User};
pub use error::StoreError;
