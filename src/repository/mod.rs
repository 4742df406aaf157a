//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM over SQLite.

mod context;
mod diesel_pool;
mod document;
mod models;
mod util;

pub use context::DbContext;
pub use diesel_pool::{AsyncSqlitePool, DieselError};
pub use document::{DocumentRepository, OcrInsert, ReasoningUpdate};
pub use models::{Document, DocumentRecord, DocumentStatus, NewDocument};

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
