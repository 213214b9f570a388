//! Low-level persistence. All SQL for the consultation core lives here;
//! components above never touch `rusqlite` directly.

pub mod ai_turn;
pub mod participant;
pub mod report;
pub mod room_message;

pub use ai_turn::*;
pub use participant::*;
pub use report::*;
pub use room_message::*;

use chrono::{DateTime, Utc};

use super::DatabaseError;

/// Parse an RFC 3339 timestamp column.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::CorruptRow(format!("bad timestamp {raw:?}: {e}")))
}
