use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use super::RoomError;
use crate::db::repository;
use crate::models::{ParticipantRole, RoomMessage};

/// Default newest-bound on history reads.
pub const DEFAULT_HISTORY_LIMIT: usize = 200;

/// Append-only, time-ordered persistence of room messages.
///
/// The store is the durability boundary: a message is broadcast only after
/// `append` has returned, so a crash after acknowledgment can never lose an
/// already-delivered message.
pub struct MessageStore<'a> {
    conn: &'a Connection,
}

impl<'a> MessageStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Validate and durably write one message. Returns the stored message
    /// with its assigned sequence number.
    pub fn append(
        &self,
        room_id: &str,
        sender_email: &str,
        sender_role: ParticipantRole,
        text: &str,
    ) -> Result<RoomMessage, RoomError> {
        let room_id = room_id.trim();
        if room_id.is_empty() {
            return Err(RoomError::EmptyRoomId);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(RoomError::EmptyMessage);
        }

        let mut message = RoomMessage {
            id: Uuid::new_v4(),
            room_id: room_id.to_string(),
            sender_email: sender_email.to_string(),
            sender_role,
            content: text.to_string(),
            timestamp: Utc::now(),
            seq: 0,
        };
        message.seq = repository::insert_room_message(self.conn, &message)?;

        tracing::debug!(room_id = %message.room_id, seq = message.seq, "room message stored");
        Ok(message)
    }

    /// The most recent `limit` messages (default cap 200) in ascending
    /// timestamp order, insertion order breaking ties. Restartable read.
    pub fn history(
        &self,
        room_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<RoomMessage>, RoomError> {
        let room_id = room_id.trim();
        if room_id.is_empty() {
            return Err(RoomError::EmptyRoomId);
        }
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        Ok(repository::recent_room_messages(self.conn, room_id, limit)?)
    }
}
