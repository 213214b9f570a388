use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::repository::parse_timestamp;
use crate::db::DatabaseError;
use crate::models::{ParticipantRole, RoomMessage};

/// Insert a room message and return it with its assigned sequence number.
///
/// The sequence number is the insertion-order tiebreak for messages that
/// share a timestamp.
pub fn insert_room_message(
    conn: &Connection,
    msg: &RoomMessage,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO room_messages (id, room_id, sender_email, sender_role, content, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            msg.id.to_string(),
            msg.room_id,
            msg.sender_email,
            msg.sender_role.as_str(),
            msg.content,
            msg.timestamp.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// The most recent `limit` messages of a room, in ascending
/// (timestamp, seq) order. A pure read; repeated calls without writes
/// return identical sequences.
pub fn recent_room_messages(
    conn: &Connection,
    room_id: &str,
    limit: usize,
) -> Result<Vec<RoomMessage>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT seq, id, room_id, sender_email, sender_role, content, timestamp
         FROM room_messages WHERE room_id = ?1
         ORDER BY timestamp DESC, seq DESC LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![room_id, limit as i64], |row| {
        Ok(MessageRow {
            seq: row.get(0)?,
            id: row.get(1)?,
            room_id: row.get(2)?,
            sender_email: row.get(3)?,
            sender_role: row.get(4)?,
            content: row.get(5)?,
            timestamp: row.get(6)?,
        })
    })?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(message_from_row(row?)?);
    }
    // Query walked newest-first to apply the cap; callers want ascending.
    messages.reverse();
    Ok(messages)
}

struct MessageRow {
    seq: i64,
    id: String,
    room_id: String,
    sender_email: String,
    sender_role: String,
    content: String,
    timestamp: String,
}

fn message_from_row(row: MessageRow) -> Result<RoomMessage, DatabaseError> {
    Ok(RoomMessage {
        id: Uuid::parse_str(&row.id).map_err(|e| DatabaseError::CorruptRow(e.to_string()))?,
        room_id: row.room_id,
        sender_email: row.sender_email,
        sender_role: ParticipantRole::from_str(&row.sender_role)?,
        content: row.content,
        timestamp: parse_timestamp(&row.timestamp)?,
        seq: row.seq,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::{TimeZone, Utc};

    fn message(room: &str, text: &str, ts: chrono::DateTime<Utc>) -> RoomMessage {
        RoomMessage {
            id: Uuid::new_v4(),
            room_id: room.into(),
            sender_email: "doc@example.com".into(),
            sender_role: ParticipantRole::Doctor,
            content: text.into(),
            timestamp: ts,
            seq: 0,
        }
    }

    #[test]
    fn seq_is_monotonic_per_insert() {
        let conn = open_memory_database().unwrap();
        let ts = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        let a = insert_room_message(&conn, &message("r1", "a", ts)).unwrap();
        let b = insert_room_message(&conn, &message("r1", "b", ts)).unwrap();
        assert!(b > a);
    }

    #[test]
    fn equal_timestamps_keep_insertion_order() {
        let conn = open_memory_database().unwrap();
        let ts = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        for text in ["first", "second", "third"] {
            insert_room_message(&conn, &message("r1", text, ts)).unwrap();
        }

        let history = recent_room_messages(&conn, "r1", 10).unwrap();
        let texts: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
    }

    #[test]
    fn limit_keeps_newest_messages() {
        let conn = open_memory_database().unwrap();
        for i in 0..5 {
            let ts = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, i).unwrap();
            insert_room_message(&conn, &message("r1", &format!("m{i}"), ts)).unwrap();
        }

        let history = recent_room_messages(&conn, "r1", 2).unwrap();
        let texts: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, ["m3", "m4"]);
    }

    #[test]
    fn rooms_are_isolated() {
        let conn = open_memory_database().unwrap();
        let ts = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        insert_room_message(&conn, &message("r1", "for r1", ts)).unwrap();
        insert_room_message(&conn, &message("r2", "for r2", ts)).unwrap();

        let history = recent_room_messages(&conn, "r1", 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "for r1");
    }
}
