use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::repository::parse_timestamp;
use crate::db::DatabaseError;
use crate::models::{AiTurn, TurnRole};

/// Append one turn to a conversation. Returns the assigned sequence number.
pub fn insert_ai_turn(
    conn: &Connection,
    conversation_key: &str,
    turn: &AiTurn,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO ai_turns (id, conversation_key, role, content, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            turn.id.to_string(),
            conversation_key,
            turn.role.as_str(),
            turn.content,
            turn.timestamp.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// The most recent `limit` turns of a conversation, ascending
/// (timestamp, seq) order.
pub fn recent_ai_turns(
    conn: &Connection,
    conversation_key: &str,
    limit: usize,
) -> Result<Vec<AiTurn>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT seq, id, role, content, timestamp
         FROM ai_turns WHERE conversation_key = ?1
         ORDER BY timestamp DESC, seq DESC LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![conversation_key, limit as i64], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut turns = Vec::new();
    for row in rows {
        let (seq, id, role, content, timestamp) = row?;
        turns.push(AiTurn {
            id: Uuid::parse_str(&id).map_err(|e| DatabaseError::CorruptRow(e.to_string()))?,
            role: TurnRole::from_str(&role)?,
            content,
            timestamp: parse_timestamp(&timestamp)?,
            seq,
        });
    }
    turns.reverse();
    Ok(turns)
}
