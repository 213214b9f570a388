use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ParticipantRole;

/// A persisted consultation-room message.
///
/// Immutable once stored. `seq` is the database insertion counter and
/// breaks ordering ties between messages sharing a timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMessage {
    pub id: Uuid,
    pub room_id: String,
    pub sender_email: String,
    pub sender_role: ParticipantRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub seq: i64,
}
