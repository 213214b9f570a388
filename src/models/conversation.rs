use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::TurnRole;

/// Identity of an AI conversation, carried structured end-to-end and
/// encoded to a string only at the repository boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversationKey {
    /// Free-form conversation with no report attached.
    General { requester: String },
    /// Conversation grounded in one diagnostic report.
    ReportGrounded { requester: String, report_id: String },
}

impl ConversationKey {
    /// The string form persisted alongside each turn.
    pub fn storage_key(&self) -> String {
        match self {
            Self::General { requester } => format!("general:{requester}"),
            Self::ReportGrounded {
                requester,
                report_id,
            } => format!("report:{requester}:{report_id}"),
        }
    }

    pub fn requester(&self) -> &str {
        match self {
            Self::General { requester } => requester,
            Self::ReportGrounded { requester, .. } => requester,
        }
    }

    pub fn report_id(&self) -> Option<&str> {
        match self {
            Self::General { .. } => None,
            Self::ReportGrounded { report_id, .. } => Some(report_id),
        }
    }
}

/// One side of an AI conversation exchange. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiTurn {
    pub id: Uuid,
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub seq: i64,
}
