//! Report-grounded AI assistant: conversation keys, bounded context
//! assembly, turn persistence, and model-failure fallback.

pub mod conversation;
pub mod ollama;
pub mod prompt;

pub use conversation::{AssistantManager, ConversationStart, ReportSummary};
pub use ollama::{ChatMessage, ChatModel, ChatRole, OllamaChatClient};

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Message text is empty")]
    EmptyMessage,

    #[error("Requester identity is empty")]
    EmptyRequester,

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("Report belongs to a different patient")]
    Forbidden,

    #[error("Language model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
