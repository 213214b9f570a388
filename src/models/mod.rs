pub mod conversation;
pub mod enums;
pub mod message;
pub mod participant;
pub mod report;

pub use conversation::{AiTurn, ConversationKey};
pub use enums::{DiseaseType, ParticipantRole, TurnRole};
pub use message::RoomMessage;
pub use participant::Participant;
pub use report::{ImageResult, Report};
