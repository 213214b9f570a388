//! Consultation rooms: deterministic identity, durable message history,
//! and live fan-out to connected participants.

pub mod bus;
pub mod identity;
pub mod store;

pub use bus::{BroadcastBus, RoomEvent, RoomSubscription};
pub use identity::resolve_room_id;
pub use store::MessageStore;

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum RoomError {
    #[error("Message text is empty")]
    EmptyMessage,

    #[error("Room id is empty")]
    EmptyRoomId,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
