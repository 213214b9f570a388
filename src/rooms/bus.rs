//! Live fan-out of room events.
//!
//! One broadcast channel per room, created on first join. The membership
//! map is the only shared section; delivery goes through the room's own
//! channel, so activity in one room never blocks another. Dropping a
//! subscription is the implicit leave.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

use crate::models::RoomMessage;

/// Per-room channel capacity. A subscriber that falls this far behind
/// skips ahead rather than stalling the room.
const ROOM_CHANNEL_CAPACITY: usize = 256;

/// An event delivered to room subscribers.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// A durably stored message. Published only after the storage write
    /// has been confirmed.
    Message(RoomMessage),
    /// Ephemeral presence change. At-most-once, never persisted.
    Presence { email: String, joined: bool },
    /// Ephemeral typing indicator. At-most-once, never persisted.
    Typing { email: String },
}

/// Tracks which connections are subscribed to which room and fans out
/// events to all current subscribers, including the publisher's own
/// subscription.
pub struct BroadcastBus {
    rooms: RwLock<HashMap<String, broadcast::Sender<RoomEvent>>>,
}

impl BroadcastBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rooms: RwLock::new(HashMap::new()),
        })
    }

    /// Subscribe to a room, implicitly creating it on first join.
    ///
    /// A connection may hold subscriptions to any number of rooms at once.
    pub fn join(self: &Arc<Self>, room_id: &str) -> RoomSubscription {
        let rx = {
            let mut rooms = self.rooms.write().expect("room map poisoned");
            let tx = rooms
                .entry(room_id.to_string())
                .or_insert_with(|| broadcast::channel(ROOM_CHANNEL_CAPACITY).0);
            tx.subscribe()
        };
        tracing::debug!(room_id, "subscriber joined");
        RoomSubscription {
            bus: Arc::clone(self),
            room_id: room_id.to_string(),
            rx,
        }
    }

    /// Deliver an already-stored message to every current subscriber of
    /// the room. Returns the number of subscribers reached; zero when the
    /// room has no live members.
    pub fn publish(&self, room_id: &str, event: RoomEvent) -> usize {
        let rooms = self.rooms.read().expect("room map poisoned");
        match rooms.get(room_id) {
            Some(tx) => tx.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Publish a presence/typing event. Silently dropped when the room has
    /// no subscribers.
    pub fn publish_ephemeral(&self, room_id: &str, event: RoomEvent) {
        let _ = self.publish(room_id, event);
    }

    /// Current live subscriber count for a room.
    pub fn member_count(&self, room_id: &str) -> usize {
        let rooms = self.rooms.read().expect("room map poisoned");
        rooms.get(room_id).map_or(0, |tx| tx.receiver_count())
    }

    /// Drop the room's channel once its last subscriber is gone. Called
    /// from `RoomSubscription::drop`, where the departing receiver is
    /// still counted.
    fn release(&self, room_id: &str) {
        let mut rooms = self.rooms.write().expect("room map poisoned");
        if let Some(tx) = rooms.get(room_id) {
            if tx.receiver_count() <= 1 {
                rooms.remove(room_id);
                tracing::debug!(room_id, "room released");
            }
        }
    }
}

/// A live membership in one room. Dropping it is the implicit leave: no
/// further events are delivered, and the room's channel is reclaimed when
/// the last member departs.
pub struct RoomSubscription {
    bus: Arc<BroadcastBus>,
    room_id: String,
    rx: broadcast::Receiver<RoomEvent>,
}

impl RoomSubscription {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Receive the next event for this room. Returns `None` once the room
    /// channel is gone. A lagged subscriber skips the overwritten events
    /// and keeps receiving.
    pub async fn recv(&mut self) -> Option<RoomEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(room_id = %self.room_id, skipped, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive, for callers polling between writes.
    pub fn try_recv(&mut self) -> Option<RoomEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(room_id = %self.room_id, skipped, "subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// Explicit leave; equivalent to dropping the subscription.
    pub fn leave(self) {}
}

impl Drop for RoomSubscription {
    fn drop(&mut self) {
        self.bus.release(&self.room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParticipantRole;
    use chrono::Utc;
    use uuid::Uuid;

    fn message(room: &str, text: &str) -> RoomMessage {
        RoomMessage {
            id: Uuid::new_v4(),
            room_id: room.into(),
            sender_email: "doc@example.com".into(),
            sender_role: ParticipantRole::Doctor,
            content: text.into(),
            timestamp: Utc::now(),
            seq: 0,
        }
    }

    fn text_of(event: RoomEvent) -> String {
        match event {
            RoomEvent::Message(m) => m.content,
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delivers_to_all_room_members_including_sender() {
        let bus = BroadcastBus::new();
        let mut doctor = bus.join("r1");
        let mut patient = bus.join("r1");

        let reached = bus.publish("r1", RoomEvent::Message(message("r1", "hello")));
        assert_eq!(reached, 2);
        assert_eq!(text_of(doctor.recv().await.unwrap()), "hello");
        assert_eq!(text_of(patient.recv().await.unwrap()), "hello");
    }

    #[tokio::test]
    async fn does_not_leak_across_rooms() {
        let bus = BroadcastBus::new();
        let mut in_r1 = bus.join("r1");
        let mut in_r2 = bus.join("r2");

        bus.publish("r1", RoomEvent::Message(message("r1", "for r1")));

        assert_eq!(text_of(in_r1.recv().await.unwrap()), "for r1");
        assert!(in_r2.try_recv().is_none());
    }

    #[tokio::test]
    async fn leave_stops_delivery_but_keeps_other_rooms() {
        let bus = BroadcastBus::new();
        let in_r1 = bus.join("r1");
        let mut in_r2 = bus.join("r2");
        let mut stays_r1 = bus.join("r1");

        in_r1.leave();
        let reached = bus.publish("r1", RoomEvent::Message(message("r1", "after leave")));
        assert_eq!(reached, 1);
        assert_eq!(text_of(stays_r1.recv().await.unwrap()), "after leave");

        bus.publish("r2", RoomEvent::Message(message("r2", "still here")));
        assert_eq!(text_of(in_r2.recv().await.unwrap()), "still here");
    }

    #[tokio::test]
    async fn subscribers_observe_publish_order() {
        let bus = BroadcastBus::new();
        let mut a = bus.join("r1");
        let mut b = bus.join("r1");

        for text in ["one", "two", "three"] {
            bus.publish("r1", RoomEvent::Message(message("r1", text)));
        }

        for expected in ["one", "two", "three"] {
            assert_eq!(text_of(a.recv().await.unwrap()), expected);
        }
        for expected in ["one", "two", "three"] {
            assert_eq!(text_of(b.recv().await.unwrap()), expected);
        }
    }

    #[tokio::test]
    async fn ephemeral_events_drop_silently_without_subscribers() {
        let bus = BroadcastBus::new();
        // No one joined; must not panic or error.
        bus.publish_ephemeral(
            "empty-room",
            RoomEvent::Typing {
                email: "pat@example.com".into(),
            },
        );
        assert_eq!(bus.member_count("empty-room"), 0);
    }

    #[tokio::test]
    async fn room_is_reclaimed_after_last_member_leaves() {
        let bus = BroadcastBus::new();
        let a = bus.join("r1");
        let b = bus.join("r1");
        assert_eq!(bus.member_count("r1"), 2);

        drop(a);
        assert_eq!(bus.member_count("r1"), 1);
        drop(b);
        assert_eq!(bus.member_count("r1"), 0);
        assert!(bus.rooms.read().unwrap().get("r1").is_none());
    }

    #[tokio::test]
    async fn connection_can_join_multiple_rooms() {
        let bus = BroadcastBus::new();
        // One logical connection holding two subscriptions.
        let mut sub_a = bus.join("doc::pat-a");
        let mut sub_b = bus.join("doc::pat-b");

        bus.publish("doc::pat-a", RoomEvent::Message(message("doc::pat-a", "A")));
        bus.publish("doc::pat-b", RoomEvent::Message(message("doc::pat-b", "B")));

        assert_eq!(text_of(sub_a.recv().await.unwrap()), "A");
        assert_eq!(text_of(sub_b.recv().await.unwrap()), "B");
    }
}
