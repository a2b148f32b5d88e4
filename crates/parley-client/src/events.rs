//! Client-side events for front ends.
//!
//! Components publish onto one broadcast channel; a front end (the CLI, or
//! any UI embedding this crate) subscribes and renders.

use serde::Serialize;
use tokio::sync::broadcast;

use parley_shared::models::{ChatLog, RoomActivity};
use parley_shared::types::{ConnectionState, MessageId, RoomId};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientEvent {
    ConnectionChanged {
        state: ConnectionState,
    },
    /// A message was added to an open room's transcript.
    NewMessage {
        room_id: RoomId,
        log: ChatLog,
    },
    /// Unread counts in an open room changed.
    UnreadCountsUpdated {
        room_id: RoomId,
        message_ids: Vec<MessageId>,
    },
    /// Room summary change from the per-user channel.
    RoomActivity(RoomActivity),
    SessionExpired,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub fn emit_event(bus: &EventBus, event: ClientEvent) {
    // No listener is not an error.
    if bus.tx.receiver_count() == 0 {
        return;
    }
    if let Err(e) = bus.tx.send(event) {
        tracing::error!(error = %e, "Failed to emit event");
    }
}
