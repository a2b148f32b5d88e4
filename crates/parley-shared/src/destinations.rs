//! Broker destination names.
//!
//! The broker routes by plain string destinations. `/topic/...` names are
//! subscribed to, `/app/...` names are published to and handled by the
//! backend.

use crate::types::{RoomId, UserId};

/// Per-user notifications, subscribed implicitly on connect.
pub fn user_notifications(user_id: &str) -> String {
    format!("/topic/chat/user/{user_id}")
}

/// New messages posted in a room.
pub fn room_messages(room_id: RoomId) -> String {
    format!("/topic/room/{room_id}")
}

/// Someone's read state changed in a room.
pub fn room_read_notifications(room_id: RoomId) -> String {
    format!("/topic/room/{room_id}/read-notifications")
}

/// Reply channel carrying this user's aggregated unread counts for a room.
pub fn room_read_replies(room_id: RoomId, user_id: UserId) -> String {
    format!("/topic/room/{room_id}/read/user/{user_id}")
}

/// Publish target for read receipts.
pub fn room_read_endpoint(room_id: RoomId) -> String {
    format!("/app/room/{room_id}/read")
}
