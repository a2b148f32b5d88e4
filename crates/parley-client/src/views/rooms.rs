//! Chat room list.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, info};

use parley_net::ApiClient;
use parley_shared::constants::MAX_UNREAD_BADGE;
use parley_shared::models::{ChatRoom, RoomActivity};
use parley_shared::time::{format_last_message_time, parse_timestamp};
use parley_shared::types::UserId;

use crate::auth::SessionManager;
use crate::error::ClientResult;

pub struct RoomListView {
    api: ApiClient,
    session: Arc<SessionManager>,
    rooms: Vec<ChatRoom>,
    error: Option<String>,
}

impl RoomListView {
    pub fn new(api: ApiClient, session: Arc<SessionManager>) -> Self {
        Self {
            api,
            session,
            rooms: Vec::new(),
            error: None,
        }
    }

    /// Rooms in server order.
    pub fn rooms(&self) -> &[ChatRoom] {
        &self.rooms
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Rooms with unread messages first, then most recent activity first.
    pub fn sorted(&self) -> Vec<&ChatRoom> {
        let mut rooms: Vec<&ChatRoom> = self.rooms.iter().collect();
        rooms.sort_by(|a, b| compare_rooms(a, b));
        rooms
    }

    pub async fn load(&mut self) -> ClientResult<()> {
        let result = self.fetch().await;
        self.error = result.as_ref().err().map(ToString::to_string);
        result
    }

    /// Create the private room with `friend`, then reload the list.
    pub async fn create_private(&mut self, friend: UserId) -> ClientResult<Option<ChatRoom>> {
        let result = self.create_and_reload(friend).await;
        self.error = result.as_ref().err().map(ToString::to_string);
        result
    }

    /// Overlay a pushed room summary. Returns `false` for a room not in the
    /// list, which calls for a reload.
    pub fn apply_activity(&mut self, activity: &RoomActivity) -> bool {
        let Some(room) = self.rooms.iter_mut().find(|r| r.id == activity.chat_room_id) else {
            debug!(room = %activity.chat_room_id, "Activity for unknown room");
            return false;
        };
        if let Some(unread) = activity.unread_ct {
            room.unread_ct = unread;
        }
        if let Some(message) = &activity.last_message {
            room.last_message = Some(message.clone());
        }
        if let Some(time) = &activity.last_time {
            room.last_time = Some(time.clone());
        }
        true
    }

    async fn create_and_reload(&mut self, friend: UserId) -> ClientResult<Option<ChatRoom>> {
        let token = self.session.access_token().await?;
        let room = self.api.create_private_room(friend, &token).await?;
        info!(friend = %friend, room = ?room.as_ref().map(|r| r.id), "Private room created");
        self.fetch().await?;
        Ok(room)
    }

    async fn fetch(&mut self) -> ClientResult<()> {
        let token = self.session.access_token().await?;
        self.rooms = self.api.chat_rooms(&token).await?;
        Ok(())
    }
}

fn compare_rooms(a: &ChatRoom, b: &ChatRoom) -> Ordering {
    let unread = (b.unread_ct > 0).cmp(&(a.unread_ct > 0));
    let a_time = a.last_time.as_deref().and_then(parse_timestamp);
    let b_time = b.last_time.as_deref().and_then(parse_timestamp);
    let recency = match (a_time, b_time) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    unread.then(recency)
}

/// Badge text for an unread count; nothing when there is nothing unread.
pub fn unread_badge(count: i64) -> Option<String> {
    match count {
        c if c <= 0 => None,
        c if c > MAX_UNREAD_BADGE => Some(format!("{MAX_UNREAD_BADGE}+")),
        c => Some(c.to_string()),
    }
}

/// Short label for the room's last activity.
pub fn last_activity_label(room: &ChatRoom) -> Option<String> {
    room.last_time.as_deref().and_then(format_last_message_time)
}
