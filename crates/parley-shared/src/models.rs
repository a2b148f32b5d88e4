//! Wire models exchanged with the backend REST API and the broker.
//!
//! Field names follow the backend's camelCase JSON. Timestamps are kept as
//! the strings the backend sends; see [`crate::time`] for parsing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{
    ChatRoomType, ContentType, FriendRequestStatus, MessageId, RoomId, UserId,
};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Uniform wrapper around every REST response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One page of a paged listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub total_pages: u32,
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub login_id: String,
    pub password: String,
}

/// Tokens issued at login or refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub phone_number: String,
    pub login_id: String,
    pub password: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResult {
    pub user_id: UserId,
    pub login_id: String,
}

// ---------------------------------------------------------------------------
// Users & friends
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: UserId,
    pub login_id: String,
    #[serde(default)]
    pub nick_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSearchResult {
    pub user_id: UserId,
    #[serde(default)]
    pub nick_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default)]
    pub requested: Option<FriendRequestStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    pub id: UserId,
    #[serde(default)]
    pub nick_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub is_online: bool,
}

/// A pending request from another user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub friend_id: i64,
    pub requested_user_id: UserId,
    #[serde(default)]
    pub nick_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub request_at: Option<String>,
    #[serde(default)]
    pub is_online: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFriendRequest {
    pub user_id: UserId,
}

// ---------------------------------------------------------------------------
// Chat rooms & logs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: RoomId,
    #[serde(default)]
    pub name: String,
    pub room_type: ChatRoomType,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_time: Option<String>,
    #[serde(default)]
    pub member_ct: i64,
    #[serde(default)]
    pub unread_ct: i64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoomCreateRequest {
    pub friend_user_ids: Vec<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub room_type: ChatRoomType,
}

impl ChatRoomCreateRequest {
    pub fn private_with(friend: UserId) -> Self {
        Self {
            friend_user_ids: vec![friend],
            name: None,
            room_type: ChatRoomType::Private,
        }
    }
}

/// One entry of a room transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatLog {
    pub id: MessageId,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub content_type: ContentType,
    pub writer_id: UserId,
    #[serde(default)]
    pub write_user_nick_name: String,
    #[serde(default)]
    pub wrote_time: Option<String>,
    /// Number of room members who have not read this message yet.
    #[serde(default)]
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatWriteRequest {
    pub chat_room_id: RoomId,
    pub message: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
}

// ---------------------------------------------------------------------------
// Realtime payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceiptRequest {
    pub message_ids: Vec<MessageId>,
}

/// Aggregate sent back on the read reply channel: message id -> unread count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnreadCounts(pub HashMap<MessageId, i64>);

impl UnreadCounts {
    /// Parse the broker payload. Keys are message ids rendered as JSON
    /// object keys (strings); entries whose key is not an integer are skipped.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let counts = object
            .iter()
            .filter_map(|(k, v)| Some((k.parse::<MessageId>().ok()?, v.as_i64()?)))
            .collect();
        Some(Self(counts))
    }

    pub fn get(&self, id: MessageId) -> Option<i64> {
        self.0.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Room summary change pushed on the per-user notification channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomActivity {
    pub chat_room_id: RoomId,
    #[serde(default)]
    pub unread_ct: Option<i64>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_time: Option<String>,
}
