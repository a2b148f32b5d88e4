//! Open chat room: transcript, live updates and read receipts.
//!
//! While a room is open three destinations are subscribed: the room's
//! message stream, its read-notification stream and this user's reply
//! channel for the room. Every new message and every read notification
//! answers with a read receipt naming all known message ids; the broker
//! replies on the reply channel with the unread count per message.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, info, warn};

use parley_net::{ApiClient, RealtimeSession};
use parley_shared::destinations;
use parley_shared::models::{ChatLog, ChatWriteRequest, ReadReceiptRequest, UnreadCounts};
use parley_shared::types::{ContentType, MessageId, RoomId, UserId};

use crate::auth::SessionManager;
use crate::error::{ClientError, ClientResult};
use crate::events::{emit_event, ClientEvent, EventBus};

const MSG_EMPTY_MESSAGE: &str = "Message cannot be empty.";

/// Messages of one room in display order, at most one entry per id.
#[derive(Debug, Default)]
pub struct Transcript {
    logs: Vec<ChatLog>,
    ids: HashSet<MessageId>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `log` unless its id is already known.
    pub fn push(&mut self, log: ChatLog) -> bool {
        if !self.ids.insert(log.id) {
            return false;
        }
        self.logs.push(log);
        true
    }

    /// Append a history page, oldest first.
    pub fn extend_history(&mut self, mut page: Vec<ChatLog>) {
        page.sort_by_key(|log| log.id);
        for log in page {
            self.push(log);
        }
    }

    pub fn message_ids(&self) -> Vec<MessageId> {
        self.logs.iter().map(|log| log.id).collect()
    }

    /// Overwrite unread counts in place. Returns the ids that changed.
    pub fn apply_unread_counts(&mut self, counts: &UnreadCounts) -> Vec<MessageId> {
        let mut changed = Vec::new();
        for log in &mut self.logs {
            if let Some(count) = counts.get(log.id) {
                if log.unread_count != count {
                    log.unread_count = count;
                    changed.push(log.id);
                }
            }
        }
        changed
    }

    pub fn logs(&self) -> &[ChatLog] {
        &self.logs
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}

type SharedTranscript = Arc<Mutex<Transcript>>;

fn lock(transcript: &SharedTranscript) -> MutexGuard<'_, Transcript> {
    transcript.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Where read receipts for a room go and where the answer comes back.
#[derive(Debug, Clone)]
struct ReceiptRoute {
    endpoint: String,
    reply_to: String,
}

impl ReceiptRoute {
    fn publish(&self, realtime: &RealtimeSession, message_ids: Vec<MessageId>) {
        let request = ReadReceiptRequest { message_ids };
        if !realtime.publish(&self.endpoint, &request, Some(&self.reply_to)) {
            debug!(endpoint = %self.endpoint, "Read receipt not sent");
        }
    }
}

pub struct ChatRoomView {
    api: ApiClient,
    session: Arc<SessionManager>,
    realtime: RealtimeSession,
    events: EventBus,
    room_id: RoomId,
    transcript: SharedTranscript,
    route: ReceiptRoute,
    subscriptions: Vec<String>,
    open: bool,
}

impl ChatRoomView {
    /// Load the first history page and start following the room.
    pub async fn open(
        api: ApiClient,
        session: Arc<SessionManager>,
        realtime: RealtimeSession,
        events: EventBus,
        room_id: RoomId,
        page_size: u32,
    ) -> ClientResult<Self> {
        let token = session.access_token().await?;
        let user_id = session.user_id().await?;

        let page = api.chat_logs(room_id, 0, page_size, &token).await?;
        let transcript: SharedTranscript = Arc::new(Mutex::new(Transcript::new()));
        lock(&transcript).extend_history(page.content);

        let route = ReceiptRoute {
            endpoint: destinations::room_read_endpoint(room_id),
            reply_to: destinations::room_read_replies(room_id, user_id),
        };

        let mut view = Self {
            api,
            session,
            realtime,
            events,
            room_id,
            transcript,
            route,
            subscriptions: Vec::new(),
            open: true,
        };
        view.follow(user_id);

        let history = lock(&view.transcript).message_ids();
        info!(room = %room_id, messages = history.len(), "Chat room opened");
        if !history.is_empty() {
            view.route.publish(&view.realtime, history);
        }
        Ok(view)
    }

    fn follow(&mut self, user_id: UserId) {
        let room_id = self.room_id;

        let messages = destinations::room_messages(room_id);
        let on_message = {
            let transcript = self.transcript.clone();
            let realtime = self.realtime.clone();
            let events = self.events.clone();
            let route = self.route.clone();
            move |payload: Value| {
                let log: ChatLog = match serde_json::from_value(payload) {
                    Ok(log) => log,
                    Err(e) => {
                        warn!(room = %room_id, error = %e, "Undecodable chat message");
                        return;
                    }
                };
                let (appended, ids) = {
                    let mut transcript = lock(&transcript);
                    let appended = transcript.push(log.clone());
                    (appended, transcript.message_ids())
                };
                if appended {
                    emit_event(&events, ClientEvent::NewMessage { room_id, log });
                } else {
                    debug!(room = %room_id, id = log.id, "Duplicate message ignored");
                }
                route.publish(&realtime, ids);
            }
        };
        self.follow_destination(messages, on_message);

        let notifications = destinations::room_read_notifications(room_id);
        let on_notification = {
            let transcript = self.transcript.clone();
            let realtime = self.realtime.clone();
            let route = self.route.clone();
            move |_: Value| {
                let ids = lock(&transcript).message_ids();
                route.publish(&realtime, ids);
            }
        };
        self.follow_destination(notifications, on_notification);

        let replies = destinations::room_read_replies(room_id, user_id);
        let on_reply = {
            let transcript = self.transcript.clone();
            let events = self.events.clone();
            move |payload: Value| {
                let Some(counts) = UnreadCounts::from_value(&payload) else {
                    warn!(room = %room_id, "Read reply is not an object");
                    return;
                };
                let mut message_ids = lock(&transcript).apply_unread_counts(&counts);
                if message_ids.is_empty() {
                    return;
                }
                message_ids.sort_unstable();
                emit_event(
                    &events,
                    ClientEvent::UnreadCountsUpdated {
                        room_id,
                        message_ids,
                    },
                );
            }
        };
        self.follow_destination(replies, on_reply);
    }

    fn follow_destination<F>(&mut self, destination: String, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        if self.realtime.subscribe(&destination, handler) {
            self.subscriptions.push(destination);
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Reply channel read receipts are answered on.
    pub fn reply_channel(&self) -> &str {
        &self.route.reply_to
    }

    /// Snapshot of the transcript.
    pub fn messages(&self) -> Vec<ChatLog> {
        lock(&self.transcript).logs().to_vec()
    }

    /// Post `content` to the room. The stored message is appended right
    /// away; its broker echo is then ignored as a duplicate.
    pub async fn send(&self, content: &str) -> ClientResult<ChatLog> {
        let message = content.trim();
        if message.is_empty() {
            return Err(ClientError::validation(MSG_EMPTY_MESSAGE));
        }

        let token = self.session.access_token().await?;
        let request = ChatWriteRequest {
            chat_room_id: self.room_id,
            message: message.to_string(),
            content_type: ContentType::Text,
        };
        let log = self.api.send_message(&request, &token).await?;

        if lock(&self.transcript).push(log.clone()) {
            emit_event(
                &self.events,
                ClientEvent::NewMessage {
                    room_id: self.room_id,
                    log: log.clone(),
                },
            );
        }
        Ok(log)
    }

    /// Stop following the room. Also runs on drop.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        for destination in self.subscriptions.drain(..) {
            self.realtime.unsubscribe(&destination);
        }
        info!(room = %self.room_id, "Chat room closed");
    }
}

impl Drop for ChatRoomView {
    fn drop(&mut self) {
        self.close();
    }
}
