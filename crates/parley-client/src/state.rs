//! Application state shared by every front-end entry point.
//!
//! [`AppState`] owns the long-lived handles (API client, session manager,
//! realtime session, event bus) and hands out views wired to them.

use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::warn;

use parley_net::{ApiClient, Connector, RealtimeSession, WebSocketConnector};
use parley_shared::models::RoomActivity;
use parley_shared::types::RoomId;

use crate::auth::SessionManager;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::events::{emit_event, ClientEvent, EventBus};
use crate::lifecycle::spawn_connection_lifecycle;
use crate::views::{ChatRoomView, FriendsView, RoomListView};

pub struct AppState {
    pub config: ClientConfig,
    pub api: ApiClient,
    pub session: Arc<SessionManager>,
    pub realtime: RealtimeSession,
    pub events: EventBus,
}

impl AppState {
    /// State talking to the configured backend and broker.
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        Self::with_connector(config, Arc::new(WebSocketConnector))
    }

    /// Same as [`Self::new`] with a custom broker transport.
    pub fn with_connector(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
    ) -> anyhow::Result<Self> {
        let api = ApiClient::new(config.api_url.clone(), config.request_timeout)
            .context("Failed to build HTTP client")?;
        let session = Arc::new(SessionManager::new(api.clone(), config.token_buffer));
        let realtime = RealtimeSession::new(config.realtime(), connector);
        let events = EventBus::new();

        let bus = events.clone();
        realtime.set_user_hook(move |payload| {
            match serde_json::from_value::<RoomActivity>(payload) {
                Ok(activity) => emit_event(&bus, ClientEvent::RoomActivity(activity)),
                Err(e) => warn!(error = %e, "Unrecognised user notification"),
            }
        });

        Ok(Self {
            config,
            api,
            session,
            realtime,
            events,
        })
    }

    /// Keep the broker connection in step with the login state.
    pub fn start_lifecycle(&self) -> JoinHandle<()> {
        spawn_connection_lifecycle(&self.session, self.realtime.clone(), self.events.clone())
    }

    pub fn friends_view(&self) -> FriendsView {
        FriendsView::new(self.api.clone(), self.session.clone())
    }

    pub fn room_list_view(&self) -> RoomListView {
        RoomListView::new(self.api.clone(), self.session.clone())
    }

    pub async fn open_room(&self, room_id: RoomId) -> ClientResult<ChatRoomView> {
        ChatRoomView::open(
            self.api.clone(),
            self.session.clone(),
            self.realtime.clone(),
            self.events.clone(),
            room_id,
            self.config.history_page_size,
        )
        .await
    }
}
