//! Ties the broker connection to the auth state.
//!
//! `Authenticated` connects (a no-op when already connected for the same
//! user, so a token refresh keeps the live connection; a different user
//! replaces it), `Unauthenticated` and `Invalid` disconnect, `Refreshing`
//! leaves things as they are. The `watch` channel only keeps the latest
//! state, so a logout followed by a login can arrive as a single change.

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use parley_net::RealtimeSession;

use crate::auth::{AuthStatus, SessionManager};
use crate::events::{emit_event, ClientEvent, EventBus};

pub fn spawn_connection_lifecycle(
    session: &SessionManager,
    realtime: RealtimeSession,
    events: EventBus,
) -> JoinHandle<()> {
    let mut status = session.watch();
    tokio::spawn(async move {
        loop {
            let current = status.borrow_and_update().clone();
            apply_status(&realtime, &events, &current).await;
            if status.changed().await.is_err() {
                debug!("Session manager dropped, lifecycle task exiting");
                break;
            }
        }
    })
}

pub async fn apply_status(realtime: &RealtimeSession, events: &EventBus, status: &AuthStatus) {
    match status {
        AuthStatus::Authenticated(credential) => {
            if let Some(active) = realtime.user() {
                if credential.user_id().as_deref() != Some(active.as_str()) {
                    info!(
                        previous = %active,
                        "Signed-in user changed, replacing broker connection"
                    );
                    realtime.disconnect();
                }
            }
            if let Err(e) = realtime.connect(credential).await {
                warn!(error = %e, "Realtime connection failed");
            }
        }
        AuthStatus::Unauthenticated => realtime.disconnect(),
        AuthStatus::Invalid => {
            realtime.disconnect();
            emit_event(events, ClientEvent::SessionExpired);
        }
        AuthStatus::Refreshing => return,
    }
    emit_event(
        events,
        ClientEvent::ConnectionChanged {
            state: realtime.state(),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_net::{loopback, ApiClient, Command, Frame, RealtimeConfig};
    use parley_shared::token::unsigned_token;
    use parley_shared::Credential;
    use parley_shared::types::ConnectionState;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn wait_for(realtime: &RealtimeSession, state: ConnectionState) {
        for _ in 0..200 {
            if realtime.state() == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("realtime session never reached {state}");
    }

    #[tokio::test]
    async fn test_login_connects_and_logout_disconnects() {
        let server = MockServer::start().await;
        let token = unsigned_token("42", Utc::now() + chrono::Duration::hours(1));
        Mock::given(path("/v1/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"accessToken": token, "refreshToken": "r"}
            })))
            .mount(&server)
            .await;
        Mock::given(path("/v1/logout"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let session = SessionManager::new(api, chrono::Duration::minutes(3));
        let (connector, mut broker) = loopback();
        let realtime = RealtimeSession::new(RealtimeConfig::default(), Arc::new(connector));
        let events = EventBus::new();

        let task = spawn_connection_lifecycle(&session, realtime.clone(), events.clone());
        assert!(broker.try_accept().is_none());

        session.login("alice", "pw").await.unwrap();
        let mut conn = broker.accept().await.unwrap();
        let connect = conn.accept_handshake().await.unwrap();
        assert_eq!(connect.get("Authorization"), Some(token.as_str()));
        conn.expect_subscribe("/topic/chat/user/42").await.unwrap();
        wait_for(&realtime, ConnectionState::Connected).await;

        session.logout().await;
        conn.expect(Command::Disconnect).await.unwrap();
        wait_for(&realtime, ConnectionState::Disconnected).await;

        task.abort();
    }

    #[tokio::test]
    async fn test_user_switch_during_handshake_replaces_connection() {
        let server = MockServer::start().await;
        let alice = unsigned_token("42", Utc::now() + chrono::Duration::hours(1));
        let bob = unsigned_token("77", Utc::now() + chrono::Duration::hours(1));
        for (login_id, token) in [("alice", &alice), ("bob", &bob)] {
            Mock::given(path("/v1/login"))
                .and(body_partial_json(json!({ "loginId": login_id })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "data": {"accessToken": token, "refreshToken": "r"}
                })))
                .mount(&server)
                .await;
        }
        Mock::given(path("/v1/logout"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let session = SessionManager::new(api, chrono::Duration::minutes(3));
        let (connector, mut broker) = loopback();
        let realtime = RealtimeSession::new(RealtimeConfig::default(), Arc::new(connector));
        let task = spawn_connection_lifecycle(&session, realtime.clone(), EventBus::new());

        session.login("alice", "pw").await.unwrap();
        let mut first = broker.accept().await.unwrap();
        first.expect(Command::Connect).await.unwrap();

        // Both changes land while the first handshake is still pending.
        session.logout().await;
        session.login("bob", "pw").await.unwrap();
        first.send(Frame::connected()).await.unwrap();

        first.expect_subscribe("/topic/chat/user/42").await.unwrap();
        first.expect(Command::Disconnect).await.unwrap();

        let mut second = broker.accept().await.unwrap();
        let connect = second.accept_handshake().await.unwrap();
        assert_eq!(connect.get("Authorization"), Some(bob.as_str()));
        second.expect_subscribe("/topic/chat/user/77").await.unwrap();
        wait_for(&realtime, ConnectionState::Connected).await;
        assert_eq!(realtime.user().as_deref(), Some("77"));
        assert!(!realtime.is_subscribed("/topic/chat/user/42"));

        task.abort();
    }

    #[tokio::test]
    async fn test_refreshed_token_for_same_user_keeps_connection() {
        let (connector, mut broker) = loopback();
        let realtime = RealtimeSession::new(RealtimeConfig::default(), Arc::new(connector));
        let events = EventBus::new();

        let original = Credential::new(
            unsigned_token("42", Utc::now() + chrono::Duration::hours(1)),
            None,
        );
        let original_status = AuthStatus::Authenticated(original);
        let (_, conn) = tokio::join!(
            apply_status(&realtime, &events, &original_status),
            async {
                let mut conn = broker.accept().await.unwrap();
                conn.accept_handshake().await.unwrap();
                conn
            }
        );
        let mut conn = conn;
        conn.expect_subscribe("/topic/chat/user/42").await.unwrap();

        let refreshed = Credential::new(
            unsigned_token("42", Utc::now() + chrono::Duration::hours(2)),
            None,
        );
        apply_status(&realtime, &events, &AuthStatus::Authenticated(refreshed)).await;
        assert!(realtime.is_connected());
        assert!(broker.try_accept().is_none());
        assert!(conn.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_refreshing_is_ignored_and_invalid_disconnects() {
        let (connector, _broker) = loopback();
        let realtime = RealtimeSession::new(RealtimeConfig::default(), Arc::new(connector));
        let events = EventBus::new();
        let mut rx = events.subscribe();

        apply_status(&realtime, &events, &AuthStatus::Refreshing).await;
        assert!(rx.try_recv().is_err());

        apply_status(&realtime, &events, &AuthStatus::Invalid).await;
        assert!(matches!(rx.recv().await.unwrap(), ClientEvent::SessionExpired));
        assert!(matches!(
            rx.recv().await.unwrap(),
            ClientEvent::ConnectionChanged {
                state: ConnectionState::Disconnected
            }
        ));
    }
}
