//! View state: what the screens render, without the rendering.

pub mod chat;
pub mod friends;
pub mod rooms;

pub use chat::{ChatRoomView, Transcript};
pub use friends::{sort_friends, FriendsView};
pub use rooms::{last_activity_label, unread_badge, RoomListView};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use parley_net::ApiClient;
    use parley_shared::token::unsigned_token;

    use crate::auth::SessionManager;

    /// Access token for user 42, valid for an hour.
    pub fn token() -> String {
        unsigned_token("42", Utc::now() + chrono::Duration::hours(1))
    }

    /// API client against `server` and a session logged in as user 42.
    pub async fn authenticated(server: &MockServer) -> (ApiClient, Arc<SessionManager>) {
        Mock::given(method("POST"))
            .and(path("/v1/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"accessToken": token(), "refreshToken": "r"}
            })))
            .mount(server)
            .await;

        let api = ApiClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let session = Arc::new(SessionManager::new(
            api.clone(),
            chrono::Duration::minutes(3),
        ));
        session.login("alice", "pw").await.unwrap();
        (api, session)
    }
}
