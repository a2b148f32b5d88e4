//! Friends, pending requests and user search.

use std::sync::Arc;

use tracing::{info, warn};

use parley_net::ApiClient;
use parley_shared::constants::MIN_SEARCH_KEYWORD_LEN;
use parley_shared::models::{Friend, FriendRequest, UserSearchResult};
use parley_shared::types::{FriendRequestStatus, UserId};

use crate::auth::SessionManager;
use crate::error::{ClientError, ClientResult};

pub struct FriendsView {
    api: ApiClient,
    session: Arc<SessionManager>,
    friends: Vec<Friend>,
    requests: Vec<FriendRequest>,
    search_results: Vec<UserSearchResult>,
    error: Option<String>,
}

impl FriendsView {
    pub fn new(api: ApiClient, session: Arc<SessionManager>) -> Self {
        Self {
            api,
            session,
            friends: Vec::new(),
            requests: Vec::new(),
            search_results: Vec::new(),
            error: None,
        }
    }

    /// Friends, online first, then by nickname.
    pub fn friends(&self) -> &[Friend] {
        &self.friends
    }

    pub fn online(&self) -> impl Iterator<Item = &Friend> {
        self.friends.iter().filter(|f| f.is_online)
    }

    pub fn offline(&self) -> impl Iterator<Item = &Friend> {
        self.friends.iter().filter(|f| !f.is_online)
    }

    pub fn requests(&self) -> &[FriendRequest] {
        &self.requests
    }

    pub fn search_results(&self) -> &[UserSearchResult] {
        &self.search_results
    }

    /// Message of the last failed operation, for display.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn load(&mut self) -> ClientResult<()> {
        let result = self.fetch_friends().await;
        self.settle(result)
    }

    /// Replace the pending list with the server's.
    pub async fn load_requests(&mut self) -> ClientResult<()> {
        let result = self.fetch_requests().await;
        self.settle(result)
    }

    /// Accept request `friend_id`. The entry leaves the local list before
    /// the backend is asked.
    pub async fn accept(&mut self, friend_id: i64) -> ClientResult<()> {
        self.requests.retain(|r| r.friend_id != friend_id);

        let result = match self.session.access_token().await {
            Ok(token) => self.api.accept_friend(friend_id, &token).await.map_err(Into::into),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                info!(friend_id, "Friend request accepted");
                let reloaded = self.fetch_friends().await;
                self.settle(reloaded)
            }
            Err(e) => {
                warn!(friend_id, error = %e, "Accepting friend request failed");
                self.reconcile_requests().await;
                self.settle(Err(e))
            }
        }
    }

    /// Refuse request `friend_id`, removing it locally first.
    pub async fn decline(&mut self, friend_id: i64) -> ClientResult<()> {
        self.requests.retain(|r| r.friend_id != friend_id);

        let result = match self.session.access_token().await {
            Ok(token) => self.api.refuse_friend(friend_id, &token).await.map_err(Into::into),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            warn!(friend_id, error = %e, "Declining friend request failed");
            self.reconcile_requests().await;
        }
        self.settle(result)
    }

    pub async fn search(&mut self, keyword: &str) -> ClientResult<()> {
        let keyword = keyword.trim();
        if keyword.chars().count() < MIN_SEARCH_KEYWORD_LEN {
            let e = ClientError::validation(format!(
                "Enter at least {MIN_SEARCH_KEYWORD_LEN} characters to search."
            ));
            return self.settle(Err(e));
        }

        let result = match self.session.access_token().await {
            Ok(token) => self
                .api
                .search_users(keyword, &token)
                .await
                .map_err(Into::into),
            Err(e) => Err(e),
        };
        let result = result.map(|found| self.search_results = found);
        self.settle(result)
    }

    /// Send a friend request; the matching search result is marked
    /// as requested on success.
    pub async fn send_request(&mut self, user_id: UserId) -> ClientResult<()> {
        let result = match self.session.access_token().await {
            Ok(token) => self
                .api
                .send_friend_request(user_id, &token)
                .await
                .map_err(Into::into),
            Err(e) => Err(e),
        };
        if result.is_ok() {
            info!(user = %user_id, "Friend request sent");
            for found in self.search_results.iter_mut().filter(|r| r.user_id == user_id) {
                found.requested = Some(FriendRequestStatus::Requested);
            }
        }
        self.settle(result)
    }

    async fn fetch_friends(&mut self) -> ClientResult<()> {
        let token = self.session.access_token().await?;
        let mut friends = self.api.friends(&token).await?;
        sort_friends(&mut friends);
        self.friends = friends;
        Ok(())
    }

    async fn fetch_requests(&mut self) -> ClientResult<()> {
        let token = self.session.access_token().await?;
        self.requests = self.api.friend_requests(&token).await?;
        Ok(())
    }

    async fn reconcile_requests(&mut self) {
        if let Err(e) = self.fetch_requests().await {
            warn!(error = %e, "Could not reload friend requests");
        }
    }

    fn settle(&mut self, result: ClientResult<()>) -> ClientResult<()> {
        match &result {
            Ok(()) => self.error = None,
            Err(e) => self.error = Some(e.to_string()),
        }
        result
    }
}

pub fn sort_friends(friends: &mut [Friend]) {
    friends.sort_by(|a, b| {
        b.is_online
            .cmp(&a.is_online)
            .then_with(|| a.nick_name.to_lowercase().cmp(&b.nick_name.to_lowercase()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::test_support::authenticated;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn friend(id: i64, nick: &str, online: bool) -> Friend {
        Friend {
            id: UserId(id),
            nick_name: nick.into(),
            description: String::new(),
            created_at: None,
            is_online: online,
        }
    }

    fn data(value: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": value}))
    }

    async fn view(server: &MockServer) -> FriendsView {
        let (api, session) = authenticated(server).await;
        FriendsView::new(api, session)
    }

    #[test]
    fn test_sort_online_first_then_nickname() {
        let mut friends = vec![
            friend(1, "zed", false),
            friend(2, "bob", true),
            friend(3, "Amy", false),
            friend(4, "carl", true),
        ];
        sort_friends(&mut friends);
        let order: Vec<i64> = friends.iter().map(|f| f.id.0).collect();
        assert_eq!(order, vec![2, 4, 3, 1]);
    }

    #[tokio::test]
    async fn test_load_groups_friends() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/friends"))
            .respond_with(data(json!([
                {"id": 1, "nickName": "zed", "isOnline": false},
                {"id": 2, "nickName": "bob", "isOnline": true}
            ])))
            .mount(&server)
            .await;

        let mut view = view(&server).await;
        view.load().await.unwrap();
        assert_eq!(view.friends()[0].nick_name, "bob");
        assert_eq!(view.online().count(), 1);
        assert_eq!(view.offline().count(), 1);
        assert!(view.error().is_none());
    }

    #[tokio::test]
    async fn test_accept_removes_exactly_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/friends/requests"))
            .respond_with(data(json!([
                {"friendId": 3, "requestedUserId": 30, "nickName": "c"},
                {"friendId": 4, "requestedUserId": 40, "nickName": "d"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/friends/accept"))
            .and(query_param("id", "3"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/friends"))
            .respond_with(data(json!([{"id": 30, "nickName": "c", "isOnline": true}])))
            .expect(1)
            .mount(&server)
            .await;

        let mut view = view(&server).await;
        view.load_requests().await.unwrap();
        assert_eq!(view.requests().len(), 2);

        view.accept(3).await.unwrap();
        let remaining: Vec<i64> = view.requests().iter().map(|r| r.friend_id).collect();
        assert_eq!(remaining, vec![4]);
        assert_eq!(view.friends().len(), 1);
        assert_eq!(view.friends()[0].id, UserId(30));
    }

    #[tokio::test]
    async fn test_failed_decline_reconciles_from_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/friends/requests"))
            .respond_with(data(json!([{"friendId": 3, "requestedUserId": 30}])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/friends/refuse"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "No such request"})),
            )
            .mount(&server)
            .await;

        let mut view = view(&server).await;
        view.load_requests().await.unwrap();
        assert!(view.decline(3).await.is_err());
        assert_eq!(view.error(), Some("No such request"));
        assert_eq!(view.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_search_and_send_request() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/users/search"))
            .and(query_param("keyword", "bob"))
            .respond_with(data(json!([
                {"userId": 9, "nickName": "bob"},
                {"userId": 10, "nickName": "bobby"}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/friends"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut view = view(&server).await;
        assert!(matches!(
            view.search(" bo ").await,
            Err(ClientError::Validation(_))
        ));
        assert!(view.error().is_some());

        view.search("  bob ").await.unwrap();
        assert_eq!(view.search_results().len(), 2);

        view.send_request(UserId(9)).await.unwrap();
        assert_eq!(
            view.search_results()[0].requested,
            Some(FriendRequestStatus::Requested)
        );
        assert_eq!(view.search_results()[1].requested, None);
    }

    #[tokio::test]
    async fn test_nothing_sent_without_credential() {
        let server = MockServer::start().await;
        Mock::given(path("/v1/friends"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri(), std::time::Duration::from_secs(5)).unwrap();
        let session = Arc::new(SessionManager::new(api.clone(), chrono::Duration::minutes(3)));
        let mut view = FriendsView::new(api, session);

        assert!(view.load().await.is_err());
        assert_eq!(view.error(), Some("Not logged in"));
    }
}
