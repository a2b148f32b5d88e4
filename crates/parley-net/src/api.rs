//! Typed backend endpoints.

use parley_shared::constants::*;
use parley_shared::models::{
    ChatLog, ChatRoom, ChatRoomCreateRequest, ChatWriteRequest, Friend, FriendRequest,
    LoginRequest, LogoutRequest, Page, RefreshRequest, SendFriendRequest, SignUpRequest,
    SignUpResult, TokenPair, User, UserSearchResult,
};
use parley_shared::types::{RoomId, UserId};

use crate::http::{require, ApiClient, ApiResult};

type Ignored = serde_json::Value;

impl ApiClient {
    // -- auth ---------------------------------------------------------------

    pub async fn login(&self, login_id: &str, password: &str) -> ApiResult<TokenPair> {
        let body = LoginRequest {
            login_id: login_id.to_string(),
            password: password.to_string(),
        };
        require(self.post(PATH_LOGIN, Some(&body), None).await?)
    }

    pub async fn refresh(&self, refresh_token: &str) -> ApiResult<TokenPair> {
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        require(self.post(PATH_REFRESH, Some(&body), None).await?)
    }

    pub async fn logout(&self, user_id: &str, token: &str) -> ApiResult<()> {
        let body = LogoutRequest {
            user_id: user_id.to_string(),
        };
        self.post::<Ignored, _>(PATH_LOGOUT, Some(&body), Some(token))
            .await
            .map(|_| ())
    }

    pub async fn sign_up(&self, form: &SignUpRequest) -> ApiResult<SignUpResult> {
        require(self.post(PATH_SIGN_UP, Some(form), None).await?)
    }

    // -- users & friends ----------------------------------------------------

    pub async fn find_user(&self, user_id: &str, token: &str) -> ApiResult<User> {
        let path = format!("{PATH_USERS}/{user_id}");
        require(self.get(&path, Some(token)).await?)
    }

    pub async fn search_users(
        &self,
        keyword: &str,
        token: &str,
    ) -> ApiResult<Vec<UserSearchResult>> {
        Ok(self
            .get_query(PATH_USER_SEARCH, &[("keyword", keyword)], Some(token))
            .await?
            .unwrap_or_default())
    }

    pub async fn friends(&self, token: &str) -> ApiResult<Vec<Friend>> {
        Ok(self.get(PATH_FRIENDS, Some(token)).await?.unwrap_or_default())
    }

    pub async fn friend_requests(&self, token: &str) -> ApiResult<Vec<FriendRequest>> {
        Ok(self
            .get(PATH_FRIEND_REQUESTS, Some(token))
            .await?
            .unwrap_or_default())
    }

    pub async fn accept_friend(&self, friend_id: i64, token: &str) -> ApiResult<()> {
        let id = friend_id.to_string();
        self.post_query::<Ignored>(PATH_FRIEND_ACCEPT, &[("id", id.as_str())], Some(token))
            .await
            .map(|_| ())
    }

    pub async fn refuse_friend(&self, friend_id: i64, token: &str) -> ApiResult<()> {
        let id = friend_id.to_string();
        self.post_query::<Ignored>(PATH_FRIEND_REFUSE, &[("id", id.as_str())], Some(token))
            .await
            .map(|_| ())
    }

    pub async fn send_friend_request(&self, user_id: UserId, token: &str) -> ApiResult<()> {
        let body = SendFriendRequest { user_id };
        self.post::<Ignored, _>(PATH_FRIENDS, Some(&body), Some(token))
            .await
            .map(|_| ())
    }

    // -- chat ---------------------------------------------------------------

    pub async fn chat_rooms(&self, token: &str) -> ApiResult<Vec<ChatRoom>> {
        Ok(self
            .get(PATH_CHAT_ROOMS, Some(token))
            .await?
            .unwrap_or_default())
    }

    /// Create (or reopen) the private room with `friend`. The backend may
    /// answer without the room itself.
    pub async fn create_private_room(
        &self,
        friend: UserId,
        token: &str,
    ) -> ApiResult<Option<ChatRoom>> {
        let body = ChatRoomCreateRequest::private_with(friend);
        self.post(PATH_PRIVATE_ROOM, Some(&body), Some(token)).await
    }

    pub async fn chat_logs(
        &self,
        room: RoomId,
        page: u32,
        size: u32,
        token: &str,
    ) -> ApiResult<Page<ChatLog>> {
        let path = format!("{PATH_CHAT_ROOMS}/{room}/logs");
        let (page, size) = (page.to_string(), size.to_string());
        require(
            self.get_query(&path, &[("page", page.as_str()), ("size", size.as_str())], Some(token))
                .await?,
        )
    }

    pub async fn send_message(
        &self,
        request: &ChatWriteRequest,
        token: &str,
    ) -> ApiResult<ChatLog> {
        require(self.post(PATH_CHAT_MESSAGES, Some(request), Some(token)).await?)
    }
}
