/// Application name
pub const APP_NAME: &str = "Parley";

/// Default backend REST API base URL
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Default STOMP-over-WebSocket endpoint
pub const DEFAULT_SOCKET_URL: &str = "ws://localhost:8080/ws";

/// HTTP request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Minutes before expiry at which an access token is treated as expired
pub const DEFAULT_TOKEN_BUFFER_MINS: i64 = 3;

/// Time allowed for the broker to answer CONNECT, in seconds
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Chat log entries fetched when a room is opened
pub const DEFAULT_HISTORY_PAGE_SIZE: u32 = 50;

/// Minimum keyword length accepted by user search
pub const MIN_SEARCH_KEYWORD_LEN: usize = 3;

/// Unread counts above this are shown as "99+"
pub const MAX_UNREAD_BADGE: i64 = 99;

/// STOMP protocol version negotiated with the broker
pub const STOMP_VERSION: &str = "1.2";

/// Shown when a request never reached the server
pub const MSG_UNREACHABLE: &str = "Cannot reach the server. Please check your network connection.";

/// Shown when a failure carries no better description
pub const MSG_UNKNOWN_ERROR: &str = "An unknown error occurred.";

// REST endpoints (relative to the API base URL)
pub const PATH_LOGIN: &str = "/v1/login";
pub const PATH_REFRESH: &str = "/v1/refresh";
pub const PATH_LOGOUT: &str = "/v1/logout";
pub const PATH_SIGN_UP: &str = "/v1/users/sign-up";
pub const PATH_USERS: &str = "/v1/users";
pub const PATH_USER_SEARCH: &str = "/v1/users/search";
pub const PATH_FRIENDS: &str = "/v1/friends";
pub const PATH_FRIEND_REQUESTS: &str = "/v1/friends/requests";
pub const PATH_FRIEND_ACCEPT: &str = "/v1/friends/accept";
pub const PATH_FRIEND_REFUSE: &str = "/v1/friends/refuse";
pub const PATH_CHAT_ROOMS: &str = "/v1/chats/rooms";
pub const PATH_PRIVATE_ROOM: &str = "/v1/chats/rooms/private";
pub const PATH_CHAT_MESSAGES: &str = "/v1/chats/messages";
