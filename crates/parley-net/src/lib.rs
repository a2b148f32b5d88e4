// Backend plumbing: the REST client and the STOMP realtime session.

pub mod api;
pub mod error;
pub mod http;
pub mod loopback;
pub mod realtime;
pub mod registry;
pub mod stomp;
pub mod transport;

pub use error::{ApiError, RealtimeError, StompError, TransportError};
pub use http::{ApiClient, ApiResult};
pub use loopback::{loopback, BrokerConnection, LoopbackBroker, LoopbackConnector};
pub use realtime::{RealtimeConfig, RealtimeSession};
pub use registry::{Handler, SubscriptionRegistry};
pub use stomp::{Command, Frame};
pub use transport::{Connector, FrameLink, WebSocketConnector};
