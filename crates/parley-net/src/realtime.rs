//! Realtime publish/subscribe session over STOMP.
//!
//! A [`RealtimeSession`] owns at most one broker connection. The connection
//! runs in a dedicated tokio task that owns the [`FrameLink`]; callers talk
//! to it through a bounded command channel, the same command/event loop
//! shape used elsewhere in the workspace.
//!
//! ```text
//! Disconnected --connect--> Connecting --CONNECTED--> Connected
//!      ^                        |                         |
//!      +---- error/timeout -----+---- disconnect/ERROR/close
//! ```
//!
//! Handlers run on the event loop task with no lock held, so a handler may
//! call back into the session (publishing a read receipt from a message
//! handler is the normal pattern). Every public operation except `connect`
//! is synchronous and never waits on the loop.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use parley_shared::constants::{DEFAULT_HANDSHAKE_TIMEOUT_SECS, DEFAULT_SOCKET_URL};
use parley_shared::destinations;
use parley_shared::types::ConnectionState;
use parley_shared::Credential;

use crate::error::{RealtimeError, TransportError};
use crate::registry::{Handler, SubscriptionRegistry};
use crate::stomp::{Command, Frame};
use crate::transport::{host_of, Connector, FrameLink, WebSocketConnector};

const COMMAND_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Broker WebSocket endpoint.
    pub endpoint: String,
    /// Time allowed for CONNECTED to arrive after CONNECT.
    pub handshake_timeout: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SOCKET_URL.to_string(),
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
        }
    }
}

/// Commands sent *into* the connection task.
#[derive(Debug)]
enum LoopCommand {
    Send(Frame),
    /// Send DISCONNECT and stop.
    Close,
}

struct Inner {
    state: ConnectionState,
    /// Bumped on every connect attempt and disconnect so a stale loop can
    /// tell it no longer owns the session.
    generation: u64,
    commands: Option<mpsc::Sender<LoopCommand>>,
    /// Subject of the credential the active (or pending) connection uses.
    user: Option<String>,
    registry: SubscriptionRegistry,
    next_subscription: u64,
    user_hook: Option<Handler>,
}

struct Shared {
    config: RealtimeConfig,
    connector: Arc<dyn Connector>,
    inner: Mutex<Inner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Cloneable handle to the realtime session.
#[derive(Clone)]
pub struct RealtimeSession {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RealtimeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("RealtimeSession")
            .field("endpoint", &self.shared.config.endpoint)
            .field("state", &inner.state)
            .field("subscriptions", &inner.registry.count())
            .finish()
    }
}

impl RealtimeSession {
    pub fn new(config: RealtimeConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                connector,
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    generation: 0,
                    commands: None,
                    user: None,
                    registry: SubscriptionRegistry::new(),
                    next_subscription: 0,
                    user_hook: None,
                }),
            }),
        }
    }

    /// Session speaking STOMP over a WebSocket.
    pub fn websocket(config: RealtimeConfig) -> Self {
        Self::new(config, Arc::new(WebSocketConnector))
    }

    /// Handler for the per-user notification channel subscribed on connect.
    /// Takes effect from the next connect.
    pub fn set_user_hook<F>(&self, hook: F)
    where
        F: Fn(serde_json::Value) + Send + Sync + 'static,
    {
        self.shared.lock().user_hook = Some(Arc::new(hook));
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// User the connection was opened for, while connecting or connected.
    pub fn user(&self) -> Option<String> {
        self.shared.lock().user.clone()
    }

    pub fn is_subscribed(&self, destination: &str) -> bool {
        self.shared.lock().registry.is_subscribed(destination)
    }

    pub fn subscription_count(&self) -> usize {
        self.shared.lock().registry.count()
    }

    /// Open the broker connection for `credential`'s user. Does nothing
    /// unless the session is disconnected.
    pub async fn connect(&self, credential: &Credential) -> Result<(), RealtimeError> {
        let user_id = credential.user_id().ok_or(RealtimeError::MissingUser)?;

        let generation = {
            let mut inner = self.shared.lock();
            if inner.state != ConnectionState::Disconnected {
                debug!(state = %inner.state, "Connect ignored, session already active");
                return Ok(());
            }
            inner.state = ConnectionState::Connecting;
            inner.user = Some(user_id.clone());
            inner.generation += 1;
            inner.generation
        };
        info!(endpoint = %self.shared.config.endpoint, user = %user_id, "Connecting to broker");

        let link = match self.handshake(credential).await {
            Ok(link) => link,
            Err(e) => {
                let mut inner = self.shared.lock();
                if inner.generation == generation {
                    inner.state = ConnectionState::Disconnected;
                    inner.user = None;
                }
                warn!(error = %e, "Broker handshake failed");
                return Err(e);
            }
        };

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);
        let user_hook = {
            let mut inner = self.shared.lock();
            if inner.generation != generation || inner.state != ConnectionState::Connecting {
                drop(inner);
                let _ = link.outbound.try_send(Frame::disconnect());
                debug!("Session was closed during the handshake");
                return Err(RealtimeError::Aborted);
            }
            inner.state = ConnectionState::Connected;
            inner.commands = Some(cmd_tx);
            inner.user_hook.clone()
        };

        tokio::spawn(run_connection(
            Arc::downgrade(&self.shared),
            generation,
            link,
            cmd_rx,
        ));
        info!(user = %user_id, "Broker session established");

        let user_handler: Handler = match user_hook {
            Some(hook) => hook,
            None => Arc::new(|payload: serde_json::Value| {
                debug!(payload = %payload, "User notification")
            }),
        };
        self.register(&destinations::user_notifications(&user_id), user_handler);
        Ok(())
    }

    async fn handshake(&self, credential: &Credential) -> Result<FrameLink, RealtimeError> {
        let endpoint = &self.shared.config.endpoint;
        let mut link = self.shared.connector.connect(endpoint).await?;

        link.outbound
            .send(Frame::connect(&host_of(endpoint), &credential.access_token))
            .await
            .map_err(|_| TransportError::Closed)?;

        let reply = tokio::time::timeout(self.shared.config.handshake_timeout, link.inbound.recv())
            .await
            .map_err(|_| RealtimeError::HandshakeTimeout)?;

        match reply {
            Some(frame) if frame.command == Command::Connected => {
                debug!(version = ?frame.get("version"), "CONNECTED received");
                Ok(link)
            }
            Some(frame) if frame.command == Command::Error => {
                let message = frame.get("message").unwrap_or(frame.body.as_str()).to_string();
                Err(RealtimeError::Rejected(message))
            }
            Some(frame) => Err(RealtimeError::Rejected(format!(
                "unexpected {} frame during handshake",
                frame.command
            ))),
            None => Err(TransportError::Closed.into()),
        }
    }

    /// Close the connection and drop every subscription.
    pub fn disconnect(&self) {
        let mut inner = self.shared.lock();
        if inner.state == ConnectionState::Disconnected {
            return;
        }
        inner.generation += 1;
        inner.state = ConnectionState::Disconnected;
        inner.user = None;
        let dropped = inner.registry.clear();
        if let Some(commands) = inner.commands.take() {
            if commands.try_send(LoopCommand::Close).is_err() {
                debug!("Connection task already gone or saturated; dropping its channel");
            }
        }
        info!(dropped_subscriptions = dropped, "Disconnected from broker");
    }

    /// Route messages on `destination` to `handler`, in arrival order.
    /// Returns `false` when disconnected or already subscribed; an existing
    /// subscription keeps its handler.
    pub fn subscribe<F>(&self, destination: &str, handler: F) -> bool
    where
        F: Fn(serde_json::Value) + Send + Sync + 'static,
    {
        self.register(destination, Arc::new(handler))
    }

    fn register(&self, destination: &str, handler: Handler) -> bool {
        let mut inner = self.shared.lock();
        if inner.state != ConnectionState::Connected {
            warn!(destination = %destination, "Cannot subscribe while not connected");
            return false;
        }
        if inner.registry.is_subscribed(destination) {
            warn!(destination = %destination, "Already subscribed, keeping the live handler");
            return false;
        }

        inner.next_subscription += 1;
        let id = format!("sub-{}", inner.next_subscription);
        if !enqueue(&inner, Frame::subscribe(&id, destination)) {
            return false;
        }
        inner.registry.insert(destination, &id, handler)
    }

    /// Stop delivery for `destination`. No-op if not subscribed.
    pub fn unsubscribe(&self, destination: &str) {
        let mut inner = self.shared.lock();
        let Some(subscription) = inner.registry.remove(destination) else {
            return;
        };
        if inner.state == ConnectionState::Connected {
            enqueue(&inner, Frame::unsubscribe(&subscription.id));
        }
    }

    /// SEND `payload` as JSON to `destination`.
    pub fn publish<T: Serialize + ?Sized>(
        &self,
        destination: &str,
        payload: &T,
        reply_to: Option<&str>,
    ) -> bool {
        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(e) => {
                warn!(destination = %destination, error = %e, "Failed to encode payload");
                return false;
            }
        };

        let inner = self.shared.lock();
        if inner.state != ConnectionState::Connected {
            warn!(destination = %destination, "Cannot publish while not connected");
            return false;
        }
        enqueue(&inner, Frame::send(destination, body, reply_to))
    }
}

fn enqueue(inner: &Inner, frame: Frame) -> bool {
    let Some(commands) = inner.commands.as_ref() else {
        return false;
    };
    let command = frame.command;
    match commands.try_send(LoopCommand::Send(frame)) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(command = %command, "Broker command queue full, dropping frame");
            false
        }
        Err(TrySendError::Closed(_)) => {
            warn!(command = %command, "Connection task is gone, dropping frame");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Connection task
// ---------------------------------------------------------------------------

async fn run_connection(
    shared: Weak<Shared>,
    generation: u64,
    link: FrameLink,
    mut commands: mpsc::Receiver<LoopCommand>,
) {
    let FrameLink {
        outbound,
        mut inbound,
    } = link;

    let reason = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(LoopCommand::Send(frame)) => {
                    if outbound.send(frame).await.is_err() {
                        break "link closed while sending";
                    }
                }
                Some(LoopCommand::Close) => {
                    let _ = outbound.send(Frame::disconnect()).await;
                    debug!(generation, "Connection task closed");
                    return;
                }
                None => {
                    debug!(generation, "Session dropped, closing connection task");
                    return;
                }
            },

            frame = inbound.recv() => match frame {
                Some(frame) => {
                    if let Err(reason) = dispatch(&shared, generation, frame) {
                        break reason;
                    }
                }
                None => break "broker closed the link",
            },
        }
    };

    let Some(shared) = shared.upgrade() else {
        return;
    };
    let mut inner = shared.lock();
    if inner.generation != generation {
        return;
    }
    let dropped = inner.registry.clear();
    inner.state = ConnectionState::Disconnected;
    inner.commands = None;
    inner.user = None;
    warn!(
        reason,
        dropped_subscriptions = dropped,
        "Broker connection lost"
    );
}

/// Handle one inbound frame. `Err` ends the connection.
fn dispatch(shared: &Weak<Shared>, generation: u64, frame: Frame) -> Result<(), &'static str> {
    match frame.command {
        Command::Message => {
            let Some(subscription) = frame.get("subscription") else {
                warn!(
                    destination = ?frame.get("destination"),
                    "MESSAGE without subscription header"
                );
                return Ok(());
            };

            let target = {
                let Some(shared) = shared.upgrade() else {
                    return Err("session dropped");
                };
                let inner = shared.lock();
                if inner.generation != generation {
                    return Err("superseded");
                }
                inner
                    .registry
                    .by_id(subscription)
                    .map(|s| (s.destination.clone(), s.handler.clone()))
            };
            let Some((destination, handler)) = target else {
                debug!(subscription = %subscription, "MESSAGE for an inactive subscription");
                return Ok(());
            };

            match serde_json::from_str::<serde_json::Value>(&frame.body) {
                Ok(payload) => handler(payload),
                Err(e) => warn!(
                    destination = %destination,
                    error = %e,
                    "Dropping message with undecodable body"
                ),
            }
            Ok(())
        }
        Command::Error => {
            error!(
                message = ?frame.get("message"),
                body = %frame.body,
                "Broker reported an error"
            );
            Err("broker error frame")
        }
        Command::Receipt => {
            debug!(receipt = ?frame.get("receipt-id"), "Receipt");
            Ok(())
        }
        other => {
            debug!(command = %other, "Ignoring unexpected frame");
            Ok(())
        }
    }
}
