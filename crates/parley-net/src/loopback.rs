//! In-process broker transport.
//!
//! [`loopback`] returns a connector and the broker end it dials into. Each
//! successful `connect` hands a [`BrokerConnection`] to the broker, which
//! can then script the broker's half of the conversation. Used by tests
//! across the workspace and for embedding without a network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::TransportError;
use crate::stomp::{Command, Frame};
use crate::transport::{Connector, FrameLink, LINK_CAPACITY};

/// How long broker-side helpers wait for the client.
const WAIT: Duration = Duration::from_secs(5);

pub fn loopback() -> (LoopbackConnector, LoopbackBroker) {
    let (tx, rx) = mpsc::unbounded_channel();
    let connector = LoopbackConnector {
        accepted: tx,
        reachable: Arc::new(AtomicBool::new(true)),
    };
    (connector, LoopbackBroker { incoming: rx })
}

#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    accepted: mpsc::UnboundedSender<BrokerConnection>,
    reachable: Arc<AtomicBool>,
}

impl LoopbackConnector {
    /// While unreachable, `connect` fails as a refused dial would.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn connect(&self, endpoint: &str) -> Result<FrameLink, TransportError> {
        let refused = |reason: &str| TransportError::Connect {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(refused("connection refused"));
        }

        let (to_broker, from_client) = mpsc::channel(LINK_CAPACITY);
        let (to_client, from_broker) = mpsc::channel(LINK_CAPACITY);
        let connection = BrokerConnection {
            endpoint: endpoint.to_string(),
            from_client,
            to_client,
        };
        self.accepted
            .send(connection)
            .map_err(|_| refused("broker is gone"))?;
        debug!(endpoint = %endpoint, "Loopback link opened");

        Ok(FrameLink {
            outbound: to_broker,
            inbound: from_broker,
        })
    }
}

#[derive(Debug)]
pub struct LoopbackBroker {
    incoming: mpsc::UnboundedReceiver<BrokerConnection>,
}

impl LoopbackBroker {
    /// Wait for the next client connection.
    pub async fn accept(&mut self) -> anyhow::Result<BrokerConnection> {
        tokio::time::timeout(WAIT, self.incoming.recv())
            .await
            .context("no client connected")?
            .ok_or_else(|| anyhow!("connector dropped"))
    }

    /// A connection that was already dialled, if any.
    pub fn try_accept(&mut self) -> Option<BrokerConnection> {
        self.incoming.try_recv().ok()
    }
}

/// Broker side of one link.
#[derive(Debug)]
pub struct BrokerConnection {
    pub endpoint: String,
    from_client: mpsc::Receiver<Frame>,
    to_client: mpsc::Sender<Frame>,
}

impl BrokerConnection {
    pub async fn recv(&mut self) -> anyhow::Result<Frame> {
        tokio::time::timeout(WAIT, self.from_client.recv())
            .await
            .context("client sent nothing")?
            .ok_or_else(|| anyhow!("client closed the link"))
    }

    pub fn try_recv(&mut self) -> Option<Frame> {
        self.from_client.try_recv().ok()
    }

    /// Whether the client side has dropped its sender.
    pub async fn closed_by_client(&mut self) -> bool {
        matches!(
            tokio::time::timeout(WAIT, self.from_client.recv()).await,
            Ok(None)
        )
    }

    /// Receive the next frame and check its command.
    pub async fn expect(&mut self, command: Command) -> anyhow::Result<Frame> {
        let frame = self.recv().await?;
        if frame.command != command {
            bail!("expected {command}, got {}", frame.command);
        }
        Ok(frame)
    }

    /// Read CONNECT and answer CONNECTED. Returns the CONNECT frame.
    pub async fn accept_handshake(&mut self) -> anyhow::Result<Frame> {
        let connect = self.expect(Command::Connect).await?;
        self.send(Frame::connected()).await?;
        Ok(connect)
    }

    /// Read a SUBSCRIBE for `destination` and return its subscription id.
    pub async fn expect_subscribe(&mut self, destination: &str) -> anyhow::Result<String> {
        let frame = self.expect(Command::Subscribe).await?;
        match frame.get("destination") {
            Some(d) if d == destination => {}
            other => bail!("expected SUBSCRIBE to {destination}, got {other:?}"),
        }
        frame
            .get("id")
            .map(str::to_string)
            .ok_or_else(|| anyhow!("SUBSCRIBE without id"))
    }

    pub async fn send(&self, frame: Frame) -> anyhow::Result<()> {
        self.to_client
            .send(frame)
            .await
            .map_err(|_| anyhow!("client closed the link"))
    }

    /// Push a MESSAGE with a JSON body to subscription `subscription`.
    pub async fn deliver(
        &self,
        subscription: &str,
        destination: &str,
        body: &serde_json::Value,
    ) -> anyhow::Result<()> {
        self.deliver_raw(subscription, destination, body.to_string())
            .await
    }

    pub async fn deliver_raw(
        &self,
        subscription: &str,
        destination: &str,
        body: String,
    ) -> anyhow::Result<()> {
        let message_id = format!("{subscription}-{}", body.len());
        self.send(Frame::message(subscription, destination, &message_id, body))
            .await
    }
}
