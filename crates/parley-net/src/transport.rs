//! Broker transports.
//!
//! A [`Connector`] opens a [`FrameLink`]: a pair of frame channels to the
//! broker. Dropping the outbound sender closes the link; the inbound
//! receiver yields `None` once the broker side is gone.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::stomp::{Command, Frame};

/// Buffered frames per direction.
pub const LINK_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct FrameLink {
    pub outbound: mpsc::Sender<Frame>,
    pub inbound: mpsc::Receiver<Frame>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<FrameLink, TransportError>;
}

/// STOMP over a plain WebSocket, one frame per text message.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, endpoint: &str) -> Result<FrameLink, TransportError> {
        let (ws, _response) =
            connect_async(endpoint)
                .await
                .map_err(|e| TransportError::Connect {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                })?;
        info!(endpoint = %endpoint, "WebSocket connection established");

        let (mut sink, mut stream) = ws.split();
        let (out_tx, mut out_rx) = mpsc::channel::<Frame>(LINK_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel::<Frame>(LINK_CAPACITY);

        // Writer: frames -> text messages. Ends after DISCONNECT or when the
        // session drops its sender.
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let last = frame.command == Command::Disconnect;
                if let Err(e) = sink.send(Message::Text(frame.encode().into())).await {
                    warn!(error = %e, "WebSocket write failed");
                    break;
                }
                if last {
                    break;
                }
            }
            let _ = sink.close().await;
            debug!("WebSocket writer finished");
        });

        // Reader: text messages -> frames.
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text.to_string(),
                    Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                        Ok(text) => text.to_string(),
                        Err(e) => {
                            warn!(error = %e, "Dropping non UTF-8 binary message");
                            continue;
                        }
                    },
                    Ok(Message::Close(close)) => {
                        debug!(frame = ?close, "WebSocket closed by peer");
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "WebSocket read failed");
                        break;
                    }
                };

                match Frame::decode(&text) {
                    Ok(Some(frame)) => {
                        if in_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "Dropping malformed STOMP frame"),
                }
            }
            debug!("WebSocket reader finished");
        });

        Ok(FrameLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

/// `host` header value for CONNECT, taken from the endpoint URL. An endpoint
/// that is not a URL is used as is.
pub fn host_of(endpoint: &str) -> String {
    // IPv6 hosts come back bracketed.
    Url::parse(endpoint)
        .ok()
        .and_then(|url| {
            url.host_str()
                .map(|host| host.trim_start_matches('[').trim_end_matches(']').to_string())
        })
        .unwrap_or_else(|| endpoint.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("ws://localhost:8080/ws"), "localhost");
        assert_eq!(host_of("wss://chat.example.com/ws?x=1"), "chat.example.com");
        assert_eq!(host_of("ws://user@host:1/"), "host");
        assert_eq!(host_of("ws://[::1]:8080/ws"), "::1");
        assert_eq!(host_of("plain"), "plain");
        assert_eq!(host_of("WS://Chat.Example.com:443"), "chat.example.com");
    }

    #[tokio::test]
    async fn test_websocket_connect_failure() {
        let err = WebSocketConnector
            .connect("ws://127.0.0.1:1/ws")
            .await
            .unwrap_err();
        match err {
            TransportError::Connect { endpoint, .. } => assert_eq!(endpoint, "ws://127.0.0.1:1/ws"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
