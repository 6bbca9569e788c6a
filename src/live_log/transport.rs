//! Transport seam for the live-log connection
//!
//! The driver only ever talks to [`Transport`] and [`TransportConnection`], so
//! the lifecycle logic can be run against an in-memory fake in tests and
//! against a real WebSocket ([`WsTransport`]) in the binary.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::endpoint::ConnectionEndpoint;
use super::machine::InboundFrame;

/// Something that can establish connections to an endpoint
#[async_trait]
pub trait Transport: Send + 'static {
    type Connection: TransportConnection;

    /// Attempt to establish a connection
    async fn open(
        &mut self,
        endpoint: &ConnectionEndpoint,
    ) -> Result<Self::Connection, TransportError>;
}

/// An established, bidirectional connection
#[async_trait]
pub trait TransportConnection: Send + 'static {
    /// Write one text frame
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Wait for the next data frame
    ///
    /// Returns `None` once the peer has closed the connection.
    async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>>;
}

/// Transport-level failures
///
/// These never reach callers of the connection; the driver folds every one of
/// them into a close event.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Connection closed")]
    Closed,
}

/// Default bound on one opening handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket transport backed by tokio-tungstenite
#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    /// A transport whose opens fail with [`TransportError::Connect`] after `connect_timeout`
    pub fn with_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WsTransport {
    type Connection = WsConnection;

    async fn open(
        &mut self,
        endpoint: &ConnectionEndpoint,
    ) -> Result<WsConnection, TransportError> {
        let handshake = tokio_tungstenite::connect_async(endpoint.as_str());
        let (stream, _response) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                TransportError::Connect(format!("timed out after {:?}", self.connect_timeout))
            })?
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(WsConnection { stream })
    }
}

/// An open WebSocket
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl TransportConnection for WsConnection {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>> {
        while let Some(result) = self.stream.next().await {
            match result {
                Ok(Message::Text(text)) => return Some(Ok(InboundFrame::Text(text))),
                Ok(Message::Binary(bytes)) => return Some(Ok(InboundFrame::Binary(bytes))),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(frame = ?frame, "Peer closed live-log socket");
                    return None;
                }
                // Ping/pong are answered by tungstenite itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
        None
    }
}
