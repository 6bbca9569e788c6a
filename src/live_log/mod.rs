//! Live-Log Streaming Connection
//!
//! Keeps one WebSocket connection to the backend's log stream alive and fans
//! decoded payloads out to whichever views are listening.
//!
//! ## Architecture
//!
//! - **Endpoint**: derives `{ws|wss}://<host>/ws/dev/log/` from the page origin
//! - **Machine**: pure lifecycle transitions and the retry budget
//! - **Transport**: the seam to the network, with a tokio-tungstenite backend
//! - **Connection**: the driver task plus the handle consumers hold
//!
//! ## Protocol
//!
//! On every successful open the client sends the text frame `init`. Everything
//! the server sends back is treated as an opaque JSON document; frames that do
//! not decode are dropped without notice.
//!
//! ## Example
//!
//! ```rust,no_run
//! use liftwatch::live_log::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let endpoint = ConnectionEndpoint::from_origin("http://localhost:8000")?;
//!     let handle = LiveLogConnection::connect(endpoint, WsTransport::new(), ConnectionOptions::default());
//!
//!     let mut log = handle.subscribe();
//!     while let Ok(payload) = log.recv().await {
//!         println!("{}", payload);
//!     }
//!     Ok(())
//! }
//! ```

mod connection;
mod endpoint;
mod machine;
mod transport;

pub use connection::{ConnectionOptions, ConnectionStatus, LiveLogConnection, LiveLogHandle};
pub use endpoint::{ConnectionEndpoint, EndpointError, LOG_PATH};
pub use machine::{
    ConnectionMachine, ConnectionState, Effect, Event, InboundFrame, RetryBudget, RetryPolicy,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, HANDSHAKE_TOKEN,
};
pub use transport::{
    Transport, TransportConnection, TransportError, WsConnection, WsTransport,
    DEFAULT_CONNECT_TIMEOUT,
};
