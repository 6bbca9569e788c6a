//! # Liftwatch
//!
//! Client for an elevator/robot monitoring dashboard. It renders three views
//! (live log, elevator info, robot info), keeps one piece of shared UI state
//! (navigation-drawer visibility) and holds a self-healing live-log connection
//! to the backend.
//!
//! ## Modules
//!
//! - [`live_log`]: the streaming connection, its retry state machine and transports
//! - [`ui`]: route table, UI store and terminal rendering
//! - [`app`]: boot sequence wiring the pieces together
//! - [`config`]: TOML + environment configuration
//! - [`telemetry`]: tracing setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use liftwatch::app::App;
//! use liftwatch::config::Config;
//! use liftwatch::ui::LogFormat;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.connection.origin = "https://lift.example.com".to_string();
//!
//!     // Opens wss://lift.example.com/ws/dev/log/ and mounts the log page
//!     let app = App::boot(&config, LogFormat::Pretty)?;
//!     app.mount(&mut std::io::stdout()).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod live_log;
pub mod telemetry;
pub mod ui;

pub use app::{App, AppError};

pub use config::{Config, ConfigDiscovery, ConfigError, ConnectionConfig, LoggingConfig, UiConfig};

pub use live_log::{
    ConnectionEndpoint, ConnectionOptions, ConnectionState, ConnectionStatus, LiveLogConnection,
    LiveLogHandle, RetryPolicy, Transport, TransportConnection, TransportError, WsTransport,
};

pub use ui::{route_for, LogFormat, UiStore, View};
