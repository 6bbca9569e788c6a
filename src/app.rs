//! Application boot
//!
//! Boot order: build the UI store, resolve the root view through the router,
//! open the live-log connection, then mount the root view. Every piece is an
//! owned value on [`App`]; nothing is global.

use chrono::Local;
use std::io::Write;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;

use crate::config::Config;
use crate::live_log::{
    ConnectionEndpoint, EndpointError, LiveLogConnection, LiveLogHandle, Transport, WsTransport,
};
use crate::ui::{render_header, render_nav, render_payload, render_status, route_for, LogFormat, UiStore, View};

/// The running dashboard
pub struct App {
    store: UiStore,
    root: View,
    live_log: LiveLogHandle,
    format: LogFormat,
}

impl App {
    /// Boot against the real WebSocket transport
    pub fn boot(config: &Config, format: LogFormat) -> Result<Self, AppError> {
        let transport = WsTransport::with_timeout(config.connection.connect_timeout());
        Self::boot_with(config, format, transport)
    }

    /// Boot against any transport
    pub fn boot_with<T: Transport>(
        config: &Config,
        format: LogFormat,
        transport: T,
    ) -> Result<Self, AppError> {
        let store = UiStore::new(config.ui.nav_show);

        let root = route_for(&config.ui.initial_path)
            .ok_or_else(|| AppError::UnknownRoute(config.ui.initial_path.clone()))?;

        let endpoint = ConnectionEndpoint::from_origin(&config.connection.origin)?;
        tracing::info!(view = %root, endpoint = %endpoint, "Booting dashboard");

        let live_log =
            LiveLogConnection::connect(endpoint, transport, config.connection.options());

        Ok(Self {
            store,
            root,
            live_log,
            format,
        })
    }

    pub fn store(&self) -> &UiStore {
        &self.store
    }

    pub fn root_view(&self) -> View {
        self.root
    }

    pub fn live_log(&self) -> &LiveLogHandle {
        &self.live_log
    }

    /// Render the root view until the connection goes away
    ///
    /// The log page prints every payload; the info views only track the
    /// connection indicator.
    pub async fn mount<W: Write>(&self, out: &mut W) -> Result<(), AppError> {
        let mut payloads = self.live_log.subscribe();
        let mut status = self.live_log.watch_status();
        let mut nav = self.store.watch_nav_show();

        self.render_chrome(out)?;

        loop {
            tokio::select! {
                payload = payloads.recv(), if self.root.streams_log() => match payload {
                    Ok(payload) => {
                        writeln!(out, "{}", render_payload(&payload, self.format, Local::now()))?;
                        out.flush()?;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Log view fell behind, frames skipped");
                    }
                    Err(RecvError::Closed) => break,
                },
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = *status.borrow();
                    writeln!(out, "-- {}", render_status(current))?;
                    out.flush()?;
                },
                changed = nav.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.render_chrome(out)?;
                },
            }
        }

        Ok(())
    }

    fn render_chrome<W: Write>(&self, out: &mut W) -> Result<(), AppError> {
        if self.store.nav_show() {
            writeln!(out, "{}", render_nav(self.root))?;
        }
        writeln!(out, "{}", render_header(self.root, self.live_log.status()))?;
        out.flush()?;
        Ok(())
    }
}

/// Errors raised while booting or rendering
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("No view is routed at {0:?}")]
    UnknownRoute(String),

    #[error("Render error: {0}")]
    Render(#[from] std::io::Error),
}
