//! Terminal rendering for the dashboard views

use chrono::{DateTime, Local};
use clap::ValueEnum;
use serde_json::Value;

use super::router::{View, ROUTES};
use crate::live_log::{ConnectionState, ConnectionStatus};

/// How the log page prints payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Timestamped, human readable lines
    #[default]
    Pretty,
    /// One raw JSON document per line
    Json,
}

/// Text fields the backend commonly uses for the log line itself
const LINE_FIELDS: &[&str] = &["message", "msg", "log"];

/// Render one log payload as a single line
pub fn render_payload(payload: &Value, format: LogFormat, received_at: DateTime<Local>) -> String {
    match format {
        LogFormat::Json => payload.to_string(),
        LogFormat::Pretty => {
            format!("{} {}", received_at.format("%H:%M:%S"), payload_text(payload))
        }
    }
}

fn payload_text(payload: &Value) -> String {
    match payload {
        Value::String(line) => line.clone(),
        Value::Object(fields) => LINE_FIELDS
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| payload.to_string()),
        other => other.to_string(),
    }
}

/// Title bar shown when a view is mounted
pub fn render_header(view: View, status: ConnectionStatus) -> String {
    format!("== {} == [{}]", view.title(), render_status(status))
}

/// Connection indicator text
pub fn render_status(status: ConnectionStatus) -> String {
    match status.state {
        ConnectionState::Reconnecting => format!(
            "live log: reconnecting, {} attempts left",
            status.remaining_attempts
        ),
        state => format!("live log: {}", state),
    }
}

/// Navigation drawer listing every route, current one marked
pub fn render_nav(current: View) -> String {
    ROUTES
        .iter()
        .map(|(path, view)| {
            let marker = if *view == current { '*' } else { ' ' };
            format!("{} {:<7} {}", marker, path, view.title())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
