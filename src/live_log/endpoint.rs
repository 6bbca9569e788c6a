//! Live-log endpoint derivation
//!
//! The streaming endpoint is never configured directly. It is derived from the
//! origin the dashboard is served from: plaintext pages talk `ws`, encrypted
//! pages talk `wss`, and the path is always [`LOG_PATH`].

use std::fmt;
use thiserror::Error;
use url::Url;

/// Fixed path of the log-streaming endpoint on the backend
pub const LOG_PATH: &str = "/ws/dev/log/";

/// Where the live-log connection points
///
/// Computed once at startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEndpoint {
    url: Url,
}

impl ConnectionEndpoint {
    /// Derive the endpoint from a page origin such as `https://dash.local:8443`
    ///
    /// Anything after the authority (path, query, fragment) is ignored.
    pub fn from_origin(origin: &str) -> Result<Self, EndpointError> {
        let page = Url::parse(origin).map_err(|e| EndpointError::InvalidOrigin {
            origin: origin.to_string(),
            error: e.to_string(),
        })?;

        let scheme = match page.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
        };

        let host = page
            .host_str()
            .ok_or_else(|| EndpointError::MissingHost(origin.to_string()))?;

        let authority = match page.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let url = Url::parse(&format!("{}://{}{}", scheme, authority, LOG_PATH)).map_err(|e| {
            EndpointError::InvalidOrigin {
                origin: origin.to_string(),
                error: e.to_string(),
            }
        })?;

        Ok(Self { url })
    }

    /// The full connection URI
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Whether the endpoint uses the encrypted transport
    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "wss"
    }
}

impl fmt::Display for ConnectionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Errors deriving an endpoint from a page origin
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Invalid origin {origin:?}: {error}")]
    InvalidOrigin { origin: String, error: String },

    #[error("Unsupported origin scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Origin has no host: {0}")]
    MissingHost(String),
}
