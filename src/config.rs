//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::live_log::{ConnectionOptions, RetryPolicy, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_ATTEMPTS};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Live-log connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Origin the dashboard is served from; the endpoint is derived from it
    #[serde(default = "default_origin")]
    pub origin: String,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Upper bound on one WebSocket opening handshake
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_origin() -> String {
    "http://localhost:8080".to_string()
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_delay() -> u64 {
    3000 // 3 seconds
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_millis() as u64
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
            channel_capacity: default_channel_capacity(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl ConnectionConfig {
    pub fn options(&self) -> ConnectionOptions {
        ConnectionOptions {
            policy: RetryPolicy {
                max_attempts: self.max_attempts,
                delay: Duration::from_millis(self.retry_delay_ms),
            },
            channel_capacity: self.channel_capacity,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// View configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    /// Path of the view mounted at boot
    #[serde(default = "default_initial_path")]
    pub initial_path: String,

    /// Initial navigation drawer visibility
    #[serde(default)]
    pub nav_show: bool,
}

fn default_initial_path() -> String {
    "/log".to_string()
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            initial_path: default_initial_path(),
            nav_show: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    ///
    /// Nothing is logged here; the caller reports the outcome through
    /// [`ConfigDiscovery::log`] once the subscriber is installed.
    pub fn load_default() -> ConfigDiscovery {
        Self::discover(&default_config_paths())
    }

    /// Use the first of `paths` that exists and loads cleanly
    pub fn discover(paths: &[PathBuf]) -> ConfigDiscovery {
        let mut rejected = Vec::new();

        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    return ConfigDiscovery {
                        config,
                        source: Some(path.clone()),
                        rejected,
                    };
                }
                Err(e) => rejected.push((path.clone(), e)),
            }
        }

        ConfigDiscovery {
            config: Self::from_env(),
            source: None,
            rejected,
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Connection overrides
        if let Some(origin) = var("LIFTWATCH_ORIGIN") {
            self.connection.origin = origin;
        }
        if let Some(attempts) = var("LIFTWATCH_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.connection.max_attempts = n;
            }
        }
        if let Some(delay) = var("LIFTWATCH_RETRY_DELAY_MS") {
            if let Ok(ms) = delay.parse() {
                self.connection.retry_delay_ms = ms;
            }
        }
        if let Some(timeout) = var("LIFTWATCH_CONNECT_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.connection.connect_timeout_ms = ms;
            }
        }

        // Logging overrides
        if let Some(level) = var("LIFTWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("LIFTWATCH_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Config search order: user config dir, then /etc, then the working directory
pub fn default_config_paths() -> Vec<PathBuf> {
    [
        dirs::config_dir().map(|p| p.join("liftwatch").join("config.toml")),
        Some(PathBuf::from("/etc/liftwatch/config.toml")),
        Some(PathBuf::from("./config.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Result of searching the default config locations
#[derive(Debug)]
pub struct ConfigDiscovery {
    pub config: Config,
    /// File the config came from; `None` means defaults plus environment
    pub source: Option<PathBuf>,
    /// Files that exist but failed to load
    pub rejected: Vec<(PathBuf, ConfigError)>,
}

impl ConfigDiscovery {
    /// Report where the config came from
    pub fn log(&self) {
        for (path, e) in &self.rejected {
            tracing::warn!("Failed to load config from {:?}: {}", path, e);
        }
        match &self.source {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::info!("Using default config with environment overrides"),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Liftwatch Configuration
#
# Environment variables override these settings:
# - LIFTWATCH_ORIGIN
# - LIFTWATCH_MAX_ATTEMPTS
# - LIFTWATCH_RETRY_DELAY_MS
# - LIFTWATCH_CONNECT_TIMEOUT_MS
# - LIFTWATCH_LOG_LEVEL
# - LIFTWATCH_LOG_FORMAT

[connection]
# Origin the dashboard is served from. The live-log endpoint is
# {ws|wss}://<host>/ws/dev/log/ on this origin.
origin = "http://localhost:8080"

# Connection attempts per outage before giving up for good
max_attempts = 5

# Delay between attempts (ms)
retry_delay_ms = 3000

# Payloads buffered per view before it starts skipping
channel_capacity = 1024

# Give up on a single opening handshake after this long (ms).
# A timed-out attempt counts as a failed connection.
connect_timeout_ms = 10000

[ui]
# View mounted at startup: /log, / or /robot
initial_path = "/log"

# Show the navigation drawer
nav_show = false

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_match_live_log_policy() {
        let config = Config::default();
        let options = config.connection.options();
        assert_eq!(options.policy, RetryPolicy::default());
        assert_eq!(options.channel_capacity, 1024);
        assert_eq!(config.ui.initial_path, "/log");
        assert!(!config.ui.nav_show);
    }

    #[test]
    fn test_generated_config_parses_to_defaults() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.connection.origin, "http://localhost:8080");
        assert_eq!(config.connection.max_attempts, 5);
        assert_eq!(config.connection.retry_delay_ms, 3000);
        assert_eq!(config.connection.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[connection]\norigin = \"https://lift.example.com\"\n\n[ui]\nnav_show = true"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.connection.origin, "https://lift.example.com");
        assert_eq!(config.connection.max_attempts, 5);
        assert!(config.ui.nav_show);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_errors() {
        let missing = Config::load(Path::new("/nonexistent/liftwatch.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection\norigin = ").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_discover_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.toml");
        let good = dir.path().join("good.toml");
        let missing = dir.path().join("missing.toml");
        std::fs::write(&broken, "[ui\n").unwrap();
        std::fs::write(&good, "[logging]\nformat = \"json\"\n").unwrap();

        let found = Config::discover(&[missing.clone(), broken.clone(), good.clone()]);
        assert_eq!(found.source.as_deref(), Some(good.as_path()));
        assert_eq!(found.config.logging.format, "json");
        assert_eq!(found.rejected.len(), 1);
        assert_eq!(found.rejected[0].0, broken);
        assert!(matches!(found.rejected[0].1, ConfigError::Parse { .. }));

        let fallback = Config::discover(&[missing, broken]);
        assert!(fallback.source.is_none());
        assert_eq!(fallback.rejected.len(), 1);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("LIFTWATCH_ORIGIN", "https://10.1.1.1:8443"),
            ("LIFTWATCH_MAX_ATTEMPTS", "9"),
            ("LIFTWATCH_RETRY_DELAY_MS", "not-a-number"),
            ("LIFTWATCH_CONNECT_TIMEOUT_MS", "2500"),
            ("LIFTWATCH_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.connection.origin, "https://10.1.1.1:8443");
        assert_eq!(config.connection.max_attempts, 9);
        assert_eq!(config.connection.retry_delay_ms, 3000);
        assert_eq!(config.connection.connect_timeout_ms, 2500);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }
}
