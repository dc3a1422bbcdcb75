//! TOML configuration.
//!
//! ```toml
//! [server]
//! host = "irc.example.net"
//! port = 6697
//! tls = true
//!
//! [bot]
//! nickname = "lunchbot"
//! owner = "alice"
//! channels = ["lunch"]
//! ```
//!
//! Every other key has a default; see the field docs.

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::bot::DEFAULT_OWNER;
use crate::client::ClientConfig;
use crate::reconnect::Backoff;
use crate::state::HandshakeConfig;
use crate::transport::ServerAddr;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub bot: BotConfig,
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub failures: FailuresConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Check values serde cannot rule out on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host is empty".into()));
        }
        let nickname = &self.bot.nickname;
        if nickname.is_empty() || nickname.contains([' ', '\r', '\n', ':']) {
            return Err(ConfigError::Invalid(format!(
                "bot.nickname {:?} is not a valid nickname",
                nickname
            )));
        }
        if self.keepalive.timeout_secs == 0 {
            return Err(ConfigError::Invalid("keepalive.timeout_secs must be positive".into()));
        }
        if self.reconnect.initial_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "reconnect.initial_delay_ms must be positive".into(),
            ));
        }
        if self.failures.capacity == 0 {
            return Err(ConfigError::Invalid("failures.capacity must be positive".into()));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> ServerAddr {
        ServerAddr {
            host: self.server.host.clone(),
            port: self.server.port,
            tls: self.server.tls,
        }
    }

    /// Engine settings derived from this configuration.
    pub fn client_config(&self) -> ClientConfig {
        let poll = self.keepalive.poll_secs;
        ClientConfig {
            handshake: HandshakeConfig {
                nickname: self.bot.nickname.clone(),
                full_name: self.bot.full_name.clone(),
                password: self.server.password.clone(),
            },
            ping_timeout: Duration::from_secs(self.keepalive.timeout_secs),
            idle_poll: (poll > 0).then(|| Duration::from_secs(poll)),
            backoff: Backoff::new(
                Duration::from_millis(self.reconnect.initial_delay_ms),
                Duration::from_secs(self.reconnect.max_delay_secs),
            ),
            quit_message: self.bot.quit_message.clone(),
        }
    }

    pub fn failure_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.failures.capacity).unwrap_or(crate::failures::DEFAULT_CAPACITY)
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

/// Server connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    /// Port (default: 6667).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connect with TLS (default: false).
    #[serde(default)]
    pub tls: bool,
    /// Server password sent with `PASS` (optional).
    pub password: Option<String>,
}

/// Bot identity and behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub nickname: String,
    /// Real name sent with `USER` (default: "slirc bot").
    #[serde(default = "default_full_name")]
    pub full_name: String,
    /// Who to ping when a command fails (default: "someone").
    #[serde(default = "default_owner")]
    pub owner: String,
    /// Channels joined on every connect; `#` is optional.
    #[serde(default)]
    pub channels: Vec<String>,
    /// `QUIT` text sent on shutdown (default: "bye").
    #[serde(default = "default_quit_message")]
    pub quit_message: String,
}

/// Keepalive timing.
#[derive(Debug, Clone, Deserialize)]
pub struct KeepaliveConfig {
    /// Seconds without traffic before the connection is dropped (default: 180).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Seconds between redundant idle checks; 0 disables them (default: 120).
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            poll_secs: default_poll_secs(),
        }
    }
}

/// Reconnect backoff.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    /// First delay in milliseconds (default: 250).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Delay cap in seconds (default: 300).
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

/// Failure-report deduplication.
#[derive(Debug, Clone, Deserialize)]
pub struct FailuresConfig {
    /// Distinct failures remembered (default: 256).
    #[serde(default = "default_failure_capacity")]
    pub capacity: usize,
}

impl Default for FailuresConfig {
    fn default() -> Self {
        Self {
            capacity: default_failure_capacity(),
        }
    }
}

fn default_port() -> u16 {
    6667
}

fn default_full_name() -> String {
    "slirc bot".to_string()
}

fn default_owner() -> String {
    DEFAULT_OWNER.to_string()
}

fn default_quit_message() -> String {
    "bye".to_string()
}

fn default_timeout_secs() -> u64 {
    crate::keepalive::PING_TIMEOUT.as_secs()
}

fn default_poll_secs() -> u64 {
    crate::keepalive::IDLE_POLL_INTERVAL.as_secs()
}

fn default_initial_delay_ms() -> u64 {
    crate::reconnect::INITIAL_DELAY.as_millis() as u64
}

fn default_max_delay_secs() -> u64 {
    crate::reconnect::MAX_DELAY.as_secs()
}

fn default_failure_capacity() -> usize {
    crate::failures::DEFAULT_CAPACITY.get()
}
