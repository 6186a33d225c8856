//! Server Configuration
//!
//! Centralized configuration with sensible defaults. The binary fills it in
//! from command-line arguments; tests usually start from
//! `Config::builder().port(0)`.

use crate::protocol::DEFAULT_MAX_LINE_LENGTH;
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use std::time::Duration;

/// Runtime configuration for a linekv server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,

    /// Port to listen on (0 picks a free port)
    pub port: u16,

    /// Close a session that sends nothing for this long (`None` = never)
    pub idle_timeout: Option<Duration>,

    /// Interval of the background expiry sweep (`None` = lazy expiry only)
    pub sweep_interval: Option<Duration>,

    /// Longest accepted request line, delimiter excluded
    pub max_line_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            idle_timeout: Some(Duration::from_secs(300)),
            sweep_interval: Some(Duration::from_millis(100)),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Returns the bind address as `host:port`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn max_line_length(mut self, bytes: usize) -> Self {
        self.config.max_line_length = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "127.0.0.1:6379");
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(300)));
        assert_eq!(config.max_line_length, 64 * 1024);
    }

    #[test]
    fn test_builder() {
        let config = Config::builder()
            .host("0.0.0.0")
            .port(7000)
            .idle_timeout(None)
            .sweep_interval(Some(Duration::from_secs(1)))
            .max_line_length(128)
            .build();

        assert_eq!(config.bind_address(), "0.0.0.0:7000");
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.sweep_interval, Some(Duration::from_secs(1)));
        assert_eq!(config.max_line_length, 128);
    }
}
