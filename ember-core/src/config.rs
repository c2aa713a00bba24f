//! Consumer configuration

use std::time::Duration;

/// Default TCP port for Ember+ providers
pub const DEFAULT_PORT: u16 = 9000;

/// Consumer session configuration
///
/// Timeouts govern the request pipeline and the S101 keep-alive machinery.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Provider host name or address
    pub host: String,
    /// Provider TCP port
    pub port: u16,
    /// Deadline applied to every in-flight request
    pub request_timeout: Duration,
    /// Interval between outbound keep-alive requests
    pub keepalive_interval: Duration,
    /// Silence period after which the peer is considered dead
    pub keepalive_timeout: Duration,
}

impl ConsumerConfig {
    /// Create a configuration for the given host with default timeouts
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            request_timeout: Duration::from_secs(3),
            keepalive_interval: Duration::from_secs(2),
            keepalive_timeout: Duration::from_secs(10),
        }
    }

    /// Set the provider port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the per-request deadline
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the keep-alive send interval
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Set the keep-alive liveness timeout
    pub fn with_keepalive_timeout(mut self, timeout: Duration) -> Self {
        self.keepalive_timeout = timeout;
        self
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self::new("localhost")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConsumerConfig::new("10.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.keepalive_interval, Duration::from_secs(2));
        assert_eq!(config.keepalive_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_builder() {
        let config = ConsumerConfig::new("host")
            .with_port(9998)
            .with_request_timeout(Duration::from_millis(500));
        assert_eq!(config.port, 9998);
        assert_eq!(config.request_timeout, Duration::from_millis(500));
    }
}
