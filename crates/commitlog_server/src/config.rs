//! Server configuration.

use std::time::Duration;

/// Configuration for the log service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Name recorded on the tracing span of every call.
    pub name: String,
    /// First wait of a tailing consumer that has caught up.
    pub poll_interval: Duration,
    /// Longest wait between reads of a caught-up tailing consumer.
    pub max_poll_interval: Duration,
    /// Channel capacity of streams opened by [`LogClient`](crate::LogClient).
    pub stream_buffer: usize,
}

impl ServerConfig {
    /// Creates a configuration with the given server name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            poll_interval: Duration::from_millis(1),
            max_poll_interval: Duration::from_millis(50),
            stream_buffer: 64,
        }
    }

    /// Sets the first tailing backoff.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the tailing backoff cap.
    pub fn with_max_poll_interval(mut self, interval: Duration) -> Self {
        self.max_poll_interval = interval;
        self
    }

    /// Sets the client stream channel capacity.
    pub fn with_stream_buffer(mut self, buffer: usize) -> Self {
        self.stream_buffer = buffer.max(1);
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("commitlog")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.name, "commitlog");
        assert_eq!(config.poll_interval, Duration::from_millis(1));
        assert_eq!(config.max_poll_interval, Duration::from_millis(50));
        assert_eq!(config.stream_buffer, 64);
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("server")
            .with_poll_interval(Duration::from_millis(5))
            .with_max_poll_interval(Duration::from_millis(20))
            .with_stream_buffer(0);

        assert_eq!(config.name, "server");
        assert_eq!(config.poll_interval, Duration::from_millis(5));
        assert_eq!(config.max_poll_interval, Duration::from_millis(20));
        // mpsc channels need room for one message
        assert_eq!(config.stream_buffer, 1);
    }
}
