use shared::DEFAULT_PORT;
use std::time::Duration;

/// Where and how an observer joins a simulator.
#[derive(Debug, Clone)]
pub struct ObserverConfig {
    /// `host:port` of the simulator.
    pub server_addr: String,
    /// Upper bound on waiting for `Initialize`.
    pub join_timeout: Duration,
    /// Keep-alive period while joined.
    pub heartbeat_interval: Duration,
}

impl ObserverConfig {
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            ..Self::default()
        }
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            join_timeout: Duration::from_millis(2000),
            heartbeat_interval: Duration::from_secs(1),
        }
    }
}
