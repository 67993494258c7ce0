use std::time::Duration;

/// Failed heartbeats retried at the minimum interval before backing off to the normal one.
pub const FAST_RETRY_ATTEMPTS: u32 = 3;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct ServerMonitorSettings {
    /// Time between heartbeats to a healthy server.
    pub heartbeat_interval: Duration,
    /// Heartbeats are never sent closer together than this, even when requested.
    pub min_heartbeat_interval: Duration,
    /// Bounds both opening the monitoring connection and each heartbeat.
    pub connect_timeout: Duration,
}

impl Default for ServerMonitorSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            min_heartbeat_interval: DEFAULT_MIN_HEARTBEAT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}
