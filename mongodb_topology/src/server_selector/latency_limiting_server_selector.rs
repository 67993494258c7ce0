use std::{fmt, time::Duration};

use crate::{ClusterDescription, ServerDescription, ServerSelector, ServerSelectorError};

pub const DEFAULT_LOCAL_THRESHOLD: Duration = Duration::from_millis(15);

/// Keeps every server whose average round trip time is within `allowed_latency_range` of
/// the fastest candidate. A single candidate always passes.
#[derive(Debug, Clone, Copy)]
pub struct LatencyLimitingServerSelector {
    allowed_latency_range: Duration,
}

impl LatencyLimitingServerSelector {
    pub fn new(allowed_latency_range: Duration) -> Self {
        Self {
            allowed_latency_range,
        }
    }

    pub fn allowed_latency_range(&self) -> Duration {
        self.allowed_latency_range
    }
}

impl Default for LatencyLimitingServerSelector {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_THRESHOLD)
    }
}

impl ServerSelector for LatencyLimitingServerSelector {
    fn select_servers(
        &self,
        _cluster: &ClusterDescription,
        servers: &[ServerDescription],
    ) -> Result<Vec<ServerDescription>, ServerSelectorError> {
        if servers.len() <= 1 {
            return Ok(servers.to_vec());
        }

        let fastest = servers
            .iter()
            .map(|s| s.average_round_trip_time())
            .min()
            .unwrap_or_default();
        let limit = fastest.saturating_add(self.allowed_latency_range);

        Ok(servers
            .iter()
            .filter(|s| s.average_round_trip_time() <= limit)
            .cloned()
            .collect())
    }
}

impl fmt::Display for LatencyLimitingServerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LatencyLimitingServerSelector {{ AllowedLatencyRange: {:?} }}",
            self.allowed_latency_range
        )
    }
}
