use std::time::Duration;

use tokio::sync::oneshot;

use crate::{
    events::EventPublisher, server_selector::DEFAULT_LOCAL_THRESHOLD, ClusterConnectionMode,
    ConnectionFactory, EndPoint, ServerDescription, ServerMonitorSettings, ServerSelector,
};

pub const DEFAULT_SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_SERVER_SELECTION_WAIT_QUEUE_SIZE: usize = 500;

#[derive(Debug)]
pub enum ClusterMessage {
    /// A monitor observed its server. Sent on the actor's internal channel.
    ServerDescriptionChanged {
        /// Identifies the monitor that sent the report.
        generation: u64,
        server: ServerDescription,
    },
    /// Asks every monitor for an early heartbeat.
    RequestHeartbeat,
    /// Stops every monitor and shuts the actor down.
    Dispose { respond_to: oneshot::Sender<()> },
}

#[derive(Clone, Debug)]
pub struct ClusterSettings {
    pub connection_mode: ClusterConnectionMode,
    pub replica_set_name: Option<String>,
    pub end_points: Vec<EndPoint>,
    /// Width of the latency window applied after every selector.
    pub local_threshold: Duration,
    pub server_selection_timeout: Duration,
    pub max_server_selection_wait_queue_size: usize,
    /// Runs before every caller's selector.
    pub pre_server_selector: Option<Box<dyn ServerSelector>>,
    /// Runs after every caller's selector and before the latency window.
    pub post_server_selector: Option<Box<dyn ServerSelector>>,
    pub server_monitor: ServerMonitorSettings,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            connection_mode: ClusterConnectionMode::default(),
            replica_set_name: None,
            end_points: Vec::new(),
            local_threshold: DEFAULT_LOCAL_THRESHOLD,
            server_selection_timeout: DEFAULT_SERVER_SELECTION_TIMEOUT,
            max_server_selection_wait_queue_size: DEFAULT_MAX_SERVER_SELECTION_WAIT_QUEUE_SIZE,
            pre_server_selector: None,
            post_server_selector: None,
            server_monitor: ServerMonitorSettings::default(),
        }
    }
}

/// Everything the actor needs to start.
#[derive(Debug)]
pub struct ClusterInitialConfiguration {
    pub(crate) settings: ClusterSettings,
    pub(crate) connection_factory: Box<dyn ConnectionFactory>,
    pub(crate) events: EventPublisher,
}
