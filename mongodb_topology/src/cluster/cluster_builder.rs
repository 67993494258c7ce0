use std::{sync::Arc, time::Duration};

use tracing::instrument;

use crate::{
    events::{ClusterEvent, EventPublisher},
    Cluster, ClusterConnectionMode, ClusterError, ClusterInitialConfiguration, ClusterSettings,
    ConnectionFactory, EndPoint, EndPointError, ServerSelector,
};

#[derive(Debug, Default)]
pub struct ClusterBuilder {
    connection_factory: Option<Box<dyn ConnectionFactory>>,
    end_points: Vec<String>,
    events: EventPublisher,
    settings: ClusterSettings,
}

impl ClusterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds seed end points, `host` or `host:port`.
    pub fn set_end_points<T>(mut self, end_points: &[T]) -> Self
    where
        T: AsRef<str>,
    {
        for e in end_points {
            self.end_points.push(e.as_ref().to_string());
        }
        self
    }

    pub fn set_connection_mode(mut self, connection_mode: ClusterConnectionMode) -> Self {
        self.settings.connection_mode = connection_mode;
        self
    }

    /// Expects every member to belong to this replica set. Implies the ReplicaSet connection
    /// mode unless another mode was chosen.
    pub fn set_replica_set_name(mut self, replica_set_name: &str) -> Self {
        self.settings.replica_set_name = Some(replica_set_name.to_string());
        self
    }

    pub fn set_heartbeat_interval(mut self, heartbeat_interval: Duration) -> Self {
        self.settings.server_monitor.heartbeat_interval = heartbeat_interval;
        self
    }

    pub fn set_min_heartbeat_interval(mut self, min_heartbeat_interval: Duration) -> Self {
        self.settings.server_monitor.min_heartbeat_interval = min_heartbeat_interval;
        self
    }

    pub fn set_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.settings.server_monitor.connect_timeout = connect_timeout;
        self
    }

    pub fn set_local_threshold(mut self, local_threshold: Duration) -> Self {
        self.settings.local_threshold = local_threshold;
        self
    }

    pub fn set_server_selection_timeout(mut self, server_selection_timeout: Duration) -> Self {
        self.settings.server_selection_timeout = server_selection_timeout;
        self
    }

    pub fn set_max_server_selection_wait_queue_size(mut self, size: usize) -> Self {
        self.settings.max_server_selection_wait_queue_size = size;
        self
    }

    /// A selector applied to every selection ahead of the caller's own.
    pub fn set_pre_server_selector(mut self, selector: impl ServerSelector + 'static) -> Self {
        self.settings.pre_server_selector = Some(Box::new(selector));
        self
    }

    /// A selector applied to every selection after the caller's own.
    pub fn set_post_server_selector(mut self, selector: impl ServerSelector + 'static) -> Self {
        self.settings.post_server_selector = Some(Box::new(selector));
        self
    }

    pub fn set_connection_factory(
        mut self,
        connection_factory: impl ConnectionFactory + 'static,
    ) -> Self {
        self.connection_factory = Some(Box::new(connection_factory));
        self
    }

    pub fn add_event_subscriber<F>(mut self, subscriber: F) -> Self
    where
        F: Fn(&ClusterEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(Arc::new(subscriber));
        self
    }

    /// Starts a new cluster actor and returns a handle to it.
    ///
    /// Each call creates a new, independent cluster with its own monitors, so the builder can
    /// be kept around as a template. Must be called from within a tokio runtime.
    #[instrument(level = "debug", name = "Build ClusterBuilder", skip(self))]
    pub fn build(&self) -> Result<Cluster, ClusterError> {
        // Ensure there is at least one end point
        if self.end_points.is_empty() {
            tracing::error!(
                "No end points were supplied and a cluster can't exist without at least one"
            );
            return Err(ClusterError::MissingEndPoints);
        }

        let end_points = validate_end_points(self.end_points.as_slice())?;

        let connection_factory = self.connection_factory.clone().ok_or_else(|| {
            ClusterError::InvalidConfiguration("A connection factory is required".to_string())
        })?;

        let mut settings = self.settings.clone();
        settings.end_points = end_points;

        if settings.replica_set_name.is_some() {
            match settings.connection_mode {
                ClusterConnectionMode::Automatic => {
                    settings.connection_mode = ClusterConnectionMode::ReplicaSet
                }
                ClusterConnectionMode::ReplicaSet | ClusterConnectionMode::Direct => {}
                mode => {
                    return Err(ClusterError::InvalidConfiguration(format!(
                        "A replica set name cannot be used with the {} connection mode",
                        mode
                    )))
                }
            }
        }

        if matches!(
            settings.connection_mode,
            ClusterConnectionMode::Direct | ClusterConnectionMode::Standalone
        ) && settings.end_points.len() > 1
        {
            return Err(ClusterError::InvalidConfiguration(format!(
                "The {} connection mode requires exactly one end point",
                settings.connection_mode
            )));
        }

        let monitor = &settings.server_monitor;
        if monitor.min_heartbeat_interval > monitor.heartbeat_interval {
            return Err(ClusterError::InvalidConfiguration(
                "The minimum heartbeat interval cannot exceed the heartbeat interval".to_string(),
            ));
        }

        let initial_config = ClusterInitialConfiguration {
            settings,
            connection_factory,
            events: self.events.clone(),
        };

        tracing::trace!("Initial Configuration: {:?}", &initial_config);

        Ok(Cluster::new(initial_config))
    }
}

/// Parses the seed strings, dropping duplicates but keeping the given order.
#[instrument(level = "debug", name = "Validate End Points")]
fn validate_end_points<T>(end_points: &[T]) -> Result<Vec<EndPoint>, EndPointError>
where
    T: AsRef<str> + std::fmt::Debug,
{
    let mut clean_end_points = Vec::with_capacity(end_points.len());
    for e in end_points {
        let end_point = e.as_ref().parse::<EndPoint>()?;
        if !clean_end_points.contains(&end_point) {
            clean_end_points.push(end_point);
        }
    }
    Ok(clean_end_points)
}
