use std::{sync::Arc, time::Duration};

use serde_json::json;
use tokio::{
    sync::{mpsc, watch},
    time::Instant,
};
use tracing::{instrument, Span};
use uuid::Uuid;

use crate::{
    events::{ClusterEvent, EventPublisher},
    ClusterMessage, Connection, ConnectionError, ConnectionFactory, HeartbeatResult,
    RoundTripTime, ServerDescription, ServerId, ServerMonitorSettings, ServerType,
    FAST_RETRY_ATTEMPTS,
};

/// Owns the monitoring connection and everything needed to run one heartbeat.
#[derive(Debug)]
struct HeartbeatChecker {
    server_id: ServerId,
    connection_factory: Box<dyn ConnectionFactory>,
    connection: Option<Box<dyn Connection>>,
    settings: ServerMonitorSettings,
}

impl HeartbeatChecker {
    /// Sends one `hello`. The connection is kept for the next heartbeat only if this one
    /// succeeded.
    async fn check(&mut self) -> Result<HeartbeatResult, ConnectionError> {
        let end_point = self.server_id.end_point().clone();
        let timeout = self.settings.connect_timeout;

        let mut connection = match self.connection.take() {
            Some(connection) => connection,
            None => {
                tracing::trace!("Opening monitoring connection.");
                tokio::time::timeout(timeout, self.connection_factory.connect(&end_point, timeout))
                    .await
                    .map_err(|_| ConnectionError::Timeout {
                        end_point: end_point.clone(),
                        after: timeout,
                    })??
            }
        };

        let reply = tokio::time::timeout(timeout, connection.run_command(json!({ "hello": 1 }), timeout))
            .await
            .map_err(|_| ConnectionError::Timeout {
                end_point: end_point.clone(),
                after: timeout,
            })??;
        let result = HeartbeatResult::from_reply(&end_point, reply)?;

        self.connection = Some(connection);
        Ok(result)
    }
}

#[derive(Debug)]
pub struct ServerMonitorActor {
    checker: HeartbeatChecker,
    consecutive_failures: u32,
    description: ServerDescription,
    events: EventPublisher,
    generation: u64,
    heartbeat_requests: mpsc::Receiver<()>,
    /// The cluster actor's internal channel.
    reporter: mpsc::Sender<ClusterMessage>,
    round_trip_time: RoundTripTime,
    shutdown: watch::Receiver<bool>,
}

impl ServerMonitorActor {
    pub(crate) fn new(
        server_id: ServerId,
        generation: u64,
        connection_factory: Box<dyn ConnectionFactory>,
        settings: ServerMonitorSettings,
        reporter: mpsc::Sender<ClusterMessage>,
        events: EventPublisher,
        heartbeat_requests: mpsc::Receiver<()>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            description: ServerDescription::new(server_id.clone()),
            checker: HeartbeatChecker {
                server_id,
                connection_factory,
                connection: None,
                settings,
            },
            consecutive_failures: 0,
            events,
            generation,
            heartbeat_requests,
            reporter,
            round_trip_time: RoundTripTime::default(),
            shutdown,
        }
    }

    fn server_id(&self) -> &ServerId {
        &self.checker.server_id
    }

    /// Turns the outcome of a heartbeat into the server's new description.
    #[instrument(
        level = "debug",
        name = "Server Monitor - Handle Heartbeat",
        skip_all,
        fields(end_point = %self.server_id().end_point(), correlation_id)
    )]
    fn handle_outcome(
        &mut self,
        outcome: Result<HeartbeatResult, ConnectionError>,
        duration: Duration,
    ) -> ServerDescription {
        Span::current().record("correlation_id", Uuid::new_v4().to_string());
        let server_id = self.server_id().clone();

        match outcome {
            Ok(result) => {
                let average = self.round_trip_time.add_sample(duration);
                self.consecutive_failures = 0;
                tracing::trace!("Heartbeat succeeded in {:?}.", duration);
                self.events.publish(ClusterEvent::HeartbeatSucceeded {
                    server_id,
                    duration,
                });
                self.description
                    .clone()
                    .with_heartbeat_result(&result, average)
            }
            Err(error) => {
                self.round_trip_time.reset();
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                tracing::debug!(
                    "Heartbeat failed ({} in a row): {}",
                    self.consecutive_failures,
                    error
                );
                let description = self.description.clone().with_heartbeat_error(&error);
                self.events.publish(ClusterEvent::HeartbeatFailed {
                    server_id,
                    duration,
                    error: Arc::new(error),
                });
                description
            }
        }
    }

    /// How long after the start of the last heartbeat the next one is due.
    fn next_delay(&self, previous_type: ServerType) -> Duration {
        let settings = &self.checker.settings;
        match self.consecutive_failures {
            0 => settings.heartbeat_interval,
            // A server that was fine a moment ago gets one immediate retry.
            1 if previous_type != ServerType::Unknown => Duration::ZERO,
            n if n <= FAST_RETRY_ATTEMPTS => settings.min_heartbeat_interval,
            _ => settings.heartbeat_interval,
        }
    }
}

#[instrument(
    level = "debug",
    name = "Running Server Monitor Actor",
    skip_all,
    fields(end_point = %actor.server_id().end_point())
)]
pub async fn run_server_monitor_actor(mut actor: ServerMonitorActor) {
    'monitor: loop {
        let started = Instant::now();
        actor.events.publish(ClusterEvent::HeartbeatStarted {
            server_id: actor.server_id().clone(),
        });

        let outcome = tokio::select! {
            _ = actor.shutdown.changed() => break 'monitor,
            outcome = actor.checker.check() => outcome,
        };

        let previous_type = actor.description.server_type();
        let description = actor.handle_outcome(outcome, started.elapsed());
        actor.description = description.clone();

        if actor
            .reporter
            .send(ClusterMessage::ServerDescriptionChanged {
                generation: actor.generation,
                server: description,
            })
            .await
            .is_err()
        {
            tracing::debug!("Cluster is gone, stopping monitor.");
            break;
        }

        let min_interval = actor.checker.settings.min_heartbeat_interval;
        let mut deadline = started + actor.next_delay(previous_type);
        loop {
            tokio::select! {
                _ = actor.shutdown.changed() => break 'monitor,
                _ = tokio::time::sleep_until(deadline) => break,
                Some(()) = actor.heartbeat_requests.recv() => {
                    tracing::trace!("Heartbeat requested.");
                    deadline = deadline.min(started + min_interval);
                }
            }
        }
    }
    tracing::debug!("Server monitor stopped.");
}
