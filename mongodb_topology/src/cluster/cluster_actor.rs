use std::collections::HashMap;

use tokio::sync::{mpsc, watch};
use tracing::{instrument, Span};
use uuid::Uuid;

use crate::{
    events::{ClusterEvent, EventPublisher},
    ClusterDescription, ClusterInitialConfiguration, ClusterMessage, ClusterMonitor,
    ClusterSettings, ClusterType, ConnectionFactory, EndPoint, ServerDescription, ServerId,
    ServerMonitor, TransitionAction,
};

/// Owns the monitors and the authoritative [`ClusterDescription`].
///
/// Reports are processed one at a time, so every transition sees the description the
/// previous one produced.
pub struct ClusterActor {
    connection_factory: Box<dyn ConnectionFactory>,
    /// The register every [`Cluster`](crate::Cluster) handle reads snapshots from.
    description: watch::Sender<ClusterDescription>,
    events: EventPublisher,
    monitors: HashMap<EndPoint, ServerMonitor>,
    next_generation: u64,
    receiver: mpsc::Receiver<ClusterMessage>,
    /// Allows the actor to receive messages from its monitors.
    receiver_internal: mpsc::Receiver<ClusterMessage>,
    /// Handed to every monitor so it can report back.
    sender_internal: mpsc::Sender<ClusterMessage>,
    settings: ClusterSettings,
}

impl ClusterActor {
    pub fn new(
        receiver: mpsc::Receiver<ClusterMessage>,
        description: watch::Sender<ClusterDescription>,
        initial_config: ClusterInitialConfiguration,
    ) -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            connection_factory: initial_config.connection_factory,
            description,
            events: initial_config.events,
            monitors: HashMap::new(),
            next_generation: 0,
            receiver,
            receiver_internal: rx,
            sender_internal: tx,
            settings: initial_config.settings,
        }
    }

    /// Starts a monitor for every server of the current description.
    fn start_monitors(&mut self) {
        let end_points = self
            .description
            .borrow()
            .end_points()
            .cloned()
            .collect::<Vec<_>>();
        for end_point in end_points {
            self.add_monitor(end_point.clone());
            self.events.publish(ClusterEvent::ServerAdded { end_point });
        }
    }

    /// Message handler for the ClusterActor
    #[instrument(
        level = "debug",
        name = "Cluster Actor - Handle Message",
        skip(self),
        fields(correlation_id)
    )]
    fn handle_message(&mut self, msg: ClusterMessage) {
        // Apply a correlation id to all child spans of this message handler
        Span::current().record("correlation_id", Uuid::new_v4().to_string());
        match msg {
            ClusterMessage::ServerDescriptionChanged { generation, server } => {
                self.process_server_description(generation, server)
            }
            ClusterMessage::RequestHeartbeat => {
                tracing::trace!("Requesting heartbeats from {} monitors.", self.monitors.len());
                for monitor in self.monitors.values() {
                    monitor.request_heartbeat();
                }
            }
            ClusterMessage::Dispose { respond_to } => {
                self.dispose();
                let _ = respond_to.send(());
            }
        }
    }

    fn process_server_description(&mut self, generation: u64, server: ServerDescription) {
        let current = self.monitors.get(server.end_point()).map(|m| m.generation());
        if current != Some(generation) {
            tracing::debug!(
                "Ignoring report from a monitor of {} that is no longer running.",
                server.end_point()
            );
            return;
        }

        let previous = self.description.borrow().clone();
        let old_server = previous.get_server(server.end_point()).cloned();

        let actions = match ClusterMonitor::transition(&previous, server.clone()) {
            Ok(actions) => actions,
            Err(e) => {
                tracing::error!(
                    "Could not apply the report from {}. Caused by: {}",
                    server.end_point(),
                    e
                );
                return;
            }
        };

        for action in actions {
            match action {
                TransitionAction::UpdateClusterDescription(new) => {
                    let old = self.description.send_replace(new.clone());
                    tracing::debug!("Cluster description changed: {}", new);
                    if let (Some(old_server), Some(new_server)) =
                        (old_server.as_ref(), new.get_server(server.end_point()))
                    {
                        if !old_server.sdam_equals(new_server) {
                            self.events.publish(ClusterEvent::ServerDescriptionChanged {
                                old: old_server.clone(),
                                new: new_server.clone(),
                            });
                        }
                    }
                    self.events
                        .publish(ClusterEvent::ClusterDescriptionChanged { old, new });
                }
                TransitionAction::AddServer(end_point) => {
                    tracing::info!("Adding server {}.", end_point);
                    self.add_monitor(end_point.clone());
                    self.events.publish(ClusterEvent::ServerAdded { end_point });
                }
                TransitionAction::RemoveServer { end_point, reason } => {
                    tracing::info!("Removing server {}: {}", end_point, reason);
                    if let Some(mut monitor) = self.monitors.remove(&end_point) {
                        monitor.stop();
                    }
                    self.events
                        .publish(ClusterEvent::ServerRemoved { end_point, reason });
                }
            }
        }
    }

    fn add_monitor(&mut self, end_point: EndPoint) {
        if self.monitors.contains_key(&end_point) {
            return;
        }
        let cluster_id = self.description.borrow().cluster_id();
        let generation = self.next_generation;
        self.next_generation += 1;
        let mut monitor = ServerMonitor::new(
            ServerId::new(cluster_id, end_point.clone()),
            generation,
            self.connection_factory.clone(),
            self.settings.server_monitor.clone(),
            self.sender_internal.clone(),
            self.events.clone(),
        );
        monitor.start();
        self.monitors.insert(end_point, monitor);
    }

    /// Stops every monitor and publishes an empty description.
    #[instrument(level = "debug", name = "Cluster Actor - Dispose", skip(self))]
    fn dispose(&mut self) {
        for (_, mut monitor) in self.monitors.drain() {
            monitor.stop();
        }
        let previous = self.description.borrow().clone();
        self.description.send_replace(ClusterDescription::new(
            previous.cluster_id(),
            previous.connection_mode(),
            ClusterType::Unknown,
            std::iter::empty(),
        ));
        // Stop accepting new requests; queued ones are dropped with the actor.
        self.receiver.close();
    }
}

#[instrument(level = "debug", name = "Running Cluster Actor", skip(actor))]
pub async fn run_cluster_actor(mut actor: ClusterActor) {
    actor.start_monitors();
    loop {
        tokio::select! {
            opt_msg = actor.receiver.recv() => {
                let msg = match opt_msg {
                    Some(msg) => msg,
                    None => break,
                };
                let disposing = matches!(msg, ClusterMessage::Dispose { .. });
                actor.handle_message(msg);
                if disposing {
                    break;
                }
            },
            Some(msg) = actor.receiver_internal.recv() => {
                actor.handle_message(msg);
            }
        }
    }
    actor.dispose();
    tracing::debug!("Cluster actor stopped.");
}
