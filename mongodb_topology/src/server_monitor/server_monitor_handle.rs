use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::instrument;

use crate::{
    events::EventPublisher, run_server_monitor_actor, ClusterMessage, ConnectionFactory,
    ServerId, ServerMonitorActor, ServerMonitorSettings,
};

/**
Handle to the background task that heartbeats one server.

The task is created by [`ServerMonitor::new`] but only spawned by
[`start`](ServerMonitor::start). Every heartbeat, successful or not, produces exactly one
new [`ServerDescription`](crate::ServerDescription) that is sent to the cluster.
Dropping the handle stops the task.
*/
#[derive(Debug)]
pub struct ServerMonitor {
    server_id: ServerId,
    /// Tags every report, so reports of a replaced monitor can be told apart.
    generation: u64,
    /// The actor, until it is spawned.
    pending: Option<ServerMonitorActor>,
    task: Option<JoinHandle<()>>,
    heartbeat_requests: mpsc::Sender<()>,
    shutdown: watch::Sender<bool>,
}

impl ServerMonitor {
    pub fn new(
        server_id: ServerId,
        generation: u64,
        connection_factory: Box<dyn ConnectionFactory>,
        settings: ServerMonitorSettings,
        reporter: mpsc::Sender<ClusterMessage>,
        events: EventPublisher,
    ) -> Self {
        // One pending request is as good as many.
        let (heartbeat_requests, heartbeat_receiver) = mpsc::channel(1);
        let (shutdown, shutdown_receiver) = watch::channel(false);
        let actor = ServerMonitorActor::new(
            server_id.clone(),
            generation,
            connection_factory,
            settings,
            reporter,
            events,
            heartbeat_receiver,
            shutdown_receiver,
        );

        Self {
            server_id,
            generation,
            pending: Some(actor),
            task: None,
            heartbeat_requests,
            shutdown,
        }
    }

    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Spawns the heartbeat loop. Calling this more than once has no effect.
    #[instrument(level = "debug", name = "Server Monitor - Start", skip(self), fields(server_id = %self.server_id))]
    pub fn start(&mut self) {
        if let Some(actor) = self.pending.take() {
            self.task = Some(tokio::spawn(run_server_monitor_actor(actor)));
        }
    }

    /// Stops the heartbeat loop and releases the monitoring connection. Safe to call at
    /// any time, any number of times.
    #[instrument(level = "debug", name = "Server Monitor - Stop", skip(self), fields(server_id = %self.server_id))]
    pub fn stop(&mut self) {
        self.pending = None;
        // Fails only when the task has already ended.
        let _ = self.shutdown.send(true);
    }

    /// Asks for a heartbeat as soon as the minimum heartbeat interval allows.
    pub fn request_heartbeat(&self) {
        let _ = self.heartbeat_requests.try_send(());
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for ServerMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
