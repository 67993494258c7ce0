use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    sync::{mpsc, oneshot, watch},
    time::Instant,
};
use tracing::instrument;

use crate::{
    run_cluster_actor, ClusterActor, ClusterBuilder, ClusterDescription, ClusterError,
    ClusterId, ClusterInitialConfiguration, ClusterMessage, ClusterSettings,
    CompositeServerSelector, LatencyLimitingServerSelector, RandomServerSelector,
    ServerDescription, ServerSelector,
};

/**
This is a handle to the cluster actor.

Only one cluster should exist per deployment. Cloning this handle is very cheap and will not
start a new actor or new monitors in the background; clone it to every component that needs
a server. When the last handle is dropped, the actor stops all monitoring.

```rust,no_run
# use mongodb_topology::{BoxFuture, Connection, ConnectionError, ConnectionFactory, EndPoint};
# #[derive(Clone, Debug)]
# struct MyConnectionFactory;
# impl ConnectionFactory for MyConnectionFactory {
#     fn connect<'a>(
#         &'a self,
#         _: &'a EndPoint,
#         _: std::time::Duration,
#     ) -> BoxFuture<'a, Result<Box<dyn Connection>, ConnectionError>> {
#         unimplemented!()
#     }
# }
# tokio_test::block_on(async {
use mongodb_topology::{Cluster, WritableServerSelector};

let cluster = Cluster::builder()
    .set_end_points(&["db1:27017", "db2:27017", "db3:27017"])
    .set_replica_set_name("rs0")
    .set_connection_factory(MyConnectionFactory)
    .build()?;

let primary = cluster.select_server(WritableServerSelector).await?;
println!("Writing to {}", primary.end_point());
# Ok::<(), mongodb_topology::ClusterError>(())
# }).unwrap();
```
*/
#[derive(Clone, Debug)]
pub struct Cluster {
    cluster_id: ClusterId,
    description: watch::Receiver<ClusterDescription>,
    sender: mpsc::Sender<ClusterMessage>,
    settings: Arc<ClusterSettings>,
    /// Callers currently waiting in `select_server`.
    waiting: Arc<AtomicUsize>,
}

impl Cluster {
    pub fn builder() -> ClusterBuilder {
        ClusterBuilder::default()
    }

    // This is pub(crate) so only the builder can crank it out
    pub(crate) fn new(initial_config: ClusterInitialConfiguration) -> Self {
        let cluster_id = ClusterId::new();
        let settings = initial_config.settings.clone();
        let initial = ClusterDescription::create_initial(
            cluster_id,
            settings.connection_mode,
            &settings.end_points,
        )
        .with_replica_set_name(settings.replica_set_name.clone());

        let (sender, receiver) = mpsc::channel(8);
        let (description_sender, description) = watch::channel(initial);
        let actor = ClusterActor::new(receiver, description_sender, initial_config);
        tokio::spawn(run_cluster_actor(actor));

        Self {
            cluster_id,
            description,
            sender,
            settings: Arc::new(settings),
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn cluster_id(&self) -> ClusterId {
        self.cluster_id
    }

    pub fn settings(&self) -> &ClusterSettings {
        &self.settings
    }

    /// The current snapshot of the deployment.
    pub fn description(&self) -> ClusterDescription {
        self.description.borrow().clone()
    }

    /// Selects a server, waiting at most the configured server selection timeout.
    pub async fn select_server(
        &self,
        selector: impl ServerSelector + 'static,
    ) -> Result<ServerDescription, ClusterError> {
        self.select_server_with_timeout(selector, self.settings.server_selection_timeout)
            .await
    }

    pub async fn select_server_with_timeout(
        &self,
        selector: impl ServerSelector + 'static,
        timeout: Duration,
    ) -> Result<ServerDescription, ClusterError> {
        self.select_server_with_cancellation(selector, timeout, std::future::pending())
            .await
    }

    /**
    Selects a server matching `selector`, picked at random among the servers inside the
    latency window. The configured pre and post selectors run before and after `selector`.

    When nothing matches, waits for the description to change and tries again, until a
    server matches, `timeout` elapses, `cancel` completes or the cluster is disposed.
    */
    #[instrument(
        level = "debug",
        name = "Cluster Handle - Select Server",
        skip(self, selector, cancel),
        fields(selector = %selector)
    )]
    pub async fn select_server_with_cancellation(
        &self,
        selector: impl ServerSelector + 'static,
        timeout: Duration,
        cancel: impl Future<Output = ()>,
    ) -> Result<ServerDescription, ClusterError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let selector_name = selector.to_string();
        let mut stages: Vec<Box<dyn ServerSelector>> = Vec::with_capacity(5);
        stages.extend(self.settings.pre_server_selector.clone());
        stages.push(Box::new(selector));
        stages.extend(self.settings.post_server_selector.clone());
        stages.push(Box::new(LatencyLimitingServerSelector::new(
            self.settings.local_threshold,
        )));
        stages.push(Box::new(RandomServerSelector));
        let selector = CompositeServerSelector::new(stages);

        if self.sender.is_closed() {
            return Err(ClusterError::Disposed);
        }

        tokio::pin!(cancel);
        let mut description = self.description.clone();
        let mut wait_queue_entry = None;
        loop {
            let current = description.borrow_and_update().clone();
            let servers = current.connected_servers();
            if let Some(server) = selector.select_servers(&current, &servers)?.into_iter().next() {
                tracing::debug!("Selected {}.", server.end_point());
                return Ok(server);
            }

            if wait_queue_entry.is_none() {
                wait_queue_entry = Some(WaitQueueEntry::enter(
                    &self.waiting,
                    self.settings.max_server_selection_wait_queue_size,
                )?);
            }
            tracing::trace!("No server matched, waiting for the cluster to change.");
            self.request_heartbeat();

            tokio::select! {
                changed = description.changed() => {
                    if changed.is_err() {
                        return Err(ClusterError::Disposed);
                    }
                },
                _ = tokio::time::sleep_until(deadline) => {
                    let error = ClusterError::ServerSelectionTimeout {
                        selector: selector_name,
                        elapsed: started.elapsed(),
                        description: Box::new(current),
                    };
                    tracing::warn!("{}", error);
                    return Err(error);
                },
                _ = &mut cancel => {
                    return Err(ClusterError::ServerSelectionCancelled(selector_name));
                },
            }
        }
    }

    /// Asks every monitor for a heartbeat as soon as its minimum interval allows.
    pub fn request_heartbeat(&self) {
        // A full channel means a request is already on its way.
        let _ = self.sender.try_send(ClusterMessage::RequestHeartbeat);
    }

    /// Stops all monitoring. Callers still waiting for a server get [`ClusterError::Disposed`].
    #[instrument(level = "debug", name = "Cluster Handle - Dispose", skip(self))]
    pub async fn dispose(&self) {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(ClusterMessage::Dispose { respond_to: tx })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }
}

/// A place in the server selection wait queue, released on drop.
struct WaitQueueEntry {
    waiting: Arc<AtomicUsize>,
}

impl WaitQueueEntry {
    fn enter(waiting: &Arc<AtomicUsize>, max: usize) -> Result<Self, ClusterError> {
        if waiting.fetch_add(1, Ordering::SeqCst) >= max {
            waiting.fetch_sub(1, Ordering::SeqCst);
            return Err(ClusterError::WaitQueueFull);
        }
        Ok(Self {
            waiting: waiting.clone(),
        })
    }
}

impl Drop for WaitQueueEntry {
    fn drop(&mut self) {
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_queue_is_bounded_and_released_on_drop() {
        let waiting = Arc::new(AtomicUsize::new(0));

        let first = WaitQueueEntry::enter(&waiting, 1).unwrap();
        let second = WaitQueueEntry::enter(&waiting, 1);
        assert!(matches!(second, Err(ClusterError::WaitQueueFull)));

        drop(first);
        assert_eq!(waiting.load(Ordering::SeqCst), 0);
        assert!(WaitQueueEntry::enter(&waiting, 1).is_ok());
    }
}
