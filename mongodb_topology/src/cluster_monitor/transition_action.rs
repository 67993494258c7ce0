use crate::{ClusterDescription, EndPoint};

/// One step the cluster has to take after a server reported in. Actions are applied in
/// the order they are returned.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionAction {
    /// Publish this description.
    UpdateClusterDescription(ClusterDescription),
    /// Start monitoring a newly discovered server.
    AddServer(EndPoint),
    /// Stop monitoring a server that no longer belongs to the cluster.
    RemoveServer { end_point: EndPoint, reason: String },
}
