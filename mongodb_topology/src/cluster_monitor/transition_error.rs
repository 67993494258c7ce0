use crate::{error_chain_fmt, ClusterType, EndPoint};

#[derive(thiserror::Error)]
pub enum TransitionError {
    #[error("{0} reported in but is not a member of the cluster")]
    UnknownServer(EndPoint),
    #[error("Cannot apply a server report to a cluster of type {0}")]
    UnexpectedClusterType(ClusterType),
}
impl std::fmt::Debug for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
