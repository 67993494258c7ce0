use std::time::Duration;

use crate::{error_chain_fmt, ClusterDescription, EndPointError, ServerSelectorError};

#[derive(thiserror::Error)]
pub enum ClusterError {
    #[error("No end points were supplied and a cluster can't exist without at least one")]
    MissingEndPoints,
    #[error("Invalid cluster configuration: {0}")]
    InvalidConfiguration(String),
    #[error("A timeout occurred after {elapsed:?} selecting a server using {selector}. Client view of cluster state is {description}.")]
    ServerSelectionTimeout {
        selector: String,
        elapsed: Duration,
        description: Box<ClusterDescription>,
    },
    #[error("Server selection using {0} was cancelled")]
    ServerSelectionCancelled(String),
    #[error("Too many callers are already waiting for a server")]
    WaitQueueFull,
    #[error("The cluster has been disposed")]
    Disposed,
    #[error(transparent)]
    SelectorError(#[from] ServerSelectorError),
    #[error(transparent)]
    EndPointError(#[from] EndPointError),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}
impl std::fmt::Debug for ClusterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
