use crate::{error_chain_fmt, ClusterType};

#[derive(thiserror::Error)]
pub enum ServerSelectorError {
    #[error("{selector} does not know how to select servers from a {cluster_type} cluster")]
    NotImplemented {
        selector: String,
        cluster_type: ClusterType,
    },
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}
impl std::fmt::Debug for ServerSelectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
