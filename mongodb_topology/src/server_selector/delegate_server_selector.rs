use std::{fmt, sync::Arc};

use crate::{ClusterDescription, ServerDescription, ServerSelector, ServerSelectorError};

pub type SelectorFn =
    dyn Fn(&ClusterDescription, &[ServerDescription]) -> Vec<ServerDescription> + Send + Sync;

/// Wraps an ad hoc filter function.
///
/// Whatever the function returns, only servers that were among the candidates are kept.
#[derive(Clone)]
pub struct DelegateServerSelector {
    name: String,
    selector: Arc<SelectorFn>,
}

impl DelegateServerSelector {
    pub fn new<F>(name: &str, selector: F) -> Self
    where
        F: Fn(&ClusterDescription, &[ServerDescription]) -> Vec<ServerDescription>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.to_string(),
            selector: Arc::new(selector),
        }
    }
}

impl ServerSelector for DelegateServerSelector {
    fn select_servers(
        &self,
        cluster: &ClusterDescription,
        servers: &[ServerDescription],
    ) -> Result<Vec<ServerDescription>, ServerSelectorError> {
        let selected = (self.selector)(cluster, servers);
        let (kept, invented): (Vec<_>, Vec<_>) = selected
            .into_iter()
            .partition(|s| servers.iter().any(|c| c.end_point() == s.end_point()));
        if !invented.is_empty() {
            tracing::warn!(
                "{} returned {} server(s) that were not candidates; ignoring them.",
                self,
                invented.len()
            );
        }
        Ok(kept)
    }
}

impl fmt::Debug for DelegateServerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateServerSelector")
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for DelegateServerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DelegateServerSelector {{ Name: {} }}", self.name)
    }
}
