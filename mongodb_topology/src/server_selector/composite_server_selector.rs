use std::fmt;

use crate::{ClusterDescription, ServerDescription, ServerSelector, ServerSelectorError};

/// Runs selectors in order, each one seeing only what the previous one kept.
#[derive(Debug, Clone)]
pub struct CompositeServerSelector {
    selectors: Vec<Box<dyn ServerSelector>>,
}

impl CompositeServerSelector {
    pub fn new(selectors: Vec<Box<dyn ServerSelector>>) -> Self {
        Self { selectors }
    }

    /// Appends another stage to the pipeline.
    pub fn then(mut self, selector: impl ServerSelector + 'static) -> Self {
        self.selectors.push(Box::new(selector));
        self
    }
}

impl ServerSelector for CompositeServerSelector {
    fn select_servers(
        &self,
        cluster: &ClusterDescription,
        servers: &[ServerDescription],
    ) -> Result<Vec<ServerDescription>, ServerSelectorError> {
        let mut selected = servers.to_vec();
        for selector in &self.selectors {
            if selected.is_empty() {
                break;
            }
            selected = selector.select_servers(cluster, &selected)?;
        }
        Ok(selected)
    }
}

impl fmt::Display for CompositeServerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let selectors = self
            .selectors
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        write!(f, "CompositeServerSelector {{ Selectors: [{}] }}", selectors.join(", "))
    }
}
