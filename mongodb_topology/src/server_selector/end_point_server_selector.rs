use std::fmt;

use crate::{
    ClusterDescription, EndPoint, ServerDescription, ServerSelector, ServerSelectorError,
};

/// Keeps the server at one specific address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndPointServerSelector {
    end_point: EndPoint,
}

impl EndPointServerSelector {
    pub fn new(end_point: EndPoint) -> Self {
        Self { end_point }
    }

    pub fn end_point(&self) -> &EndPoint {
        &self.end_point
    }
}

impl ServerSelector for EndPointServerSelector {
    fn select_servers(
        &self,
        _cluster: &ClusterDescription,
        servers: &[ServerDescription],
    ) -> Result<Vec<ServerDescription>, ServerSelectorError> {
        Ok(servers
            .iter()
            .filter(|s| s.end_point() == &self.end_point)
            .cloned()
            .collect())
    }
}

impl fmt::Display for EndPointServerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndPointServerSelector {{ EndPoint: {} }}", self.end_point)
    }
}
