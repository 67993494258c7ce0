use std::fmt;

use crate::{ClusterDescription, ServerDescription, ServerSelector, ServerSelectorError};

/// Keeps the servers that accept writes: primaries, routers and standalones.
#[derive(Debug, Clone, Copy, Default)]
pub struct WritableServerSelector;

impl ServerSelector for WritableServerSelector {
    fn select_servers(
        &self,
        _cluster: &ClusterDescription,
        servers: &[ServerDescription],
    ) -> Result<Vec<ServerDescription>, ServerSelectorError> {
        Ok(servers
            .iter()
            .filter(|s| s.server_type().is_writable())
            .cloned()
            .collect())
    }
}

impl fmt::Display for WritableServerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WritableServerSelector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        server_selector::test_servers::{cluster, end_points, server},
        ClusterType, ServerType,
    };

    #[test]
    fn keeps_only_writable_types() {
        // Arrange
        let servers = vec![
            server("primary:27017", ServerType::ReplicaSetPrimary, 10),
            server("secondary:27017", ServerType::ReplicaSetSecondary, 10),
            server("arbiter:27017", ServerType::ReplicaSetArbiter, 10),
            server("ghost:27017", ServerType::ReplicaSetGhost, 10),
            server("unknown:27017", ServerType::Unknown, 10),
            server("mongos:27017", ServerType::ShardRouter, 10),
            server("standalone:27017", ServerType::Standalone, 10),
        ];
        let description = cluster(ClusterType::ReplicaSet, &servers);

        // Act
        let selected = WritableServerSelector
            .select_servers(&description, &servers)
            .unwrap();

        // Assert
        assert_eq!(
            end_points(&selected),
            vec!["primary:27017", "mongos:27017", "standalone:27017"]
        );
    }

    #[test]
    fn empty_in_empty_out() {
        let description = cluster(ClusterType::Unknown, &[]);

        let selected = WritableServerSelector
            .select_servers(&description, &[])
            .unwrap();

        assert!(selected.is_empty());
    }
}
