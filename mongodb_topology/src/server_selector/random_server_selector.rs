use std::fmt;

use rand::seq::IteratorRandom;

use crate::{ClusterDescription, ServerDescription, ServerSelector, ServerSelectorError};

/// Picks one candidate uniformly at random, spreading load across equally good servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomServerSelector;

impl ServerSelector for RandomServerSelector {
    fn select_servers(
        &self,
        _cluster: &ClusterDescription,
        servers: &[ServerDescription],
    ) -> Result<Vec<ServerDescription>, ServerSelectorError> {
        Ok(servers
            .iter()
            .choose(&mut rand::thread_rng())
            .cloned()
            .into_iter()
            .collect())
    }
}

impl fmt::Display for RandomServerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RandomServerSelector")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::{
        server_selector::test_servers::{cluster, server},
        ClusterType, ServerType,
    };

    #[test]
    fn picks_exactly_one_candidate_and_eventually_all_of_them() {
        let servers = vec![
            server("a:27017", ServerType::ShardRouter, 10),
            server("b:27017", ServerType::ShardRouter, 10),
            server("c:27017", ServerType::ShardRouter, 10),
        ];
        let description = cluster(ClusterType::Sharded, &servers);

        let mut seen = HashSet::new();
        for _ in 0..500 {
            let selected = RandomServerSelector
                .select_servers(&description, &servers)
                .unwrap();
            assert_eq!(selected.len(), 1);
            seen.insert(selected[0].end_point().clone());
        }

        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn empty_in_empty_out() {
        let description = cluster(ClusterType::Sharded, &[]);

        assert!(RandomServerSelector
            .select_servers(&description, &[])
            .unwrap()
            .is_empty());
    }
}
