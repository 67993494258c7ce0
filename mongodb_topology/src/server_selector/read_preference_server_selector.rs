use std::fmt;

use crate::{
    ClusterConnectionMode, ClusterDescription, ClusterType, LatencyLimitingServerSelector, ReadPreference,
    ReadPreferenceMode, ServerDescription, ServerSelector, ServerSelectorError, ServerType,
    TagSet,
};

/**
Selects the servers a read with the given [`ReadPreference`] may go to.

In a replica set the mode decides between the primary and the secondaries, and the tag
sets narrow the secondaries down. Routers of a sharded cluster apply the read preference
themselves, so every router qualifies. Standalone servers always qualify. The result is
finally limited to the latency window of the fastest remaining server.

A directly connected server is used whatever its role, so in the Direct connection mode
every candidate qualifies.
*/
#[derive(Debug, Clone)]
pub struct ReadPreferenceServerSelector {
    read_preference: ReadPreference,
    latency_limiting: LatencyLimitingServerSelector,
}

impl ReadPreferenceServerSelector {
    pub fn new(read_preference: ReadPreference) -> Self {
        Self {
            read_preference,
            latency_limiting: LatencyLimitingServerSelector::default(),
        }
    }

    pub fn primary() -> Self {
        Self::new(ReadPreference::primary())
    }

    /// Overrides the default 15 ms latency window.
    pub fn with_latency_limiting(self, latency_limiting: LatencyLimitingServerSelector) -> Self {
        Self {
            latency_limiting,
            ..self
        }
    }

    pub fn read_preference(&self) -> &ReadPreference {
        &self.read_preference
    }

    fn select_for_replica_set(&self, servers: &[ServerDescription]) -> Vec<ServerDescription> {
        let primaries = of_type(servers, ServerType::ReplicaSetPrimary);
        let secondaries = of_type(servers, ServerType::ReplicaSetSecondary);
        let tag_sets = self.read_preference.tag_sets();

        match self.read_preference.mode() {
            ReadPreferenceMode::Primary => primaries,
            ReadPreferenceMode::PrimaryPreferred => {
                if primaries.is_empty() {
                    select_by_tag_sets(&secondaries, tag_sets)
                } else {
                    primaries
                }
            }
            ReadPreferenceMode::Secondary => select_by_tag_sets(&secondaries, tag_sets),
            ReadPreferenceMode::SecondaryPreferred => {
                let matching = select_by_tag_sets(&secondaries, tag_sets);
                if matching.is_empty() {
                    primaries
                } else {
                    matching
                }
            }
            ReadPreferenceMode::Nearest => {
                let eligible = servers
                    .iter()
                    .filter(|s| {
                        matches!(
                            s.server_type(),
                            ServerType::ReplicaSetPrimary | ServerType::ReplicaSetSecondary
                        )
                    })
                    .cloned()
                    .collect::<Vec<_>>();
                select_by_tag_sets(&eligible, tag_sets)
            }
        }
    }
}

impl ServerSelector for ReadPreferenceServerSelector {
    fn select_servers(
        &self,
        cluster: &ClusterDescription,
        servers: &[ServerDescription],
    ) -> Result<Vec<ServerDescription>, ServerSelectorError> {
        if cluster.connection_mode() == ClusterConnectionMode::Direct {
            return Ok(servers.to_vec());
        }

        let selected = match cluster.cluster_type() {
            // Nothing has been discovered yet.
            ClusterType::Unknown => Vec::new(),
            ClusterType::ReplicaSet => self.select_for_replica_set(servers),
            ClusterType::Sharded => of_type(servers, ServerType::ShardRouter),
            ClusterType::Standalone => of_type(servers, ServerType::Standalone),
            cluster_type @ ClusterType::LoadBalanced => {
                return Err(ServerSelectorError::NotImplemented {
                    selector: self.to_string(),
                    cluster_type,
                })
            }
        };

        self.latency_limiting.select_servers(cluster, &selected)
    }
}

impl fmt::Display for ReadPreferenceServerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReadPreferenceServerSelector {{ ReadPreference: {} }}",
            self.read_preference
        )
    }
}

fn of_type(servers: &[ServerDescription], server_type: ServerType) -> Vec<ServerDescription> {
    servers
        .iter()
        .filter(|s| s.server_type() == server_type)
        .cloned()
        .collect()
}

/// The servers matching the first tag set that matches anything. No tag sets at all is the
/// same as a single empty tag set.
fn select_by_tag_sets(servers: &[ServerDescription], tag_sets: &[TagSet]) -> Vec<ServerDescription> {
    if tag_sets.is_empty() {
        return servers.to_vec();
    }

    tag_sets
        .iter()
        .map(|tag_set| {
            servers
                .iter()
                .filter(|s| s.tags().contains_all(tag_set))
                .cloned()
                .collect::<Vec<_>>()
        })
        .find(|matching| !matching.is_empty())
        .unwrap_or_default()
}
