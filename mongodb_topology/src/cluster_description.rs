use std::{collections::BTreeMap, fmt};

use uuid::Uuid;

use crate::{ElectionId, EndPoint, ServerDescription, ServerId, ServerType};

/// Process-local identity of one logical cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterId(Uuid);

impl ClusterId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How the driver was told to treat the seed list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ClusterConnectionMode {
    /// Discover the deployment type from the first server that answers.
    #[default]
    Automatic,
    /// Talk to exactly one server, whatever it turns out to be.
    Direct,
    ReplicaSet,
    Sharded,
    Standalone,
}

impl ClusterConnectionMode {
    /// The cluster type a fresh description starts with.
    pub fn initial_cluster_type(self) -> ClusterType {
        match self {
            ClusterConnectionMode::Automatic | ClusterConnectionMode::Direct => {
                ClusterType::Unknown
            }
            ClusterConnectionMode::ReplicaSet => ClusterType::ReplicaSet,
            ClusterConnectionMode::Sharded => ClusterType::Sharded,
            ClusterConnectionMode::Standalone => ClusterType::Standalone,
        }
    }
}

impl fmt::Display for ClusterConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ClusterType {
    #[default]
    Unknown,
    ReplicaSet,
    Sharded,
    Standalone,
    /// A deployment behind a load balancer. Discovery never produces this type.
    LoadBalanced,
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The largest `(electionId, setVersion)` pair any primary of the replica set reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ElectionInfo {
    election_id: Option<ElectionId>,
    set_version: Option<i32>,
}

impl ElectionInfo {
    pub fn new(election_id: Option<ElectionId>, set_version: Option<i32>) -> Self {
        Self {
            election_id,
            set_version,
        }
    }

    pub fn election_id(&self) -> Option<ElectionId> {
        self.election_id
    }

    pub fn set_version(&self) -> Option<i32> {
        self.set_version
    }

    pub fn is_empty(&self) -> bool {
        self.election_id.is_none() && self.set_version.is_none()
    }

    /// Returns the new maximum when `claim` is at least as recent as `self`, or `None`
    /// when the claim is stale. The election id decides first; a missing value is older
    /// than any present one.
    pub fn compare(&self, claim: ElectionInfo) -> Option<ElectionInfo> {
        if (claim.election_id, claim.set_version) < (self.election_id, self.set_version) {
            None
        } else {
            Some(claim)
        }
    }
}

/**
An immutable snapshot of the whole deployment.

A new description replaces the previous one on every accepted topology transition.
Equality is structural and is what suppresses redundant updates.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterDescription {
    cluster_id: ClusterId,
    connection_mode: ClusterConnectionMode,
    cluster_type: ClusterType,
    servers: BTreeMap<EndPoint, ServerDescription>,
    replica_set_name: Option<String>,
    max_election_info: ElectionInfo,
}

impl ClusterDescription {
    pub fn new(
        cluster_id: ClusterId,
        connection_mode: ClusterConnectionMode,
        cluster_type: ClusterType,
        servers: impl IntoIterator<Item = ServerDescription>,
    ) -> Self {
        Self {
            cluster_id,
            connection_mode,
            cluster_type,
            servers: servers
                .into_iter()
                .map(|s| (s.end_point().clone(), s))
                .collect(),
            replica_set_name: None,
            max_election_info: ElectionInfo::default(),
        }
    }

    /// The description a cluster starts with: one Unknown server per seed.
    pub fn create_initial(
        cluster_id: ClusterId,
        connection_mode: ClusterConnectionMode,
        end_points: &[EndPoint],
    ) -> Self {
        Self::new(
            cluster_id,
            connection_mode,
            connection_mode.initial_cluster_type(),
            end_points
                .iter()
                .map(|e| ServerDescription::new(ServerId::new(cluster_id, e.clone()))),
        )
    }

    pub fn with_server_description(mut self, server: ServerDescription) -> Self {
        self.servers.insert(server.end_point().clone(), server);
        self
    }

    pub fn without_server_description(mut self, end_point: &EndPoint) -> Self {
        self.servers.remove(end_point);
        self
    }

    pub fn with_type(self, cluster_type: ClusterType) -> Self {
        Self {
            cluster_type,
            ..self
        }
    }

    pub fn with_replica_set_name(self, replica_set_name: Option<String>) -> Self {
        Self {
            replica_set_name,
            ..self
        }
    }

    pub fn with_max_election_info(self, max_election_info: ElectionInfo) -> Self {
        Self {
            max_election_info,
            ..self
        }
    }

    pub fn cluster_id(&self) -> ClusterId {
        self.cluster_id
    }

    pub fn connection_mode(&self) -> ClusterConnectionMode {
        self.connection_mode
    }

    pub fn cluster_type(&self) -> ClusterType {
        self.cluster_type
    }

    pub fn replica_set_name(&self) -> Option<&str> {
        self.replica_set_name.as_deref()
    }

    pub fn max_election_info(&self) -> ElectionInfo {
        self.max_election_info
    }

    pub fn servers(&self) -> impl Iterator<Item = &ServerDescription> {
        self.servers.values()
    }

    pub fn end_points(&self) -> impl Iterator<Item = &EndPoint> {
        self.servers.keys()
    }

    pub fn server_descriptions(&self) -> Vec<ServerDescription> {
        self.servers.values().cloned().collect()
    }

    /// The servers that answered their last heartbeat. Only these are offered to selectors.
    pub fn connected_servers(&self) -> Vec<ServerDescription> {
        self.servers
            .values()
            .filter(|s| s.is_connected())
            .cloned()
            .collect()
    }

    pub fn get_server(&self, end_point: &EndPoint) -> Option<&ServerDescription> {
        self.servers.get(end_point)
    }

    pub fn contains(&self, end_point: &EndPoint) -> bool {
        self.servers.contains_key(end_point)
    }

    pub fn primaries(&self) -> impl Iterator<Item = &ServerDescription> {
        self.servers
            .values()
            .filter(|s| s.server_type() == ServerType::ReplicaSetPrimary)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

impl fmt::Display for ClusterDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ ClusterId: \"{}\", ConnectionMode: \"{}\", Type: \"{}\"",
            self.cluster_id, self.connection_mode, self.cluster_type
        )?;
        if let Some(name) = &self.replica_set_name {
            write!(f, ", ReplicaSet: \"{}\"", name)?;
        }
        let servers = self
            .servers
            .values()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        write!(f, ", Servers: [{}] }}", servers.join(", "))
    }
}
