use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    str::FromStr,
    time::{Duration, SystemTime},
};

use serde::Deserialize;

use crate::{
    error_chain_fmt, ClusterId, ClusterType, ConnectionError, EndPoint, HeartbeatResult,
};

pub const DEFAULT_MAX_DOCUMENT_SIZE: u32 = 4 * 1024 * 1024;
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 16_000_000;
pub const DEFAULT_MAX_BATCH_COUNT: u32 = 1000;
/// Extra room a command document may take on the wire on top of the user document.
const WIRE_DOCUMENT_OVERHEAD: u32 = 16 * 1024;

/// The role a server reported in its last heartbeat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ServerType {
    #[default]
    Unknown,
    Standalone,
    ReplicaSetPrimary,
    ReplicaSetSecondary,
    ReplicaSetArbiter,
    ReplicaSetOther,
    ReplicaSetGhost,
    ShardRouter,
}

impl ServerType {
    pub fn is_replica_set_member(self) -> bool {
        matches!(
            self,
            ServerType::ReplicaSetPrimary
                | ServerType::ReplicaSetSecondary
                | ServerType::ReplicaSetArbiter
                | ServerType::ReplicaSetOther
                | ServerType::ReplicaSetGhost
        )
    }

    /// Only these types accept writes.
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            ServerType::ReplicaSetPrimary | ServerType::ShardRouter | ServerType::Standalone
        )
    }

    /// The cluster type a first observation of this server type implies.
    pub fn to_cluster_type(self) -> ClusterType {
        match self {
            ServerType::Unknown => ClusterType::Unknown,
            ServerType::Standalone => ClusterType::Standalone,
            ServerType::ShardRouter => ClusterType::Sharded,
            ServerType::ReplicaSetPrimary
            | ServerType::ReplicaSetSecondary
            | ServerType::ReplicaSetArbiter
            | ServerType::ReplicaSetOther
            | ServerType::ReplicaSetGhost => ClusterType::ReplicaSet,
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ServerState {
    Connected,
    #[default]
    Disconnected,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Labels attached to a replica set member, used to target reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, name: &str, value: &str) -> Self {
        self.0.insert(name.to_string(), value.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether every tag of `required` is present here with the same value. An empty
    /// `required` set is contained in everything.
    pub fn contains_all(&self, required: &TagSet) -> bool {
        required
            .0
            .iter()
            .all(|(name, value)| self.0.get(name) == Some(value))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<HashMap<String, String>> for TagSet {
    fn from(tags: HashMap<String, String>) -> Self {
        tags.into_iter().collect()
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags = self
            .0
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>();
        write!(f, "{{{}}}", tags.join(", "))
    }
}

/// The 12 byte object id a replica set primary reports for the election that made it
/// primary. Later elections compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "ObjectIdRepr")]
pub struct ElectionId([u8; 12]);

impl ElectionId {
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }
}

impl FromStr for ElectionId {
    type Err = ElectionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 24 || !s.is_ascii() {
            return Err(ElectionIdError(s.to_string()));
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| ElectionIdError(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for ElectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Hello replies carry object ids either as plain hex or as extended JSON.
#[derive(Deserialize)]
#[serde(untagged)]
enum ObjectIdRepr {
    Hex(String),
    Extended {
        #[serde(rename = "$oid")]
        oid: String,
    },
}

impl TryFrom<ObjectIdRepr> for ElectionId {
    type Error = ElectionIdError;

    fn try_from(value: ObjectIdRepr) -> Result<Self, Self::Error> {
        match value {
            ObjectIdRepr::Hex(hex) | ObjectIdRepr::Extended { oid: hex } => hex.parse(),
        }
    }
}

#[derive(thiserror::Error)]
#[error("`{0}` is not a 24 character hex object id")]
pub struct ElectionIdError(String);
impl std::fmt::Debug for ElectionIdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Identifies one server within one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerId {
    cluster_id: ClusterId,
    end_point: EndPoint,
}

impl ServerId {
    pub fn new(cluster_id: ClusterId, end_point: EndPoint) -> Self {
        Self {
            cluster_id,
            end_point,
        }
    }

    pub fn cluster_id(&self) -> ClusterId {
        self.cluster_id
    }

    pub fn end_point(&self) -> &EndPoint {
        &self.end_point
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cluster_id, self.end_point)
    }
}

/**
An immutable snapshot of one server as last observed.

A new description is produced for every heartbeat; nothing ever changes one in place.
The `with_*` methods consume the description and hand back a modified copy.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct ServerDescription {
    server_id: ServerId,
    server_type: ServerType,
    state: ServerState,
    average_round_trip_time: Duration,
    tags: TagSet,
    max_document_size: u32,
    max_message_size: u32,
    max_batch_count: u32,
    max_wire_document_size: u32,
    max_wire_version: i32,
    replica_set_name: Option<String>,
    election_id: Option<ElectionId>,
    set_version: Option<i32>,
    /// Every member the server listed: hosts, passives and arbiters.
    hosts: BTreeSet<EndPoint>,
    canonical_end_point: Option<EndPoint>,
    heartbeat_error: Option<String>,
    last_update_timestamp: SystemTime,
    reason_changed: String,
}

impl ServerDescription {
    /// The Unknown, Disconnected description a server starts with.
    pub fn new(server_id: ServerId) -> Self {
        Self {
            server_id,
            server_type: ServerType::Unknown,
            state: ServerState::Disconnected,
            average_round_trip_time: Duration::ZERO,
            tags: TagSet::default(),
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            max_message_size: max_message_size_for(DEFAULT_MAX_DOCUMENT_SIZE),
            max_batch_count: DEFAULT_MAX_BATCH_COUNT,
            max_wire_document_size: DEFAULT_MAX_DOCUMENT_SIZE + WIRE_DOCUMENT_OVERHEAD,
            max_wire_version: 0,
            replica_set_name: None,
            election_id: None,
            set_version: None,
            hosts: BTreeSet::new(),
            canonical_end_point: None,
            heartbeat_error: None,
            last_update_timestamp: SystemTime::now(),
            reason_changed: "InitialDescription".to_string(),
        }
    }

    /// Builds the Connected description of a successful heartbeat.
    pub fn with_heartbeat_result(
        self,
        result: &HeartbeatResult,
        average_round_trip_time: Duration,
    ) -> Self {
        let max_document_size = result
            .max_document_size
            .unwrap_or(DEFAULT_MAX_DOCUMENT_SIZE);

        Self {
            server_type: result.server_type(),
            state: ServerState::Connected,
            average_round_trip_time,
            tags: result.tags.clone(),
            max_document_size,
            max_message_size: result
                .max_message_size
                .unwrap_or_else(|| max_message_size_for(max_document_size)),
            max_batch_count: result.max_batch_count.unwrap_or(DEFAULT_MAX_BATCH_COUNT),
            max_wire_document_size: max_document_size.saturating_add(WIRE_DOCUMENT_OVERHEAD),
            max_wire_version: result.max_wire_version,
            replica_set_name: result.set_name.clone(),
            election_id: result.election_id,
            set_version: result.set_version,
            hosts: result.members(),
            canonical_end_point: result.canonical_end_point(),
            heartbeat_error: None,
            last_update_timestamp: SystemTime::now(),
            reason_changed: "Heartbeat".to_string(),
            ..self
        }
    }

    /// Builds the Unknown, Disconnected description of a failed heartbeat.
    pub fn with_heartbeat_error(self, error: &ConnectionError) -> Self {
        Self {
            heartbeat_error: Some(error.to_string()),
            last_update_timestamp: SystemTime::now(),
            reason_changed: "Heartbeat".to_string(),
            ..ServerDescription::new(self.server_id)
        }
    }

    pub fn with_type(self, server_type: ServerType) -> Self {
        Self {
            server_type,
            state: match server_type {
                ServerType::Unknown => ServerState::Disconnected,
                _ => ServerState::Connected,
            },
            ..self
        }
    }

    pub fn with_state(self, state: ServerState) -> Self {
        Self { state, ..self }
    }

    pub fn with_average_round_trip_time(self, average_round_trip_time: Duration) -> Self {
        Self {
            average_round_trip_time,
            ..self
        }
    }

    pub fn with_tags(self, tags: TagSet) -> Self {
        Self { tags, ..self }
    }

    /// Sets the replica set name and the members this server lists.
    pub fn with_replica_set(self, name: &str, hosts: impl IntoIterator<Item = EndPoint>) -> Self {
        Self {
            replica_set_name: Some(name.to_string()),
            hosts: hosts.into_iter().collect(),
            ..self
        }
    }

    pub fn with_election(self, election_id: Option<ElectionId>, set_version: Option<i32>) -> Self {
        Self {
            election_id,
            set_version,
            ..self
        }
    }

    pub fn with_canonical_end_point(self, canonical_end_point: Option<EndPoint>) -> Self {
        Self {
            canonical_end_point,
            ..self
        }
    }

    pub fn with_reason(self, reason_changed: &str) -> Self {
        Self {
            reason_changed: reason_changed.to_string(),
            ..self
        }
    }

    /// Equality for the purpose of deciding whether anything about the server changed,
    /// ignoring the timestamp, the round trip time and the reason.
    pub fn sdam_equals(&self, other: &ServerDescription) -> bool {
        self.server_id == other.server_id
            && self.server_type == other.server_type
            && self.state == other.state
            && self.tags == other.tags
            && self.max_document_size == other.max_document_size
            && self.max_message_size == other.max_message_size
            && self.max_batch_count == other.max_batch_count
            && self.max_wire_version == other.max_wire_version
            && self.replica_set_name == other.replica_set_name
            && self.election_id == other.election_id
            && self.set_version == other.set_version
            && self.hosts == other.hosts
            && self.canonical_end_point == other.canonical_end_point
            && self.heartbeat_error == other.heartbeat_error
    }

    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    pub fn end_point(&self) -> &EndPoint {
        self.server_id.end_point()
    }

    pub fn server_type(&self) -> ServerType {
        self.server_type
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ServerState::Connected
    }

    pub fn average_round_trip_time(&self) -> Duration {
        self.average_round_trip_time
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn max_document_size(&self) -> u32 {
        self.max_document_size
    }

    pub fn max_message_size(&self) -> u32 {
        self.max_message_size
    }

    pub fn max_batch_count(&self) -> u32 {
        self.max_batch_count
    }

    pub fn max_wire_document_size(&self) -> u32 {
        self.max_wire_document_size
    }

    pub fn max_wire_version(&self) -> i32 {
        self.max_wire_version
    }

    pub fn replica_set_name(&self) -> Option<&str> {
        self.replica_set_name.as_deref()
    }

    pub fn election_id(&self) -> Option<ElectionId> {
        self.election_id
    }

    pub fn set_version(&self) -> Option<i32> {
        self.set_version
    }

    pub fn hosts(&self) -> &BTreeSet<EndPoint> {
        &self.hosts
    }

    pub fn canonical_end_point(&self) -> Option<&EndPoint> {
        self.canonical_end_point.as_ref()
    }

    pub fn heartbeat_error(&self) -> Option<&str> {
        self.heartbeat_error.as_deref()
    }

    pub fn last_update_timestamp(&self) -> SystemTime {
        self.last_update_timestamp
    }

    pub fn reason_changed(&self) -> &str {
        &self.reason_changed
    }
}

impl fmt::Display for ServerDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ EndPoint: {}, Type: {}, State: {}, RoundTripTime: {:?}",
            self.end_point(),
            self.server_type,
            self.state,
            self.average_round_trip_time
        )?;
        if !self.tags.is_empty() {
            write!(f, ", Tags: {}", self.tags)?;
        }
        if let Some(error) = &self.heartbeat_error {
            write!(f, ", HeartbeatError: \"{}\"", error)?;
        }
        write!(f, " }}")
    }
}

fn max_message_size_for(max_document_size: u32) -> u32 {
    max_document_size
        .saturating_add(1024)
        .max(DEFAULT_MAX_MESSAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_id(end_point: &str) -> ServerId {
        ServerId::new(ClusterId::new(), end_point.parse().unwrap())
    }

    #[test]
    fn new_description_is_unknown_and_disconnected() {
        let description = ServerDescription::new(server_id("localhost:27017"));

        assert_eq!(description.server_type(), ServerType::Unknown);
        assert_eq!(description.state(), ServerState::Disconnected);
        assert_eq!(description.max_document_size(), 4 * 1024 * 1024);
        assert_eq!(description.max_message_size(), 16_000_000);
        assert_eq!(description.max_batch_count(), 1000);
        assert_eq!(description.max_wire_document_size(), 4 * 1024 * 1024 + 16 * 1024);
    }

    #[test]
    fn with_returns_a_modified_copy() {
        let original = ServerDescription::new(server_id("localhost:27017"));

        let modified = original
            .clone()
            .with_type(ServerType::ReplicaSetSecondary)
            .with_average_round_trip_time(Duration::from_millis(10));

        assert_eq!(original.server_type(), ServerType::Unknown);
        assert_eq!(modified.server_type(), ServerType::ReplicaSetSecondary);
        assert_eq!(modified.state(), ServerState::Connected);
        assert_ne!(original, modified);
    }

    #[test]
    fn sdam_equals_ignores_round_trip_time_and_reason() {
        let description = ServerDescription::new(server_id("localhost:27017"))
            .with_type(ServerType::Standalone);

        let other = description
            .clone()
            .with_average_round_trip_time(Duration::from_millis(42))
            .with_reason("Heartbeat");

        assert!(description.sdam_equals(&other));
        assert_ne!(description, other);
        assert!(!description.sdam_equals(&other.with_type(ServerType::Unknown)));
    }

    #[test]
    fn heartbeat_error_resets_to_unknown() {
        let id = server_id("localhost:27017");
        let description = ServerDescription::new(id.clone())
            .with_type(ServerType::ReplicaSetPrimary)
            .with_tags(TagSet::new().with_tag("dc", "ny"));

        let failed = description.with_heartbeat_error(&ConnectionError::Network {
            end_point: id.end_point().clone(),
            message: "connection refused".to_string(),
        });

        assert_eq!(failed.server_type(), ServerType::Unknown);
        assert_eq!(failed.state(), ServerState::Disconnected);
        assert!(failed.tags().is_empty());
        assert!(failed.heartbeat_error().unwrap().contains("connection refused"));
    }

    #[test]
    fn tag_set_contains_all_matches_subsets() {
        let tags = TagSet::new().with_tag("dc", "ny").with_tag("rack", "1");

        assert!(tags.contains_all(&TagSet::new()));
        assert!(tags.contains_all(&TagSet::new().with_tag("dc", "ny")));
        assert!(!tags.contains_all(&TagSet::new().with_tag("dc", "sf")));
        assert!(!tags.contains_all(&TagSet::new().with_tag("disk", "ssd")));
    }

    #[test]
    fn election_ids_parse_and_order() {
        let older = "000000000000000000000001".parse::<ElectionId>().unwrap();
        let newer = "7fffffff0000000000000002".parse::<ElectionId>().unwrap();

        assert!(older < newer);
        assert_eq!(newer.to_string(), "7fffffff0000000000000002");
        assert!("not-an-object-id".parse::<ElectionId>().is_err());
    }

    #[test]
    fn server_types_map_to_cluster_types() {
        assert_eq!(ServerType::ReplicaSetGhost.to_cluster_type(), ClusterType::ReplicaSet);
        assert_eq!(ServerType::ShardRouter.to_cluster_type(), ClusterType::Sharded);
        assert_eq!(ServerType::Standalone.to_cluster_type(), ClusterType::Standalone);
        assert_eq!(ServerType::Unknown.to_cluster_type(), ClusterType::Unknown);
    }
}
