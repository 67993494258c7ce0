use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;

use crate::{ConnectionError, ElectionId, EndPoint, ServerType, TagSet};

/// The reply to a `hello` (or legacy `isMaster`) command, as far as topology is concerned.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeartbeatResult {
    pub ok: f64,
    #[serde(alias = "ismaster", alias = "isMaster")]
    pub is_writable_primary: bool,
    pub secondary: bool,
    pub arbiter_only: bool,
    pub hidden: bool,
    #[serde(rename = "isreplicaset")]
    pub is_replica_set: bool,
    pub msg: Option<String>,
    pub set_name: Option<String>,
    pub set_version: Option<i32>,
    pub election_id: Option<ElectionId>,
    pub hosts: Vec<String>,
    pub passives: Vec<String>,
    pub arbiters: Vec<String>,
    pub me: Option<String>,
    pub tags: TagSet,
    pub max_wire_version: i32,
    #[serde(rename = "maxBsonObjectSize")]
    pub max_document_size: Option<u32>,
    #[serde(rename = "maxMessageSizeBytes")]
    pub max_message_size: Option<u32>,
    #[serde(rename = "maxWriteBatchSize")]
    pub max_batch_count: Option<u32>,
    pub errmsg: Option<String>,
}

impl HeartbeatResult {
    /// Parses a raw reply. A reply with `ok` below 1 is a failed command.
    pub fn from_reply(end_point: &EndPoint, reply: Value) -> Result<Self, ConnectionError> {
        let result: HeartbeatResult =
            serde_json::from_value(reply).map_err(|source| ConnectionError::InvalidReply {
                end_point: end_point.clone(),
                source,
            })?;

        if !result.is_ok() {
            return Err(ConnectionError::CommandFailed {
                end_point: end_point.clone(),
                message: result
                    .errmsg
                    .clone()
                    .unwrap_or_else(|| "hello returned ok: 0".to_string()),
            });
        }

        Ok(result)
    }

    pub fn is_ok(&self) -> bool {
        self.ok >= 1.0
    }

    pub fn server_type(&self) -> ServerType {
        if self.is_replica_set {
            return ServerType::ReplicaSetGhost;
        }

        if self.set_name.is_some() {
            return if self.is_writable_primary {
                ServerType::ReplicaSetPrimary
            } else if self.hidden {
                ServerType::ReplicaSetOther
            } else if self.secondary {
                ServerType::ReplicaSetSecondary
            } else if self.arbiter_only {
                ServerType::ReplicaSetArbiter
            } else {
                ServerType::ReplicaSetOther
            };
        }

        if self.msg.as_deref() == Some("isdbgrid") {
            return ServerType::ShardRouter;
        }

        ServerType::Standalone
    }

    /// Every member the server knows about: hosts, passives and arbiters.
    pub fn members(&self) -> BTreeSet<EndPoint> {
        self.hosts
            .iter()
            .chain(&self.passives)
            .chain(&self.arbiters)
            .filter_map(|host| match host.parse::<EndPoint>() {
                Ok(end_point) => Some(end_point),
                Err(e) => {
                    tracing::warn!("Ignoring member `{}` listed in hello reply: {}", host, e);
                    None
                }
            })
            .collect()
    }

    /// The address the server believes it has, from the `me` field.
    pub fn canonical_end_point(&self) -> Option<EndPoint> {
        self.me.as_deref().and_then(|me| me.parse().ok())
    }
}
