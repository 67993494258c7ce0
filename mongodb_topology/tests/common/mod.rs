#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, Once},
    time::Duration,
};

use mongodb_topology::{
    BoxFuture, Cluster, ClusterBuilder, ClusterDescription, Connection, ConnectionError,
    ConnectionFactory, EndPoint,
};
use serde_json::{json, Value};
use tracing::subscriber::set_global_default;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

static TRACING: Once = Once::new();

/// Installs the test subscriber once per test binary. Set `TEST_LOG` to see the output.
pub fn init_tracing() {
    TRACING.call_once(|| {
        LogTracer::init().expect("Failed to set logger");
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        if std::env::var("TEST_LOG").is_ok() {
            let formatting_layer =
                BunyanFormattingLayer::new("mongodb_topology_tests".into(), std::io::stdout);
            let subscriber = Registry::default()
                .with(env_filter)
                .with(JsonStorageLayer)
                .with(formatting_layer);
            set_global_default(subscriber).expect("Failed to set subscriber");
        } else {
            let formatting_layer =
                BunyanFormattingLayer::new("mongodb_topology_tests".into(), std::io::sink);
            let subscriber = Registry::default()
                .with(env_filter)
                .with(JsonStorageLayer)
                .with(formatting_layer);
            set_global_default(subscriber).expect("Failed to set subscriber");
        }
    });
}

#[derive(Debug, Clone)]
struct Script {
    reply: Value,
    latency: Duration,
    up: bool,
}

/// An in-memory deployment. Every end point answers `hello` with its scripted reply, which
/// can be changed while a cluster is monitoring it.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFactory {
    scripts: Arc<Mutex<HashMap<EndPoint, Script>>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(self, end_point: &str, reply: Value) -> Self {
        self.set_reply(end_point, reply);
        self
    }

    pub fn with_latency(self, end_point: &str, latency: Duration) -> Self {
        self.update(end_point, |s| s.latency = latency);
        self
    }

    pub fn set_reply(&self, end_point: &str, reply: Value) {
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts.entry(ep(end_point)).or_insert(Script {
            reply: Value::Null,
            latency: Duration::ZERO,
            up: true,
        });
        script.reply = reply;
    }

    pub fn set_up(&self, end_point: &str, up: bool) {
        self.update(end_point, |s| s.up = up);
    }

    fn update(&self, end_point: &str, f: impl FnOnce(&mut Script)) {
        if let Some(script) = self.scripts.lock().unwrap().get_mut(&ep(end_point)) {
            f(script);
        }
    }

    fn script(&self, end_point: &EndPoint) -> Result<Script, ConnectionError> {
        match self.scripts.lock().unwrap().get(end_point) {
            Some(script) if script.up => Ok(script.clone()),
            _ => Err(ConnectionError::Network {
                end_point: end_point.clone(),
                message: "connection refused".to_string(),
            }),
        }
    }
}

impl ConnectionFactory for ScriptedFactory {
    fn connect<'a>(
        &'a self,
        end_point: &'a EndPoint,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<Box<dyn Connection>, ConnectionError>> {
        Box::pin(async move {
            self.script(end_point)?;
            Ok(Box::new(ScriptedConnection {
                end_point: end_point.clone(),
                factory: self.clone(),
            }) as Box<dyn Connection>)
        })
    }
}

#[derive(Debug)]
struct ScriptedConnection {
    end_point: EndPoint,
    factory: ScriptedFactory,
}

impl Connection for ScriptedConnection {
    fn run_command(
        &mut self,
        _command: Value,
        _timeout: Duration,
    ) -> BoxFuture<'_, Result<Value, ConnectionError>> {
        Box::pin(async move {
            let script = self.factory.script(&self.end_point)?;
            if !script.latency.is_zero() {
                tokio::time::sleep(script.latency).await;
            }
            Ok(script.reply)
        })
    }
}

pub fn ep(end_point: &str) -> EndPoint {
    end_point.parse().expect("Invalid end point in test")
}

pub fn standalone_reply() -> Value {
    json!({ "ok": 1, "isWritablePrimary": true, "maxWireVersion": 17 })
}

pub fn mongos_reply() -> Value {
    json!({ "ok": 1, "isWritablePrimary": true, "msg": "isdbgrid", "maxWireVersion": 17 })
}

pub fn primary_reply(me: &str, hosts: &[&str]) -> Value {
    json!({
        "ok": 1,
        "isWritablePrimary": true,
        "setName": "rs0",
        "setVersion": 1,
        "electionId": { "$oid": "7fffffff0000000000000001" },
        "hosts": hosts,
        "me": me,
        "maxWireVersion": 17,
    })
}

pub fn secondary_reply(me: &str, hosts: &[&str], tags: Value) -> Value {
    json!({
        "ok": 1,
        "isWritablePrimary": false,
        "secondary": true,
        "setName": "rs0",
        "setVersion": 1,
        "hosts": hosts,
        "me": me,
        "tags": tags,
        "maxWireVersion": 17,
    })
}

/// Builder preset with intervals short enough for tests.
pub fn fast_cluster(factory: &ScriptedFactory, seeds: &[&str]) -> ClusterBuilder {
    Cluster::builder()
        .set_end_points(seeds)
        .set_heartbeat_interval(Duration::from_millis(100))
        .set_min_heartbeat_interval(Duration::from_millis(10))
        .set_connect_timeout(Duration::from_secs(1))
        .set_server_selection_timeout(Duration::from_secs(5))
        .set_connection_factory(factory.clone())
}

/// Polls the cluster description until `predicate` holds.
pub async fn wait_for(
    cluster: &Cluster,
    predicate: impl Fn(&ClusterDescription) -> bool,
) -> ClusterDescription {
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let description = cluster.description();
            if predicate(&description) {
                return description;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    match result {
        Ok(description) => description,
        Err(_) => panic!("Cluster never reached the expected state: {}", cluster.description()),
    }
}
