use std::time::Duration;

use mongodb_topology::{
    events::ClusterEvent, BoxFuture, Cluster, Connection, ConnectionError, ConnectionFactory,
    EndPoint, ReadPreference, ReadPreferenceServerSelector, TagSet, WritableServerSelector,
};
use serde_json::{json, Value};
use tracing::subscriber::set_global_default;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

const MEMBERS: [&str; 3] = ["localhost:27017", "localhost:27018", "localhost:27019"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();

    // Only the first member is given; the rest are discovered from its reply.
    let cluster = Cluster::builder()
        .set_end_points(&MEMBERS[..1])
        .set_connection_factory(DemoReplicaSet)
        .set_heartbeat_interval(Duration::from_secs(1))
        .add_event_subscriber(|event: &ClusterEvent| match event {
            ClusterEvent::ServerAdded { end_point } => println!("monitoring {}", end_point),
            ClusterEvent::ServerRemoved { end_point, reason } => {
                println!("removed {} ({})", end_point, reason)
            }
            _ => {}
        })
        .build()?;

    let primary = cluster.select_server(WritableServerSelector).await?;
    println!("writes go to {}", primary.end_point());

    let in_sf = ReadPreference::secondary()
        .with_tag_sets(vec![TagSet::new().with_tag("dc", "sf"), TagSet::new()])?;
    for read_preference in [
        ReadPreference::primary_preferred(),
        ReadPreference::secondary_preferred(),
        in_sf,
        ReadPreference::nearest(),
    ] {
        let server = cluster
            .select_server(ReadPreferenceServerSelector::new(read_preference.clone()))
            .await?;
        println!(
            "{} -> {} ({:?}, {:?})",
            read_preference,
            server.end_point(),
            server.server_type(),
            server.average_round_trip_time()
        );
    }

    println!("{}", cluster.description());
    cluster.dispose().await;
    Ok(())
}

/// Answers `hello` as a three member replica set whose members sit at different distances.
#[derive(Debug, Clone)]
struct DemoReplicaSet;

impl ConnectionFactory for DemoReplicaSet {
    fn connect<'a>(
        &'a self,
        end_point: &'a EndPoint,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<Box<dyn Connection>, ConnectionError>> {
        Box::pin(async move {
            Ok(Box::new(DemoConnection {
                end_point: end_point.clone(),
            }) as Box<dyn Connection>)
        })
    }
}

#[derive(Debug)]
struct DemoConnection {
    end_point: EndPoint,
}

impl Connection for DemoConnection {
    fn run_command(
        &mut self,
        _command: Value,
        _timeout: Duration,
    ) -> BoxFuture<'_, Result<Value, ConnectionError>> {
        Box::pin(async move {
            let me = self.end_point.to_string();
            let (primary, dc, latency) = match self.end_point.port() {
                27017 => (true, "ny", 2),
                27018 => (false, "ny", 5),
                _ => (false, "sf", 40),
            };
            tokio::time::sleep(Duration::from_millis(latency)).await;
            Ok(json!({
                "ok": 1.0,
                "isWritablePrimary": primary,
                "secondary": !primary,
                "setName": "demo",
                "setVersion": 1,
                "hosts": MEMBERS,
                "me": me,
                "tags": { "dc": dc },
                "maxWireVersion": 17,
            }))
        })
    }
}

fn setup_tracing() {
    // Redirect all `log`'s events to the subscriber
    LogTracer::init().expect("Failed to set logger");
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let formatting_layer = BunyanFormattingLayer::new("mongodb-topology-demo".into(), std::io::stdout);
    let subscriber = Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer);
    set_global_default(subscriber).expect("Failed to set subscriber");
}
