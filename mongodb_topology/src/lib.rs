/*!
mongodb_topology is the server discovery, monitoring and selection core of a MongoDB
client driver.

It keeps track of every server in a deployment (standalone, replica set or sharded
cluster) through one background heartbeat task per server, folds the individual
observations into a single [`ClusterDescription`], and hands out a server matching a
[`ServerSelector`] to callers that need one.

Like the rest of the driver this library requires tokio and uses the actor pattern: a
single [`ClusterActor`] owns the monitors and the authoritative description, and cheap
[`Cluster`] handles talk to it. Readers never lock; they receive immutable snapshots.

Wire protocol, connection pooling and authentication live outside this crate and are
consumed through the [`ConnectionFactory`] and [`Connection`] traits.

# Example
```rust,no_run
# use mongodb_topology::{BoxFuture, Connection, ConnectionError, ConnectionFactory, EndPoint};
# #[derive(Clone, Debug)]
# struct MyConnectionFactory;
# impl ConnectionFactory for MyConnectionFactory {
#     fn connect<'a>(
#         &'a self,
#         _: &'a EndPoint,
#         _: std::time::Duration,
#     ) -> BoxFuture<'a, Result<Box<dyn Connection>, ConnectionError>> {
#         unimplemented!()
#     }
# }
# tokio_test::block_on(async {
use mongodb_topology::{Cluster, ReadPreference, ReadPreferenceServerSelector};

let cluster = Cluster::builder()
    .set_end_points(&["localhost:27017", "localhost:27018"])
    .set_connection_factory(MyConnectionFactory)
    .build()?;

let server = cluster
    .select_server(ReadPreferenceServerSelector::new(ReadPreference::secondary_preferred()))
    .await?;
println!("Selected {}", server.end_point());
# Ok::<(), mongodb_topology::ClusterError>(())
# }).unwrap();
```

When the last [`Cluster`] handle is dropped, the actor stops every monitor on its own.
*/

mod cluster;
mod cluster_description;
mod cluster_monitor;
mod connection;
mod end_point;
mod heartbeat_result;
mod read_preference;
mod server_description;
mod server_monitor;

pub mod events;
pub mod server_selector;

pub use cluster::*;
pub use cluster_description::*;
pub use cluster_monitor::*;
pub use connection::*;
pub use end_point::*;
pub use heartbeat_result::*;
pub use read_preference::*;
pub use server_description::*;
pub use server_monitor::*;
pub use server_selector::{
    CompositeServerSelector, DelegateServerSelector, EndPointServerSelector,
    LatencyLimitingServerSelector, RandomServerSelector, ReadPreferenceServerSelector,
    ServerSelector, ServerSelectorError, WritableServerSelector,
};

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}
