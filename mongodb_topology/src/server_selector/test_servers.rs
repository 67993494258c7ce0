use std::time::Duration;

use crate::{
    ClusterConnectionMode, ClusterDescription, ClusterId, ServerDescription, ServerId,
    ServerType, TagSet,
};

pub(crate) fn server(end_point: &str, server_type: ServerType, rtt_ms: u64) -> ServerDescription {
    ServerDescription::new(ServerId::new(ClusterId::new(), end_point.parse().unwrap()))
        .with_type(server_type)
        .with_average_round_trip_time(Duration::from_millis(rtt_ms))
}

pub(crate) fn tagged(
    end_point: &str,
    server_type: ServerType,
    rtt_ms: u64,
    tags: &[(&str, &str)],
) -> ServerDescription {
    server(end_point, server_type, rtt_ms).with_tags(tags.iter().copied().collect::<TagSet>())
}

pub(crate) fn cluster(
    cluster_type: crate::ClusterType,
    servers: &[ServerDescription],
) -> ClusterDescription {
    ClusterDescription::new(
        ClusterId::new(),
        ClusterConnectionMode::Automatic,
        cluster_type,
        servers.iter().cloned(),
    )
}

pub(crate) fn end_points(servers: &[ServerDescription]) -> Vec<String> {
    servers.iter().map(|s| s.end_point().to_string()).collect()
}
