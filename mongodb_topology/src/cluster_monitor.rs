mod transition_action;
mod transition_error;

pub use transition_action::*;
pub use transition_error::*;

use tracing::instrument;

use crate::{
    ClusterConnectionMode, ClusterDescription, ClusterType, ElectionInfo, EndPoint,
    ServerDescription, ServerId, ServerType,
};

/**
The topology state machine.

Given the current [`ClusterDescription`] and a fresh observation of one of its servers,
[`ClusterMonitor::transition`] works out the next description and the membership changes
that go with it. It has no state of its own and never performs any I/O; the cluster actor
applies the returned actions.
*/
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterMonitor;

impl ClusterMonitor {
    #[instrument(level = "trace", skip_all, fields(end_point = %server.end_point()))]
    pub fn transition(
        previous: &ClusterDescription,
        server: ServerDescription,
    ) -> Result<Vec<TransitionAction>, TransitionError> {
        if !previous.contains(server.end_point()) {
            return Err(TransitionError::UnknownServer(server.end_point().clone()));
        }

        let mut transition = Transition::new(previous.clone());
        transition.apply(server)?;
        Ok(transition.into_actions(previous))
    }
}

struct Transition {
    description: ClusterDescription,
    added: Vec<EndPoint>,
    removed: Vec<(EndPoint, String)>,
}

impl Transition {
    fn new(description: ClusterDescription) -> Self {
        Self {
            description,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    fn apply(&mut self, server: ServerDescription) -> Result<(), TransitionError> {
        if self.description.connection_mode() == ClusterConnectionMode::Direct {
            self.apply_direct(server);
            return Ok(());
        }

        // A server we cannot reach says nothing about the rest of the cluster.
        if !server.is_connected() {
            self.update_server(server);
            return Ok(());
        }

        match self.description.cluster_type() {
            ClusterType::Unknown => self.apply_unknown(server),
            ClusterType::ReplicaSet => {
                self.apply_replica_set(server);
                Ok(())
            }
            ClusterType::Sharded => {
                self.update_server(server);
                Ok(())
            }
            ClusterType::Standalone => {
                self.apply_standalone(server);
                Ok(())
            }
            cluster_type @ ClusterType::LoadBalanced => {
                Err(TransitionError::UnexpectedClusterType(cluster_type))
            }
        }
    }

    fn apply_direct(&mut self, server: ServerDescription) {
        if let Some(expected) = self.description.replica_set_name() {
            if server.is_connected() && server.replica_set_name() != Some(expected) {
                let reason = match server.replica_set_name() {
                    Some(name) => {
                        format!("Member of replica set `{}` instead of `{}`", name, expected)
                    }
                    None => format!("Not a member of replica set `{}`", expected),
                };
                tracing::info!("Ignoring {}: {}.", server.end_point(), reason);
                self.reset_server(server.server_id(), &reason);
                return;
            }
        }

        let cluster_type = server.server_type().to_cluster_type();
        if cluster_type != ClusterType::Unknown {
            self.update(|d| d.with_type(cluster_type));
        }
        self.update_server(server);
    }

    fn apply_unknown(&mut self, server: ServerDescription) -> Result<(), TransitionError> {
        let cluster_type = server.server_type().to_cluster_type();
        if cluster_type == ClusterType::Unknown {
            self.update_server(server);
            return Ok(());
        }

        tracing::debug!("Cluster type deduced as {}.", cluster_type);
        self.update(|d| d.with_type(cluster_type));
        self.apply(server)
    }

    fn apply_replica_set(&mut self, server: ServerDescription) {
        let end_point = server.end_point().clone();

        match server.server_type() {
            server_type @ (ServerType::Standalone | ServerType::ShardRouter) => {
                self.remove(&end_point, &format!("A {} is not a replica set member", server_type));
                return;
            }
            ServerType::Unknown | ServerType::ReplicaSetGhost => {
                self.update_server(server);
                return;
            }
            _ => {}
        }

        if let Some(name) = server.replica_set_name() {
            match self.description.replica_set_name() {
                None => {
                    let name = name.to_string();
                    self.update(|d| d.with_replica_set_name(Some(name)));
                }
                Some(expected) if expected != name => {
                    let reason = format!(
                        "Member of replica set `{}` instead of `{}`",
                        name, expected
                    );
                    self.remove(&end_point, &reason);
                    return;
                }
                Some(_) => {}
            }
        }

        if server.server_type() == ServerType::ReplicaSetPrimary {
            self.apply_primary(server);
        } else {
            self.apply_non_primary(server);
        }
    }

    fn apply_primary(&mut self, server: ServerDescription) {
        let claim = ElectionInfo::new(server.election_id(), server.set_version());
        if !claim.is_empty() {
            match self.description.max_election_info().compare(claim) {
                Some(max) => self.update(|d| d.with_max_election_info(max)),
                None => {
                    tracing::info!(
                        "{} claims to be primary with stale election info {:?}.",
                        server.end_point(),
                        claim
                    );
                    self.reset_server(server.server_id(), "ReportedPrimaryIsStale");
                    return;
                }
            }
        }

        let end_point = server.end_point().clone();
        let members = server.hosts().clone();
        let demoted = self
            .description
            .primaries()
            .filter(|p| p.end_point() != &end_point)
            .map(|p| p.server_id().clone())
            .collect::<Vec<_>>();

        self.update_server(server);
        for server_id in demoted {
            self.reset_server(&server_id, "NoLongerPrimary");
        }

        for member in &members {
            self.add(member);
        }

        // The primary's member list is authoritative.
        let unlisted = self
            .description
            .end_points()
            .filter(|e| !members.contains(*e))
            .cloned()
            .collect::<Vec<_>>();
        for unlisted in unlisted {
            self.remove(&unlisted, "Not listed by the primary");
        }
    }

    fn apply_non_primary(&mut self, server: ServerDescription) {
        let end_point = server.end_point().clone();
        let canonical = server.canonical_end_point().cloned();
        let members = server.hosts().clone();

        self.update_server(server);

        if self.description.primaries().next().is_none() {
            for member in &members {
                self.add(member);
            }
        }

        if let Some(canonical) = canonical {
            if canonical != end_point {
                let reason = format!("Server calls itself {}", canonical);
                self.remove(&end_point, &reason);
            }
        }
    }

    fn apply_standalone(&mut self, server: ServerDescription) {
        let end_point = server.end_point().clone();

        match server.server_type() {
            ServerType::Standalone => {
                self.update_server(server);
                let others = self
                    .description
                    .end_points()
                    .filter(|e| *e != &end_point)
                    .cloned()
                    .collect::<Vec<_>>();
                for other in others {
                    self.remove(&other, "A standalone cluster has exactly one server");
                }
            }
            ServerType::Unknown => self.update_server(server),
            server_type => {
                self.remove(&end_point, &format!("A {} is not a standalone", server_type))
            }
        }
    }

    fn update(&mut self, f: impl FnOnce(ClusterDescription) -> ClusterDescription) {
        self.description = f(self.description.clone());
    }

    fn update_server(&mut self, server: ServerDescription) {
        self.update(|d| d.with_server_description(server));
    }

    /// Replaces a server with a fresh Unknown description unless it already is one.
    fn reset_server(&mut self, server_id: &ServerId, reason: &str) {
        let current = self.description.get_server(server_id.end_point());
        let already_reset = current
            .map(|s| s.server_type() == ServerType::Unknown && s.reason_changed() == reason)
            .unwrap_or(false);
        if !already_reset {
            self.update_server(ServerDescription::new(server_id.clone()).with_reason(reason));
        }
    }

    fn add(&mut self, end_point: &EndPoint) {
        if self.description.contains(end_point) {
            return;
        }
        tracing::debug!("Discovered {}.", end_point);
        let server_id = ServerId::new(self.description.cluster_id(), end_point.clone());
        self.update_server(ServerDescription::new(server_id));
        self.added.push(end_point.clone());
    }

    fn remove(&mut self, end_point: &EndPoint, reason: &str) {
        if !self.description.contains(end_point) {
            return;
        }
        tracing::debug!("Removing {}: {}.", end_point, reason);
        self.update(|d| d.without_server_description(end_point));
        self.added.retain(|e| e != end_point);
        self.removed.push((end_point.clone(), reason.to_string()));
    }

    fn into_actions(self, previous: &ClusterDescription) -> Vec<TransitionAction> {
        let mut actions = Vec::new();
        if &self.description != previous {
            actions.push(TransitionAction::UpdateClusterDescription(self.description));
        }
        actions.extend(self.added.into_iter().map(TransitionAction::AddServer));
        actions.extend(
            self.removed
                .into_iter()
                .filter(|(e, _)| previous.contains(e))
                .map(|(end_point, reason)| TransitionAction::RemoveServer { end_point, reason }),
        );
        actions
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{ClusterId, ElectionId};

    fn ep(address: &str) -> EndPoint {
        address.parse().unwrap()
    }

    fn initial(mode: ClusterConnectionMode, seeds: &[&str]) -> ClusterDescription {
        let seeds = seeds.iter().map(|s| ep(s)).collect::<Vec<_>>();
        ClusterDescription::create_initial(ClusterId::new(), mode, &seeds)
    }

    fn observed(
        cluster: &ClusterDescription,
        address: &str,
        server_type: ServerType,
    ) -> ServerDescription {
        ServerDescription::new(ServerId::new(cluster.cluster_id(), ep(address)))
            .with_type(server_type)
            .with_average_round_trip_time(Duration::from_millis(5))
    }

    fn member(
        cluster: &ClusterDescription,
        address: &str,
        server_type: ServerType,
        hosts: &[&str],
    ) -> ServerDescription {
        observed(cluster, address, server_type).with_replica_set("rs0", hosts.iter().map(|h| ep(h)))
    }

    /// Applies a transition and returns the published description plus the membership changes.
    fn run(
        previous: &ClusterDescription,
        server: ServerDescription,
    ) -> (ClusterDescription, Vec<String>, Vec<String>) {
        let actions = ClusterMonitor::transition(previous, server).unwrap();
        let mut description = previous.clone();
        let mut added = Vec::new();
        let mut removed = Vec::new();
        for action in actions {
            match action {
                TransitionAction::UpdateClusterDescription(d) => description = d,
                TransitionAction::AddServer(e) => added.push(e.to_string()),
                TransitionAction::RemoveServer { end_point, .. } => {
                    removed.push(end_point.to_string())
                }
            }
        }
        (description, added, removed)
    }

    #[test]
    fn standalone_report_makes_a_standalone_cluster() {
        // Arrange
        let cluster = initial(ClusterConnectionMode::Automatic, &["a:27017"]);
        let server = observed(&cluster, "a:27017", ServerType::Standalone);

        // Act
        let (description, added, removed) = run(&cluster, server);

        // Assert
        assert_eq!(description.cluster_type(), ClusterType::Standalone);
        assert_eq!(description.len(), 1);
        assert!(description.get_server(&ep("a:27017")).unwrap().is_connected());
        assert!(added.is_empty());
        assert!(removed.is_empty());
    }

    #[test]
    fn primary_report_makes_a_replica_set_cluster() {
        let cluster = initial(ClusterConnectionMode::Automatic, &["a:27017"]);
        let server = member(&cluster, "a:27017", ServerType::ReplicaSetPrimary, &["a:27017"]);

        let (description, _, _) = run(&cluster, server);

        assert_eq!(description.cluster_type(), ClusterType::ReplicaSet);
        assert_eq!(description.replica_set_name(), Some("rs0"));
    }

    #[test]
    fn ghost_and_router_deduce_their_cluster_types() {
        let cluster = initial(ClusterConnectionMode::Automatic, &["a:27017"]);

        let (ghost, _, _) = run(&cluster, observed(&cluster, "a:27017", ServerType::ReplicaSetGhost));
        let (router, _, _) = run(&cluster, observed(&cluster, "a:27017", ServerType::ShardRouter));

        assert_eq!(ghost.cluster_type(), ClusterType::ReplicaSet);
        assert_eq!(router.cluster_type(), ClusterType::Sharded);
    }

    #[test]
    fn feeding_the_same_report_twice_is_a_no_op() {
        let cluster = initial(ClusterConnectionMode::Automatic, &["a:27017"]);
        let server = member(
            &cluster,
            "a:27017",
            ServerType::ReplicaSetPrimary,
            &["a:27017", "b:27017"],
        );

        let (first, added, _) = run(&cluster, server.clone());
        let second = ClusterMonitor::transition(&first, server).unwrap();

        assert_eq!(added, vec!["b:27017"]);
        assert!(second.is_empty());
    }

    #[test]
    fn disconnected_report_only_replaces_its_own_server() {
        let cluster = initial(ClusterConnectionMode::Automatic, &["a:27017", "b:27017"]);
        let server = ServerDescription::new(ServerId::new(cluster.cluster_id(), ep("a:27017")))
            .with_reason("Heartbeat");

        let (description, added, removed) = run(&cluster, server);

        assert_eq!(description.cluster_type(), ClusterType::Unknown);
        assert_eq!(description.len(), 2);
        assert!(added.is_empty() && removed.is_empty());
    }

    #[test]
    fn report_from_untracked_server_is_rejected() {
        let cluster = initial(ClusterConnectionMode::Automatic, &["a:27017"]);
        let stranger = observed(&cluster, "z:27017", ServerType::Standalone);

        let result = ClusterMonitor::transition(&cluster, stranger);

        assert!(matches!(result, Err(TransitionError::UnknownServer(e)) if e == ep("z:27017")));
    }

    #[test]
    fn load_balanced_cluster_is_rejected() {
        let cluster = initial(ClusterConnectionMode::Automatic, &["a:27017"])
            .with_type(ClusterType::LoadBalanced);
        let server = observed(&cluster, "a:27017", ServerType::ShardRouter);

        let result = ClusterMonitor::transition(&cluster, server);

        assert!(matches!(
            result,
            Err(TransitionError::UnexpectedClusterType(ClusterType::LoadBalanced))
        ));
    }

    #[test]
    fn secondary_discovers_members_while_no_primary_is_known() {
        let cluster = initial(ClusterConnectionMode::Automatic, &["a:27017"]);
        let server = member(
            &cluster,
            "a:27017",
            ServerType::ReplicaSetSecondary,
            &["a:27017", "b:27017", "c:27017"],
        );

        let (description, added, removed) = run(&cluster, server);

        assert_eq!(added, vec!["b:27017", "c:27017"]);
        assert!(removed.is_empty());
        assert_eq!(description.len(), 3);
        assert_eq!(
            description.get_server(&ep("b:27017")).unwrap().server_type(),
            ServerType::Unknown
        );
    }

    #[test]
    fn secondary_does_not_add_members_once_a_primary_is_known() {
        let cluster = initial(ClusterConnectionMode::Automatic, &["a:27017", "b:27017"]);
        let primary = member(&cluster, "a:27017", ServerType::ReplicaSetPrimary, &["a:27017", "b:27017"]);
        let (with_primary, _, _) = run(&cluster, primary);
        let secondary = member(
            &with_primary,
            "b:27017",
            ServerType::ReplicaSetSecondary,
            &["a:27017", "b:27017", "x:27017"],
        );

        let (_, added, _) = run(&with_primary, secondary);

        assert!(added.is_empty());
    }

    #[test]
    fn primary_member_list_is_authoritative() {
        let cluster = initial(
            ClusterConnectionMode::Automatic,
            &["a:27017", "b:27017", "old:27017"],
        );
        let primary = member(
            &cluster,
            "a:27017",
            ServerType::ReplicaSetPrimary,
            &["a:27017", "b:27017", "c:27017"],
        );

        let actions = ClusterMonitor::transition(&cluster, primary).unwrap();

        assert!(matches!(actions[0], TransitionAction::UpdateClusterDescription(_)));
        assert_eq!(actions[1], TransitionAction::AddServer(ep("c:27017")));
        assert!(matches!(
            &actions[2],
            TransitionAction::RemoveServer { end_point, .. } if end_point == &ep("old:27017")
        ));
        assert_eq!(actions.len(), 3);
    }

    #[test]
    fn non_members_and_other_sets_are_removed() {
        let cluster = initial(ClusterConnectionMode::ReplicaSet, &["a:27017", "b:27017", "c:27017"])
            .with_replica_set_name(Some("rs0".to_string()));
        let standalone = observed(&cluster, "a:27017", ServerType::Standalone);
        let stranger = observed(&cluster, "b:27017", ServerType::ReplicaSetSecondary)
            .with_replica_set("other", vec![ep("b:27017")]);

        let (_, _, removed_standalone) = run(&cluster, standalone);
        let (_, _, removed_stranger) = run(&cluster, stranger);

        assert_eq!(removed_standalone, vec!["a:27017"]);
        assert_eq!(removed_stranger, vec!["b:27017"]);
    }

    #[test]
    fn secondary_with_different_canonical_name_is_removed() {
        let cluster = initial(ClusterConnectionMode::Automatic, &["alias:27017", "a:27017"]);
        let server = member(&cluster, "alias:27017", ServerType::ReplicaSetSecondary, &["a:27017"])
            .with_canonical_end_point(Some(ep("a:27017")));

        let (description, _, removed) = run(&cluster, server);

        assert_eq!(removed, vec!["alias:27017"]);
        assert!(description.contains(&ep("a:27017")));
    }

    #[test]
    fn new_primary_demotes_the_old_one() {
        let cluster = initial(ClusterConnectionMode::Automatic, &["a:27017", "b:27017"]);
        let hosts = ["a:27017", "b:27017"];
        let old_id: ElectionId = "000000000000000000000001".parse().unwrap();
        let new_id: ElectionId = "000000000000000000000002".parse().unwrap();
        let (first, _, _) = run(
            &cluster,
            member(&cluster, "a:27017", ServerType::ReplicaSetPrimary, &hosts)
                .with_election(Some(old_id), Some(1)),
        );

        let (second, _, removed) = run(
            &first,
            member(&first, "b:27017", ServerType::ReplicaSetPrimary, &hosts)
                .with_election(Some(new_id), Some(1)),
        );

        let old = second.get_server(&ep("a:27017")).unwrap();
        assert_eq!(old.server_type(), ServerType::Unknown);
        assert_eq!(old.reason_changed(), "NoLongerPrimary");
        assert_eq!(second.primaries().count(), 1);
        assert_eq!(second.max_election_info(), ElectionInfo::new(Some(new_id), Some(1)));
        assert!(removed.is_empty());
    }

    #[test]
    fn stale_primary_is_marked_unknown() {
        let cluster = initial(ClusterConnectionMode::Automatic, &["a:27017", "b:27017"]);
        let hosts = ["a:27017", "b:27017"];
        let old_id: ElectionId = "000000000000000000000001".parse().unwrap();
        let new_id: ElectionId = "000000000000000000000002".parse().unwrap();
        let (first, _, _) = run(
            &cluster,
            member(&cluster, "b:27017", ServerType::ReplicaSetPrimary, &hosts)
                .with_election(Some(new_id), Some(1)),
        );
        let stale = member(&first, "a:27017", ServerType::ReplicaSetPrimary, &hosts)
            .with_election(Some(old_id), Some(1));

        let (second, _, _) = run(&first, stale.clone());
        let again = ClusterMonitor::transition(&second, stale).unwrap();

        let reported = second.get_server(&ep("a:27017")).unwrap();
        assert_eq!(reported.server_type(), ServerType::Unknown);
        assert_eq!(reported.reason_changed(), "ReportedPrimaryIsStale");
        assert_eq!(
            second.get_server(&ep("b:27017")).unwrap().server_type(),
            ServerType::ReplicaSetPrimary
        );
        assert!(again.is_empty());
    }

    #[test]
    fn sharded_cluster_records_other_types_without_membership_changes() {
        let cluster = initial(ClusterConnectionMode::Sharded, &["a:27017", "b:27017"]);
        let odd = observed(&cluster, "b:27017", ServerType::ReplicaSetSecondary);

        let (description, added, removed) = run(&cluster, odd);

        assert_eq!(description.cluster_type(), ClusterType::Sharded);
        assert_eq!(
            description.get_server(&ep("b:27017")).unwrap().server_type(),
            ServerType::ReplicaSetSecondary
        );
        assert!(added.is_empty() && removed.is_empty());
    }

    #[test]
    fn first_standalone_removes_other_seeds() {
        let cluster = initial(ClusterConnectionMode::Automatic, &["a:27017", "b:27017"]);
        let server = observed(&cluster, "a:27017", ServerType::Standalone);

        let (description, _, removed) = run(&cluster, server);

        assert_eq!(description.cluster_type(), ClusterType::Standalone);
        assert_eq!(removed, vec!["b:27017"]);
        assert_eq!(description.len(), 1);
    }

    #[test]
    fn direct_mode_follows_the_single_server() {
        let cluster = initial(ClusterConnectionMode::Direct, &["a:27017"]);
        let server = member(&cluster, "a:27017", ServerType::ReplicaSetSecondary, &["a:27017", "b:27017"]);

        let (description, added, _) = run(&cluster, server);

        assert_eq!(description.cluster_type(), ClusterType::ReplicaSet);
        assert!(added.is_empty());
        assert_eq!(description.len(), 1);
    }

    #[test]
    fn direct_mode_ignores_a_member_of_another_replica_set() {
        // Arrange
        let cluster = initial(ClusterConnectionMode::Direct, &["a:27017"])
            .with_replica_set_name(Some("rs1".to_string()));
        let server = member(&cluster, "a:27017", ServerType::ReplicaSetPrimary, &["a:27017"]);

        // Act
        let (description, added, removed) = run(&cluster, server.clone());
        let again = ClusterMonitor::transition(&description, server).unwrap();

        // Assert
        let recorded = description.get_server(&ep("a:27017")).unwrap();
        assert_eq!(recorded.server_type(), ServerType::Unknown);
        assert!(!recorded.is_connected());
        assert!(recorded.reason_changed().contains("rs1"));
        assert_eq!(description.cluster_type(), ClusterType::Unknown);
        assert!(description.primaries().next().is_none());
        assert!(added.is_empty() && removed.is_empty());
        assert!(again.is_empty());
    }

    #[test]
    fn direct_mode_accepts_a_member_of_the_configured_replica_set() {
        let cluster = initial(ClusterConnectionMode::Direct, &["a:27017"])
            .with_replica_set_name(Some("rs0".to_string()));
        let server = member(&cluster, "a:27017", ServerType::ReplicaSetPrimary, &["a:27017"]);

        let (description, _, _) = run(&cluster, server);

        assert_eq!(description.cluster_type(), ClusterType::ReplicaSet);
        assert_eq!(description.primaries().count(), 1);
    }

    #[test]
    fn direct_mode_with_a_replica_set_name_ignores_a_standalone() {
        let cluster = initial(ClusterConnectionMode::Direct, &["a:27017"])
            .with_replica_set_name(Some("rs0".to_string()));
        let server = observed(&cluster, "a:27017", ServerType::Standalone);

        let (description, _, _) = run(&cluster, server);

        assert!(description.connected_servers().is_empty());
    }
}
