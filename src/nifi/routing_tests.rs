// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for privileged client selection

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::constants::{
        CLUSTER_COORDINATOR_ROLE, NODE_STATUS_CONNECTED, NODE_STATUS_DISCONNECTED,
        PRIMARY_NODE_ROLE,
    };

    fn node(id: i32, status: &str, roles: &[&str]) -> NodeDto {
        NodeDto {
            node_id: format!("uuid-{id}"),
            address: format!("nifi-{id}.nifi-headless.default.svc"),
            api_port: 8443,
            status: status.to_string(),
            roles: roles.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    fn uris(ids: &[i32]) -> BTreeMap<i32, NodeUri> {
        ids.iter()
            .map(|id| {
                let listener = format!("nifi-{id}.nifi-headless.default.svc:8443");
                (
                    *id,
                    NodeUri {
                        host_listener: listener.clone(),
                        request_host: listener,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_connected_coordinator_is_preferred() {
        let topology = Topology::new(
            vec![
                node(0, NODE_STATUS_CONNECTED, &[PRIMARY_NODE_ROLE]),
                node(1, NODE_STATUS_CONNECTED, &[CLUSTER_COORDINATOR_ROLE]),
                node(2, NODE_STATUS_CONNECTED, &[]),
            ],
            uris(&[0, 1, 2]),
        );
        assert_eq!(topology.coordinator_node_id(), Some(1));
        assert_eq!(topology.privileged(), Target::Node(1));
    }

    #[test]
    fn test_disconnected_coordinator_falls_back_to_first_node_client() {
        let topology = Topology::new(
            vec![
                node(0, NODE_STATUS_CONNECTED, &[]),
                node(1, NODE_STATUS_DISCONNECTED, &[CLUSTER_COORDINATOR_ROLE]),
            ],
            uris(&[0, 1]),
        );
        assert_eq!(topology.coordinator_node_id(), None);
        assert_eq!(topology.privileged(), Target::Node(0));
    }

    #[test]
    fn test_removed_coordinator_falls_back_to_first_node_client() {
        // Coordinator node 1 is no longer part of the snapshot
        let topology = Topology::new(vec![node(2, NODE_STATUS_CONNECTED, &[])], uris(&[2, 3]));
        assert_eq!(topology.privileged(), Target::Node(2));
    }

    #[test]
    fn test_no_node_clients_falls_back_to_all_nodes() {
        let topology = Topology::new(
            vec![node(0, NODE_STATUS_CONNECTED, &[CLUSTER_COORDINATOR_ROLE])],
            BTreeMap::new(),
        );
        assert_eq!(topology.privileged(), Target::AllNodes);
    }

    #[test]
    fn test_privileged_except_avoids_excluded_coordinator() {
        let topology = Topology::new(
            vec![
                node(0, NODE_STATUS_CONNECTED, &[CLUSTER_COORDINATOR_ROLE]),
                node(1, NODE_STATUS_DISCONNECTED, &[]),
                node(2, NODE_STATUS_CONNECTED, &[]),
            ],
            uris(&[0, 1, 2]),
        );
        assert_eq!(topology.privileged_except(0), Target::Node(2));
    }

    #[test]
    fn test_privileged_except_keeps_coordinator_for_other_node() {
        let topology = Topology::new(
            vec![
                node(0, NODE_STATUS_CONNECTED, &[]),
                node(1, NODE_STATUS_CONNECTED, &[CLUSTER_COORDINATOR_ROLE]),
            ],
            uris(&[0, 1]),
        );
        assert_eq!(topology.privileged_except(0), Target::Node(1));
    }

    #[test]
    fn test_privileged_except_falls_back_when_no_other_node_connected() {
        let topology = Topology::new(
            vec![
                node(0, NODE_STATUS_CONNECTED, &[CLUSTER_COORDINATOR_ROLE]),
                node(1, NODE_STATUS_DISCONNECTED, &[]),
            ],
            uris(&[0, 1]),
        );
        // Only the excluded node is connected: fall back to the normal rules
        assert_eq!(topology.privileged_except(0), Target::Node(0));
    }

    #[test]
    fn test_node_lookup_by_listener() {
        let topology = Topology::new(vec![node(4, NODE_STATUS_CONNECTED, &[])], uris(&[4]));
        let described = topology.node_by_id(4).map(|n| n.node_id.clone());
        assert_eq!(described.as_deref(), Some("uuid-4"));
        assert!(topology.node_by_id(5).is_none());
    }

    #[test]
    fn test_node_without_client_is_resolved_from_template() {
        // Node 1 is being removed: described by NiFi but no longer given a client
        let topology = Topology::new(
            vec![
                node(0, NODE_STATUS_CONNECTED, &[CLUSTER_COORDINATOR_ROLE]),
                node(1, NODE_STATUS_CONNECTED, &[]),
            ],
            uris(&[0]),
        )
        .with_node_uri_template(Some("nifi-%d.nifi-headless.default.svc:8443".to_string()));

        let described = topology.node_by_id(1).map(|n| n.node_id.clone());
        assert_eq!(described.as_deref(), Some("uuid-1"));
        assert_eq!(topology.node_id_of(&node(1, NODE_STATUS_CONNECTED, &[])), None);
        assert!(topology.node_by_id(7).is_none());
    }

    #[test]
    fn test_node_without_client_or_template_is_unknown() {
        let topology = Topology::new(vec![node(1, NODE_STATUS_CONNECTED, &[])], uris(&[0]));
        assert!(topology.node_by_id(1).is_none());
    }
}
