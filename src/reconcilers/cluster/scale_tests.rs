// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `scale.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::constants::{NODE_STATUS_CONNECTED, NODE_STATUS_CONNECTING};
    use crate::crd::ClusterState;
    use crate::events::RecordingEventPublisher;
    use crate::nifi::fake::FakeNifi;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Pods that disappear as soon as they are deleted, unless `lingering`.
    #[derive(Default)]
    struct FakePods {
        deleted: Mutex<Vec<i32>>,
        lingering: bool,
    }

    #[async_trait]
    impl NodePods for FakePods {
        async fn delete(&self, _cluster: &NifiCluster, node_id: i32) -> SyncResult<()> {
            self.deleted.lock().unwrap().push(node_id);
            Ok(())
        }

        async fn exists(&self, _cluster: &NifiCluster, _node_id: i32) -> SyncResult<bool> {
            Ok(self.lingering)
        }
    }

    fn cluster(nodes: &[i32]) -> NifiCluster {
        let nodes: Vec<_> = nodes.iter().map(|id| json!({ "id": id })).collect();
        let mut cluster =
            NifiCluster::new("nifi", serde_json::from_value(json!({ "nodes": nodes })).unwrap());
        cluster.metadata.namespace = Some("nifi".to_string());
        cluster
    }

    fn running_status(nodes: &[i32]) -> NifiClusterStatus {
        let mut status = NifiClusterStatus::default();
        init_node_states(&cluster(nodes), &mut status);
        status.state = ClusterState::ClusterRunning;
        status
    }

    fn graceful(status: &NifiClusterStatus, id: i32) -> &GracefulActionState {
        &status.nodes_state[&id.to_string()].graceful_action_state
    }

    #[test]
    fn test_bootstrap_nodes_need_no_upscale() {
        let mut status = NifiClusterStatus::default();

        assert!(init_node_states(&cluster(&[0, 1]), &mut status));

        assert_eq!(status.nodes_state.len(), 2);
        assert!(status.nodes_state.values().all(|n| n.init_cluster_node));
        assert!(!is_scaling(&status));
        assert!(!init_node_states(&cluster(&[0, 1]), &mut status));
    }

    #[test]
    fn test_new_and_removed_nodes_are_marked() {
        let mut status = running_status(&[0, 1]);

        assert!(init_node_states(&cluster(&[0, 2]), &mut status));

        assert_eq!(
            graceful(&status, 2).action_state,
            GracefulState::GracefulUpscaleRequired
        );
        assert!(!status.nodes_state["2"].init_cluster_node);
        assert_eq!(
            graceful(&status, 1).action_state,
            GracefulState::GracefulDownscaleRequired
        );
        assert!(is_scaling(&status));
    }

    #[tokio::test]
    async fn test_upscale_waits_for_connection() {
        let nifi = FakeNifi::new();
        let pods = FakePods::default();
        let events = RecordingEventPublisher::new();
        let declared = cluster(&[0]);
        let mut status = running_status(&[]);
        init_node_states(&declared, &mut status);

        // Not joined yet.
        let err = scale_nodes(&nifi, &pods, &events, &declared, &mut status)
            .await
            .unwrap_err();
        assert_eq!(err.pending_condition(), Some(AsyncCondition::NodeScaling));
        assert_eq!(
            graceful(&status, 0).action_state,
            GracefulState::GracefulUpscaleRunning
        );
        assert_eq!(graceful(&status, 0).action_step, Some(ActionStep::Connecting));

        // Joined, still connecting.
        {
            let mut state = nifi.state();
            state.node_ids.insert(0, "uuid-0".to_string());
            state.cluster.cluster.nodes.push(NodeDto {
                node_id: "uuid-0".to_string(),
                status: NODE_STATUS_CONNECTING.to_string(),
                ..Default::default()
            });
        }
        assert!(scale_nodes(&nifi, &pods, &events, &declared, &mut status)
            .await
            .is_err());

        nifi.state().cluster.cluster.nodes[0].status = NODE_STATUS_CONNECTED.to_string();
        scale_nodes(&nifi, &pods, &events, &declared, &mut status)
            .await
            .unwrap();

        assert_eq!(
            graceful(&status, 0).action_state,
            GracefulState::GracefulUpscaleSucceeded
        );
        assert_eq!(graceful(&status, 0).action_step, Some(ActionStep::Connected));
        assert_eq!(events.reasons().len(), 2);
    }

    #[tokio::test]
    async fn test_downscale_runs_every_step_and_drops_the_node() {
        let nifi = FakeNifi::with_nodes(&[0, 1]);
        let pods = FakePods::default();
        let events = RecordingEventPublisher::new();
        let declared = cluster(&[0]);
        let mut status = running_status(&[0, 1]);
        init_node_states(&declared, &mut status);

        scale_nodes(&nifi, &pods, &events, &declared, &mut status)
            .await
            .unwrap();

        assert!(!status.nodes_state.contains_key("1"));
        assert!(status.nodes_state.contains_key("0"));
        assert_eq!(*pods.deleted.lock().unwrap(), vec![1]);
        assert_eq!(nifi.count("disconnect_cluster_node"), 1);
        assert_eq!(nifi.count("offload_cluster_node"), 1);
        assert_eq!(nifi.count("remove_cluster_node"), 1);
        assert_eq!(nifi.state().cluster.cluster.nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_downscale_waits_for_the_pod() {
        let nifi = FakeNifi::with_nodes(&[0, 1]);
        let pods = FakePods {
            lingering: true,
            ..Default::default()
        };
        let events = RecordingEventPublisher::new();
        let declared = cluster(&[0]);
        let mut status = running_status(&[0, 1]);
        init_node_states(&declared, &mut status);

        let err = scale_nodes(&nifi, &pods, &events, &declared, &mut status)
            .await
            .unwrap_err();

        assert!(err.is_pending());
        assert_eq!(
            graceful(&status, 1).action_step,
            Some(ActionStep::PodRemoving)
        );
        assert!(graceful(&status, 1).task_started.is_some());
        assert_eq!(nifi.count("remove_cluster_node"), 0);
        // The node no longer receives traffic.
        assert!(!status.nodes_state["1"].is_traffic_eligible());
    }

    #[tokio::test]
    async fn test_failed_step_records_the_error() {
        let nifi = FakeNifi::with_nodes(&[0, 1]);
        nifi.fail_next(
            "disconnect_cluster_node",
            crate::nifi::NifiError::NoNodeClientsAvailable,
        );
        let pods = FakePods::default();
        let events = RecordingEventPublisher::new();
        let declared = cluster(&[0]);
        let mut status = running_status(&[0, 1]);
        init_node_states(&declared, &mut status);

        let result = scale_nodes(&nifi, &pods, &events, &declared, &mut status).await;

        assert!(result.is_err());
        assert!(graceful(&status, 1).error_message.is_some());
    }
}
