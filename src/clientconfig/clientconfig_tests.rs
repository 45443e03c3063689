// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for client configuration resolution

#[cfg(test)]
mod tests {
    use super::super::external::ExternalTlsConfig;
    use super::super::managed::{self, ManagedConfig};
    use super::super::*;
    use crate::crd::{
        ActionStep, GracefulActionState, GracefulState, NifiCluster, NifiClusterSpec,
        NifiClusterStatus, NodeState,
    };
    use crate::nifi::fake::{FakeFactory, FakeNifi};
    use crate::nifi::NifiError;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn cluster(spec: serde_json::Value) -> NifiCluster {
        let spec: NifiClusterSpec = serde_json::from_value(spec).unwrap();
        let mut cluster = NifiCluster::new("nifi", spec);
        cluster.metadata.namespace = Some("data".to_string());
        cluster
    }

    fn with_nodes_state(mut cluster: NifiCluster, states: &[(&str, NodeState)]) -> NifiCluster {
        cluster.status = Some(NifiClusterStatus {
            nodes_state: states
                .iter()
                .map(|(id, state)| ((*id).to_string(), state.clone()))
                .collect(),
            ..Default::default()
        });
        cluster
    }

    fn graceful(state: GracefulState, step: Option<ActionStep>) -> NodeState {
        NodeState {
            graceful_action_state: GracefulActionState {
                action_state: state,
                action_step: step,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_managed_node_host() {
        let c = cluster(json!({ "nodes": [{ "id": 2 }] }));
        assert_eq!(
            managed::node_host(&c, 2),
            "nifi-2-node.nifi-headless.data.svc.cluster.local:8080"
        );
        assert_eq!(
            managed::all_nodes_host(&c),
            "nifi-all-node.data.svc.cluster.local:8080"
        );
        assert_eq!(
            managed::nodes_uri_template(&c),
            "nifi-%d-node.nifi-headless.data.svc.cluster.local:8080"
        );
    }

    #[test]
    fn test_managed_ssl_uses_https_port() {
        let c = cluster(json!({
            "nodes": [{ "id": 0 }],
            "listeners": { "ssl": {} },
            "service": { "headlessName": "nifi-hs" },
            "clusterDomain": "example.internal"
        }));
        assert_eq!(
            managed::node_host(&c, 0),
            "nifi-0-node.nifi-hs.data.svc.example.internal:8443"
        );
        let config = ManagedConfig::new(c, Duration::from_secs(5)).base_config();
        assert!(config.use_ssl);
    }

    #[test]
    fn test_managed_addresses_only_eligible_nodes() {
        let c = with_nodes_state(
            cluster(json!({ "nodes": [{ "id": 0 }, { "id": 1 }, { "id": 2 }, { "id": 3 }] })),
            &[
                ("0", NodeState::default()),
                ("1", graceful(GracefulState::GracefulDownscaleRunning, None)),
                (
                    "2",
                    graceful(
                        GracefulState::GracefulDownscaleSucceeded,
                        Some(ActionStep::Removing),
                    ),
                ),
                ("3", graceful(GracefulState::GracefulUpscaleRequired, None)),
                ("not-a-number", NodeState::default()),
            ],
        );
        let addresses = managed::generate_nodes_address(&c);
        assert_eq!(addresses.keys().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(addresses[&0].host_listener, addresses[&0].request_host);
    }

    #[test]
    fn test_managed_without_status_has_no_nodes() {
        let c = cluster(json!({ "nodes": [{ "id": 0 }] }));
        assert!(managed::generate_nodes_address(&c).is_empty());
    }

    #[test]
    fn test_external_addresses_from_template() {
        let c = cluster(json!({
            "type": "external",
            "nodes": [{ "id": 1 }, { "id": 4 }],
            "nodeUriTemplate": "nifi-%d.nifi.example.com:8443",
            "nifiUri": "https://nifi.example.com:8443"
        }));
        let config = ExternalTlsConfig::new(c, Duration::from_secs(3))
            .base_config()
            .unwrap();
        assert_eq!(config.nodes_uri[&1].request_host, "nifi-1.nifi.example.com:8443");
        assert_eq!(config.nodes_uri[&4].host_listener, "nifi-4.nifi.example.com:8443");
        assert_eq!(config.nifi_uri, "https://nifi.example.com:8443");
        assert_eq!(config.operation_timeout, Duration::from_secs(3));
        assert!(!config.use_ssl);
    }

    #[test]
    fn test_external_requires_template() {
        let c = cluster(json!({ "type": "external", "nifiUri": "https://nifi:8443" }));
        let err = ExternalTlsConfig::new(c, Duration::from_secs(5))
            .base_config()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField {
                field: "spec.nodeUriTemplate",
                ..
            }
        ));
    }

    #[test]
    fn test_external_secret_enables_ssl() {
        let c = cluster(json!({
            "type": "external",
            "nodeUriTemplate": "nifi-%d:8443",
            "nifiUri": "https://nifi:8443",
            "secretRef": { "name": "nifi-client" }
        }));
        let config = ExternalTlsConfig::new(c, Duration::from_secs(5))
            .base_config()
            .unwrap();
        assert!(config.use_ssl);
    }

    #[test]
    fn test_strategy_selection() {
        let internal = cluster(json!({}));
        let external = cluster(json!({ "type": "external" }));
        assert!(!ConfigManager::for_cluster(&internal, Duration::from_secs(5)).is_external());
        assert!(ConfigManager::for_cluster(&external, Duration::from_secs(5)).is_external());
        assert!(ConfigManager::Mock(ClientConfig::default()).is_external());
    }

    #[test]
    fn test_label_safe() {
        assert_eq!(label_safe("https://nifi.example.com:8443/"), "nifi.example.com-8443");
        let long = format!("https://{}", "a".repeat(100));
        assert_eq!(label_safe(&long).len(), 63);
        assert_eq!(label_safe("--x--"), "x");
    }

    #[test]
    fn test_cluster_connect_identity() {
        let internal = ClusterConnect::new(&cluster(json!({})), ClientConfig::default());
        assert!(internal.is_internal());
        assert_eq!(internal.id(), "data/nifi");
        assert_eq!(internal.cluster_label_string(), "nifi.data");

        let external = ClusterConnect::external(ClientConfig {
            nifi_uri: "https://nifi.example.com:8443".into(),
            ..Default::default()
        });
        assert!(external.is_external());
        assert_eq!(external.id(), "https://nifi.example.com:8443");
        assert_eq!(external.cluster_label_string(), "nifi.example.com-8443");
    }

    #[tokio::test]
    async fn test_is_ready_requires_every_node_connected() {
        let nifi = Arc::new(FakeNifi::with_nodes(&[0, 1]));
        let factory = FakeFactory::new(nifi.clone());
        let connect = ClusterConnect::external(ClientConfig::default());
        assert!(connect.is_ready(&factory).await);

        nifi.state().cluster.cluster.nodes[1].status = "DISCONNECTED".to_string();
        assert!(!connect.is_ready(&factory).await);
    }

    #[tokio::test]
    async fn test_is_ready_false_without_nodes_or_when_unreachable() {
        let factory = FakeFactory::new(Arc::new(FakeNifi::new()));
        let connect = ClusterConnect::external(ClientConfig::default());
        assert!(!connect.is_ready(&factory).await);

        let mut unreachable = FakeFactory::new(Arc::new(FakeNifi::with_nodes(&[0])));
        unreachable.unreachable = Some(NifiError::NodesUnreachable {
            uri: "http://nifi".into(),
            reason: "refused".into(),
        });
        assert!(!connect.is_ready(&unreachable).await);
    }
}
