// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Connection parameters for operator-managed clusters.
//!
//! Node hosts follow the naming of the node pods behind the headless service:
//! `{cluster}-{id}-node.{headless}.{namespace}.svc.{domain}:{port}`. Only nodes
//! eligible for traffic are addressed (see [`NodeState::is_traffic_eligible`]).
//!
//! [`NodeState::is_traffic_eligible`]: crate::crd::NodeState::is_traffic_eligible

use kube::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

use super::{ClientConfig, ConfigError, NodeUri};
use crate::constants::NODE_URI_TEMPLATE_PLACEHOLDER;
use crate::crd::NifiCluster;
use crate::pki::PkiManager;

/// Resolver for an operator-managed cluster.
#[derive(Clone, Debug)]
pub struct ManagedConfig {
    cluster: NifiCluster,
    operation_timeout: Duration,
}

impl ManagedConfig {
    #[must_use]
    pub fn new(cluster: NifiCluster, operation_timeout: Duration) -> Self {
        Self {
            cluster,
            operation_timeout,
        }
    }

    #[must_use]
    pub fn cluster(&self) -> &NifiCluster {
        &self.cluster
    }

    /// Configuration without TLS material.
    #[must_use]
    pub fn base_config(&self) -> ClientConfig {
        let cluster = &self.cluster;
        ClientConfig {
            nodes_uri: generate_nodes_address(cluster),
            node_uri_template: Some(nodes_uri_template(cluster)),
            nifi_uri: all_nodes_host(cluster),
            use_ssl: cluster.spec.use_ssl(),
            tls: None,
            operation_timeout: self.operation_timeout,
            root_process_group_id: cluster.root_process_group_id().map(ToString::to_string),
        }
    }

    /// Resolve the configuration, fetching the controller certificate when TLS is on.
    ///
    /// # Errors
    ///
    /// Propagates PKI errors, including "not ready yet" while certificates are issued.
    pub async fn build_config(&self, client: &Client) -> Result<ClientConfig, ConfigError> {
        let mut config = self.base_config();
        if config.use_ssl {
            let pki = PkiManager::for_cluster(&self.cluster);
            config.tls = Some(pki.controller_tls_config(client).await?);
        }
        Ok(config)
    }
}

fn namespace(cluster: &NifiCluster) -> &str {
    cluster.metadata.namespace.as_deref().unwrap_or("default")
}

fn name(cluster: &NifiCluster) -> &str {
    cluster.metadata.name.as_deref().unwrap_or_default()
}

/// Host and port of one node.
#[must_use]
pub fn node_host(cluster: &NifiCluster, node_id: i32) -> String {
    format!(
        "{}-{node_id}-node.{}.{}.svc.{}:{}",
        name(cluster),
        cluster.headless_service_name(),
        namespace(cluster),
        cluster.spec.cluster_domain(),
        cluster.spec.api_port()
    )
}

/// Host and port of the service fronting every node.
#[must_use]
pub fn all_nodes_host(cluster: &NifiCluster) -> String {
    format!(
        "{}-all-node.{}.svc.{}:{}",
        name(cluster),
        namespace(cluster),
        cluster.spec.cluster_domain(),
        cluster.spec.api_port()
    )
}

/// Node host template, `%d` standing for the node id.
#[must_use]
pub fn nodes_uri_template(cluster: &NifiCluster) -> String {
    format!(
        "{}-{NODE_URI_TEMPLATE_PLACEHOLDER}-node.{}.{}.svc.{}:{}",
        name(cluster),
        cluster.headless_service_name(),
        namespace(cluster),
        cluster.spec.cluster_domain(),
        cluster.spec.api_port()
    )
}

/// Addresses of the nodes recorded in status that may receive traffic.
#[must_use]
pub fn generate_nodes_address(cluster: &NifiCluster) -> BTreeMap<i32, NodeUri> {
    let Some(status) = cluster.status.as_ref() else {
        return BTreeMap::new();
    };

    let mut addresses = BTreeMap::new();
    for (key, state) in &status.nodes_state {
        let Ok(node_id) = key.parse::<i32>() else {
            warn!(node = %key, "Ignoring node state with a non-numeric id");
            continue;
        };
        if !state.is_traffic_eligible() {
            continue;
        }
        let host = node_host(cluster, node_id);
        addresses.insert(
            node_id,
            NodeUri {
                host_listener: host.clone(),
                request_host: host,
            },
        );
    }
    addresses
}
