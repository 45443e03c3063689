// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Connection parameters for clusters deployed outside the operator.
//!
//! Node addresses come from `spec.nodeUriTemplate` with `%d` replaced by each
//! declared node id; TLS material comes from the secret in `spec.secretRef`.

use kube::Client;
use std::collections::BTreeMap;
use std::time::Duration;

use super::{tls_from_secret, ClientConfig, ConfigError, NodeUri};
use crate::constants::NODE_URI_TEMPLATE_PLACEHOLDER;
use crate::crd::NifiCluster;

/// Resolver for an external cluster.
#[derive(Clone, Debug)]
pub struct ExternalTlsConfig {
    cluster: NifiCluster,
    operation_timeout: Duration,
}

impl ExternalTlsConfig {
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

    fn cluster_name(&self) -> String {
        format!(
            "{}/{}",
            self.cluster.metadata.namespace.as_deref().unwrap_or_default(),
            self.cluster.metadata.name.as_deref().unwrap_or_default()
        )
    }

    /// Configuration without TLS material.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingField`] without a node URI template or cluster URI.
    pub fn base_config(&self) -> Result<ClientConfig, ConfigError> {
        let spec = &self.cluster.spec;
        let template = spec
            .node_uri_template
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                cluster: self.cluster_name(),
                field: "spec.nodeUriTemplate",
            })?;
        let nifi_uri = spec
            .nifi_uri
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                cluster: self.cluster_name(),
                field: "spec.nifiUri",
            })?;

        Ok(ClientConfig {
            nodes_uri: generate_nodes_address(&self.cluster, template),
            node_uri_template: Some(template.to_string()),
            nifi_uri,
            use_ssl: spec.secret_ref.is_some(),
            tls: None,
            operation_timeout: self.operation_timeout,
            root_process_group_id: self.cluster.root_process_group_id().map(ToString::to_string),
        })
    }

    /// Resolve the configuration, reading the TLS secret when one is referenced.
    ///
    /// # Errors
    ///
    /// Missing fields, a missing secret or a secret lacking `ca.crt`/`tls.crt`/`tls.key`.
    pub async fn build_config(&self, client: &Client) -> Result<ClientConfig, ConfigError> {
        let mut config = self.base_config()?;
        if let Some(secret_ref) = &self.cluster.spec.secret_ref {
            let current = self.cluster.metadata.namespace.as_deref().unwrap_or("default");
            let namespace = secret_ref.namespace_or(current);
            config.tls = Some(tls_from_secret(client, namespace, &secret_ref.name).await?);
        }
        Ok(config)
    }
}

/// Addresses of the declared nodes, from the host template.
#[must_use]
pub fn generate_nodes_address(cluster: &NifiCluster, template: &str) -> BTreeMap<i32, NodeUri> {
    cluster
        .spec
        .nodes
        .iter()
        .map(|node| {
            let host = template.replace(NODE_URI_TEMPLATE_PLACEHOLDER, &node.id.to_string());
            (
                node.id,
                NodeUri {
                    host_listener: host.clone(),
                    request_host: host,
                },
            )
        })
        .collect()
}
