// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Client configuration resolver.
//!
//! Turns a [`NifiCluster`] into the connection parameters a
//! [`crate::nifi::NifiClient`] is built from: node addresses, TLS material and the
//! operation timeout. The strategy is picked from `spec.type`:
//!
//! - `internal` → [`managed`]: addresses derived from the operator's naming scheme,
//!   TLS from the cluster PKI
//! - `external` → [`external`]: addresses from `nodeUriTemplate`, TLS from `secretRef`
//!
//! A third [`ConfigManager::Mock`] variant hands out a fixed configuration for tests.

pub mod external;
pub mod managed;

use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::crd::{ClusterType, NifiCluster};
use crate::nifi::ClientFactory;
use crate::pki::{PkiError, TlsMaterial};

/// Address of one node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeUri {
    /// `address:apiPort` as NiFi reports the node in the cluster description
    pub host_listener: String,
    /// `host:port` requests are sent to
    pub request_host: String,
}

/// Resolved connection parameters for one cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Per-node addresses, keyed by operator node id
    pub nodes_uri: BTreeMap<i32, NodeUri>,
    /// Node host template with `%d` standing for the node id
    pub node_uri_template: Option<String>,
    /// Address of the whole cluster; empty when unknown
    pub nifi_uri: String,
    pub use_ssl: bool,
    pub tls: Option<TlsMaterial>,
    pub operation_timeout: Duration,
    pub root_process_group_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nodes_uri: BTreeMap::new(),
            node_uri_template: None,
            nifi_uri: String::new(),
            use_ssl: false,
            tls: None,
            operation_timeout: Duration::from_secs(crate::constants::DEFAULT_OPERATION_TIMEOUT_SECS),
            root_process_group_id: None,
        }
    }
}

/// Errors resolving a client configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cluster {cluster} is missing {field}")]
    MissingField { cluster: String, field: &'static str },

    #[error("secret {secret} is invalid: {reason}")]
    InvalidSecret { secret: String, reason: String },

    #[error(transparent)]
    Pki(#[from] PkiError),

    #[error(transparent)]
    Kube(#[from] kube::Error),
}

/// Connection strategy for a cluster.
#[derive(Clone, Debug)]
pub enum ConfigManager {
    /// Operator-managed cluster
    Managed(managed::ManagedConfig),
    /// External cluster reached with TLS material from a secret
    ExternalTls(external::ExternalTlsConfig),
    /// Fixed configuration, used by tests
    Mock(ClientConfig),
}

impl ConfigManager {
    /// Select the strategy from the cluster type.
    #[must_use]
    pub fn for_cluster(cluster: &NifiCluster, operation_timeout: Duration) -> Self {
        match cluster.spec.r#type {
            ClusterType::Internal => {
                Self::Managed(managed::ManagedConfig::new(cluster.clone(), operation_timeout))
            }
            ClusterType::External => Self::ExternalTls(external::ExternalTlsConfig::new(
                cluster.clone(),
                operation_timeout,
            )),
        }
    }

    /// True unless the cluster is operator-managed.
    #[must_use]
    pub fn is_external(&self) -> bool {
        !matches!(self, Self::Managed(_))
    }

    /// Resolve node addresses, TLS material and timeout.
    ///
    /// # Errors
    ///
    /// Fails when a required field or secret is missing, or the PKI is not ready.
    pub async fn build_config(&self, client: &Client) -> Result<ClientConfig, ConfigError> {
        match self {
            Self::Managed(managed) => managed.build_config(client).await,
            Self::ExternalTls(external) => external.build_config(client).await,
            Self::Mock(config) => Ok(config.clone()),
        }
    }

    /// Resolve the connection view of the cluster.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigManager::build_config`].
    pub async fn build_connect(&self, client: &Client) -> Result<ClusterConnect, ConfigError> {
        let config = self.build_config(client).await?;
        Ok(match self {
            Self::Managed(managed) => ClusterConnect::new(managed.cluster(), config),
            Self::ExternalTls(external) => ClusterConnect::new(external.cluster(), config),
            Self::Mock(_) => ClusterConnect::external(config),
        })
    }
}

/// Lightweight view of a cluster used before building a full client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterConnect {
    name: String,
    namespace: String,
    external: bool,
    config: ClientConfig,
}

impl ClusterConnect {
    #[must_use]
    pub fn new(cluster: &NifiCluster, config: ClientConfig) -> Self {
        Self {
            name: cluster.metadata.name.clone().unwrap_or_default(),
            namespace: cluster.metadata.namespace.clone().unwrap_or_default(),
            external: cluster.spec.is_external(),
            config,
        }
    }

    /// View of a cluster only known by its configuration.
    #[must_use]
    pub fn external(config: ClientConfig) -> Self {
        Self {
            name: String::new(),
            namespace: String::new(),
            external: true,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn is_external(&self) -> bool {
        self.external
    }

    #[must_use]
    pub fn is_internal(&self) -> bool {
        !self.external
    }

    /// Stable identity of the cluster.
    #[must_use]
    pub fn id(&self) -> String {
        if self.external {
            self.config.nifi_uri.clone()
        } else {
            format!("{}/{}", self.namespace, self.name)
        }
    }

    /// Value of the cluster label put on dependents.
    ///
    /// Internal: `{name}.{namespace}`. External: the cluster URI made label-safe.
    #[must_use]
    pub fn cluster_label_string(&self) -> String {
        if self.external {
            label_safe(&self.config.nifi_uri)
        } else {
            format!("{}.{}", self.name, self.namespace)
        }
    }

    /// True when the cluster can be described and every node reports `CONNECTED`.
    pub async fn is_ready(&self, factory: &dyn ClientFactory) -> bool {
        match factory.describe(&self.config).await {
            Ok(cluster) => {
                let nodes = &cluster.cluster.nodes;
                !nodes.is_empty() && nodes.iter().all(|n| n.is_connected())
            }
            Err(e) => {
                debug!(cluster = %self.id(), error = %e, "Cluster is not ready");
                false
            }
        }
    }
}

/// Make `value` a valid Kubernetes label value: at most 63 characters from
/// `[A-Za-z0-9-_.]`, starting and ending with an alphanumeric.
#[must_use]
pub fn label_safe(value: &str) -> String {
    let value = value
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let mapped: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let truncated: String = mapped.chars().take(63).collect();
    truncated
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}

/// Read TLS material from a secret.
pub(crate) async fn tls_from_secret(
    client: &Client,
    namespace: &str,
    name: &str,
) -> Result<TlsMaterial, ConfigError> {
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = api.get(name).await?;
    TlsMaterial::from_secret(&secret).map_err(|reason| ConfigError::InvalidSecret {
        secret: format!("{namespace}/{name}"),
        reason,
    })
}

#[cfg(test)]
mod clientconfig_tests;
