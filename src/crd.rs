// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for Apache NiFi management.
//!
//! This module defines all Kubernetes Custom Resource Definitions used by nifikop
//! to drive NiFi clusters and the entities deployed on them.
//!
//! # Resource Types
//!
//! ## Infrastructure
//!
//! - [`NifiCluster`] - A NiFi cluster, operator-managed or external
//!
//! ## Flow deployment
//!
//! - [`NifiRegistryClient`] - A NiFi Registry client registered on a cluster
//! - [`NifiParameterContext`] - A named set of parameters injectable into flows
//! - [`NifiDataflow`] - A versioned flow deployed as a process group
//!
//! ## Access control
//!
//! - [`NifiUser`] - A NiFi user, optionally with a client certificate
//! - [`NifiUserGroup`] - A NiFi user group and its access policies
//!
//! # Example: Declaring a Dataflow
//!
//! ```rust,no_run
//! use nifikop::crd::{DataflowUpdateStrategy, NifiDataflowSpec, ResourceReference};
//!
//! let spec = NifiDataflowSpec {
//!     parent_process_group_id: None,
//!     bucket_id: "01ced6dc-0378-4893-9403-f6c70d080d4f".to_string(),
//!     flow_id: "9b2fb465-fb45-49e7-94fe-45b16b642ac9".to_string(),
//!     flow_version: Some(2),
//!     run_once: false,
//!     cluster_ref: ResourceReference::new("nifi"),
//!     registry_client_ref: Some(ResourceReference::new("registry")),
//!     parameter_context_ref: None,
//!     update_strategy: DataflowUpdateStrategy::Drop,
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT};

// ============================================================================
// References
// ============================================================================

/// Reference to another namespaced resource.
///
/// An absent namespace resolves to the namespace of the referencing resource.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReference {
    /// Name of the referenced resource
    pub name: String,

    /// Namespace of the referenced resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ResourceReference {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    #[must_use]
    pub fn namespaced(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// Namespace the reference points into, defaulting to `current`.
    #[must_use]
    pub fn namespace_or<'a>(&'a self, current: &'a str) -> &'a str {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => current,
        }
    }

    /// Copy of this reference with the namespace filled in.
    #[must_use]
    pub fn resolved(&self, current: &str) -> Self {
        Self::namespaced(self.name.clone(), self.namespace_or(current))
    }
}

impl std::fmt::Display for ResourceReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => write!(f, "{ns}/{}", self.name),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// Reference to a [`NifiCluster`].
pub type ClusterReference = ResourceReference;
/// Reference to a [`NifiRegistryClient`].
pub type RegistryClientReference = ResourceReference;
/// Reference to a [`NifiParameterContext`].
pub type ParameterContextReference = ResourceReference;
/// Reference to a [`NifiUser`].
pub type UserReference = ResourceReference;
/// Reference to a Kubernetes `Secret`.
pub type SecretReference = ResourceReference;

// ============================================================================
// Conditions and shared status
// ============================================================================

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. Always `Ready` for nifikop resources.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Status shared by resources that mirror a single remote entity.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntityStatus {
    /// Remote entity id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Remote revision version last observed
    #[serde(default)]
    pub version: i64,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

// ============================================================================
// Access policies
// ============================================================================

/// Kind of access policy.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccessPolicyType {
    /// System level authorization
    Global,
    /// Authorization on one component
    Component,
}

/// Action granted by an access policy.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccessPolicyAction {
    Read,
    Write,
}

impl AccessPolicyAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// Resource targeted by an access policy.
///
/// See the "Access Policies" section of the NiFi administration guide.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum AccessPolicyResource {
    #[serde(rename = "/system")]
    System,
    #[serde(rename = "/flow")]
    Flow,
    #[serde(rename = "/controller")]
    Controller,
    #[serde(rename = "/parameter-context")]
    ParameterContext,
    #[serde(rename = "/provenance")]
    Provenance,
    #[serde(rename = "/restricted-components")]
    RestrictedComponents,
    #[serde(rename = "/policies")]
    Policies,
    #[serde(rename = "/tenants")]
    Tenants,
    #[serde(rename = "/site-to-site")]
    SiteToSite,
    #[serde(rename = "/proxy")]
    Proxy,
    #[serde(rename = "/counters")]
    Counters,
    /// The component itself
    #[serde(rename = "/")]
    Components,
    #[serde(rename = "/operation")]
    Operation,
    #[serde(rename = "/provenance-data")]
    ProvenanceData,
    #[serde(rename = "/data")]
    Data,
    #[serde(rename = "/data-transfer")]
    DataTransfer,
}

impl AccessPolicyResource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "/system",
            Self::Flow => "/flow",
            Self::Controller => "/controller",
            Self::ParameterContext => "/parameter-context",
            Self::Provenance => "/provenance",
            Self::RestrictedComponents => "/restricted-components",
            Self::Policies => "/policies",
            Self::Tenants => "/tenants",
            Self::SiteToSite => "/site-to-site",
            Self::Proxy => "/proxy",
            Self::Counters => "/counters",
            Self::Components => "/",
            Self::Operation => "/operation",
            Self::ProvenanceData => "/provenance-data",
            Self::Data => "/data",
            Self::DataTransfer => "/data-transfer",
        }
    }
}

/// Component type whose policies default to the root process group.
pub const PROCESS_GROUPS_COMPONENT_TYPE: &str = "process-groups";

/// Access policy granted to a user or a user group.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicy {
    /// `global` or `component`
    pub r#type: AccessPolicyType,

    /// `read` or `write`
    pub action: AccessPolicyAction,

    /// Resource targeted by the policy
    pub resource: AccessPolicyResource,

    /// Kind of component, used when `type` is `component`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,

    /// Id of the component, used when `type` is `component`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
}

impl AccessPolicy {
    /// Remote resource path of this policy.
    ///
    /// Component policies are `{resource}/{componentType}/{componentId}`, where the
    /// `/` resource is dropped and a process-group policy without an id targets the
    /// root process group.
    #[must_use]
    pub fn resource_path(&self, root_process_group_id: Option<&str>) -> String {
        if self.r#type == AccessPolicyType::Global {
            return self.resource.as_str().to_string();
        }
        let component_type = self.component_type.as_deref().unwrap_or_default();
        let mut component_id = self.component_id.clone().unwrap_or_default();
        if component_type == PROCESS_GROUPS_COMPONENT_TYPE && component_id.is_empty() {
            component_id = root_process_group_id.unwrap_or_default().to_string();
        }
        let resource = match self.resource {
            AccessPolicyResource::Components => "",
            other => other.as_str(),
        };
        format!("{resource}/{component_type}/{component_id}")
    }
}

// ============================================================================
// NifiCluster
// ============================================================================

/// How the operator reaches the cluster.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClusterType {
    /// Cluster whose nodes are managed by this operator
    #[default]
    Internal,
    /// Cluster deployed elsewhere, reached through a node URI template
    External,
}

/// PKI backend issuing node and user certificates.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub enum PkiBackend {
    #[default]
    #[serde(rename = "cert-manager")]
    CertManager,
    #[serde(rename = "self-managed")]
    SelfManaged,
}

/// Declared node of a cluster.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    /// Unique node id, used in hostnames and pod names
    #[schemars(range(min = 0))]
    pub id: i32,
}

/// cert-manager issuer to sign certificates with.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuerReference {
    pub name: String,
    /// `Issuer` or `ClusterIssuer`
    #[serde(default = "default_issuer_kind")]
    pub kind: String,
}

fn default_issuer_kind() -> String {
    "Issuer".to_string()
}

/// TLS configuration of the cluster listeners.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SslConfig {
    #[serde(default)]
    pub pki_backend: PkiBackend,

    /// Existing cert-manager issuer. When absent a cluster CA issuer is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_ref: Option<IssuerReference>,
}

fn default_https_port() -> i32 {
    DEFAULT_HTTPS_PORT
}

fn default_http_port() -> i32 {
    DEFAULT_HTTP_PORT
}

/// Listener ports and TLS.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListenersConfig {
    #[serde(default = "default_https_port")]
    #[schemars(range(min = 1, max = 65535))]
    pub https_port: i32,

    #[serde(default = "default_http_port")]
    #[schemars(range(min = 1, max = 65535))]
    pub http_port: i32,

    /// Enables TLS on the API listener
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<SslConfig>,
}

impl Default for ListenersConfig {
    fn default() -> Self {
        Self {
            https_port: DEFAULT_HTTPS_PORT,
            http_port: DEFAULT_HTTP_PORT,
            ssl: None,
        }
    }
}

/// Service naming overrides.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    /// Name of the headless service fronting the nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headless_name: Option<String>,
}

/// `NifiCluster` describes a NiFi cluster the operator talks to.
///
/// # Example
///
/// ```yaml
/// apiVersion: nifi.firestoned.io/v1alpha1
/// kind: NifiCluster
/// metadata:
///   name: nifi
///   namespace: nifi
/// spec:
///   type: internal
///   nodes:
///     - id: 0
///     - id: 1
///   listeners:
///     httpsPort: 8443
///     ssl:
///       pkiBackend: cert-manager
///   metricsPort: 9092
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "nifi.firestoned.io",
    version = "v1alpha1",
    kind = "NifiCluster",
    namespaced,
    doc = "NifiCluster describes an Apache NiFi cluster, either managed by this operator or reached externally through a node URI template."
)]
#[kube(status = "NifiClusterStatus")]
#[serde(rename_all = "camelCase")]
pub struct NifiClusterSpec {
    /// `internal` (operator-managed) or `external`
    #[serde(default)]
    pub r#type: ClusterType,

    /// Declared nodes
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,

    /// External node host template, `%d` is replaced by the node id
    /// (e.g. `nifi-%d.nifi-headless.nifi.svc.cluster.local:8443`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_uri_template: Option<String>,

    /// Address addressing the whole cluster (external clusters)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nifi_uri: Option<String>,

    /// Root process group id, when already known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_process_group_id: Option<String>,

    /// Secret holding `ca.crt`, `tls.crt` and `tls.key` for external clusters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretReference>,

    #[serde(default)]
    pub listeners: ListenersConfig,

    /// Port of the managed Prometheus reporting task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1, max = 65535))]
    pub metrics_port: Option<i32>,

    #[serde(default)]
    pub service: ServiceConfig,

    /// Kubernetes cluster domain used in node hostnames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_domain: Option<String>,
}

impl NifiClusterSpec {
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.r#type == ClusterType::External
    }

    #[must_use]
    pub fn use_ssl(&self) -> bool {
        self.listeners.ssl.is_some()
    }

    /// Port of the API listener in use.
    #[must_use]
    pub fn api_port(&self) -> i32 {
        if self.use_ssl() {
            self.listeners.https_port
        } else {
            self.listeners.http_port
        }
    }

    #[must_use]
    pub fn cluster_domain(&self) -> &str {
        self.cluster_domain.as_deref().unwrap_or("cluster.local")
    }
}

impl NifiCluster {
    /// Name of the headless service, `{name}-headless` unless overridden.
    #[must_use]
    pub fn headless_service_name(&self) -> String {
        match self.spec.service.headless_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}-headless", self.metadata.name.as_deref().unwrap_or_default()),
        }
    }

    /// Root process group id, preferring the declared one.
    #[must_use]
    pub fn root_process_group_id(&self) -> Option<&str> {
        self.spec
            .root_process_group_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| {
                self.status
                    .as_ref()
                    .and_then(|s| s.root_process_group_id.as_deref())
            })
    }

    /// Recorded lifecycle state of a node.
    #[must_use]
    pub fn node_state(&self, node_id: i32) -> Option<&NodeState> {
        self.status
            .as_ref()
            .and_then(|s| s.nodes_state.get(&node_id.to_string()))
    }
}

/// Graceful-action state: phase crossed with scale direction.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub enum GracefulState {
    GracefulUpscaleRequired,
    GracefulUpscaleRunning,
    #[default]
    GracefulUpscaleSucceeded,
    GracefulDownscaleRequired,
    GracefulDownscaleRunning,
    GracefulDownscaleSucceeded,
}

impl GracefulState {
    #[must_use]
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            Self::GracefulUpscaleRequired | Self::GracefulDownscaleRequired
        )
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            Self::GracefulUpscaleRunning | Self::GracefulDownscaleRunning
        )
    }

    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        matches!(
            self,
            Self::GracefulUpscaleSucceeded | Self::GracefulDownscaleSucceeded
        )
    }

    #[must_use]
    pub fn is_upscale(&self) -> bool {
        matches!(
            self,
            Self::GracefulUpscaleRequired
                | Self::GracefulUpscaleRunning
                | Self::GracefulUpscaleSucceeded
        )
    }

    #[must_use]
    pub fn is_downscale(&self) -> bool {
        !self.is_upscale()
    }

    /// Running state of the same direction.
    #[must_use]
    pub fn running(&self) -> Self {
        if self.is_upscale() {
            Self::GracefulUpscaleRunning
        } else {
            Self::GracefulDownscaleRunning
        }
    }

    /// Succeeded state of the same direction.
    #[must_use]
    pub fn complete(&self) -> Self {
        if self.is_upscale() {
            Self::GracefulUpscaleSucceeded
        } else {
            Self::GracefulDownscaleSucceeded
        }
    }
}

/// Step of a graceful scale operation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStep {
    Disconnecting,
    Disconnected,
    Offloading,
    Offloaded,
    PodRemoving,
    PodRemoved,
    Removing,
    Removed,
    Connecting,
    Connected,
}

impl ActionStep {
    #[must_use]
    pub fn is_removal(&self) -> bool {
        matches!(self, Self::Removing | Self::Removed)
    }
}

/// Whether the node configuration matches the declared one.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub enum ConfigurationState {
    #[default]
    ConfigInSync,
    ConfigOutOfSync,
}

/// Graceful-action bookkeeping of one node.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GracefulActionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_step: Option<ActionStep>,

    /// RFC3339 time the current step started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_started: Option<String>,

    #[serde(default)]
    pub action_state: GracefulState,
}

/// Lifecycle state of one node.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
    #[serde(default)]
    pub graceful_action_state: GracefulActionState,

    #[serde(default)]
    pub configuration_state: ConfigurationState,

    /// Node was part of the initial cluster bootstrap
    #[serde(default)]
    pub init_cluster_node: bool,
}

impl NodeState {
    /// A node receives client traffic only outside a scale operation and before removal.
    #[must_use]
    pub fn is_traffic_eligible(&self) -> bool {
        let graceful = &self.graceful_action_state;
        if graceful.action_state.is_running() || graceful.action_state.is_required() {
            return false;
        }
        !graceful.action_step.is_some_and(|step| step.is_removal())
    }
}

/// Overall cluster state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub enum ClusterState {
    #[default]
    ClusterInitializing,
    ClusterInitialized,
    ClusterReconciling,
    ClusterRollingUpgrading,
    ClusterRunning,
}

impl ClusterState {
    #[must_use]
    pub fn is_initializing(&self) -> bool {
        *self == Self::ClusterInitializing
    }
}

/// Identity of the managed Prometheus reporting task.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportingTaskStatus {
    pub id: String,
    #[serde(default)]
    pub version: i64,
}

/// `NifiCluster` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NifiClusterStatus {
    /// Node id (as a string) to node lifecycle state
    #[serde(default)]
    pub nodes_state: BTreeMap<String, NodeState>,

    #[serde(default)]
    pub state: ClusterState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_process_group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus_reporting_task: Option<ReportingTaskStatus>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

// ============================================================================
// NifiRegistryClient
// ============================================================================

/// `NifiRegistryClient` registers a NiFi Registry on a cluster.
///
/// # Example
///
/// ```yaml
/// apiVersion: nifi.firestoned.io/v1alpha1
/// kind: NifiRegistryClient
/// metadata:
///   name: registry
/// spec:
///   clusterRef:
///     name: nifi
///   uri: http://nifi-registry:18080
///   description: Shared flow registry
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "nifi.firestoned.io",
    version = "v1alpha1",
    kind = "NifiRegistryClient",
    namespaced,
    doc = "NifiRegistryClient registers an Apache NiFi Registry as a flow source on the referenced cluster."
)]
#[kube(status = "RemoteEntityStatus")]
#[serde(rename_all = "camelCase")]
pub struct NifiRegistryClientSpec {
    /// Registry URL
    pub uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub cluster_ref: ClusterReference,
}

// ============================================================================
// NifiParameterContext
// ============================================================================

/// A declared parameter.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub sensitive: bool,
}

/// Last observed parameter-context update request.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParameterContextUpdateRequest {
    pub id: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub percent_completed: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// `NifiParameterContext` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NifiParameterContextStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub version: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_update_request: Option<ParameterContextUpdateRequest>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// `NifiParameterContext` is a named set of parameters bound to dataflows.
///
/// Every key of every referenced secret becomes a sensitive parameter.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "nifi.firestoned.io",
    version = "v1alpha1",
    kind = "NifiParameterContext",
    namespaced,
    doc = "NifiParameterContext declares a NiFi parameter context whose parameters can be injected into dataflows."
)]
#[kube(status = "NifiParameterContextStatus")]
#[serde(rename_all = "camelCase")]
pub struct NifiParameterContextSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub parameters: Vec<Parameter>,

    /// Secrets whose keys become sensitive parameters
    #[serde(default)]
    pub secret_refs: Vec<SecretReference>,

    pub cluster_ref: ClusterReference,
}

// ============================================================================
// NifiDataflow
// ============================================================================

/// How queued data is handled before a version change is applied.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DataflowUpdateStrategy {
    /// Stop the inputs and let queues drain naturally
    #[default]
    Drain,
    /// Stop everything and drop queued flowfiles
    Drop,
}

/// Lifecycle state of a dataflow.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum DataflowState {
    Created,
    Starting,
    Ran,
    OutOfSync,
    InSync,
}

impl std::fmt::Display for DataflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "Created",
            Self::Starting => "Starting",
            Self::Ran => "Ran",
            Self::OutOfSync => "OutOfSync",
            Self::InSync => "InSync",
        };
        f.write_str(s)
    }
}

/// Kind of version-control request.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
pub enum DataflowUpdateRequestType {
    #[default]
    Update,
    Revert,
}

/// Last observed version update or revert request.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    #[serde(default)]
    pub r#type: DataflowUpdateRequestType,
    pub id: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub percent_completed: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Last observed drop request on one connection.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DropRequest {
    pub connection_id: String,
    pub id: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub percent_completed: i32,
    #[serde(default)]
    pub current_count: i64,
    #[serde(default)]
    pub current_size: i64,
    #[serde(default)]
    pub original_count: i64,
    #[serde(default)]
    pub original_size: i64,
    #[serde(default)]
    pub dropped_count: i64,
    #[serde(default)]
    pub dropped_size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// `NifiDataflow` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NifiDataflowStatus {
    /// Id of the deployed process group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<DataflowState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_update_request: Option<UpdateRequest>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_drop_request: Option<DropRequest>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// `NifiDataflow` deploys a versioned flow from a registry as a process group.
///
/// # Example
///
/// ```yaml
/// apiVersion: nifi.firestoned.io/v1alpha1
/// kind: NifiDataflow
/// metadata:
///   name: ingest
/// spec:
///   bucketId: 01ced6dc-0378-4893-9403-f6c70d080d4f
///   flowId: 9b2fb465-fb45-49e7-94fe-45b16b642ac9
///   flowVersion: 2
///   updateStrategy: drop
///   clusterRef:
///     name: nifi
///   registryClientRef:
///     name: registry
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "nifi.firestoned.io",
    version = "v1alpha1",
    kind = "NifiDataflow",
    namespaced,
    doc = "NifiDataflow deploys a version-controlled flow from a NiFi Registry as a process group and keeps it on the declared version."
)]
#[kube(status = "NifiDataflowStatus")]
#[serde(rename_all = "camelCase")]
pub struct NifiDataflowSpec {
    /// Process group to deploy under, the root process group when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_process_group_id: Option<String>,

    pub bucket_id: String,

    pub flow_id: String,

    /// Flow version to deploy, latest when absent or -1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_version: Option<i32>,

    /// Start the flow once and never reconcile it again
    #[serde(default)]
    pub run_once: bool,

    pub cluster_ref: ClusterReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_client_ref: Option<RegistryClientReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_context_ref: Option<ParameterContextReference>,

    #[serde(default)]
    pub update_strategy: DataflowUpdateStrategy,
}

impl NifiDataflowSpec {
    /// Pinned version, `None` meaning latest.
    #[must_use]
    pub fn pinned_version(&self) -> Option<i32> {
        self.flow_version.filter(|v| *v > 0)
    }
}

// ============================================================================
// NifiUser / NifiUserGroup
// ============================================================================

fn default_true() -> bool {
    true
}

/// `NifiUser` declares a NiFi user and its access policies.
///
/// When `createCert` is set a client certificate is issued by the cluster PKI and
/// stored in `secretName`.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "nifi.firestoned.io",
    version = "v1alpha1",
    kind = "NifiUser",
    namespaced,
    doc = "NifiUser declares a NiFi user, its access policies and optionally a client certificate issued by the cluster PKI."
)]
#[kube(status = "RemoteEntityStatus")]
#[serde(rename_all = "camelCase")]
pub struct NifiUserSpec {
    /// User identity, the resource name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,

    /// Secret receiving the client certificate, the resource name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,

    pub cluster_ref: ClusterReference,

    #[serde(default = "default_true")]
    pub create_cert: bool,

    /// Extra DNS names in the client certificate
    #[serde(default)]
    pub dns_names: Vec<String>,

    #[serde(default)]
    pub access_policies: Vec<AccessPolicy>,
}

impl NifiUser {
    /// Identity of the user in NiFi.
    #[must_use]
    pub fn identity(&self) -> String {
        match self.spec.identity.as_deref() {
            Some(identity) if !identity.is_empty() => identity.to_string(),
            _ => self.metadata.name.clone().unwrap_or_default(),
        }
    }

    /// Secret holding the issued certificate.
    #[must_use]
    pub fn secret_name(&self) -> String {
        match self.spec.secret_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.metadata.name.clone().unwrap_or_default(),
        }
    }
}

/// `NifiUserGroup` declares a NiFi user group, its members and access policies.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "nifi.firestoned.io",
    version = "v1alpha1",
    kind = "NifiUserGroup",
    namespaced,
    doc = "NifiUserGroup declares a NiFi user group with its member users and access policies."
)]
#[kube(status = "RemoteEntityStatus")]
#[serde(rename_all = "camelCase")]
pub struct NifiUserGroupSpec {
    pub cluster_ref: ClusterReference,

    #[serde(default)]
    pub users_ref: Vec<UserReference>,

    #[serde(default)]
    pub access_policies: Vec<AccessPolicy>,
}

impl NifiUserGroup {
    /// Identity of the group in NiFi: `{namespace}-{name}`.
    #[must_use]
    pub fn identity(&self) -> String {
        format!(
            "{}-{}",
            self.metadata.namespace.as_deref().unwrap_or_default(),
            self.metadata.name.as_deref().unwrap_or_default()
        )
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
