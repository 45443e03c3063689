// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Remote cluster client for the NiFi REST API.
//!
//! The client is split into four capability traits ([`ClusterApi`], [`FlowApi`],
//! [`ComponentApi`] and [`TenantApi`]) so wrappers can depend on the narrowest
//! surface they need, and a [`NifiApi`] supertrait that reconcilers hold as
//! `Arc<dyn NifiApi>`.
//!
//! # Routing
//!
//! [`NifiClient::build`] creates one HTTP client per node that may receive traffic
//! plus one for the address of the whole cluster, then describes the cluster once.
//! Nodes without a client are still resolved from the node host template. Every call is
//! sent through the privileged node chosen from that snapshot (see [`routing`]).
//!
//! # Injection
//!
//! Reconcilers never construct a client themselves: they receive a
//! [`ClientFactory`]. Production uses [`HttpClientFactory`]; tests pass a fake.
//!
//! # Example
//!
//! ```rust,no_run
//! use nifikop::clientconfig::ClientConfig;
//! use nifikop::nifi::{ClientFactory, HttpClientFactory};
//!
//! # async fn example(config: ClientConfig) -> Result<(), nifikop::nifi::NifiError> {
//! let client = HttpClientFactory.connect(&config).await?;
//! let cluster = client.describe_cluster().await?;
//! println!("{} nodes", cluster.cluster.nodes.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod errors;
pub mod routing;
pub mod types;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use std::sync::Arc;

use crate::clientconfig::ClientConfig;

pub use client::NifiClient;
pub use errors::NifiError;
pub use routing::{Target, Topology};

use types::{
    AccessPolicyDto, AccessPolicyEntity, ClusterEntity, ControllerConfigurationEntity,
    ControllerServicesEntity, DropRequestEntity, NodeEntity, ParameterContextDto,
    ParameterContextEntity, ParameterContextUpdateRequestEntity, PortEntity, ProcessGroupDto,
    ProcessGroupEntity, ProcessGroupFlowEntity, ProcessorEntity, RegistryClientDto,
    RegistryClientEntity, ReportingTaskDto, ReportingTaskEntity, RevisionToken, UserDto,
    UserEntity, UserGroupDto, UserGroupEntity, VersionControlInformationEntity,
    VersionedFlowSnapshotMetadataSetEntity, VersionedFlowUpdateRequestEntity,
};

/// Result of a NiFi call.
pub type NifiResult<T> = Result<T, NifiError>;

/// Cluster topology, node lifecycle and controller settings.
///
/// Node operations take the operator node id and are routed away from that node.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn describe_cluster(&self) -> NifiResult<ClusterEntity>;
    async fn get_cluster_node(&self, node_id: i32) -> NifiResult<NodeEntity>;
    async fn connect_cluster_node(&self, node_id: i32) -> NifiResult<NodeEntity>;
    async fn disconnect_cluster_node(&self, node_id: i32) -> NifiResult<NodeEntity>;
    async fn offload_cluster_node(&self, node_id: i32) -> NifiResult<NodeEntity>;
    async fn remove_cluster_node(&self, node_id: i32) -> NifiResult<()>;
    async fn get_controller_config(&self) -> NifiResult<ControllerConfigurationEntity>;
    async fn update_controller_config(
        &self,
        entity: &ControllerConfigurationEntity,
    ) -> NifiResult<ControllerConfigurationEntity>;
}

/// Process groups, flows and the asynchronous requests acting on them.
#[async_trait]
pub trait FlowApi: Send + Sync {
    async fn get_process_group(&self, id: &str) -> NifiResult<ProcessGroupEntity>;
    async fn create_process_group(
        &self,
        parent_id: &str,
        component: &ProcessGroupDto,
    ) -> NifiResult<ProcessGroupEntity>;
    async fn update_process_group(
        &self,
        token: &RevisionToken,
        component: &ProcessGroupDto,
    ) -> NifiResult<ProcessGroupEntity>;
    async fn remove_process_group(&self, token: &RevisionToken) -> NifiResult<()>;

    async fn get_flow(&self, process_group_id: &str) -> NifiResult<ProcessGroupFlowEntity>;
    async fn schedule_process_group(&self, process_group_id: &str, state: &str) -> NifiResult<()>;
    async fn get_controller_services(
        &self,
        process_group_id: &str,
    ) -> NifiResult<ControllerServicesEntity>;
    async fn activate_controller_services(
        &self,
        process_group_id: &str,
        state: &str,
    ) -> NifiResult<()>;

    async fn create_drop_request(&self, connection_id: &str) -> NifiResult<DropRequestEntity>;
    async fn get_drop_request(
        &self,
        connection_id: &str,
        request_id: &str,
    ) -> NifiResult<DropRequestEntity>;

    async fn get_version_control_information(
        &self,
        process_group_id: &str,
    ) -> NifiResult<VersionControlInformationEntity>;
    async fn create_version_update_request(
        &self,
        process_group_id: &str,
        entity: &VersionControlInformationEntity,
    ) -> NifiResult<VersionedFlowUpdateRequestEntity>;
    async fn get_version_update_request(
        &self,
        request_id: &str,
    ) -> NifiResult<VersionedFlowUpdateRequestEntity>;
    async fn create_version_revert_request(
        &self,
        process_group_id: &str,
        entity: &VersionControlInformationEntity,
    ) -> NifiResult<VersionedFlowUpdateRequestEntity>;
    async fn get_version_revert_request(
        &self,
        request_id: &str,
    ) -> NifiResult<VersionedFlowUpdateRequestEntity>;

    async fn update_processor_run_status(
        &self,
        token: &RevisionToken,
        state: &str,
    ) -> NifiResult<ProcessorEntity>;
    async fn update_input_port_run_status(
        &self,
        token: &RevisionToken,
        state: &str,
    ) -> NifiResult<PortEntity>;
}

/// Registry clients, reporting tasks and parameter contexts.
#[async_trait]
pub trait ComponentApi: Send + Sync {
    async fn get_registry_client(&self, id: &str) -> NifiResult<RegistryClientEntity>;
    async fn create_registry_client(
        &self,
        component: &RegistryClientDto,
    ) -> NifiResult<RegistryClientEntity>;
    async fn update_registry_client(
        &self,
        token: &RevisionToken,
        component: &RegistryClientDto,
    ) -> NifiResult<RegistryClientEntity>;
    async fn remove_registry_client(&self, token: &RevisionToken) -> NifiResult<()>;
    async fn get_flow_versions(
        &self,
        registry_id: &str,
        bucket_id: &str,
        flow_id: &str,
    ) -> NifiResult<VersionedFlowSnapshotMetadataSetEntity>;

    async fn get_reporting_task(&self, id: &str) -> NifiResult<ReportingTaskEntity>;
    async fn create_reporting_task(
        &self,
        component: &ReportingTaskDto,
    ) -> NifiResult<ReportingTaskEntity>;
    async fn update_reporting_task(
        &self,
        token: &RevisionToken,
        component: &ReportingTaskDto,
    ) -> NifiResult<ReportingTaskEntity>;
    async fn update_reporting_task_run_status(
        &self,
        token: &RevisionToken,
        state: &str,
    ) -> NifiResult<ReportingTaskEntity>;
    async fn remove_reporting_task(&self, token: &RevisionToken) -> NifiResult<()>;

    async fn get_parameter_context(&self, id: &str) -> NifiResult<ParameterContextEntity>;
    async fn create_parameter_context(
        &self,
        component: &ParameterContextDto,
    ) -> NifiResult<ParameterContextEntity>;
    async fn create_parameter_context_update_request(
        &self,
        token: &RevisionToken,
        component: &ParameterContextDto,
    ) -> NifiResult<ParameterContextUpdateRequestEntity>;
    async fn get_parameter_context_update_request(
        &self,
        context_id: &str,
        request_id: &str,
    ) -> NifiResult<ParameterContextUpdateRequestEntity>;
    async fn remove_parameter_context(&self, token: &RevisionToken) -> NifiResult<()>;
}

/// Users, user groups and access policies.
#[async_trait]
pub trait TenantApi: Send + Sync {
    async fn get_users(&self) -> NifiResult<Vec<UserEntity>>;
    async fn get_user(&self, id: &str) -> NifiResult<UserEntity>;
    async fn create_user(&self, component: &UserDto) -> NifiResult<UserEntity>;
    async fn update_user(&self, token: &RevisionToken, component: &UserDto)
        -> NifiResult<UserEntity>;
    async fn remove_user(&self, token: &RevisionToken) -> NifiResult<()>;

    async fn get_user_groups(&self) -> NifiResult<Vec<UserGroupEntity>>;
    async fn get_user_group(&self, id: &str) -> NifiResult<UserGroupEntity>;
    async fn create_user_group(&self, component: &UserGroupDto) -> NifiResult<UserGroupEntity>;
    async fn update_user_group(
        &self,
        token: &RevisionToken,
        component: &UserGroupDto,
    ) -> NifiResult<UserGroupEntity>;
    async fn remove_user_group(&self, token: &RevisionToken) -> NifiResult<()>;

    /// Policy for `(action, resource)`; NiFi may answer with an inherited policy.
    async fn get_access_policy(&self, action: &str, resource: &str)
        -> NifiResult<AccessPolicyEntity>;
    async fn create_access_policy(
        &self,
        component: &AccessPolicyDto,
    ) -> NifiResult<AccessPolicyEntity>;
    async fn update_access_policy(
        &self,
        token: &RevisionToken,
        component: &AccessPolicyDto,
    ) -> NifiResult<AccessPolicyEntity>;
    async fn remove_access_policy(&self, token: &RevisionToken) -> NifiResult<()>;
}

/// Full client surface.
pub trait NifiApi: ClusterApi + FlowApi + ComponentApi + TenantApi {}

impl<T> NifiApi for T where T: ClusterApi + FlowApi + ComponentApi + TenantApi {}

/// Builds clients from resolved connection parameters.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Build a client; fails with [`NifiError::NodesUnreachable`] when the cluster
    /// cannot be described.
    async fn connect(&self, config: &ClientConfig) -> NifiResult<Arc<dyn NifiApi>>;

    /// Describe the cluster without building per-node clients.
    async fn describe(&self, config: &ClientConfig) -> NifiResult<ClusterEntity>;
}

/// Factory producing [`NifiClient`]s over HTTP.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpClientFactory;

#[async_trait]
impl ClientFactory for HttpClientFactory {
    async fn connect(&self, config: &ClientConfig) -> NifiResult<Arc<dyn NifiApi>> {
        let client = NifiClient::build(config).await?;
        Ok(Arc::new(client))
    }

    async fn describe(&self, config: &ClientConfig) -> NifiResult<ClusterEntity> {
        NifiClient::describe(config).await
    }
}
