// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory NiFi used by wrapper and reconciler tests.
//!
//! Behaves like a single-node cluster: creates assign ids and start at revision 1,
//! updates and deletes are compare-and-swap on the revision version, asynchronous
//! requests finish on their first poll. Every call is appended to a call log and any
//! call can be made to fail once with [`FakeNifi::fail_next`].

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::types::{
    AccessPolicyDto, AccessPolicyEntity, AccessPolicySummaryDto, AccessPolicySummaryEntity,
    ClusterEntity, ControllerConfigurationEntity,
    ControllerServicesEntity, DropRequestDto, DropRequestEntity, NodeDto, NodeEntity,
    ParameterContextDto, ParameterContextEntity, ParameterContextUpdateRequestDto,
    ParameterContextUpdateRequestEntity, PortEntity, ProcessGroupDto, ProcessGroupEntity,
    ProcessGroupFlowEntity, ProcessorEntity, RegistryClientDto, RegistryClientEntity,
    ReportingTaskDto, ReportingTaskEntity, ReportingTaskStatusDto, RevisionDto, RevisionToken, UserDto, UserEntity,
    UserGroupDto, UserGroupEntity, VersionControlInformationEntity,
    VersionedFlowSnapshotMetadata, VersionedFlowSnapshotMetadataEntity,
    VersionedFlowSnapshotMetadataSetEntity, VersionedFlowUpdateRequestDto,
    VersionedFlowUpdateRequestEntity,
};
use super::{
    ClientFactory, ClusterApi, ComponentApi, FlowApi, NifiApi, NifiError, NifiResult, TenantApi,
};
use crate::clientconfig::ClientConfig;
use crate::constants::{
    COMPONENT_STATE_DISABLED, COMPONENT_STATE_STOPPED, NODE_STATUS_CONNECTED, NODE_STATUS_DISCONNECTED, NODE_STATUS_OFFLOADED,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn not_found(method: &str, path: String) -> NifiError {
    NifiError::NotFound {
        method: method.to_string(),
        path,
    }
}

fn conflict(path: String, version: i64) -> NifiError {
    NifiError::RevisionConflict {
        method: "PUT".to_string(),
        path,
        status: 400,
        version,
    }
}

/// Remote state held by the fake.
#[derive(Debug, Default)]
pub struct FakeState {
    pub cluster: ClusterEntity,
    pub controller_config: ControllerConfigurationEntity,
    pub registry_clients: BTreeMap<String, RegistryClientEntity>,
    /// Registry versions per `bucket/flow`
    pub flow_versions: BTreeMap<String, Vec<i32>>,
    pub process_groups: BTreeMap<String, ProcessGroupEntity>,
    pub flows: BTreeMap<String, ProcessGroupFlowEntity>,
    pub controller_services: BTreeMap<String, ControllerServicesEntity>,
    pub version_info: BTreeMap<String, VersionControlInformationEntity>,
    /// Scheduled state per process group
    pub scheduled: BTreeMap<String, String>,
    /// Controller-service activation per process group
    pub activated: BTreeMap<String, String>,
    pub drop_requests: BTreeMap<String, DropRequestEntity>,
    pub update_requests: BTreeMap<String, VersionedFlowUpdateRequestEntity>,
    pub revert_requests: BTreeMap<String, VersionedFlowUpdateRequestEntity>,
    pub reporting_tasks: BTreeMap<String, ReportingTaskEntity>,
    pub parameter_contexts: BTreeMap<String, ParameterContextEntity>,
    pub parameter_context_requests: BTreeMap<String, ParameterContextUpdateRequestEntity>,
    pub users: BTreeMap<String, UserEntity>,
    pub user_groups: BTreeMap<String, UserGroupEntity>,
    pub policies: BTreeMap<String, AccessPolicyEntity>,
    /// Node UUID per operator node id
    pub node_ids: BTreeMap<i32, String>,
    /// Number of polls before an asynchronous request completes
    pub polls_until_complete: u32,
    poll_counts: BTreeMap<String, u32>,
    next_id: u64,
}

impl FakeState {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    /// Rebuild the policy summaries carried by users and groups from `policies`.
    pub fn refresh_policy_summaries(&mut self) {
        let summaries = |member: &str, groups: bool| -> Vec<AccessPolicySummaryEntity> {
            self.policies
                .values()
                .filter(|p| {
                    let members = if groups {
                        &p.component.user_groups
                    } else {
                        &p.component.users
                    };
                    members.iter().any(|t| t.id == member)
                })
                .map(|p| AccessPolicySummaryEntity {
                    id: p.id.clone(),
                    component: AccessPolicySummaryDto {
                        id: p.id.clone(),
                        resource: p.component.resource.clone(),
                        action: p.component.action.clone(),
                    },
                })
                .collect()
        };
        let users: Vec<(String, Vec<AccessPolicySummaryEntity>)> = self
            .users
            .keys()
            .map(|id| (id.clone(), summaries(id, false)))
            .collect();
        let groups: Vec<(String, Vec<AccessPolicySummaryEntity>)> = self
            .user_groups
            .keys()
            .map(|id| (id.clone(), summaries(id, true)))
            .collect();
        for (id, policies) in users {
            if let Some(user) = self.users.get_mut(&id) {
                user.component.access_policies = policies;
            }
        }
        for (id, policies) in groups {
            if let Some(group) = self.user_groups.get_mut(&id) {
                group.component.access_policies = policies;
            }
        }
    }

    fn complete_after_poll(&mut self, request_id: &str) -> bool {
        let count = self.poll_counts.entry(request_id.to_string()).or_default();
        *count += 1;
        *count > self.polls_until_complete
    }
}

/// In-memory implementation of every capability trait.
#[derive(Debug, Default)]
pub struct FakeNifi {
    state: Mutex<FakeState>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<BTreeMap<String, VecDeque<NifiError>>>,
}

impl FakeNifi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fake whose topology lists the given nodes as `CONNECTED`.
    #[must_use]
    pub fn with_nodes(ids: &[i32]) -> Self {
        let fake = Self::new();
        {
            let mut state = fake.state();
            for id in ids {
                let uuid = format!("node-uuid-{id}");
                state.node_ids.insert(*id, uuid.clone());
                state.cluster.cluster.nodes.push(NodeDto {
                    node_id: uuid,
                    address: format!("nifi-{id}-node"),
                    api_port: 8443,
                    status: NODE_STATUS_CONNECTED.to_string(),
                    ..Default::default()
                });
            }
        }
        fake
    }

    /// Mutable access to the remote state.
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        lock(&self.state)
    }

    /// Calls made so far, as `operation(args)`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Number of calls whose log entry starts with `operation`.
    #[must_use]
    pub fn count(&self, operation: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.starts_with(&format!("{operation}(")))
            .count()
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: &str, error: NifiError) {
        lock(&self.failures)
            .entry(operation.to_string())
            .or_default()
            .push_back(error);
    }

    fn record(&self, operation: &str, args: &str) -> NifiResult<()> {
        lock(&self.calls).push(format!("{operation}({args})"));
        match lock(&self.failures)
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn bump(revision: &mut RevisionDto) {
    revision.version += 1;
}

fn check(path: String, current: &RevisionDto, token: &RevisionToken) -> NifiResult<()> {
    if current.version == token.version {
        Ok(())
    } else {
        Err(conflict(path, token.version))
    }
}

#[async_trait]
impl ClusterApi for FakeNifi {
    async fn describe_cluster(&self) -> NifiResult<ClusterEntity> {
        self.record("describe_cluster", "")?;
        Ok(self.state().cluster.clone())
    }

    async fn get_cluster_node(&self, node_id: i32) -> NifiResult<NodeEntity> {
        self.record("get_cluster_node", &node_id.to_string())?;
        let state = self.state();
        let uuid = state
            .node_ids
            .get(&node_id)
            .ok_or_else(|| not_found("GET", format!("/controller/cluster/nodes/{node_id}")))?;
        state
            .cluster
            .cluster
            .nodes
            .iter()
            .find(|n| &n.node_id == uuid)
            .map(|n| NodeEntity { node: n.clone() })
            .ok_or_else(|| not_found("GET", format!("/controller/cluster/nodes/{uuid}")))
    }

    async fn connect_cluster_node(&self, node_id: i32) -> NifiResult<NodeEntity> {
        self.record("connect_cluster_node", &node_id.to_string())?;
        set_node_status(&mut self.state(), node_id, NODE_STATUS_CONNECTED)
    }

    async fn disconnect_cluster_node(&self, node_id: i32) -> NifiResult<NodeEntity> {
        self.record("disconnect_cluster_node", &node_id.to_string())?;
        set_node_status(&mut self.state(), node_id, NODE_STATUS_DISCONNECTED)
    }

    async fn offload_cluster_node(&self, node_id: i32) -> NifiResult<NodeEntity> {
        self.record("offload_cluster_node", &node_id.to_string())?;
        set_node_status(&mut self.state(), node_id, NODE_STATUS_OFFLOADED)
    }

    async fn remove_cluster_node(&self, node_id: i32) -> NifiResult<()> {
        self.record("remove_cluster_node", &node_id.to_string())?;
        let mut state = self.state();
        let uuid = state
            .node_ids
            .remove(&node_id)
            .ok_or_else(|| not_found("DELETE", format!("/controller/cluster/nodes/{node_id}")))?;
        state.cluster.cluster.nodes.retain(|n| n.node_id != uuid);
        Ok(())
    }

    async fn get_controller_config(&self) -> NifiResult<ControllerConfigurationEntity> {
        self.record("get_controller_config", "")?;
        Ok(self.state().controller_config.clone())
    }

    async fn update_controller_config(
        &self,
        entity: &ControllerConfigurationEntity,
    ) -> NifiResult<ControllerConfigurationEntity> {
        self.record("update_controller_config", "")?;
        let mut state = self.state();
        if state.controller_config.revision.version != entity.revision.version {
            return Err(conflict(
                "/controller/config".to_string(),
                entity.revision.version,
            ));
        }
        state.controller_config.component = entity.component.clone();
        bump(&mut state.controller_config.revision);
        Ok(state.controller_config.clone())
    }
}

fn set_node_status(state: &mut FakeState, node_id: i32, status: &str) -> NifiResult<NodeEntity> {
    let uuid = state
        .node_ids
        .get(&node_id)
        .cloned()
        .ok_or_else(|| not_found("PUT", format!("/controller/cluster/nodes/{node_id}")))?;
    let node = state
        .cluster
        .cluster
        .nodes
        .iter_mut()
        .find(|n| n.node_id == uuid)
        .ok_or_else(|| not_found("PUT", format!("/controller/cluster/nodes/{uuid}")))?;
    node.status = status.to_string();
    Ok(NodeEntity { node: node.clone() })
}

#[async_trait]
impl FlowApi for FakeNifi {
    async fn get_process_group(&self, id: &str) -> NifiResult<ProcessGroupEntity> {
        self.record("get_process_group", id)?;
        self.state()
            .process_groups
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("GET", format!("/process-groups/{id}")))
    }

    async fn create_process_group(
        &self,
        parent_id: &str,
        component: &ProcessGroupDto,
    ) -> NifiResult<ProcessGroupEntity> {
        self.record("create_process_group", parent_id)?;
        let mut state = self.state();
        let id = state.id("pg");
        let mut component = component.clone();
        component.id = Some(id.clone());
        component.parent_group_id = Some(parent_id.to_string());

        if let Some(vci) = component.version_control_information.as_mut() {
            vci.group_id = Some(id.clone());
            state.version_info.insert(
                id.clone(),
                VersionControlInformationEntity {
                    process_group_revision: RevisionDto {
                        client_id: None,
                        version: 1,
                    },
                    version_control_information: vci.clone(),
                },
            );
        }

        let entity = ProcessGroupEntity {
            id: id.clone(),
            revision: RevisionDto {
                client_id: None,
                version: 1,
            },
            component,
            ..Default::default()
        };
        state.process_groups.insert(id.clone(), entity.clone());
        let flow = state.flows.entry(id.clone()).or_default();
        flow.process_group_flow.id = id;
        Ok(entity)
    }

    async fn update_process_group(
        &self,
        token: &RevisionToken,
        component: &ProcessGroupDto,
    ) -> NifiResult<ProcessGroupEntity> {
        self.record("update_process_group", &token.id)?;
        let mut state = self.state();
        let path = format!("/process-groups/{}", token.id);
        let entity = state
            .process_groups
            .get_mut(&token.id)
            .ok_or_else(|| not_found("PUT", path.clone()))?;
        check(path, &entity.revision, token)?;
        entity.component.name.clone_from(&component.name);
        if component.parameter_context.is_some() {
            entity
                .component
                .parameter_context
                .clone_from(&component.parameter_context);
        }
        bump(&mut entity.revision);
        Ok(entity.clone())
    }

    async fn remove_process_group(&self, token: &RevisionToken) -> NifiResult<()> {
        self.record("remove_process_group", &token.id)?;
        let mut state = self.state();
        let path = format!("/process-groups/{}", token.id);
        let entity = state
            .process_groups
            .get(&token.id)
            .ok_or_else(|| not_found("DELETE", path.clone()))?;
        check(path, &entity.revision, token)?;
        state.process_groups.remove(&token.id);
        state.flows.remove(&token.id);
        state.version_info.remove(&token.id);
        Ok(())
    }

    async fn get_flow(&self, process_group_id: &str) -> NifiResult<ProcessGroupFlowEntity> {
        self.record("get_flow", process_group_id)?;
        self.state()
            .flows
            .get(process_group_id)
            .cloned()
            .ok_or_else(|| not_found("GET", format!("/flow/process-groups/{process_group_id}")))
    }

    async fn schedule_process_group(&self, process_group_id: &str, state: &str) -> NifiResult<()> {
        self.record(
            "schedule_process_group",
            &format!("{process_group_id},{state}"),
        )?;
        let mut remote = self.state();
        remote
            .scheduled
            .insert(process_group_id.to_string(), state.to_string());
        // Disabled components ignore scheduling.
        if let Some(flow) = remote.flows.get_mut(process_group_id) {
            let flow = &mut flow.process_group_flow.flow;
            for p in &mut flow.processors {
                if p.component.state != COMPONENT_STATE_DISABLED {
                    p.component.state = state.to_string();
                }
            }
            for p in &mut flow.input_ports {
                if p.component.state != COMPONENT_STATE_DISABLED {
                    p.component.state = state.to_string();
                }
            }
        }
        Ok(())
    }

    async fn get_controller_services(
        &self,
        process_group_id: &str,
    ) -> NifiResult<ControllerServicesEntity> {
        self.record("get_controller_services", process_group_id)?;
        Ok(self
            .state()
            .controller_services
            .get(process_group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn activate_controller_services(
        &self,
        process_group_id: &str,
        state: &str,
    ) -> NifiResult<()> {
        self.record(
            "activate_controller_services",
            &format!("{process_group_id},{state}"),
        )?;
        let mut remote = self.state();
        remote
            .activated
            .insert(process_group_id.to_string(), state.to_string());
        if let Some(services) = remote.controller_services.get_mut(process_group_id) {
            for service in &mut services.controller_services {
                service.component.state = state.to_string();
            }
        }
        Ok(())
    }

    async fn create_drop_request(&self, connection_id: &str) -> NifiResult<DropRequestEntity> {
        self.record("create_drop_request", connection_id)?;
        let mut state = self.state();
        let id = state.id("drop");
        let entity = DropRequestEntity {
            drop_request: DropRequestDto {
                id: id.clone(),
                uri: format!("/flowfile-queues/{connection_id}/drop-requests/{id}"),
                ..Default::default()
            },
        };
        state.drop_requests.insert(id, entity.clone());
        Ok(entity)
    }

    async fn get_drop_request(
        &self,
        connection_id: &str,
        request_id: &str,
    ) -> NifiResult<DropRequestEntity> {
        self.record("get_drop_request", &format!("{connection_id},{request_id}"))?;
        let mut state = self.state();
        if !state.drop_requests.contains_key(request_id) {
            return Err(not_found(
                "GET",
                format!("/flowfile-queues/{connection_id}/drop-requests/{request_id}"),
            ));
        }
        let done = state.complete_after_poll(request_id);
        if done {
            // Empty the queue the request was draining.
            for flow in state.flows.values_mut() {
                for connection in &mut flow.process_group_flow.flow.connections {
                    if connection.id == connection_id {
                        connection.status.aggregate_snapshot.flow_files_queued = 0;
                        connection.status.aggregate_snapshot.bytes_queued = 0;
                    }
                }
            }
        }
        let entity = state
            .drop_requests
            .get_mut(request_id)
            .ok_or_else(|| not_found("GET", format!("/drop-requests/{request_id}")))?;
        if done {
            entity.drop_request.finished = true;
            entity.drop_request.percent_completed = 100;
        }
        Ok(entity.clone())
    }

    async fn get_version_control_information(
        &self,
        process_group_id: &str,
    ) -> NifiResult<VersionControlInformationEntity> {
        self.record("get_version_control_information", process_group_id)?;
        self.state()
            .version_info
            .get(process_group_id)
            .cloned()
            .ok_or_else(|| not_found("GET", format!("/versions/process-groups/{process_group_id}")))
    }

    async fn create_version_update_request(
        &self,
        process_group_id: &str,
        entity: &VersionControlInformationEntity,
    ) -> NifiResult<VersionedFlowUpdateRequestEntity> {
        self.record("create_version_update_request", process_group_id)?;
        let mut state = self.state();
        let id = state.id("update");
        let mut info = entity.clone();
        bump(&mut info.process_group_revision);
        state.version_info.insert(process_group_id.to_string(), info);
        let request = VersionedFlowUpdateRequestEntity {
            process_group_revision: None,
            request: VersionedFlowUpdateRequestDto {
                request_id: id.clone(),
                process_group_id: Some(process_group_id.to_string()),
                uri: format!("/versions/update-requests/{id}"),
                ..Default::default()
            },
        };
        state.update_requests.insert(id, request.clone());
        Ok(request)
    }

    async fn get_version_update_request(
        &self,
        request_id: &str,
    ) -> NifiResult<VersionedFlowUpdateRequestEntity> {
        self.record("get_version_update_request", request_id)?;
        let mut state = self.state();
        if !state.update_requests.contains_key(request_id) {
            return Err(not_found(
                "GET",
                format!("/versions/update-requests/{request_id}"),
            ));
        }
        let done = state.complete_after_poll(request_id);
        let request = state
            .update_requests
            .get_mut(request_id)
            .ok_or_else(|| not_found("GET", format!("/versions/update-requests/{request_id}")))?;
        if done {
            request.request.complete = true;
            request.request.percent_completed = 100;
        }
        Ok(request.clone())
    }

    async fn create_version_revert_request(
        &self,
        process_group_id: &str,
        entity: &VersionControlInformationEntity,
    ) -> NifiResult<VersionedFlowUpdateRequestEntity> {
        self.record("create_version_revert_request", process_group_id)?;
        let mut state = self.state();
        let id = state.id("revert");
        let mut info = entity.clone();
        info.version_control_information.state = None;
        bump(&mut info.process_group_revision);
        state.version_info.insert(process_group_id.to_string(), info);
        let request = VersionedFlowUpdateRequestEntity {
            process_group_revision: None,
            request: VersionedFlowUpdateRequestDto {
                request_id: id.clone(),
                process_group_id: Some(process_group_id.to_string()),
                uri: format!("/versions/revert-requests/{id}"),
                ..Default::default()
            },
        };
        state.revert_requests.insert(id, request.clone());
        Ok(request)
    }

    async fn get_version_revert_request(
        &self,
        request_id: &str,
    ) -> NifiResult<VersionedFlowUpdateRequestEntity> {
        self.record("get_version_revert_request", request_id)?;
        let mut state = self.state();
        if !state.revert_requests.contains_key(request_id) {
            return Err(not_found(
                "GET",
                format!("/versions/revert-requests/{request_id}"),
            ));
        }
        let done = state.complete_after_poll(request_id);
        let request = state
            .revert_requests
            .get_mut(request_id)
            .ok_or_else(|| not_found("GET", format!("/versions/revert-requests/{request_id}")))?;
        if done {
            request.request.complete = true;
            request.request.percent_completed = 100;
        }
        Ok(request.clone())
    }

    async fn update_processor_run_status(
        &self,
        token: &RevisionToken,
        state: &str,
    ) -> NifiResult<ProcessorEntity> {
        self.record("update_processor_run_status", &format!("{},{state}", token.id))?;
        let mut remote = self.state();
        for flow in remote.flows.values_mut() {
            if let Some(p) = flow
                .process_group_flow
                .flow
                .processors
                .iter_mut()
                .find(|p| p.id == token.id)
            {
                check(format!("/processors/{}/run-status", token.id), &p.revision, token)?;
                p.component.state = state.to_string();
                bump(&mut p.revision);
                return Ok(p.clone());
            }
        }
        Err(not_found("PUT", format!("/processors/{}/run-status", token.id)))
    }

    async fn update_input_port_run_status(
        &self,
        token: &RevisionToken,
        state: &str,
    ) -> NifiResult<PortEntity> {
        self.record("update_input_port_run_status", &format!("{},{state}", token.id))?;
        let mut remote = self.state();
        for flow in remote.flows.values_mut() {
            if let Some(p) = flow
                .process_group_flow
                .flow
                .input_ports
                .iter_mut()
                .find(|p| p.id == token.id)
            {
                check(format!("/input-ports/{}/run-status", token.id), &p.revision, token)?;
                p.component.state = state.to_string();
                bump(&mut p.revision);
                return Ok(p.clone());
            }
        }
        Err(not_found("PUT", format!("/input-ports/{}/run-status", token.id)))
    }
}

#[async_trait]
impl ComponentApi for FakeNifi {
    async fn get_registry_client(&self, id: &str) -> NifiResult<RegistryClientEntity> {
        self.record("get_registry_client", id)?;
        self.state()
            .registry_clients
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("GET", format!("/controller/registry-clients/{id}")))
    }

    async fn create_registry_client(
        &self,
        component: &RegistryClientDto,
    ) -> NifiResult<RegistryClientEntity> {
        self.record("create_registry_client", &component.name)?;
        let mut state = self.state();
        let id = state.id("registry");
        let mut component = component.clone();
        component.id = Some(id.clone());
        let entity = RegistryClientEntity {
            id: id.clone(),
            revision: RevisionDto {
                client_id: None,
                version: 1,
            },
            component,
        };
        state.registry_clients.insert(id, entity.clone());
        Ok(entity)
    }

    async fn update_registry_client(
        &self,
        token: &RevisionToken,
        component: &RegistryClientDto,
    ) -> NifiResult<RegistryClientEntity> {
        self.record("update_registry_client", &token.id)?;
        let mut state = self.state();
        let path = format!("/controller/registry-clients/{}", token.id);
        let entity = state
            .registry_clients
            .get_mut(&token.id)
            .ok_or_else(|| not_found("PUT", path.clone()))?;
        check(path, &entity.revision, token)?;
        entity.component = component.clone();
        entity.component.id = Some(token.id.clone());
        bump(&mut entity.revision);
        Ok(entity.clone())
    }

    async fn remove_registry_client(&self, token: &RevisionToken) -> NifiResult<()> {
        self.record("remove_registry_client", &token.id)?;
        let mut state = self.state();
        let path = format!("/controller/registry-clients/{}", token.id);
        let entity = state
            .registry_clients
            .get(&token.id)
            .ok_or_else(|| not_found("DELETE", path.clone()))?;
        check(path, &entity.revision, token)?;
        state.registry_clients.remove(&token.id);
        Ok(())
    }

    async fn get_flow_versions(
        &self,
        registry_id: &str,
        bucket_id: &str,
        flow_id: &str,
    ) -> NifiResult<VersionedFlowSnapshotMetadataSetEntity> {
        self.record(
            "get_flow_versions",
            &format!("{registry_id},{bucket_id},{flow_id}"),
        )?;
        let state = self.state();
        let versions = state
            .flow_versions
            .get(&format!("{bucket_id}/{flow_id}"))
            .ok_or_else(|| {
                not_found(
                    "GET",
                    format!("/flow/registries/{registry_id}/buckets/{bucket_id}/flows/{flow_id}/versions"),
                )
            })?;
        Ok(VersionedFlowSnapshotMetadataSetEntity {
            versioned_flow_snapshot_metadata_set: versions
                .iter()
                .map(|v| VersionedFlowSnapshotMetadataEntity {
                    versioned_flow_snapshot_metadata: VersionedFlowSnapshotMetadata {
                        bucket_identifier: bucket_id.to_string(),
                        flow_identifier: flow_id.to_string(),
                        version: *v,
                    },
                })
                .collect(),
        })
    }

    async fn get_reporting_task(&self, id: &str) -> NifiResult<ReportingTaskEntity> {
        self.record("get_reporting_task", id)?;
        self.state()
            .reporting_tasks
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("GET", format!("/reporting-tasks/{id}")))
    }

    async fn create_reporting_task(
        &self,
        component: &ReportingTaskDto,
    ) -> NifiResult<ReportingTaskEntity> {
        self.record("create_reporting_task", &component.name)?;
        let mut state = self.state();
        let id = state.id("task");
        let mut component = component.clone();
        component.id = Some(id.clone());
        // NiFi creates reporting tasks stopped.
        let entity = ReportingTaskEntity {
            id: id.clone(),
            revision: RevisionDto {
                client_id: None,
                version: 1,
            },
            component,
            status: ReportingTaskStatusDto {
                run_status: Some(COMPONENT_STATE_STOPPED.to_string()),
                validation_status: Some("VALID".to_string()),
            },
        };
        state.reporting_tasks.insert(id, entity.clone());
        Ok(entity)
    }

    async fn update_reporting_task(
        &self,
        token: &RevisionToken,
        component: &ReportingTaskDto,
    ) -> NifiResult<ReportingTaskEntity> {
        self.record("update_reporting_task", &token.id)?;
        let mut state = self.state();
        let path = format!("/reporting-tasks/{}", token.id);
        let entity = state
            .reporting_tasks
            .get_mut(&token.id)
            .ok_or_else(|| not_found("PUT", path.clone()))?;
        check(path, &entity.revision, token)?;
        entity.component.properties.clone_from(&component.properties);
        entity.component.name.clone_from(&component.name);
        bump(&mut entity.revision);
        Ok(entity.clone())
    }

    async fn update_reporting_task_run_status(
        &self,
        token: &RevisionToken,
        state: &str,
    ) -> NifiResult<ReportingTaskEntity> {
        self.record(
            "update_reporting_task_run_status",
            &format!("{},{state}", token.id),
        )?;
        let mut remote = self.state();
        let path = format!("/reporting-tasks/{}/run-status", token.id);
        let entity = remote
            .reporting_tasks
            .get_mut(&token.id)
            .ok_or_else(|| not_found("PUT", path.clone()))?;
        check(path, &entity.revision, token)?;
        entity.component.state = Some(state.to_string());
        entity.status.run_status = Some(state.to_string());
        bump(&mut entity.revision);
        Ok(entity.clone())
    }

    async fn remove_reporting_task(&self, token: &RevisionToken) -> NifiResult<()> {
        self.record("remove_reporting_task", &token.id)?;
        let mut state = self.state();
        let path = format!("/reporting-tasks/{}", token.id);
        let entity = state
            .reporting_tasks
            .get(&token.id)
            .ok_or_else(|| not_found("DELETE", path.clone()))?;
        check(path, &entity.revision, token)?;
        state.reporting_tasks.remove(&token.id);
        Ok(())
    }

    async fn get_parameter_context(&self, id: &str) -> NifiResult<ParameterContextEntity> {
        self.record("get_parameter_context", id)?;
        self.state()
            .parameter_contexts
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("GET", format!("/parameter-contexts/{id}")))
    }

    async fn create_parameter_context(
        &self,
        component: &ParameterContextDto,
    ) -> NifiResult<ParameterContextEntity> {
        self.record("create_parameter_context", &component.name)?;
        let mut state = self.state();
        let id = state.id("context");
        let mut component = component.clone();
        component.id = Some(id.clone());
        let entity = ParameterContextEntity {
            id: id.clone(),
            revision: RevisionDto {
                client_id: None,
                version: 1,
            },
            component,
        };
        state.parameter_contexts.insert(id, entity.clone());
        Ok(entity)
    }

    async fn create_parameter_context_update_request(
        &self,
        token: &RevisionToken,
        component: &ParameterContextDto,
    ) -> NifiResult<ParameterContextUpdateRequestEntity> {
        self.record("create_parameter_context_update_request", &token.id)?;
        let mut state = self.state();
        let path = format!("/parameter-contexts/{}/update-requests", token.id);
        let entity = state
            .parameter_contexts
            .get_mut(&token.id)
            .ok_or_else(|| not_found("POST", path.clone()))?;
        check(path, &entity.revision, token)?;
        // A parameter sent without value nor description is deleted.
        for incoming in &component.parameters {
            let p = &incoming.parameter;
            let parameters = &mut entity.component.parameters;
            parameters.retain(|e| e.parameter.name != p.name);
            if p.value.is_some() || p.description.is_some() {
                parameters.push(incoming.clone());
            }
        }
        entity.component.description.clone_from(&component.description);
        bump(&mut entity.revision);

        let id = state.id("context-update");
        let request = ParameterContextUpdateRequestEntity {
            parameter_context_revision: None,
            request: ParameterContextUpdateRequestDto {
                request_id: id.clone(),
                uri: format!("/parameter-contexts/{}/update-requests/{id}", token.id),
                ..Default::default()
            },
        };
        state.parameter_context_requests.insert(id, request.clone());
        Ok(request)
    }

    async fn get_parameter_context_update_request(
        &self,
        context_id: &str,
        request_id: &str,
    ) -> NifiResult<ParameterContextUpdateRequestEntity> {
        self.record(
            "get_parameter_context_update_request",
            &format!("{context_id},{request_id}"),
        )?;
        let mut state = self.state();
        if !state.parameter_context_requests.contains_key(request_id) {
            return Err(not_found(
                "GET",
                format!("/parameter-contexts/{context_id}/update-requests/{request_id}"),
            ));
        }
        let done = state.complete_after_poll(request_id);
        let request = state
            .parameter_context_requests
            .get_mut(request_id)
            .ok_or_else(|| not_found("GET", format!("/update-requests/{request_id}")))?;
        if done {
            request.request.complete = true;
            request.request.percent_completed = 100;
        }
        Ok(request.clone())
    }

    async fn remove_parameter_context(&self, token: &RevisionToken) -> NifiResult<()> {
        self.record("remove_parameter_context", &token.id)?;
        let mut state = self.state();
        let path = format!("/parameter-contexts/{}", token.id);
        let entity = state
            .parameter_contexts
            .get(&token.id)
            .ok_or_else(|| not_found("DELETE", path.clone()))?;
        check(path, &entity.revision, token)?;
        state.parameter_contexts.remove(&token.id);
        Ok(())
    }
}

#[async_trait]
impl TenantApi for FakeNifi {
    async fn get_users(&self) -> NifiResult<Vec<UserEntity>> {
        self.record("get_users", "")?;
        Ok(self.state().users.values().cloned().collect())
    }

    async fn get_user(&self, id: &str) -> NifiResult<UserEntity> {
        self.record("get_user", id)?;
        self.state()
            .users
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("GET", format!("/tenants/users/{id}")))
    }

    async fn create_user(&self, component: &UserDto) -> NifiResult<UserEntity> {
        self.record("create_user", &component.identity)?;
        let mut state = self.state();
        let id = state.id("user");
        let mut component = component.clone();
        component.id = Some(id.clone());
        let entity = UserEntity {
            id: id.clone(),
            revision: RevisionDto {
                client_id: None,
                version: 1,
            },
            component,
        };
        state.users.insert(id, entity.clone());
        Ok(entity)
    }

    async fn update_user(&self, token: &RevisionToken, component: &UserDto) -> NifiResult<UserEntity> {
        self.record("update_user", &token.id)?;
        let mut state = self.state();
        let path = format!("/tenants/users/{}", token.id);
        let entity = state
            .users
            .get_mut(&token.id)
            .ok_or_else(|| not_found("PUT", path.clone()))?;
        check(path, &entity.revision, token)?;
        entity.component.identity.clone_from(&component.identity);
        bump(&mut entity.revision);
        Ok(entity.clone())
    }

    async fn remove_user(&self, token: &RevisionToken) -> NifiResult<()> {
        self.record("remove_user", &token.id)?;
        let mut state = self.state();
        let path = format!("/tenants/users/{}", token.id);
        let entity = state
            .users
            .get(&token.id)
            .ok_or_else(|| not_found("DELETE", path.clone()))?;
        check(path, &entity.revision, token)?;
        state.users.remove(&token.id);
        Ok(())
    }

    async fn get_user_groups(&self) -> NifiResult<Vec<UserGroupEntity>> {
        self.record("get_user_groups", "")?;
        Ok(self.state().user_groups.values().cloned().collect())
    }

    async fn get_user_group(&self, id: &str) -> NifiResult<UserGroupEntity> {
        self.record("get_user_group", id)?;
        self.state()
            .user_groups
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("GET", format!("/tenants/user-groups/{id}")))
    }

    async fn create_user_group(&self, component: &UserGroupDto) -> NifiResult<UserGroupEntity> {
        self.record("create_user_group", &component.identity)?;
        let mut state = self.state();
        let id = state.id("group");
        let mut component = component.clone();
        component.id = Some(id.clone());
        let entity = UserGroupEntity {
            id: id.clone(),
            revision: RevisionDto {
                client_id: None,
                version: 1,
            },
            component,
        };
        state.user_groups.insert(id, entity.clone());
        Ok(entity)
    }

    async fn update_user_group(
        &self,
        token: &RevisionToken,
        component: &UserGroupDto,
    ) -> NifiResult<UserGroupEntity> {
        self.record("update_user_group", &token.id)?;
        let mut state = self.state();
        let path = format!("/tenants/user-groups/{}", token.id);
        let entity = state
            .user_groups
            .get_mut(&token.id)
            .ok_or_else(|| not_found("PUT", path.clone()))?;
        check(path, &entity.revision, token)?;
        entity.component.identity.clone_from(&component.identity);
        entity.component.users.clone_from(&component.users);
        bump(&mut entity.revision);
        Ok(entity.clone())
    }

    async fn remove_user_group(&self, token: &RevisionToken) -> NifiResult<()> {
        self.record("remove_user_group", &token.id)?;
        let mut state = self.state();
        let path = format!("/tenants/user-groups/{}", token.id);
        let entity = state
            .user_groups
            .get(&token.id)
            .ok_or_else(|| not_found("DELETE", path.clone()))?;
        check(path, &entity.revision, token)?;
        state.user_groups.remove(&token.id);
        Ok(())
    }

    async fn get_access_policy(
        &self,
        action: &str,
        resource: &str,
    ) -> NifiResult<AccessPolicyEntity> {
        self.record("get_access_policy", &format!("{action},{resource}"))?;
        let state = self.state();
        let same_action = || state.policies.values().filter(|p| p.component.action == action);
        // Like NiFi, fall back to the closest policy on a parent resource.
        same_action()
            .find(|p| p.component.resource == resource)
            .or_else(|| {
                same_action()
                    .filter(|p| resource.starts_with(&format!("{}/", p.component.resource)))
                    .max_by_key(|p| p.component.resource.len())
            })
            .cloned()
            .ok_or_else(|| not_found("GET", format!("/policies/{action}{resource}")))
    }

    async fn create_access_policy(
        &self,
        component: &AccessPolicyDto,
    ) -> NifiResult<AccessPolicyEntity> {
        self.record(
            "create_access_policy",
            &format!("{},{}", component.action, component.resource),
        )?;
        let mut state = self.state();
        let id = state.id("policy");
        let mut component = component.clone();
        component.id = Some(id.clone());
        let entity = AccessPolicyEntity {
            id: id.clone(),
            revision: RevisionDto {
                client_id: None,
                version: 1,
            },
            component,
        };
        state.policies.insert(id, entity.clone());
        state.refresh_policy_summaries();
        Ok(entity)
    }

    async fn update_access_policy(
        &self,
        token: &RevisionToken,
        component: &AccessPolicyDto,
    ) -> NifiResult<AccessPolicyEntity> {
        self.record("update_access_policy", &token.id)?;
        let mut state = self.state();
        let path = format!("/policies/{}", token.id);
        let entity = state
            .policies
            .get_mut(&token.id)
            .ok_or_else(|| not_found("PUT", path.clone()))?;
        check(path, &entity.revision, token)?;
        entity.component.users.clone_from(&component.users);
        entity.component.user_groups.clone_from(&component.user_groups);
        bump(&mut entity.revision);
        let entity = entity.clone();
        state.refresh_policy_summaries();
        Ok(entity)
    }

    async fn remove_access_policy(&self, token: &RevisionToken) -> NifiResult<()> {
        self.record("remove_access_policy", &token.id)?;
        let mut state = self.state();
        let path = format!("/policies/{}", token.id);
        let entity = state
            .policies
            .get(&token.id)
            .ok_or_else(|| not_found("DELETE", path.clone()))?;
        check(path, &entity.revision, token)?;
        state.policies.remove(&token.id);
        state.refresh_policy_summaries();
        Ok(())
    }
}

/// Factory handing out one shared [`FakeNifi`].
#[derive(Clone, Debug)]
pub struct FakeFactory {
    pub nifi: Arc<FakeNifi>,
    /// When set, `connect` and `describe` fail with this error.
    pub unreachable: Option<NifiError>,
}

impl FakeFactory {
    #[must_use]
    pub fn new(nifi: Arc<FakeNifi>) -> Self {
        Self {
            nifi,
            unreachable: None,
        }
    }
}

#[async_trait]
impl ClientFactory for FakeFactory {
    async fn connect(&self, _config: &ClientConfig) -> NifiResult<Arc<dyn NifiApi>> {
        if let Some(error) = &self.unreachable {
            return Err(error.clone());
        }
        Ok(self.nifi.clone())
    }

    async fn describe(&self, _config: &ClientConfig) -> NifiResult<ClusterEntity> {
        if let Some(error) = &self.unreachable {
            return Err(error.clone());
        }
        self.nifi.describe_cluster().await
    }
}
