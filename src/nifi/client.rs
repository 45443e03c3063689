// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP implementation of the NiFi capability traits.
//!
//! One `reqwest` client is built per node that may receive traffic and one for the address of the
//! whole cluster. The topology snapshot taken in [`NifiClient::build`] lives as long
//! as the client; reconcilers build a fresh client every cycle.
//!
//! # Status mapping
//!
//! | HTTP | Result |
//! |------|--------|
//! | 200, 201, 202 | success |
//! | 404 | [`NifiError::NotFound`] |
//! | 400 / 409 with a stale revision body | [`NifiError::RevisionConflict`] |
//! | anything else | [`NifiError::UnexpectedStatus`] |
//! | no response | [`NifiError::TransportFailure`] |
//!
//! Only `GET`s are retried (see [`crate::retry::retry_nifi_read`]).

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

use super::errors::NifiError;
use super::routing::{Target, Topology};
use super::types::{
    AccessPolicyDto, AccessPolicyEntity, ActivateControllerServicesEntity, ClusterEntity,
    ControllerConfigurationEntity, ControllerServicesEntity, DropRequestEntity, NodeEntity,
    ParameterContextDto, ParameterContextEntity, ParameterContextUpdateRequestEntity, PortEntity,
    ProcessGroupDto, ProcessGroupEntity, ProcessGroupFlowEntity, ProcessorEntity,
    RegistryClientDto, RegistryClientEntity, ReportingTaskDto, ReportingTaskEntity, RevisionDto,
    RevisionToken, RunStatusEntity, ScheduleComponentsEntity, UserDto, UserEntity, UserGroupDto,
    UserGroupEntity, UserGroupsEntity, UsersEntity, VersionControlInformationEntity,
    VersionedFlowSnapshotMetadataSetEntity, VersionedFlowUpdateRequestEntity,
};
use super::{ClusterApi, ComponentApi, FlowApi, NifiResult, TenantApi};
use crate::clientconfig::ClientConfig;
use crate::constants::{
    NIFI_API_PATH, NODE_STATUS_CONNECTING, NODE_STATUS_DISCONNECTING, NODE_STATUS_OFFLOADING,
    STALE_REVISION_MARKER,
};
use crate::metrics;
use crate::retry::retry_nifi_read;

/// HTTP client bound to one base URL.
#[derive(Clone, Debug)]
struct HttpNode {
    base_url: String,
    http: HttpClient,
}

impl HttpNode {
    fn new(config: &ClientConfig, host: &str) -> NifiResult<Self> {
        Ok(Self {
            base_url: base_url(config.use_ssl, host)?,
            http: http_client(config)?,
        })
    }
}

/// `{scheme}://{host}/nifi-api`
///
/// Any scheme already present on `host` is replaced by the one `use_ssl` selects.
pub(crate) fn base_url(use_ssl: bool, host: &str) -> NifiResult<String> {
    let host = host
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    let scheme = if use_ssl { "https" } else { "http" };
    let url = Url::parse(&format!("{scheme}://{host}"))
        .map_err(|e| NifiError::InvalidConfig(format!("invalid NiFi address {host:?}: {e}")))?;
    Ok(format!(
        "{}{NIFI_API_PATH}",
        url.as_str().trim_end_matches('/')
    ))
}

fn http_client(config: &ClientConfig) -> NifiResult<HttpClient> {
    let mut builder = HttpClient::builder().timeout(config.operation_timeout);

    if config.use_ssl {
        if let Some(tls) = &config.tls {
            let ca = reqwest::Certificate::from_pem(tls.ca_pem.as_bytes())
                .map_err(|e| NifiError::InvalidConfig(format!("invalid CA certificate: {e}")))?;
            let bundle = format!("{}\n{}", tls.cert_pem.trim_end(), tls.key_pem);
            let identity = reqwest::Identity::from_pem(bundle.as_bytes())
                .map_err(|e| NifiError::InvalidConfig(format!("invalid client identity: {e}")))?;
            builder = builder.add_root_certificate(ca).identity(identity);
        }
    }

    builder
        .build()
        .map_err(|e| NifiError::InvalidConfig(format!("failed to build HTTP client: {e}")))
}

/// Turn a status code and body into the error taxonomy.
pub(crate) fn classify_response(
    method: &Method,
    path: &str,
    status: u16,
    body: String,
    version: Option<i64>,
) -> NifiResult<String> {
    match status {
        200..=202 => Ok(body),
        404 => Err(NifiError::NotFound {
            method: method.to_string(),
            path: path.to_string(),
        }),
        400 | 409 if body.contains(STALE_REVISION_MARKER) => Err(NifiError::RevisionConflict {
            method: method.to_string(),
            path: path.to_string(),
            status,
            version: version.unwrap_or_default(),
        }),
        _ => Err(NifiError::UnexpectedStatus {
            method: method.to_string(),
            path: path.to_string(),
            status,
            body,
        }),
    }
}

fn decode<T: DeserializeOwned>(path: &str, body: &str) -> NifiResult<T> {
    serde_json::from_str(body).map_err(|e| NifiError::Decode {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn status_class(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

/// Client for one NiFi cluster.
#[derive(Debug)]
pub struct NifiClient {
    all_nodes: Option<HttpNode>,
    node_clients: BTreeMap<i32, HttpNode>,
    topology: Topology,
}

impl NifiClient {
    /// Build the per-node clients and describe the cluster.
    ///
    /// # Errors
    ///
    /// [`NifiError::NoNodeClientsAvailable`] when no address is known at all,
    /// [`NifiError::NodesUnreachable`] when the describe call fails.
    pub async fn build(config: &ClientConfig) -> NifiResult<Self> {
        let all_nodes = if config.nifi_uri.is_empty() {
            None
        } else {
            Some(HttpNode::new(config, &config.nifi_uri)?)
        };

        let mut node_clients = BTreeMap::new();
        for (id, uri) in &config.nodes_uri {
            node_clients.insert(*id, HttpNode::new(config, &uri.request_host)?);
        }

        let mut client = Self {
            all_nodes,
            node_clients,
            topology: Topology::new(Vec::new(), config.nodes_uri.clone())
                .with_node_uri_template(config.node_uri_template.clone()),
        };

        let describer = client.describe_target()?.clone();
        let cluster: ClusterEntity = client
            .execute_get(&describer, "/controller/cluster")
            .await
            .map_err(|e| NifiError::NodesUnreachable {
                uri: describer.base_url.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            nodes = cluster.cluster.nodes.len(),
            uri = %describer.base_url,
            "Described NiFi cluster"
        );
        client.topology = Topology::new(cluster.cluster.nodes, config.nodes_uri.clone())
            .with_node_uri_template(config.node_uri_template.clone());
        Ok(client)
    }

    /// Describe the cluster through a single client, without building the others.
    ///
    /// # Errors
    ///
    /// Same as [`NifiClient::build`].
    pub async fn describe(config: &ClientConfig) -> NifiResult<ClusterEntity> {
        let host = if config.nifi_uri.is_empty() {
            config
                .nodes_uri
                .values()
                .next()
                .map(|uri| uri.request_host.clone())
                .ok_or(NifiError::NoNodeClientsAvailable)?
        } else {
            config.nifi_uri.clone()
        };

        let single = Self {
            all_nodes: Some(HttpNode::new(config, &host)?),
            node_clients: BTreeMap::new(),
            topology: Topology::default(),
        };
        let node = single.describe_target()?.clone();
        single
            .execute_get(&node, "/controller/cluster")
            .await
            .map_err(|e| NifiError::NodesUnreachable {
                uri: node.base_url.clone(),
                reason: e.to_string(),
            })
    }

    /// Topology snapshot taken at build time.
    #[must_use]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    fn describe_target(&self) -> NifiResult<&HttpNode> {
        self.all_nodes
            .as_ref()
            .or_else(|| self.node_clients.values().next())
            .ok_or(NifiError::NoNodeClientsAvailable)
    }

    fn select(&self, target: Target) -> NifiResult<&HttpNode> {
        let node = match target {
            Target::Node(id) => self.node_clients.get(&id).or(self.all_nodes.as_ref()),
            Target::AllNodes => self.all_nodes.as_ref(),
        };
        node.or_else(|| self.node_clients.values().next())
            .ok_or(NifiError::NoNodeClientsAvailable)
    }

    fn privileged(&self) -> NifiResult<&HttpNode> {
        self.select(self.topology.privileged())
    }

    /// NiFi node UUID of an operator node id.
    ///
    /// Resolved for any declared node, whether or not it has a client of its own;
    /// [`NifiError::NotFound`] only when the cluster description does not list it.
    fn nifi_node_id(&self, node_id: i32) -> NifiResult<String> {
        self.topology
            .node_by_id(node_id)
            .map(|n| n.node_id.clone())
            .ok_or_else(|| NifiError::NotFound {
                method: Method::GET.to_string(),
                path: format!("/controller/cluster/nodes (operator node {node_id})"),
            })
    }

    async fn execute<B>(
        &self,
        node: &HttpNode,
        method: Method,
        path: &str,
        body: Option<&B>,
        version: Option<i64>,
    ) -> NifiResult<String>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = format!("{}{path}", node.base_url);
        debug!(method = %method, url = %url, "NiFi API request");

        let mut request = node.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    method = %method,
                    url = %url,
                    error = %e,
                    infrastructure = true,
                    "NiFi API request failed without a response"
                );
                metrics::record_nifi_request(method.as_str(), "transport", started.elapsed());
                return Err(NifiError::TransportFailure {
                    method: method.to_string(),
                    path: path.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| NifiError::TransportFailure {
                method: method.to_string(),
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        metrics::record_nifi_request(method.as_str(), status_class(status), started.elapsed());

        match classify_response(&method, path, status, text, version) {
            Ok(body) => {
                debug!(method = %method, url = %url, status = status, "NiFi API response");
                Ok(body)
            }
            Err(e) if e.is_not_found() => {
                debug!(method = %method, url = %url, status = status, "NiFi entity not found");
                Err(e)
            }
            Err(e) => {
                warn!(method = %method, url = %url, status = status, error = %e, "NiFi API request failed");
                Err(e)
            }
        }
    }

    async fn execute_get<T: DeserializeOwned>(&self, node: &HttpNode, path: &str) -> NifiResult<T> {
        let body = retry_nifi_read(
            || self.execute::<()>(node, Method::GET, path, None, None),
            path,
        )
        .await?;
        decode(path, &body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> NifiResult<T> {
        let node = self.privileged()?;
        self.execute_get(node, path).await
    }

    async fn post<B, T>(&self, path: &str, body: Option<&B>) -> NifiResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let node = self.privileged()?;
        let text = self.execute(node, Method::POST, path, body, None).await?;
        decode(path, &text)
    }

    async fn put<B, T>(&self, path: &str, body: &B, version: Option<i64>) -> NifiResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let node = self.privileged()?;
        let text = self.execute(node, Method::PUT, path, Some(body), version).await?;
        decode(path, &text)
    }

    async fn delete(&self, path: &str, token: &RevisionToken) -> NifiResult<()> {
        let node = self.privileged()?;
        let path = format!("{path}?version={}", token.version);
        self.execute::<()>(node, Method::DELETE, &path, None, Some(token.version))
            .await
            .map(|_| ())
    }

    async fn set_node_status(&self, node_id: i32, status: &str) -> NifiResult<NodeEntity> {
        let nifi_id = self.nifi_node_id(node_id)?;
        let node = self.select(self.topology.privileged_except(node_id))?;
        let path = format!("/controller/cluster/nodes/{nifi_id}");
        let body = json!({ "node": { "nodeId": nifi_id, "status": status } });
        let text = self
            .execute(node, Method::PUT, &path, Some(&body), None)
            .await?;
        decode(&path, &text)
    }
}

/// Create body: a scratch revision at version 0 plus the component.
fn create_body<C: Serialize>(component: &C) -> serde_json::Value {
    json!({ "revision": RevisionDto::default(), "component": component })
}

/// Update body: the token revision plus the component, id forced to the token id.
fn update_body<C: Serialize>(token: &RevisionToken, component: &C) -> serde_json::Value {
    let mut component = serde_json::to_value(component).unwrap_or_else(|_| json!({}));
    if let Some(obj) = component.as_object_mut() {
        obj.insert("id".to_string(), json!(token.id));
    }
    json!({ "id": token.id, "revision": token.revision(), "component": component })
}

fn run_status_body(token: &RevisionToken, state: &str) -> RunStatusEntity {
    RunStatusEntity {
        revision: token.revision(),
        state: state.to_string(),
    }
}

#[async_trait]
impl ClusterApi for NifiClient {
    async fn describe_cluster(&self) -> NifiResult<ClusterEntity> {
        self.get("/controller/cluster").await
    }

    async fn get_cluster_node(&self, node_id: i32) -> NifiResult<NodeEntity> {
        let nifi_id = self.nifi_node_id(node_id)?;
        let node = self.select(self.topology.privileged_except(node_id))?;
        self.execute_get(node, &format!("/controller/cluster/nodes/{nifi_id}"))
            .await
    }

    async fn connect_cluster_node(&self, node_id: i32) -> NifiResult<NodeEntity> {
        self.set_node_status(node_id, NODE_STATUS_CONNECTING).await
    }

    async fn disconnect_cluster_node(&self, node_id: i32) -> NifiResult<NodeEntity> {
        self.set_node_status(node_id, NODE_STATUS_DISCONNECTING)
            .await
    }

    async fn offload_cluster_node(&self, node_id: i32) -> NifiResult<NodeEntity> {
        self.set_node_status(node_id, NODE_STATUS_OFFLOADING).await
    }

    async fn remove_cluster_node(&self, node_id: i32) -> NifiResult<()> {
        let nifi_id = self.nifi_node_id(node_id)?;
        let node = self.select(self.topology.privileged_except(node_id))?;
        self.execute::<()>(
            node,
            Method::DELETE,
            &format!("/controller/cluster/nodes/{nifi_id}"),
            None,
            None,
        )
        .await
        .map(|_| ())
    }

    async fn get_controller_config(&self) -> NifiResult<ControllerConfigurationEntity> {
        self.get("/controller/config").await
    }

    async fn update_controller_config(
        &self,
        entity: &ControllerConfigurationEntity,
    ) -> NifiResult<ControllerConfigurationEntity> {
        self.put("/controller/config", entity, Some(entity.revision.version))
            .await
    }
}

#[async_trait]
impl FlowApi for NifiClient {
    async fn get_process_group(&self, id: &str) -> NifiResult<ProcessGroupEntity> {
        self.get(&format!("/process-groups/{id}")).await
    }

    async fn create_process_group(
        &self,
        parent_id: &str,
        component: &ProcessGroupDto,
    ) -> NifiResult<ProcessGroupEntity> {
        let body = create_body(component);
        self.post(
            &format!("/process-groups/{parent_id}/process-groups"),
            Some(&body),
        )
        .await
    }

    async fn update_process_group(
        &self,
        token: &RevisionToken,
        component: &ProcessGroupDto,
    ) -> NifiResult<ProcessGroupEntity> {
        let body = update_body(token, component);
        self.put(
            &format!("/process-groups/{}", token.id),
            &body,
            Some(token.version),
        )
        .await
    }

    async fn remove_process_group(&self, token: &RevisionToken) -> NifiResult<()> {
        self.delete(&format!("/process-groups/{}", token.id), token)
            .await
    }

    async fn get_flow(&self, process_group_id: &str) -> NifiResult<ProcessGroupFlowEntity> {
        self.get(&format!("/flow/process-groups/{process_group_id}"))
            .await
    }

    async fn schedule_process_group(&self, process_group_id: &str, state: &str) -> NifiResult<()> {
        let body = ScheduleComponentsEntity {
            id: process_group_id.to_string(),
            state: state.to_string(),
        };
        self.put::<_, serde_json::Value>(
            &format!("/flow/process-groups/{process_group_id}"),
            &body,
            None,
        )
        .await
        .map(|_| ())
    }

    async fn get_controller_services(
        &self,
        process_group_id: &str,
    ) -> NifiResult<ControllerServicesEntity> {
        self.get(&format!(
            "/flow/process-groups/{process_group_id}/controller-services"
        ))
        .await
    }

    async fn activate_controller_services(
        &self,
        process_group_id: &str,
        state: &str,
    ) -> NifiResult<()> {
        let body = ActivateControllerServicesEntity {
            id: process_group_id.to_string(),
            state: state.to_string(),
        };
        self.put::<_, serde_json::Value>(
            &format!("/flow/process-groups/{process_group_id}/controller-services"),
            &body,
            None,
        )
        .await
        .map(|_| ())
    }

    async fn create_drop_request(&self, connection_id: &str) -> NifiResult<DropRequestEntity> {
        self.post::<(), _>(
            &format!("/flowfile-queues/{connection_id}/drop-requests"),
            None,
        )
        .await
    }

    async fn get_drop_request(
        &self,
        connection_id: &str,
        request_id: &str,
    ) -> NifiResult<DropRequestEntity> {
        self.get(&format!(
            "/flowfile-queues/{connection_id}/drop-requests/{request_id}"
        ))
        .await
    }

    async fn get_version_control_information(
        &self,
        process_group_id: &str,
    ) -> NifiResult<VersionControlInformationEntity> {
        self.get(&format!("/versions/process-groups/{process_group_id}"))
            .await
    }

    async fn create_version_update_request(
        &self,
        process_group_id: &str,
        entity: &VersionControlInformationEntity,
    ) -> NifiResult<VersionedFlowUpdateRequestEntity> {
        self.post(
            &format!("/versions/update-requests/process-groups/{process_group_id}"),
            Some(entity),
        )
        .await
    }

    async fn get_version_update_request(
        &self,
        request_id: &str,
    ) -> NifiResult<VersionedFlowUpdateRequestEntity> {
        self.get(&format!("/versions/update-requests/{request_id}"))
            .await
    }

    async fn create_version_revert_request(
        &self,
        process_group_id: &str,
        entity: &VersionControlInformationEntity,
    ) -> NifiResult<VersionedFlowUpdateRequestEntity> {
        self.post(
            &format!("/versions/revert-requests/process-groups/{process_group_id}"),
            Some(entity),
        )
        .await
    }

    async fn get_version_revert_request(
        &self,
        request_id: &str,
    ) -> NifiResult<VersionedFlowUpdateRequestEntity> {
        self.get(&format!("/versions/revert-requests/{request_id}"))
            .await
    }

    async fn update_processor_run_status(
        &self,
        token: &RevisionToken,
        state: &str,
    ) -> NifiResult<ProcessorEntity> {
        self.put(
            &format!("/processors/{}/run-status", token.id),
            &run_status_body(token, state),
            Some(token.version),
        )
        .await
    }

    async fn update_input_port_run_status(
        &self,
        token: &RevisionToken,
        state: &str,
    ) -> NifiResult<PortEntity> {
        self.put(
            &format!("/input-ports/{}/run-status", token.id),
            &run_status_body(token, state),
            Some(token.version),
        )
        .await
    }
}

#[async_trait]
impl ComponentApi for NifiClient {
    async fn get_registry_client(&self, id: &str) -> NifiResult<RegistryClientEntity> {
        self.get(&format!("/controller/registry-clients/{id}")).await
    }

    async fn create_registry_client(
        &self,
        component: &RegistryClientDto,
    ) -> NifiResult<RegistryClientEntity> {
        let body = create_body(component);
        self.post("/controller/registry-clients", Some(&body)).await
    }

    async fn update_registry_client(
        &self,
        token: &RevisionToken,
        component: &RegistryClientDto,
    ) -> NifiResult<RegistryClientEntity> {
        let body = update_body(token, component);
        self.put(
            &format!("/controller/registry-clients/{}", token.id),
            &body,
            Some(token.version),
        )
        .await
    }

    async fn remove_registry_client(&self, token: &RevisionToken) -> NifiResult<()> {
        self.delete(&format!("/controller/registry-clients/{}", token.id), token)
            .await
    }

    async fn get_flow_versions(
        &self,
        registry_id: &str,
        bucket_id: &str,
        flow_id: &str,
    ) -> NifiResult<VersionedFlowSnapshotMetadataSetEntity> {
        self.get(&format!(
            "/flow/registries/{registry_id}/buckets/{bucket_id}/flows/{flow_id}/versions"
        ))
        .await
    }

    async fn get_reporting_task(&self, id: &str) -> NifiResult<ReportingTaskEntity> {
        self.get(&format!("/reporting-tasks/{id}")).await
    }

    async fn create_reporting_task(
        &self,
        component: &ReportingTaskDto,
    ) -> NifiResult<ReportingTaskEntity> {
        let body = create_body(component);
        self.post("/controller/reporting-tasks", Some(&body)).await
    }

    async fn update_reporting_task(
        &self,
        token: &RevisionToken,
        component: &ReportingTaskDto,
    ) -> NifiResult<ReportingTaskEntity> {
        let body = update_body(token, component);
        self.put(
            &format!("/reporting-tasks/{}", token.id),
            &body,
            Some(token.version),
        )
        .await
    }

    async fn update_reporting_task_run_status(
        &self,
        token: &RevisionToken,
        state: &str,
    ) -> NifiResult<ReportingTaskEntity> {
        self.put(
            &format!("/reporting-tasks/{}/run-status", token.id),
            &run_status_body(token, state),
            Some(token.version),
        )
        .await
    }

    async fn remove_reporting_task(&self, token: &RevisionToken) -> NifiResult<()> {
        self.delete(&format!("/reporting-tasks/{}", token.id), token)
            .await
    }

    async fn get_parameter_context(&self, id: &str) -> NifiResult<ParameterContextEntity> {
        self.get(&format!("/parameter-contexts/{id}")).await
    }

    async fn create_parameter_context(
        &self,
        component: &ParameterContextDto,
    ) -> NifiResult<ParameterContextEntity> {
        let body = create_body(component);
        self.post("/parameter-contexts", Some(&body)).await
    }

    async fn create_parameter_context_update_request(
        &self,
        token: &RevisionToken,
        component: &ParameterContextDto,
    ) -> NifiResult<ParameterContextUpdateRequestEntity> {
        let body = update_body(token, component);
        let path = format!("/parameter-contexts/{}/update-requests", token.id);
        let node = self.privileged()?;
        let text = self
            .execute(node, Method::POST, &path, Some(&body), Some(token.version))
            .await?;
        decode(&path, &text)
    }

    async fn get_parameter_context_update_request(
        &self,
        context_id: &str,
        request_id: &str,
    ) -> NifiResult<ParameterContextUpdateRequestEntity> {
        self.get(&format!(
            "/parameter-contexts/{context_id}/update-requests/{request_id}"
        ))
        .await
    }

    async fn remove_parameter_context(&self, token: &RevisionToken) -> NifiResult<()> {
        self.delete(&format!("/parameter-contexts/{}", token.id), token)
            .await
    }
}

#[async_trait]
impl TenantApi for NifiClient {
    async fn get_users(&self) -> NifiResult<Vec<UserEntity>> {
        let users: UsersEntity = self.get("/tenants/users").await?;
        Ok(users.users)
    }

    async fn get_user(&self, id: &str) -> NifiResult<UserEntity> {
        self.get(&format!("/tenants/users/{id}")).await
    }

    async fn create_user(&self, component: &UserDto) -> NifiResult<UserEntity> {
        let body = create_body(component);
        self.post("/tenants/users", Some(&body)).await
    }

    async fn update_user(
        &self,
        token: &RevisionToken,
        component: &UserDto,
    ) -> NifiResult<UserEntity> {
        let body = update_body(token, component);
        self.put(
            &format!("/tenants/users/{}", token.id),
            &body,
            Some(token.version),
        )
        .await
    }

    async fn remove_user(&self, token: &RevisionToken) -> NifiResult<()> {
        self.delete(&format!("/tenants/users/{}", token.id), token)
            .await
    }

    async fn get_user_groups(&self) -> NifiResult<Vec<UserGroupEntity>> {
        let groups: UserGroupsEntity = self.get("/tenants/user-groups").await?;
        Ok(groups.user_groups)
    }

    async fn get_user_group(&self, id: &str) -> NifiResult<UserGroupEntity> {
        self.get(&format!("/tenants/user-groups/{id}")).await
    }

    async fn create_user_group(&self, component: &UserGroupDto) -> NifiResult<UserGroupEntity> {
        let body = create_body(component);
        self.post("/tenants/user-groups", Some(&body)).await
    }

    async fn update_user_group(
        &self,
        token: &RevisionToken,
        component: &UserGroupDto,
    ) -> NifiResult<UserGroupEntity> {
        let body = update_body(token, component);
        self.put(
            &format!("/tenants/user-groups/{}", token.id),
            &body,
            Some(token.version),
        )
        .await
    }

    async fn remove_user_group(&self, token: &RevisionToken) -> NifiResult<()> {
        self.delete(&format!("/tenants/user-groups/{}", token.id), token)
            .await
    }

    async fn get_access_policy(
        &self,
        action: &str,
        resource: &str,
    ) -> NifiResult<AccessPolicyEntity> {
        let resource = resource.trim_start_matches('/');
        self.get(&format!("/policies/{action}/{resource}")).await
    }

    async fn create_access_policy(
        &self,
        component: &AccessPolicyDto,
    ) -> NifiResult<AccessPolicyEntity> {
        let body = create_body(component);
        self.post("/policies", Some(&body)).await
    }

    async fn update_access_policy(
        &self,
        token: &RevisionToken,
        component: &AccessPolicyDto,
    ) -> NifiResult<AccessPolicyEntity> {
        let body = update_body(token, component);
        self.put(
            &format!("/policies/{}", token.id),
            &body,
            Some(token.version),
        )
        .await
    }

    async fn remove_access_policy(&self, token: &RevisionToken) -> NifiResult<()> {
        self.delete(&format!("/policies/{}", token.id), token)
            .await
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
