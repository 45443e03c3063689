// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! NiFi REST API entity representations.
//!
//! Only the fields the operator reads or writes are modelled; everything else NiFi
//! returns is ignored on decode. Every struct decodes from partial payloads
//! (`#[serde(default)]`) because NiFi omits empty collections and null fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{
    CLUSTER_COORDINATOR_ROLE, NODE_STATUS_CONNECTED, VCI_LOCALLY_MODIFIED,
    VCI_LOCALLY_MODIFIED_AND_STALE,
};

// ============================================================================
// Revisions
// ============================================================================

/// Revision of a remote entity as carried on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RevisionDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub version: i64,
}

/// Compare-and-swap token for updates and deletes: the entity id plus the revision
/// version it was last read at.
///
/// NiFi rejects an update or delete whose version does not match the current one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionToken {
    pub id: String,
    pub version: i64,
}

impl RevisionToken {
    #[must_use]
    pub fn new(id: impl Into<String>, version: i64) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// Wire revision for this token.
    #[must_use]
    pub fn revision(&self) -> RevisionDto {
        RevisionDto {
            client_id: None,
            version: self.version,
        }
    }
}

/// Remote entities that carry an id and a revision.
pub trait Versioned {
    fn entity_id(&self) -> &str;
    fn revision(&self) -> &RevisionDto;

    /// Token used to update or delete the entity as it was read.
    fn token(&self) -> RevisionToken {
        RevisionToken::new(self.entity_id(), self.revision().version)
    }
}

macro_rules! versioned {
    ($($entity:ty),+ $(,)?) => {
        $(
            impl Versioned for $entity {
                fn entity_id(&self) -> &str {
                    &self.id
                }
                fn revision(&self) -> &RevisionDto {
                    &self.revision
                }
            }
        )+
    };
}

// ============================================================================
// Cluster
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterEntity {
    pub cluster: ClusterDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterDto {
    pub nodes: Vec<NodeDto>,
    pub generated: Option<String>,
}

/// One node of the cluster topology as described by NiFi.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeDto {
    pub node_id: String,
    pub address: String,
    pub api_port: i32,
    pub status: String,
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_thread_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued: Option<String>,
}

impl NodeDto {
    /// `address:apiPort`, the form node URIs are matched against.
    #[must_use]
    pub fn host_listener(&self) -> String {
        format!("{}:{}", self.address, self.api_port)
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == NODE_STATUS_CONNECTED
    }

    #[must_use]
    pub fn is_coordinator(&self) -> bool {
        self.roles.iter().any(|r| r == CLUSTER_COORDINATOR_ROLE)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeEntity {
    pub node: NodeDto,
}

// ============================================================================
// Registry clients
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryClientEntity {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub revision: RevisionDto,
    pub component: RegistryClientDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryClientDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub uri: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionedFlowSnapshotMetadataSetEntity {
    pub versioned_flow_snapshot_metadata_set: Vec<VersionedFlowSnapshotMetadataEntity>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionedFlowSnapshotMetadataEntity {
    pub versioned_flow_snapshot_metadata: VersionedFlowSnapshotMetadata,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionedFlowSnapshotMetadata {
    pub bucket_identifier: String,
    pub flow_identifier: String,
    pub version: i32,
}

// ============================================================================
// Process groups and flows
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessGroupEntity {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub revision: RevisionDto,
    pub component: ProcessGroupDto,
    pub running_count: i32,
    pub stopped_count: i32,
    pub invalid_count: i32,
    pub disabled_count: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessGroupDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_group_id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_control_information: Option<VersionControlInformationDto>,
    pub parameter_context: Option<ParameterContextReferenceEntity>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PositionDto {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionControlInformationDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub registry_id: String,
    pub bucket_id: String,
    pub flow_id: String,
    pub version: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl VersionControlInformationDto {
    /// True when the deployed flow was edited in the NiFi UI.
    #[must_use]
    pub fn is_locally_modified(&self) -> bool {
        matches!(
            self.state.as_deref(),
            Some(VCI_LOCALLY_MODIFIED | VCI_LOCALLY_MODIFIED_AND_STALE)
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionControlInformationEntity {
    pub process_group_revision: RevisionDto,
    pub version_control_information: VersionControlInformationDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterContextReferenceEntity {
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<ParameterContextReferenceDto>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterContextReferenceDto {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessGroupFlowEntity {
    pub process_group_flow: ProcessGroupFlowDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessGroupFlowDto {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub parent_group_id: Option<String>,
    pub flow: FlowDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowDto {
    pub process_groups: Vec<ProcessGroupEntity>,
    pub connections: Vec<ConnectionEntity>,
    pub processors: Vec<ProcessorEntity>,
    pub input_ports: Vec<PortEntity>,
}

impl FlowDto {
    /// Processors no connection points at: the components that feed the flow.
    #[must_use]
    pub fn source_processors(&self) -> Vec<&ProcessorEntity> {
        self.processors
            .iter()
            .filter(|p| {
                !self
                    .connections
                    .iter()
                    .any(|c| c.destination_id.as_deref() == Some(p.id.as_str()))
            })
            .collect()
    }

    /// Connections that still hold flowfiles.
    #[must_use]
    pub fn queued_connections(&self) -> Vec<&ConnectionEntity> {
        self.connections
            .iter()
            .filter(|c| c.status.aggregate_snapshot.flow_files_queued > 0)
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionEntity {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub source_id: Option<String>,
    pub destination_id: Option<String>,
    pub status: ConnectionStatusDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionStatusDto {
    pub aggregate_snapshot: ConnectionStatusSnapshotDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionStatusSnapshotDto {
    pub flow_files_queued: i64,
    pub bytes_queued: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessorEntity {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub revision: RevisionDto,
    pub component: ProcessorDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessorDto {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub state: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortEntity {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub revision: RevisionDto,
    pub component: PortDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortDto {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub state: String,
}

/// Body of a run-status change for processors, ports and reporting tasks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunStatusEntity {
    pub revision: RevisionDto,
    pub state: String,
}

/// Body of a schedule-components request on a process group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleComponentsEntity {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub state: String,
}

/// Body of an activate-controller-services request on a process group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivateControllerServicesEntity {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub state: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerServicesEntity {
    pub controller_services: Vec<ControllerServiceEntity>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerServiceEntity {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub parent_group_id: Option<String>,
    pub component: ControllerServiceDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerServiceDto {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub state: String,
    pub validation_status: Option<String>,
}

// ============================================================================
// Asynchronous requests
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DropRequestEntity {
    pub drop_request: DropRequestDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DropRequestDto {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub uri: String,
    pub submission_time: Option<String>,
    pub last_updated: Option<String>,
    pub percent_completed: i32,
    pub finished: bool,
    pub failure_reason: Option<String>,
    pub current_count: i64,
    pub current_size: i64,
    pub current: Option<String>,
    pub original_count: i64,
    pub original_size: i64,
    pub original: Option<String>,
    pub dropped_count: i64,
    pub dropped_size: i64,
    pub dropped: Option<String>,
    pub state: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionedFlowUpdateRequestEntity {
    pub process_group_revision: Option<RevisionDto>,
    pub request: VersionedFlowUpdateRequestDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionedFlowUpdateRequestDto {
    pub request_id: String,
    pub process_group_id: Option<String>,
    pub uri: String,
    pub last_updated: Option<String>,
    pub complete: bool,
    pub failure_reason: Option<String>,
    pub percent_completed: i32,
    pub state: Option<String>,
}

// ============================================================================
// Parameter contexts
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterContextEntity {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub revision: RevisionDto,
    pub component: ParameterContextDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterContextDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterEntity>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterEntity {
    pub parameter: ParameterDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterDto {
    pub name: String,
    pub description: Option<String>,
    pub sensitive: bool,
    pub value: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterContextUpdateRequestEntity {
    pub parameter_context_revision: Option<RevisionDto>,
    pub request: ParameterContextUpdateRequestDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParameterContextUpdateRequestDto {
    pub request_id: String,
    pub uri: String,
    pub last_updated: Option<String>,
    pub complete: bool,
    pub failure_reason: Option<String>,
    pub percent_completed: i32,
    pub state: Option<String>,
}

// ============================================================================
// Tenants and policies
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantEntity {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<TenantDto>,
}

impl TenantEntity {
    #[must_use]
    pub fn reference(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            component: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantDto {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub identity: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserEntity {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub revision: RevisionDto,
    pub component: UserDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub identity: String,
    pub user_groups: Vec<TenantEntity>,
    pub access_policies: Vec<AccessPolicySummaryEntity>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsersEntity {
    pub users: Vec<UserEntity>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserGroupEntity {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub revision: RevisionDto,
    pub component: UserGroupDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserGroupDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub identity: String,
    pub users: Vec<TenantEntity>,
    pub access_policies: Vec<AccessPolicySummaryEntity>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserGroupsEntity {
    pub user_groups: Vec<UserGroupEntity>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessPolicySummaryEntity {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub component: AccessPolicySummaryDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessPolicySummaryDto {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub resource: String,
    pub action: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessPolicyEntity {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub revision: RevisionDto,
    pub component: AccessPolicyDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessPolicyDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub resource: String,
    pub action: String,
    pub users: Vec<TenantEntity>,
    pub user_groups: Vec<TenantEntity>,
}

// ============================================================================
// Reporting tasks and controller configuration
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportingTaskEntity {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub revision: RevisionDto,
    pub component: ReportingTaskDto,
    pub status: ReportingTaskStatusDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportingTaskDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub properties: BTreeMap<String, Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportingTaskStatusDto {
    pub run_status: Option<String>,
    pub validation_status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfigurationEntity {
    pub revision: RevisionDto,
    pub component: ControllerConfigurationDto,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfigurationDto {
    pub max_timer_driven_thread_count: i32,
}

versioned!(
    RegistryClientEntity,
    ProcessGroupEntity,
    ProcessorEntity,
    PortEntity,
    ParameterContextEntity,
    UserEntity,
    UserGroupEntity,
    AccessPolicyEntity,
    ReportingTaskEntity,
);
