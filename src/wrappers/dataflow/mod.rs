// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Versioned dataflow deployment.
//!
//! A dataflow is a process group under version control, imported from a registry
//! bucket and flow. This module holds the entity operations; the drift correction
//! is in [`update`] and the lifecycle driving both is in [`lifecycle`].
//!
//! Queue clearing before a version change or a removal follows the declared
//! [`DataflowUpdateStrategy`]:
//!
//! - `Drop`: stop every component, then drop the content of every queued connection
//! - `Drain`: stop the source processors and input ports, then wait for the queues
//!   to empty on their own

pub mod lifecycle;
mod queues;
pub mod update;

use kube::ResourceExt;
use tracing::{debug, info};

use super::{found, stored_id, with_conflict_retry};
use crate::constants::{
    COMPONENT_STATE_DISABLED, COMPONENT_STATE_RUNNING, COMPONENT_STATE_STOPPED,
    CONTROLLER_SERVICE_DISABLED, CONTROLLER_SERVICE_ENABLED, VALIDATION_STATUS_INVALID,
};
use crate::crd::{DataflowUpdateStrategy, NifiDataflow, NifiDataflowStatus};
use crate::errors::{AsyncCondition, SyncError, SyncResult};
use crate::nifi::types::{
    ControllerServiceEntity, ParameterContextReferenceEntity, PositionDto, ProcessGroupDto,
    RevisionToken, VersionControlInformationDto, Versioned,
};
use crate::nifi::{ComponentApi, FlowApi};

/// Remote ids a dataflow is bound to, resolved from its references.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowBinding {
    /// Process group the flow is deployed under
    pub parent_process_group_id: String,
    /// Registry client the flow is imported from
    pub registry_id: String,
    pub parameter_context_id: Option<String>,
}

/// Registry coordinates the process group should track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowCoordinates {
    pub registry_id: String,
    pub bucket_id: String,
    pub flow_id: String,
    pub version: i32,
}

impl FlowCoordinates {
    fn matches(&self, vci: &VersionControlInformationDto) -> bool {
        vci.registry_id == self.registry_id
            && vci.bucket_id == self.bucket_id
            && vci.flow_id == self.flow_id
            && vci.version == self.version
    }

    fn to_vci(&self, group_id: Option<String>) -> VersionControlInformationDto {
        VersionControlInformationDto {
            group_id,
            registry_id: self.registry_id.clone(),
            bucket_id: self.bucket_id.clone(),
            flow_id: self.flow_id.clone(),
            version: self.version,
            state: None,
        }
    }
}

/// Coordinates of the declared flow, resolving "latest" against the registry.
pub async fn desired_coordinates<A: ComponentApi + ?Sized>(
    api: &A,
    dataflow: &NifiDataflow,
    binding: &FlowBinding,
) -> SyncResult<FlowCoordinates> {
    let spec = &dataflow.spec;
    let version = match spec.pinned_version() {
        Some(version) => version,
        None => latest_version(api, &binding.registry_id, &spec.bucket_id, &spec.flow_id).await?,
    };
    Ok(FlowCoordinates {
        registry_id: binding.registry_id.clone(),
        bucket_id: spec.bucket_id.clone(),
        flow_id: spec.flow_id.clone(),
        version,
    })
}

async fn latest_version<A: ComponentApi + ?Sized>(
    api: &A,
    registry_id: &str,
    bucket_id: &str,
    flow_id: &str,
) -> SyncResult<i32> {
    api.get_flow_versions(registry_id, bucket_id, flow_id)
        .await?
        .versioned_flow_snapshot_metadata_set
        .iter()
        .map(|m| m.versioned_flow_snapshot_metadata.version)
        .max()
        .ok_or_else(|| {
            SyncError::Invalid(format!(
                "flow {flow_id} in bucket {bucket_id} has no version in the registry"
            ))
        })
}

fn process_group_id(status: &NifiDataflowStatus) -> Option<&str> {
    stored_id(status.process_group_id.as_deref())
}

fn parameter_context(binding: &FlowBinding) -> Option<ParameterContextReferenceEntity> {
    binding
        .parameter_context_id
        .as_ref()
        .map(|id| ParameterContextReferenceEntity {
            id: Some(id.clone()),
            component: None,
        })
}

fn bound_context_id(group: &ProcessGroupDto) -> Option<&str> {
    group
        .parameter_context
        .as_ref()
        .and_then(|pc| pc.id.as_deref())
}

/// True when the recorded process group still exists.
pub async fn exists<A: FlowApi + ?Sized>(api: &A, status: &NifiDataflowStatus) -> SyncResult<bool> {
    let Some(id) = process_group_id(status) else {
        return Ok(false);
    };
    Ok(found(api.get_process_group(id).await)?.is_some())
}

/// Import the declared flow as a new process group under version control.
pub async fn create<A: FlowApi + ComponentApi + ?Sized>(
    api: &A,
    dataflow: &NifiDataflow,
    binding: &FlowBinding,
) -> SyncResult<RevisionToken> {
    let coordinates = desired_coordinates(api, dataflow, binding).await?;
    let component = ProcessGroupDto {
        name: dataflow.name_any(),
        position: Some(PositionDto::default()),
        version_control_information: Some(coordinates.to_vci(None)),
        parameter_context: parameter_context(binding),
        ..Default::default()
    };
    let entity = api
        .create_process_group(&binding.parent_process_group_id, &component)
        .await?;
    info!(
        name = %dataflow.name_any(),
        id = %entity.id,
        parent = %binding.parent_process_group_id,
        bucket = %coordinates.bucket_id,
        flow = %coordinates.flow_id,
        version = coordinates.version,
        "Created NiFi dataflow process group"
    );
    Ok(entity.token())
}

/// True when the deployed process group diverges from the declaration.
///
/// Drift is a different registry binding or version, a different parameter
/// context, or local edits made in the NiFi UI.
pub async fn is_out_of_sync<A: FlowApi + ComponentApi + ?Sized>(
    api: &A,
    dataflow: &NifiDataflow,
    binding: &FlowBinding,
    status: &NifiDataflowStatus,
) -> SyncResult<bool> {
    let id = process_group_id(status)
        .ok_or_else(|| SyncError::Invalid("dataflow has no process group".to_string()))?;

    let group = api.get_process_group(id).await?;
    if bound_context_id(&group.component) != binding.parameter_context_id.as_deref() {
        debug!(id, "Parameter context binding changed");
        return Ok(true);
    }

    let Some(vci) = found(api.get_version_control_information(id).await)? else {
        debug!(id, "Process group is not under version control");
        return Ok(true);
    };
    let vci = vci.version_control_information;
    if vci.is_locally_modified() {
        debug!(id, "Process group was modified locally");
        return Ok(true);
    }

    let coordinates = desired_coordinates(api, dataflow, binding).await?;
    Ok(!coordinates.matches(&vci))
}

fn is_service_settled(service: &ControllerServiceEntity, target: &str) -> bool {
    let c = &service.component;
    c.state == target
        || (c.state == CONTROLLER_SERVICE_DISABLED
            && c.validation_status.as_deref() == Some(VALIDATION_STATUS_INVALID))
}

/// Enable controller services, then start the components of the process group.
///
/// Each step is asynchronous in NiFi: a request is sent and the matching pending
/// condition returned, and the next call checks that the step took effect before
/// moving on. Invalid services and disabled or invalid processors are ignored.
pub async fn schedule<A: FlowApi + ?Sized>(api: &A, process_group_id: &str) -> SyncResult<()> {
    let services = api.get_controller_services(process_group_id).await?;
    if services
        .controller_services
        .iter()
        .any(|s| !is_service_settled(s, CONTROLLER_SERVICE_ENABLED))
    {
        api.activate_controller_services(process_group_id, CONTROLLER_SERVICE_ENABLED)
            .await?;
        info!(id = process_group_id, "Enabling controller services");
        return Err(SyncError::Pending(
            AsyncCondition::FlowControllerServiceScheduling,
        ));
    }

    let flow = api.get_flow(process_group_id).await?.process_group_flow.flow;
    let idle = flow
        .processors
        .iter()
        .filter(|p| {
            p.component.state != COMPONENT_STATE_RUNNING
                && p.component.state != COMPONENT_STATE_DISABLED
        })
        .count();
    if idle > 0 {
        api.schedule_process_group(process_group_id, COMPONENT_STATE_RUNNING)
            .await?;
        info!(id = process_group_id, idle, "Starting process group components");
        return Err(SyncError::Pending(AsyncCondition::FlowScheduling));
    }

    debug!(id = process_group_id, "Process group running");
    Ok(())
}

async fn disable_controller_services<A: FlowApi + ?Sized>(
    api: &A,
    process_group_id: &str,
) -> SyncResult<()> {
    let services = api.get_controller_services(process_group_id).await?;
    if services
        .controller_services
        .iter()
        .all(|s| s.component.state == CONTROLLER_SERVICE_DISABLED)
    {
        return Ok(());
    }
    api.activate_controller_services(process_group_id, CONTROLLER_SERVICE_DISABLED)
        .await?;
    info!(id = process_group_id, "Disabling controller services");
    Err(SyncError::Pending(
        AsyncCondition::FlowControllerServiceScheduling,
    ))
}

/// Tear the process group down: clear its queues, stop it, disable its controller
/// services and delete it.
///
/// Safe to call on a half-created flow. An absent process group is success. Drop
/// request progress is recorded in `status`.
pub async fn remove<A: FlowApi + ?Sized>(
    api: &A,
    strategy: DataflowUpdateStrategy,
    status: &mut NifiDataflowStatus,
) -> SyncResult<()> {
    let Some(id) = process_group_id(status).map(ToString::to_string) else {
        return Ok(());
    };
    if found(api.get_process_group(&id).await)?.is_none() {
        debug!(id = %id, "Process group already removed");
        return Ok(());
    }

    queues::clear(api, strategy, &id, status).await?;
    api.schedule_process_group(&id, COMPONENT_STATE_STOPPED)
        .await?;
    disable_controller_services(api, &id).await?;

    let id = id.as_str();
    with_conflict_retry("remove_process_group", || async move {
        let Some(group) = found(api.get_process_group(id).await)? else {
            return Ok(());
        };
        api.remove_process_group(&group.token()).await?;
        Ok(())
    })
    .await?;
    info!(id, "Removed NiFi dataflow process group");
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
