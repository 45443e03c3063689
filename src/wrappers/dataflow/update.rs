// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Bringing a drifted process group back to its declared flow.
//!
//! The steps below run on every call and each one either completes or returns a
//! pending condition; progress is read back from NiFi and from `status`, so an
//! interrupted sync resumes where it stopped:
//!
//! 1. wait for a running update or revert request
//! 2. rebind the parameter context
//! 3. clear the queues per the update strategy
//! 4. submit an update request, or a revert request when only local edits differ

use tracing::{debug, info, warn};

use super::{bound_context_id, desired_coordinates, parameter_context, process_group_id, queues};
use super::{FlowBinding, FlowCoordinates};
use crate::crd::{DataflowUpdateRequestType, NifiDataflow, NifiDataflowStatus};
use crate::errors::{AsyncCondition, SyncError, SyncResult};
use crate::nifi::types::Versioned;
use crate::nifi::types::{
    ProcessGroupEntity, VersionControlInformationEntity, VersionedFlowUpdateRequestEntity,
};
use crate::nifi::{ComponentApi, FlowApi};
use crate::wrappers::jobs::{update_request_status, JobState, RemoteJob};
use crate::wrappers::{found, with_conflict_retry};

fn settle(state: JobState) -> SyncResult<()> {
    match state {
        JobState::Submitted | JobState::Polling => {
            Err(SyncError::Pending(AsyncCondition::FlowUpdateRequestRunning))
        }
        JobState::Finished => Ok(()),
        JobState::Failed(reason) => Err(SyncError::Invalid(format!(
            "flow version change failed: {reason}"
        ))),
    }
}

async fn poll_latest_request<A: FlowApi + ?Sized>(
    api: &A,
    status: &mut NifiDataflowStatus,
) -> SyncResult<()> {
    let Some(latest) = status
        .latest_update_request
        .as_ref()
        .filter(|r| r.job_state().is_running())
    else {
        return Ok(());
    };

    let (kind, request_id) = (latest.r#type, latest.id.clone());
    let polled = match kind {
        DataflowUpdateRequestType::Update => api.get_version_update_request(&request_id).await,
        DataflowUpdateRequestType::Revert => api.get_version_revert_request(&request_id).await,
    };
    let Some(request) = found(polled)? else {
        debug!(request = %request_id, "Update request expired");
        status.latest_update_request = None;
        return Ok(());
    };

    let snapshot = update_request_status(kind, &request.request);
    let state = snapshot.job_state();
    status.latest_update_request = Some(snapshot);
    if let JobState::Failed(reason) = &state {
        warn!(request = %request_id, reason = %reason, "Flow version change failed");
    }
    settle(state)
}

/// Rebind the process group to the declared parameter context.
///
/// Returns `true` when an update was made.
async fn rebind_parameter_context<A: FlowApi + ?Sized>(
    api: &A,
    id: &str,
    binding: &FlowBinding,
) -> SyncResult<bool> {
    with_conflict_retry("rebind_parameter_context", || async move {
        let group = api.get_process_group(id).await?;
        if bound_context_id(&group.component) == binding.parameter_context_id.as_deref() {
            return Ok(false);
        }
        let mut component = group.component.clone();
        // NiFi unbinds a context given as an empty reference.
        component.parameter_context = Some(parameter_context(binding).unwrap_or_default());
        api.update_process_group(&group.token(), &component).await?;
        info!(
            id,
            context = binding.parameter_context_id.as_deref().unwrap_or("none"),
            "Rebound parameter context"
        );
        Ok(true)
    })
    .await
}

async fn submit<A: FlowApi + ?Sized>(
    api: &A,
    group: &ProcessGroupEntity,
    kind: DataflowUpdateRequestType,
    coordinates: &FlowCoordinates,
) -> SyncResult<VersionedFlowUpdateRequestEntity> {
    let entity = VersionControlInformationEntity {
        process_group_revision: group.revision.clone(),
        version_control_information: coordinates.to_vci(Some(group.id.clone())),
    };
    let request = match kind {
        DataflowUpdateRequestType::Update => {
            api.create_version_update_request(&group.id, &entity).await?
        }
        DataflowUpdateRequestType::Revert => {
            api.create_version_revert_request(&group.id, &entity).await?
        }
    };
    Ok(request)
}

/// Bring the process group in line with the declared flow.
///
/// `Ok` means the group matches the declaration. `status` records drop and update
/// request progress and must be persisted whether or not an error is returned.
pub async fn sync<A: FlowApi + ComponentApi + ?Sized>(
    api: &A,
    dataflow: &NifiDataflow,
    binding: &FlowBinding,
    status: &mut NifiDataflowStatus,
) -> SyncResult<()> {
    let id = process_group_id(status)
        .map(ToString::to_string)
        .ok_or_else(|| SyncError::Invalid("dataflow has no process group".to_string()))?;

    poll_latest_request(api, status).await?;

    if rebind_parameter_context(api, &id, binding).await? {
        return Err(SyncError::Pending(AsyncCondition::FlowSyncing));
    }

    let coordinates = desired_coordinates(api, dataflow, binding).await?;
    let current = found(api.get_version_control_information(&id).await)?
        .map(|vci| vci.version_control_information);
    let kind = match &current {
        Some(vci) if coordinates.matches(vci) && !vci.is_locally_modified() => {
            debug!(id = %id, version = coordinates.version, "Process group matches the declared flow");
            return Ok(());
        }
        Some(vci) if coordinates.matches(vci) => DataflowUpdateRequestType::Revert,
        _ => DataflowUpdateRequestType::Update,
    };

    queues::clear(api, dataflow.spec.update_strategy, &id, status).await?;

    // The revision moved while the queues were cleared.
    let group = api.get_process_group(&id).await?;
    let request = submit(api, &group, kind, &coordinates).await?;
    let snapshot = update_request_status(kind, &request.request);
    info!(
        id = %id,
        request = %snapshot.id,
        kind = ?kind,
        version = coordinates.version,
        "Submitted flow version change"
    );
    let state = snapshot.job_state();
    status.latest_update_request = Some(snapshot);
    settle(state)
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod update_tests;
