// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Dataflow lifecycle: `Created -> Starting -> Ran`, with `OutOfSync -> InSync`
//! entered whenever the deployed process group drifts from its declaration.
//!
//! One call to [`advance`] moves the dataflow as far as it can go. Asynchronous
//! NiFi work surfaces as [`SyncError::Pending`]; the state reached so far is
//! already written to `status`, which the caller persists before requeueing.

use kube::ResourceExt;
use tracing::{debug, info};

use super::{create, exists, is_out_of_sync, remove, schedule, update, FlowBinding};
use crate::crd::{DataflowState, NifiDataflow, NifiDataflowStatus};
use crate::errors::{SyncError, SyncResult};
use crate::events::{self, reasons, EventPublisher};
use crate::nifi::NifiApi;
use crate::wrappers::jobs::RemoteJob;

/// Where one lifecycle pass left the dataflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Running; check for drift again at the normal interval
    Running,
    /// Drift detected; sync on the next pass
    OutOfSync,
    /// A run-once flow ran; nothing left to do
    Completed,
}

async fn set_state(
    events: &dyn EventPublisher,
    dataflow: &NifiDataflow,
    status: &mut NifiDataflowStatus,
    state: DataflowState,
    reason: &str,
    note: String,
) {
    if status.state != Some(state) {
        info!(name = %dataflow.name_any(), from = ?status.state, to = %state, "Dataflow state changed");
        status.state = Some(state);
        events::normal(events, dataflow, reason, note).await;
    }
}

fn job_running(status: &NifiDataflowStatus) -> bool {
    let drop = status.latest_drop_request.as_ref().map(RemoteJob::job_state);
    let update = status.latest_update_request.as_ref().map(RemoteJob::job_state);
    [drop, update]
        .into_iter()
        .flatten()
        .any(|state| state.is_running())
}

/// Record a failed step: pending work is silent, anything else is a warning event.
async fn failed(
    events: &dyn EventPublisher,
    dataflow: &NifiDataflow,
    reason: &str,
    what: &str,
    error: SyncError,
) -> SyncError {
    if error.is_pending() {
        debug!(name = %dataflow.name_any(), condition = %error, "{what} in progress");
    } else {
        events::warning(events, dataflow, reason, format!("{what} failed: {error}")).await;
    }
    error
}

/// Drive the dataflow one pass through its lifecycle.
pub async fn advance(
    api: &dyn NifiApi,
    events: &dyn EventPublisher,
    dataflow: &NifiDataflow,
    binding: &FlowBinding,
    status: &mut NifiDataflowStatus,
) -> SyncResult<Outcome> {
    let run_once = dataflow.spec.run_once;
    if run_once && status.state == Some(DataflowState::Ran) {
        debug!(name = %dataflow.name_any(), "Run-once dataflow already ran");
        return Ok(Outcome::Completed);
    }

    if !exists(api, status).await? {
        events::normal(
            events,
            dataflow,
            reasons::CREATING,
            format!(
                "Creating dataflow from bucket {} flow {}",
                dataflow.spec.bucket_id, dataflow.spec.flow_id
            ),
        )
        .await;
        let token = match create(api, dataflow, binding).await {
            Ok(token) => token,
            Err(e) => return Err(failed(events, dataflow, reasons::CREATION_FAILED, "Creation", e).await),
        };
        status.process_group_id = Some(token.id.clone());
        status.latest_update_request = None;
        status.latest_drop_request = None;
        status.state = None;
        set_state(
            events,
            dataflow,
            status,
            DataflowState::Created,
            reasons::CREATED,
            format!("Created process group {}", token.id),
        )
        .await;
    }

    if status.state == Some(DataflowState::OutOfSync) {
        if !job_running(status) {
            events::normal(
                events,
                dataflow,
                reasons::SYNCHRONIZING,
                "Synchronizing dataflow".to_string(),
            )
            .await;
        }
        if let Err(e) = update::sync(api, dataflow, binding, status).await {
            return Err(failed(events, dataflow, reasons::SYNCHRONIZING_FAILED, "Synchronization", e).await);
        }
        set_state(
            events,
            dataflow,
            status,
            DataflowState::InSync,
            reasons::SYNCHRONIZED,
            "Dataflow synchronized".to_string(),
        )
        .await;
    }

    if is_out_of_sync(api, dataflow, binding, status).await? {
        info!(name = %dataflow.name_any(), "Dataflow out of sync");
        status.state = Some(DataflowState::OutOfSync);
        return Ok(Outcome::OutOfSync);
    }

    let starting = matches!(
        status.state,
        None | Some(DataflowState::Created | DataflowState::Starting | DataflowState::InSync)
    );
    // A running flow is rescheduled in place so stopped components come back.
    let rescheduling = status.state == Some(DataflowState::Ran) && !run_once;
    if starting || rescheduling {
        let id = status.process_group_id.clone().unwrap_or_default();
        if starting {
            set_state(
                events,
                dataflow,
                status,
                DataflowState::Starting,
                reasons::STARTING,
                format!("Starting process group {id}"),
            )
            .await;
        }
        if let Err(e) = schedule(api, &id).await {
            return Err(failed(events, dataflow, reasons::STARTING_FAILED, "Start", e).await);
        }
        set_state(
            events,
            dataflow,
            status,
            DataflowState::Ran,
            reasons::RAN,
            format!("Process group {id} running"),
        )
        .await;
    }

    Ok(if run_once {
        Outcome::Completed
    } else {
        Outcome::Running
    })
}

/// Remove the deployed process group, if any.
pub async fn finalize(
    api: &dyn NifiApi,
    events: &dyn EventPublisher,
    dataflow: &NifiDataflow,
    status: &mut NifiDataflowStatus,
) -> SyncResult<()> {
    if !exists(api, status).await? {
        return Ok(());
    }
    events::normal(
        events,
        dataflow,
        reasons::REMOVING,
        "Removing dataflow process group".to_string(),
    )
    .await;
    if let Err(e) = remove(api, dataflow.spec.update_strategy, status).await {
        return Err(failed(events, dataflow, reasons::REMOVE_ERROR, "Removal", e).await);
    }
    status.process_group_id = None;
    events::normal(
        events,
        dataflow,
        reasons::REMOVED,
        "Dataflow process group removed".to_string(),
    )
    .await;
    Ok(())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod lifecycle_tests;
