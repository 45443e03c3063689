// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Emptying the queues of a process group before it is changed or removed.

use tracing::{debug, info, warn};

use crate::constants::{COMPONENT_STATE_RUNNING, COMPONENT_STATE_STOPPED};
use crate::crd::{DataflowUpdateStrategy, NifiDataflowStatus};
use crate::errors::{AsyncCondition, SyncError, SyncResult};
use crate::nifi::types::{FlowDto, Versioned};
use crate::nifi::FlowApi;
use crate::wrappers::found;
use crate::wrappers::jobs::{drop_request_status, JobState, RemoteJob};

/// Flows of the process group and all of its descendants, the group itself first.
pub(super) async fn collect_flows<A: FlowApi + ?Sized>(
    api: &A,
    process_group_id: &str,
) -> SyncResult<Vec<FlowDto>> {
    let mut pending = vec![process_group_id.to_string()];
    let mut flows = Vec::new();
    while let Some(id) = pending.pop() {
        let flow = api.get_flow(&id).await?.process_group_flow.flow;
        pending.extend(flow.process_groups.iter().map(|g| g.id.clone()));
        flows.push(flow);
    }
    Ok(flows)
}

/// Clear the queues of the process group according to `strategy`.
///
/// Returns once every connection is empty. Until then a pending condition is
/// returned and the caller retries on a later reconcile.
pub(super) async fn clear<A: FlowApi + ?Sized>(
    api: &A,
    strategy: DataflowUpdateStrategy,
    process_group_id: &str,
    status: &mut NifiDataflowStatus,
) -> SyncResult<()> {
    match strategy {
        DataflowUpdateStrategy::Drop => drop_queues(api, process_group_id, status).await,
        DataflowUpdateStrategy::Drain => drain_queues(api, process_group_id).await,
    }
}

async fn drop_queues<A: FlowApi + ?Sized>(
    api: &A,
    process_group_id: &str,
    status: &mut NifiDataflowStatus,
) -> SyncResult<()> {
    api.schedule_process_group(process_group_id, COMPONENT_STATE_STOPPED)
        .await?;

    if let Some(latest) = status
        .latest_drop_request
        .as_ref()
        .filter(|r| r.job_state().is_running())
    {
        let (connection_id, request_id) = (latest.connection_id.clone(), latest.id.clone());
        match found(api.get_drop_request(&connection_id, &request_id).await)? {
            Some(request) => {
                let snapshot = drop_request_status(&connection_id, &request.drop_request);
                let state = snapshot.job_state();
                status.latest_drop_request = Some(snapshot);
                match state {
                    JobState::Submitted | JobState::Polling => {
                        debug!(
                            connection = %connection_id,
                            request = %request_id,
                            "Drop request still running"
                        );
                        return Err(SyncError::Pending(AsyncCondition::ConnectionDropping));
                    }
                    JobState::Failed(reason) => {
                        warn!(connection = %connection_id, reason = %reason, "Drop request failed");
                    }
                    JobState::Finished => {}
                }
            }
            None => status.latest_drop_request = None,
        }
    }

    for flow in collect_flows(api, process_group_id).await? {
        if let Some(connection) = flow.queued_connections().first() {
            let request = api.create_drop_request(&connection.id).await?;
            info!(
                connection = %connection.id,
                queued = connection.status.aggregate_snapshot.flow_files_queued,
                request = %request.drop_request.id,
                "Dropping queued flowfiles"
            );
            status.latest_drop_request =
                Some(drop_request_status(&connection.id, &request.drop_request));
            return Err(SyncError::Pending(AsyncCondition::ConnectionDropping));
        }
    }
    Ok(())
}

async fn drain_queues<A: FlowApi + ?Sized>(api: &A, process_group_id: &str) -> SyncResult<()> {
    let flows = collect_flows(api, process_group_id).await?;

    for (depth, flow) in flows.iter().enumerate() {
        for processor in flow
            .source_processors()
            .into_iter()
            .filter(|p| p.component.state == COMPONENT_STATE_RUNNING)
        {
            api.update_processor_run_status(&processor.token(), COMPONENT_STATE_STOPPED)
                .await?;
            debug!(processor = %processor.id, "Stopped source processor");
        }
        // Only the ports of the deployed group receive data from outside.
        if depth == 0 {
            for port in flow
                .input_ports
                .iter()
                .filter(|p| p.component.state == COMPONENT_STATE_RUNNING)
            {
                api.update_input_port_run_status(&port.token(), COMPONENT_STATE_STOPPED)
                    .await?;
                debug!(port = %port.id, "Stopped input port");
            }
        }
    }

    let queued: i64 = flows
        .iter()
        .flat_map(FlowDto::queued_connections)
        .map(|c| c.status.aggregate_snapshot.flow_files_queued)
        .sum();
    if queued > 0 {
        debug!(id = process_group_id, queued, "Waiting for queues to drain");
        return Err(SyncError::Pending(AsyncCondition::FlowDraining));
    }
    Ok(())
}
