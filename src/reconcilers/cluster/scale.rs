// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Graceful node scaling.
//!
//! Every node recorded in the cluster status carries a [`GracefulActionState`].
//! A declared node missing from status is added; a recorded node missing from the
//! spec is marked for downscale. Each pass then moves every node as far as NiFi
//! lets it:
//!
//! - upscale: `Required -> Running (CONNECTING) -> Succeeded` once NiFi reports the
//!   node `CONNECTED`
//! - downscale: `DISCONNECTING -> DISCONNECTED -> OFFLOADING -> OFFLOADED ->
//!   POD_REMOVING -> POD_REMOVED -> REMOVING -> REMOVED`, after which the node is
//!   dropped from status
//!
//! A node that is waiting on NiFi or on its pod makes the pass pending.

use chrono::Utc;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::pods::NodePods;
use crate::constants::{NODE_STATUS_DISCONNECTED, NODE_STATUS_OFFLOADED};
use crate::crd::{
    ActionStep, GracefulActionState, GracefulState, NifiCluster, NifiClusterStatus, NodeState,
};
use crate::errors::{AsyncCondition, SyncError, SyncResult};
use crate::events::{self, reasons, EventPublisher};
use crate::nifi::types::NodeDto;
use crate::nifi::NifiApi;
use crate::wrappers::found;

/// Record declared nodes missing from status and mark undeclared ones for removal.
///
/// Nodes declared while the cluster is still initializing are part of the
/// bootstrap and need no graceful upscale.
///
/// Returns true when `status` changed.
pub fn init_node_states(cluster: &NifiCluster, status: &mut NifiClusterStatus) -> bool {
    let initializing = status.state.is_initializing();
    let declared: BTreeSet<String> = cluster
        .spec
        .nodes
        .iter()
        .map(|n| n.id.to_string())
        .collect();
    let mut changed = false;

    for id in &declared {
        if status.nodes_state.contains_key(id) {
            continue;
        }
        let action_state = if initializing {
            GracefulState::GracefulUpscaleSucceeded
        } else {
            GracefulState::GracefulUpscaleRequired
        };
        debug!(node = %id, ?action_state, "Recording declared node");
        status.nodes_state.insert(
            id.clone(),
            NodeState {
                graceful_action_state: GracefulActionState {
                    action_state,
                    ..Default::default()
                },
                init_cluster_node: initializing,
                ..Default::default()
            },
        );
        changed = true;
    }

    for (id, node) in &mut status.nodes_state {
        let graceful = &mut node.graceful_action_state;
        if declared.contains(id) || graceful.action_state.is_downscale() {
            continue;
        }
        info!(node = %id, "Node no longer declared, scheduling graceful downscale");
        *graceful = GracefulActionState {
            action_state: GracefulState::GracefulDownscaleRequired,
            ..Default::default()
        };
        changed = true;
    }
    changed
}

/// True while any node is waiting for or going through a scale operation.
#[must_use]
pub fn is_scaling(status: &NifiClusterStatus) -> bool {
    status.nodes_state.values().any(|n| {
        let state = n.graceful_action_state.action_state;
        state.is_required() || state.is_running()
    })
}

/// Where one step left a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Progress {
    /// Moved to a new step; try the next one right away
    Advanced,
    /// Waiting on NiFi or Kubernetes
    Waiting,
    /// Operation finished
    Done,
}

fn enter(graceful: &mut GracefulActionState, step: ActionStep) -> Progress {
    debug!(?step, "Node entering scale step");
    graceful.action_step = Some(step);
    graceful.task_started = Some(Utc::now().to_rfc3339());
    graceful.error_message = None;
    Progress::Advanced
}

async fn node(api: &dyn NifiApi, node_id: i32) -> SyncResult<Option<NodeDto>> {
    Ok(found(api.get_cluster_node(node_id).await)?.map(|entity| entity.node))
}

async fn upscale_step(
    api: &dyn NifiApi,
    node_id: i32,
    graceful: &mut GracefulActionState,
) -> SyncResult<Progress> {
    if graceful.action_state.is_required() {
        graceful.action_state = graceful.action_state.running();
        return Ok(enter(graceful, ActionStep::Connecting));
    }

    let Some(current) = node(api, node_id).await? else {
        debug!(node_id, "Node has not joined the cluster yet");
        return Ok(Progress::Waiting);
    };
    if current.is_connected() {
        graceful.action_state = graceful.action_state.complete();
        enter(graceful, ActionStep::Connected);
        return Ok(Progress::Done);
    }
    if current.status == NODE_STATUS_DISCONNECTED {
        let connected = api.connect_cluster_node(node_id).await?.node;
        if connected.is_connected() {
            return Ok(Progress::Advanced);
        }
    }
    Ok(Progress::Waiting)
}

async fn downscale_step(
    api: &dyn NifiApi,
    pods: &dyn NodePods,
    cluster: &NifiCluster,
    node_id: i32,
    graceful: &mut GracefulActionState,
) -> SyncResult<Progress> {
    let Some(step) = graceful
        .action_step
        .filter(|_| !graceful.action_state.is_required())
    else {
        let disconnected = found(api.disconnect_cluster_node(node_id).await)?;
        graceful.action_state = graceful.action_state.running();
        return Ok(match disconnected {
            Some(_) => enter(graceful, ActionStep::Disconnecting),
            // Not part of the cluster any more: only the pod is left.
            None => enter(graceful, ActionStep::Offloaded),
        });
    };
    let progress = match step {
        ActionStep::Disconnecting => match node(api, node_id).await? {
            None => enter(graceful, ActionStep::Offloaded),
            Some(n) if n.status == NODE_STATUS_DISCONNECTED => {
                enter(graceful, ActionStep::Disconnected)
            }
            Some(_) => Progress::Waiting,
        },
        ActionStep::Disconnected => match found(api.offload_cluster_node(node_id).await)? {
            Some(_) => enter(graceful, ActionStep::Offloading),
            None => enter(graceful, ActionStep::Offloaded),
        },
        ActionStep::Offloading => match node(api, node_id).await? {
            None => enter(graceful, ActionStep::Offloaded),
            Some(n) if n.status == NODE_STATUS_OFFLOADED => {
                enter(graceful, ActionStep::Offloaded)
            }
            Some(_) => Progress::Waiting,
        },
        ActionStep::Offloaded => {
            pods.delete(cluster, node_id).await?;
            enter(graceful, ActionStep::PodRemoving)
        }
        ActionStep::PodRemoving => {
            if pods.exists(cluster, node_id).await? {
                Progress::Waiting
            } else {
                enter(graceful, ActionStep::PodRemoved)
            }
        }
        ActionStep::PodRemoved => {
            found(api.remove_cluster_node(node_id).await)?;
            enter(graceful, ActionStep::Removing)
        }
        ActionStep::Removing => match node(api, node_id).await? {
            None => enter(graceful, ActionStep::Removed),
            Some(_) => Progress::Waiting,
        },
        ActionStep::Removed => {
            graceful.action_state = graceful.action_state.complete();
            Progress::Done
        }
        // Connect steps left over from an interrupted upscale.
        ActionStep::Connecting | ActionStep::Connected => {
            graceful.action_step = None;
            Progress::Advanced
        }
    };
    Ok(progress)
}

async fn scale_node(
    api: &dyn NifiApi,
    pods: &dyn NodePods,
    events: &dyn EventPublisher,
    cluster: &NifiCluster,
    node_id: i32,
    graceful: &mut GracefulActionState,
) -> SyncResult<Progress> {
    let upscale = graceful.action_state.is_upscale();
    let direction = if upscale { "upscale" } else { "downscale" };

    if graceful.action_state.is_required() {
        events::normal(
            events,
            cluster,
            reasons::SCALING,
            format!("Starting graceful {direction} of node {node_id}"),
        )
        .await;
    }

    loop {
        let step = if upscale {
            upscale_step(api, node_id, graceful).await
        } else {
            downscale_step(api, pods, cluster, node_id, graceful).await
        };
        match step {
            Ok(Progress::Advanced) => {}
            Ok(Progress::Waiting) => return Ok(Progress::Waiting),
            Ok(Progress::Done) => {
                info!(node_id, direction, "Graceful scale finished");
                events::normal(
                    events,
                    cluster,
                    reasons::SCALING,
                    format!("Graceful {direction} of node {node_id} finished"),
                )
                .await;
                return Ok(Progress::Done);
            }
            Err(e) => {
                warn!(node_id, direction, error = %e, "Graceful scale step failed");
                graceful.error_message = Some(e.to_string());
                return Err(e);
            }
        }
    }
}

/// Drive every recorded node one pass through its scale operation.
///
/// Nodes that finished downscaling are dropped from `status`.
///
/// # Errors
///
/// Remote and pod failures. [`SyncError::Pending`] with
/// [`AsyncCondition::NodeScaling`] while any node is still waiting.
pub async fn scale_nodes(
    api: &dyn NifiApi,
    pods: &dyn NodePods,
    events: &dyn EventPublisher,
    cluster: &NifiCluster,
    status: &mut NifiClusterStatus,
) -> SyncResult<()> {
    let mut waiting = false;
    let mut removed = Vec::new();

    for (key, node) in &mut status.nodes_state {
        let graceful = &mut node.graceful_action_state;
        if graceful.action_state.is_succeeded() {
            if graceful.action_state.is_downscale() {
                removed.push(key.clone());
            }
            continue;
        }
        let Ok(node_id) = key.parse::<i32>() else {
            warn!(node = %key, "Dropping node state with a non-numeric id");
            removed.push(key.clone());
            continue;
        };
        match scale_node(api, pods, events, cluster, node_id, graceful).await? {
            Progress::Waiting => waiting = true,
            Progress::Done if graceful.action_state.is_downscale() => removed.push(key.clone()),
            Progress::Done | Progress::Advanced => {}
        }
    }

    for key in removed {
        status.nodes_state.remove(&key);
    }

    if waiting {
        Err(SyncError::Pending(AsyncCondition::NodeScaling))
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[path = "scale_tests.rs"]
mod scale_tests;
