// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `NifiCluster` reconciliation.
//!
//! The operator does not deploy NiFi; it drives an existing cluster:
//!
//! 1. **PKI** - issue the cluster CA and controller certificate (managed TLS clusters)
//! 2. **Nodes** - record declared nodes and run graceful scale operations
//! 3. **Root process group** - record its id once known
//! 4. **Reporting task** - keep the managed Prometheus reporting task in line with
//!    `metricsPort`
//! 5. **State** - move the cluster through its lifecycle states
//!
//! ## Module Structure
//!
//! - [`pods`] - Node pod deletion
//! - [`scale`] - Graceful upscale and downscale

pub mod pods;
pub mod scale;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use pods::{KubeNodePods, NodePods};
use scale::{init_node_states, is_scaling, scale_nodes};

use super::finalizers::{ensure_finalizers, is_deleting, pending, remove_finalizers};
use super::status::KubeStatusWriter;
use super::ReconcilePass;
use crate::constants::{KIND_NIFI_CLUSTER, ROOT_PROCESS_GROUP_ALIAS};
use crate::context::Context;
use crate::crd::{ClusterState, NifiCluster, NifiClusterStatus, ReportingTaskStatus};
use crate::errors::{ReconcileError, SyncResult};
use crate::events::{self, reasons, EventPublisher};
use crate::labels::{FINALIZER_CLUSTER_PKI, FINALIZER_CLUSTER_REPORTING_TASK};
use crate::metrics;
use crate::nifi::NifiApi;
use crate::pki::PkiManager;
use crate::wrappers::reporting_task;

const OBLIGATIONS: &[&str] = &[FINALIZER_CLUSTER_REPORTING_TASK, FINALIZER_CLUSTER_PKI];

/// Resource type of the managed reporting task in metrics.
const REPORTING_TASK: &str = "ReportingTask";

/// True when the operator issues the certificates of this cluster.
#[must_use]
pub fn manages_pki(cluster: &NifiCluster) -> bool {
    !cluster.spec.is_external() && cluster.spec.use_ssl()
}

/// Finalizers the cluster needs, given its spec and status.
#[must_use]
pub fn obligations(cluster: &NifiCluster) -> Vec<&'static str> {
    let has_task = cluster
        .status
        .as_ref()
        .is_some_and(|s| s.prometheus_reporting_task.is_some());
    let mut obligations = Vec::new();
    if cluster.spec.metrics_port.is_some() || has_task {
        obligations.push(FINALIZER_CLUSTER_REPORTING_TASK);
    }
    if manages_pki(cluster) {
        obligations.push(FINALIZER_CLUSTER_PKI);
    }
    obligations
}

fn with_status(cluster: &NifiCluster, status: &NifiClusterStatus) -> NifiCluster {
    NifiCluster {
        status: Some(status.clone()),
        ..cluster.clone()
    }
}

/// Lifecycle state after a successful pass.
#[must_use]
pub fn next_state(status: &NifiClusterStatus) -> ClusterState {
    if is_scaling(status) {
        ClusterState::ClusterReconciling
    } else if status.state.is_initializing() {
        ClusterState::ClusterInitialized
    } else {
        ClusterState::ClusterRunning
    }
}

async fn record_root_process_group(
    api: &dyn NifiApi,
    cluster: &NifiCluster,
    status: &mut NifiClusterStatus,
) -> SyncResult<()> {
    if let Some(declared) = cluster
        .spec
        .root_process_group_id
        .as_deref()
        .filter(|id| !id.is_empty())
    {
        status.root_process_group_id = Some(declared.to_string());
        return Ok(());
    }
    if status.root_process_group_id.is_none() {
        let root = api.get_process_group(ROOT_PROCESS_GROUP_ALIAS).await?;
        info!(cluster = %cluster.name_any(), id = %root.id, "Recorded root process group");
        status.root_process_group_id = Some(root.id);
    }
    Ok(())
}

/// Create, update or remove the managed Prometheus reporting task.
///
/// # Errors
///
/// Remote failures, and [`crate::errors::SyncError::Pending`] while NiFi validates
/// the task.
pub async fn sync_reporting_task(
    api: &dyn NifiApi,
    events: &dyn EventPublisher,
    cluster: &NifiCluster,
    status: &mut NifiClusterStatus,
) -> SyncResult<()> {
    if cluster.spec.metrics_port.is_none() {
        if status.prometheus_reporting_task.is_some() {
            remove_reporting_task(api, events, cluster, status).await?;
        }
        return Ok(());
    }

    if !reporting_task::exists(api, &with_status(cluster, status)).await? {
        let token = reporting_task::create(api, cluster).await?;
        metrics::record_resource_created(REPORTING_TASK);
        events::normal(
            events,
            cluster,
            reasons::CREATED,
            format!("Created managed Prometheus reporting task {}", token.id),
        )
        .await;
        status.prometheus_reporting_task = Some(ReportingTaskStatus {
            id: token.id,
            version: token.version,
        });
    }

    let token = reporting_task::sync(api, &with_status(cluster, status)).await?;
    status.prometheus_reporting_task = Some(ReportingTaskStatus {
        id: token.id,
        version: token.version,
    });
    Ok(())
}

/// Remove the managed reporting task and forget it.
///
/// # Errors
///
/// Remote failures, after a `RemoveError` event.
pub async fn remove_reporting_task(
    api: &dyn NifiApi,
    events: &dyn EventPublisher,
    cluster: &NifiCluster,
    status: &mut NifiClusterStatus,
) -> SyncResult<()> {
    if let Err(e) = reporting_task::remove(api, &with_status(cluster, status)).await {
        events::warning(
            events,
            cluster,
            reasons::REMOVE_ERROR,
            format!("Failed to remove managed Prometheus reporting task: {e}"),
        )
        .await;
        return Err(e);
    }
    if status.prometheus_reporting_task.take().is_some() {
        metrics::record_resource_deleted(REPORTING_TASK);
        events::normal(
            events,
            cluster,
            reasons::REMOVED,
            "Removed managed Prometheus reporting task".to_string(),
        )
        .await;
    }
    Ok(())
}

/// Drive a connected cluster one pass: nodes, root process group, reporting task
/// and lifecycle state.
///
/// A waiting scale operation does not stop the other steps; its pending error is
/// returned at the end.
///
/// # Errors
///
/// Remote and pod failures, and [`crate::errors::SyncError::Pending`] while nodes
/// scale or the reporting task validates.
pub async fn sync_cluster(
    api: &dyn NifiApi,
    pods: &dyn NodePods,
    events: &dyn EventPublisher,
    cluster: &NifiCluster,
    status: &mut NifiClusterStatus,
) -> SyncResult<()> {
    let scaling = if cluster.spec.is_external() {
        Ok(())
    } else {
        scale_nodes(api, pods, events, cluster, status).await
    };
    if let Err(e) = &scaling {
        if !e.is_pending() {
            return scaling;
        }
    }

    record_root_process_group(api, cluster, status).await?;
    sync_reporting_task(api, events, cluster, status).await?;

    let state = next_state(status);
    if state != status.state {
        info!(cluster = %cluster.name_any(), from = ?status.state, to = ?state, "Cluster state changed");
        status.state = state;
    }
    scaling
}

async fn connect(ctx: &Context, cluster: &NifiCluster) -> SyncResult<Arc<dyn NifiApi>> {
    let config = ctx.config_manager(cluster).build_config(&ctx.client).await?;
    Ok(ctx.factory.connect(&config).await?)
}

async fn reconcile_cluster(
    ctx: &Context,
    pods: &dyn NodePods,
    cluster: &NifiCluster,
    status: &mut NifiClusterStatus,
) -> SyncResult<()> {
    if manages_pki(cluster) {
        PkiManager::for_cluster(cluster)
            .reconcile_pki(&ctx.client)
            .await?;
    }
    if !cluster.spec.is_external() {
        init_node_states(cluster, status);
    }
    // Nodes entering or leaving the cluster must not receive traffic.
    let api = connect(ctx, &with_status(cluster, status)).await?;
    sync_cluster(api.as_ref(), pods, ctx.events.as_ref(), cluster, status).await
}

async fn discharge(
    ctx: &Context,
    cluster: &NifiCluster,
    obligation: &str,
    status: &mut NifiClusterStatus,
) -> SyncResult<()> {
    if obligation == FINALIZER_CLUSTER_PKI {
        if manages_pki(cluster) {
            info!(cluster = %cluster.name_any(), "Removing cluster PKI");
            PkiManager::for_cluster(cluster)
                .finalize_pki(&ctx.client)
                .await?;
        }
        return Ok(());
    }

    if status.prometheus_reporting_task.is_none() {
        return Ok(());
    }
    match connect(ctx, cluster).await {
        Ok(api) => remove_reporting_task(api.as_ref(), ctx.events.as_ref(), cluster, status).await,
        Err(e) => {
            // Nodes already gone take the reporting task with them.
            warn!(cluster = %cluster.name_any(), error = %e, "Cluster unreachable, skipping reporting task removal");
            status.prometheus_reporting_task = None;
            Ok(())
        }
    }
}

/// Reconcile a `NifiCluster`.
///
/// # Errors
///
/// Failures other than pending scale operations, see [`super::conclude`], and
/// Kubernetes API failures patching finalizers.
pub async fn reconcile_nifi_cluster(
    ctx: Arc<Context>,
    cluster: Arc<NifiCluster>,
) -> Result<Action, ReconcileError> {
    let cluster = cluster.as_ref();
    info!(
        namespace = %cluster.namespace().unwrap_or_default(),
        name = %cluster.name_any(),
        "Reconciling NifiCluster"
    );

    let writer = KubeStatusWriter::new(ctx.client.clone());
    let pass = ReconcilePass::new(KIND_NIFI_CLUSTER, &ctx.config, ctx.events.as_ref(), &writer);
    let current = cluster.status.as_ref();
    let mut status = current.cloned().unwrap_or_default();

    if is_deleting(cluster) {
        let obligations = pending(cluster, OBLIGATIONS);
        let mut discharged = Vec::with_capacity(obligations.len());
        for obligation in obligations {
            debug!(obligation, "Discharging cluster obligation");
            if let Err(e) = discharge(&ctx, cluster, obligation, &mut status).await {
                return pass.finish(cluster, current, status, Err(e)).await;
            }
            discharged.push(obligation);
            remove_finalizers(&ctx.client, cluster, &discharged).await?;
        }
        return Ok(Action::await_change());
    }

    ensure_finalizers(&ctx.client, cluster, &obligations(cluster)).await?;

    let pods = KubeNodePods::new(ctx.client.clone());
    let result = reconcile_cluster(&ctx, &pods, cluster, &mut status).await;
    pass.finish(cluster, current, status, result).await
}
