// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `NifiDataflow` reconciliation.
//!
//! The flow is imported through the referenced registry client and optionally
//! bound to a parameter context. Both must be synchronized and live on the same
//! cluster as the dataflow. The state machine itself is in
//! [`crate::wrappers::dataflow::lifecycle`].

use async_trait::async_trait;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::debug;

use super::dependent::{self, ClusterDependent};
use super::references::{self, ClusterBinding};
use crate::constants::{
    KIND_NIFI_DATAFLOW, KIND_NIFI_PARAMETER_CONTEXT, KIND_NIFI_REGISTRY_CLIENT,
};
use crate::context::Context;
use crate::crd::{
    ClusterReference, DataflowState, NifiDataflow, NifiDataflowStatus, NifiParameterContext,
    NifiRegistryClient,
};
use crate::errors::{AsyncCondition, ReconcileError, SyncError, SyncResult};
use crate::events::EventPublisher;
use crate::labels::FINALIZER_DATAFLOW;
use crate::metrics;
use crate::nifi::NifiApi;
use crate::wrappers::dataflow::lifecycle::{self, Outcome};
use crate::wrappers::dataflow::FlowBinding;

/// Reconcile a `NifiDataflow`.
///
/// A run-once dataflow that already ran is not touched again until it changes or
/// is deleted.
///
/// # Errors
///
/// See [`dependent::reconcile`].
pub async fn reconcile_nifi_dataflow(
    ctx: Arc<Context>,
    dataflow: Arc<NifiDataflow>,
) -> Result<Action, ReconcileError> {
    if is_finished_run_once(&dataflow) {
        debug!(name = %dataflow.name_any(), "Run-once dataflow already ran");
        return Ok(Action::await_change());
    }
    dependent::reconcile(ctx, dataflow).await
}

/// True for a live run-once dataflow whose recorded state is `Ran`.
#[must_use]
pub fn is_finished_run_once(dataflow: &NifiDataflow) -> bool {
    dataflow.spec.run_once
        && dataflow.metadata.deletion_timestamp.is_none()
        && dataflow.status.as_ref().and_then(|s| s.state) == Some(DataflowState::Ran)
}

/// Resolve the remote ids the dataflow deploys against.
///
/// # Errors
///
/// An unsynchronized reference, or one bound to another cluster.
pub fn flow_binding(
    dataflow: &NifiDataflow,
    registry: &NifiRegistryClient,
    parameter_context: Option<&NifiParameterContext>,
    root_process_group_id: &str,
) -> SyncResult<FlowBinding> {
    let namespace = dataflow.namespace().unwrap_or_default();
    let registry_ref = dataflow
        .spec
        .registry_client_ref
        .as_ref()
        .ok_or_else(|| SyncError::Invalid("registryClientRef is required".to_string()))?;

    let registry_namespace = registry.namespace().unwrap_or_else(|| namespace.clone());
    references::ensure_same_cluster(
        &dataflow.spec.cluster_ref,
        &namespace,
        &[(
            KIND_NIFI_REGISTRY_CLIENT,
            &registry.spec.cluster_ref,
            &registry_namespace,
        )],
    )?;
    let registry_id = references::require_remote_id(
        KIND_NIFI_REGISTRY_CLIENT,
        registry_ref,
        &namespace,
        registry.status.as_ref().and_then(|s| s.id.as_deref()),
    )?;

    let parameter_context_id = match (&dataflow.spec.parameter_context_ref, parameter_context) {
        (Some(reference), Some(context)) => {
            let context_namespace = context.namespace().unwrap_or_else(|| namespace.clone());
            references::ensure_same_cluster(
                &dataflow.spec.cluster_ref,
                &namespace,
                &[(
                    KIND_NIFI_PARAMETER_CONTEXT,
                    &context.spec.cluster_ref,
                    &context_namespace,
                )],
            )?;
            Some(references::require_remote_id(
                KIND_NIFI_PARAMETER_CONTEXT,
                reference,
                &namespace,
                context.status.as_ref().and_then(|s| s.id.as_deref()),
            )?)
        }
        _ => None,
    };

    let parent_process_group_id = dataflow
        .spec
        .parent_process_group_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| root_process_group_id.to_string());

    Ok(FlowBinding {
        parent_process_group_id,
        registry_id,
        parameter_context_id,
    })
}

async fn resolve_binding(
    ctx: &Context,
    dataflow: &NifiDataflow,
    cluster: &ClusterBinding,
) -> SyncResult<FlowBinding> {
    let namespace = dataflow.namespace().unwrap_or_default();
    let registry_ref = dataflow
        .spec
        .registry_client_ref
        .as_ref()
        .ok_or_else(|| SyncError::Invalid("registryClientRef is required".to_string()))?;
    let registry: NifiRegistryClient = references::get(
        &ctx.client,
        KIND_NIFI_REGISTRY_CLIENT,
        registry_ref,
        &namespace,
    )
    .await?;
    let parameter_context: Option<NifiParameterContext> =
        match &dataflow.spec.parameter_context_ref {
            Some(reference) => Some(
                references::get(
                    &ctx.client,
                    KIND_NIFI_PARAMETER_CONTEXT,
                    reference,
                    &namespace,
                )
                .await?,
            ),
            None => None,
        };
    let root = cluster.root_process_group_id().await?;
    flow_binding(dataflow, &registry, parameter_context.as_ref(), &root)
}

/// Run one lifecycle pass of the dataflow.
///
/// Detected drift is reported as pending so the correction runs on the short
/// interval.
///
/// # Errors
///
/// Lifecycle failures, and [`SyncError::Pending`] while remote work is running.
pub async fn sync_dataflow(
    api: &dyn NifiApi,
    events: &dyn EventPublisher,
    dataflow: &NifiDataflow,
    binding: &FlowBinding,
    status: &mut NifiDataflowStatus,
) -> SyncResult<()> {
    let created = status.process_group_id.is_none();
    let outcome = lifecycle::advance(api, events, dataflow, binding, status).await;
    if created && status.process_group_id.is_some() {
        metrics::record_resource_created(KIND_NIFI_DATAFLOW);
    }
    match outcome? {
        Outcome::OutOfSync => Err(SyncError::Pending(AsyncCondition::FlowSyncing)),
        Outcome::Completed => {
            debug!(name = %dataflow.name_any(), "Dataflow completed");
            Ok(())
        }
        Outcome::Running => Ok(()),
    }
}

/// Remove the deployed process group.
///
/// # Errors
///
/// Removal failures, and [`SyncError::Pending`] while queues empty.
pub async fn remove_dataflow(
    api: &dyn NifiApi,
    events: &dyn EventPublisher,
    dataflow: &NifiDataflow,
    status: &mut NifiDataflowStatus,
) -> SyncResult<()> {
    let deployed = status.process_group_id.is_some();
    lifecycle::finalize(api, events, dataflow, status).await?;
    if deployed {
        metrics::record_resource_deleted(KIND_NIFI_DATAFLOW);
    }
    status.state = None;
    status.latest_update_request = None;
    status.latest_drop_request = None;
    Ok(())
}

#[async_trait]
impl ClusterDependent for NifiDataflow {
    type Status = NifiDataflowStatus;

    const KIND: &'static str = KIND_NIFI_DATAFLOW;
    const OBLIGATIONS: &'static [&'static str] = &[FINALIZER_DATAFLOW];

    fn cluster_ref(&self) -> &ClusterReference {
        &self.spec.cluster_ref
    }

    fn current_status(&self) -> Option<&Self::Status> {
        self.status.as_ref()
    }

    async fn sync(
        &self,
        ctx: &Context,
        binding: &ClusterBinding,
        status: &mut Self::Status,
    ) -> SyncResult<()> {
        let flow = resolve_binding(ctx, self, binding).await?;
        sync_dataflow(binding.api.as_ref(), ctx.events.as_ref(), self, &flow, status).await
    }

    async fn remove(
        &self,
        ctx: &Context,
        binding: &ClusterBinding,
        status: &mut Self::Status,
    ) -> SyncResult<()> {
        remove_dataflow(binding.api.as_ref(), ctx.events.as_ref(), self, status).await
    }
}

#[cfg(test)]
#[path = "dataflow_tests.rs"]
mod dataflow_tests;
