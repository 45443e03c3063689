// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconcile loop shared by every resource that lives on a `NifiCluster`.
//!
//! Registry clients, parameter contexts, users, user groups and dataflows all go
//! through the same pass:
//!
//! 1. **Delete** - when a deletion timestamp is set, discharge every pending
//!    obligation against the cluster and remove its finalizer
//! 2. **Guard** - add the finalizers of the resource
//! 3. **Migrate** - when `clusterRef` changed since the last bind, remove the
//!    remote entity from the previous cluster and forget its ids
//! 4. **Synchronize** - resolve the cluster and run the kind-specific sync
//! 5. **Bind** - label the resource with its cluster and record the reference
//! 6. **Finish** - persist status, emit events, choose the requeue
//!
//! A kind plugs in by implementing [`ClusterDependent`].

use async_trait::async_trait;
use kube::core::NamespaceResourceScope;
use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info};

use super::finalizers::{ensure_finalizers, is_deleting, pending, remove_finalizers};
use super::references::{
    bind_to_cluster, connect_cluster, previous_cluster, removal_target, ClusterBinding,
};
use super::status::{ConditionedStatus, KubeStatusWriter};
use super::ReconcilePass;
use crate::context::Context;
use crate::crd::ClusterReference;
use crate::errors::{ReconcileError, SyncResult};

/// A resource whose remote entity lives on the cluster named by its `clusterRef`.
#[async_trait]
pub trait ClusterDependent:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + DeserializeOwned
    + Send
    + Sync
{
    type Status: ConditionedStatus;

    /// Kind name used in logs, metrics and events.
    const KIND: &'static str;

    /// Every finalizer the kind may carry, in discharge order.
    const OBLIGATIONS: &'static [&'static str];

    fn cluster_ref(&self) -> &ClusterReference;

    fn current_status(&self) -> Option<&Self::Status>;

    /// Finalizers this resource needs, given its spec.
    fn obligations(&self) -> &'static [&'static str] {
        Self::OBLIGATIONS
    }

    /// Create or update the remote entity on `binding`.
    async fn sync(
        &self,
        ctx: &Context,
        binding: &ClusterBinding,
        status: &mut Self::Status,
    ) -> SyncResult<()>;

    /// Remove the remote entity from `binding` and forget its ids in `status`.
    async fn remove(
        &self,
        ctx: &Context,
        binding: &ClusterBinding,
        status: &mut Self::Status,
    ) -> SyncResult<()>;

    /// Discharge one obligation. `target` is `None` when the cluster is gone.
    async fn discharge(
        &self,
        ctx: &Context,
        _obligation: &str,
        target: Option<&ClusterBinding>,
        status: &mut Self::Status,
    ) -> SyncResult<()> {
        match target {
            Some(binding) => self.remove(ctx, binding, status).await,
            None => Ok(()),
        }
    }
}

/// Run one reconcile pass of a cluster dependent.
///
/// # Errors
///
/// Failures other than pending remote jobs and an unready cluster, see
/// [`super::conclude`], and Kubernetes API failures patching metadata.
pub async fn reconcile<K: ClusterDependent>(
    ctx: Arc<Context>,
    resource: Arc<K>,
) -> Result<Action, ReconcileError> {
    let resource = resource.as_ref();
    let namespace = resource.namespace().unwrap_or_default();
    info!(kind = K::KIND, %namespace, name = %resource.name_any(), "Reconciling");

    let writer = KubeStatusWriter::new(ctx.client.clone());
    let pass = ReconcilePass::new(K::KIND, &ctx.config, ctx.events.as_ref(), &writer);
    let current = resource.current_status();
    let mut status = current.cloned().unwrap_or_default();

    if is_deleting(resource) {
        let obligations = pending(resource, K::OBLIGATIONS);
        if obligations.is_empty() {
            return Ok(Action::await_change());
        }
        let target = match removal_target(&ctx, resource.cluster_ref(), &namespace).await {
            Ok(target) => target,
            Err(e) => return pass.finish(resource, current, status, Err(e)).await,
        };
        let mut discharged = Vec::with_capacity(obligations.len());
        for obligation in obligations {
            debug!(kind = K::KIND, obligation, "Discharging obligation");
            if let Err(e) = resource
                .discharge(&ctx, obligation, target.as_ref(), &mut status)
                .await
            {
                return pass.finish(resource, current, status, Err(e)).await;
            }
            discharged.push(obligation);
            remove_finalizers(&ctx.client, resource, &discharged).await?;
        }
        info!(kind = K::KIND, name = %resource.name_any(), "Finalized");
        return Ok(Action::await_change());
    }

    ensure_finalizers(&ctx.client, resource, resource.obligations()).await?;

    let result = synchronize(&ctx, resource, &mut status).await;
    let binding = result.as_ref().ok().cloned();
    let action = pass
        .finish(resource, current, status, result.map(|_| ()))
        .await?;
    if let Some(binding) = binding {
        bind_to_cluster(&ctx.client, resource, &binding, resource.cluster_ref()).await?;
    }
    Ok(action)
}

async fn synchronize<K: ClusterDependent>(
    ctx: &Context,
    resource: &K,
    status: &mut K::Status,
) -> SyncResult<ClusterBinding> {
    let namespace = resource.namespace().unwrap_or_default();
    let cluster_ref = resource.cluster_ref();

    if let Some(previous) = previous_cluster(resource.meta(), cluster_ref, &namespace) {
        info!(
            kind = K::KIND,
            name = %resource.name_any(),
            from = %previous,
            to = %cluster_ref.resolved(&namespace),
            "Cluster reference changed, removing from previous cluster"
        );
        if let Some(old) = removal_target(ctx, &previous, &namespace).await? {
            resource.remove(ctx, &old, status).await?;
        }
        *status = K::Status::default();
    }

    let binding = connect_cluster(ctx, cluster_ref, &namespace).await?;
    resource.sync(ctx, &binding, status).await?;
    Ok(binding)
}
