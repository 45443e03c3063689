// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `NifiUserGroup` reconciliation.
//!
//! Members are the referenced `NifiUser` resources. Each must be synchronized
//! (its remote id recorded) and bound to the same cluster as the group.

use async_trait::async_trait;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;

use super::dependent::{self, ClusterDependent};
use super::references::{self, ClusterBinding};
use crate::constants::{KIND_NIFI_USER, KIND_NIFI_USER_GROUP};
use crate::context::Context;
use crate::crd::{ClusterReference, NifiUser, NifiUserGroup, RemoteEntityStatus};
use crate::errors::{ReconcileError, SyncResult};
use crate::events::{self, reasons, EventPublisher};
use crate::labels::FINALIZER_USER_GROUP;
use crate::metrics;
use crate::nifi::NifiApi;
use crate::wrappers::user_group;

/// Reconcile a `NifiUserGroup`.
///
/// # Errors
///
/// See [`dependent::reconcile`].
pub async fn reconcile_nifi_user_group(
    ctx: Arc<Context>,
    group: Arc<NifiUserGroup>,
) -> Result<Action, ReconcileError> {
    dependent::reconcile(ctx, group).await
}

/// Remote ids of the group members, in declaration order.
///
/// # Errors
///
/// A member that is missing, not yet synchronized, or bound to another cluster.
pub fn member_ids(group: &NifiUserGroup, members: &[NifiUser]) -> SyncResult<Vec<String>> {
    let namespace = group.namespace().unwrap_or_default();
    let mut ids = Vec::with_capacity(members.len());
    for (reference, member) in group.spec.users_ref.iter().zip(members) {
        let member_namespace = member.namespace().unwrap_or_else(|| namespace.clone());
        references::ensure_same_cluster(
            &group.spec.cluster_ref,
            &namespace,
            &[(KIND_NIFI_USER, &member.spec.cluster_ref, &member_namespace)],
        )?;
        let id = references::require_remote_id(
            KIND_NIFI_USER,
            reference,
            &namespace,
            member.status.as_ref().and_then(|s| s.id.as_deref()),
        )?;
        ids.push(id);
    }
    Ok(ids)
}

async fn read_members(ctx: &Context, group: &NifiUserGroup) -> SyncResult<Vec<NifiUser>> {
    let namespace = group.namespace().unwrap_or_default();
    let mut members = Vec::with_capacity(group.spec.users_ref.len());
    for reference in &group.spec.users_ref {
        members.push(
            references::get::<NifiUser>(&ctx.client, KIND_NIFI_USER, reference, &namespace)
                .await?,
        );
    }
    Ok(members)
}

/// Create or update the remote group, its members and its access policies.
///
/// # Errors
///
/// Remote failures, after a warning event.
pub async fn sync_user_group(
    api: &dyn NifiApi,
    events: &dyn EventPublisher,
    group: &NifiUserGroup,
    user_ids: &[String],
    root_process_group_id: Option<&str>,
    status: &mut RemoteEntityStatus,
) -> SyncResult<()> {
    let name = group.name_any();
    let existed = user_group::exists(api, status.id.as_deref()).await?;

    if !existed {
        events::normal(
            events,
            group,
            reasons::CREATING,
            format!("Creating user group {name}"),
        )
        .await;
        let token = match user_group::create(api, group, user_ids).await {
            Ok(token) => token,
            Err(e) => {
                events::warning(
                    events,
                    group,
                    reasons::CREATION_FAILED,
                    format!("Failed to create user group {name}: {e}"),
                )
                .await;
                return Err(e);
            }
        };
        metrics::record_resource_created(KIND_NIFI_USER_GROUP);
        events::normal(
            events,
            group,
            reasons::CREATED,
            format!("Created user group {name} with id {}", token.id),
        )
        .await;
        status.id = Some(token.id);
        status.version = token.version;
    }

    let view = NifiUserGroup {
        status: Some(status.clone()),
        ..group.clone()
    };
    let token = match user_group::sync(api, &view, user_ids, root_process_group_id).await {
        Ok(token) => token,
        Err(e) => {
            events::warning(
                events,
                group,
                reasons::SYNCHRONIZING_FAILED,
                format!("Failed to synchronize user group {name}: {e}"),
            )
            .await;
            return Err(e);
        }
    };
    if existed && token.version != status.version {
        events::normal(
            events,
            group,
            reasons::SYNCHRONIZED,
            format!(
                "Synchronized user group {name} with {} members",
                user_ids.len()
            ),
        )
        .await;
    }
    status.id = Some(token.id);
    status.version = token.version;
    Ok(())
}

/// Remove the remote group and forget its id.
///
/// # Errors
///
/// Remote failures, after a `RemoveError` event.
pub async fn remove_user_group(
    api: &dyn NifiApi,
    events: &dyn EventPublisher,
    group: &NifiUserGroup,
    status: &mut RemoteEntityStatus,
) -> SyncResult<()> {
    let name = group.name_any();
    events::normal(
        events,
        group,
        reasons::REMOVING,
        format!("Removing user group {name}"),
    )
    .await;
    if let Err(e) = user_group::remove(api, status.id.as_deref()).await {
        events::warning(
            events,
            group,
            reasons::REMOVE_ERROR,
            format!("Failed to remove user group {name}: {e}"),
        )
        .await;
        return Err(e);
    }
    metrics::record_resource_deleted(KIND_NIFI_USER_GROUP);
    events::normal(
        events,
        group,
        reasons::REMOVED,
        format!("Removed user group {name}"),
    )
    .await;
    status.id = None;
    status.version = 0;
    Ok(())
}

#[async_trait]
impl ClusterDependent for NifiUserGroup {
    type Status = RemoteEntityStatus;

    const KIND: &'static str = KIND_NIFI_USER_GROUP;
    const OBLIGATIONS: &'static [&'static str] = &[FINALIZER_USER_GROUP];

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
        let members = read_members(ctx, self).await?;
        let user_ids = member_ids(self, &members)?;
        let root = binding.root_process_group_id().await?;
        sync_user_group(
            binding.api.as_ref(),
            ctx.events.as_ref(),
            self,
            &user_ids,
            Some(&root),
            status,
        )
        .await
    }

    async fn remove(
        &self,
        ctx: &Context,
        binding: &ClusterBinding,
        status: &mut Self::Status,
    ) -> SyncResult<()> {
        remove_user_group(binding.api.as_ref(), ctx.events.as_ref(), self, status).await
    }
}

#[cfg(test)]
#[path = "user_group_tests.rs"]
mod user_group_tests;
