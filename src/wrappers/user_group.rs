// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! NiFi user-group synchronization.
//!
//! A group is in sync when its identity matches and its members are exactly the
//! remote ids of the referenced users. Policy membership is reconciled as a set
//! after the group itself, see [`reconcile_membership`].

use std::collections::BTreeSet;

use kube::ResourceExt;
use tracing::{debug, info};

use super::access_policy::{reconcile_membership, Tenant};
use super::{found, stored_id, with_conflict_retry};
use crate::crd::NifiUserGroup;
use crate::errors::SyncResult;
use crate::nifi::types::{RevisionToken, TenantEntity, UserGroupDto, UserGroupEntity, Versioned};
use crate::nifi::TenantApi;

fn members(user_ids: &[String]) -> Vec<TenantEntity> {
    let unique: BTreeSet<&String> = user_ids.iter().collect();
    unique.into_iter().map(TenantEntity::reference).collect()
}

fn is_sync(entity: &UserGroupEntity, identity: &str, user_ids: &[String]) -> bool {
    let remote: BTreeSet<&str> = entity
        .component
        .users
        .iter()
        .map(|u| u.id.as_str())
        .collect();
    let declared: BTreeSet<&str> = user_ids.iter().map(String::as_str).collect();
    entity.component.identity == identity && remote == declared
}

/// True when the stored id designates a live remote group.
pub async fn exists<A: TenantApi + ?Sized>(api: &A, id: Option<&str>) -> SyncResult<bool> {
    let Some(id) = stored_id(id) else {
        return Ok(false);
    };
    Ok(found(api.get_user_group(id).await)?.is_some())
}

async fn create_entity<A: TenantApi + ?Sized>(
    api: &A,
    group: &NifiUserGroup,
    user_ids: &[String],
) -> SyncResult<UserGroupEntity> {
    let entity = api
        .create_user_group(&UserGroupDto {
            identity: group.identity(),
            users: members(user_ids),
            ..Default::default()
        })
        .await?;
    info!(
        name = %group.name_any(),
        id = %entity.id,
        members = user_ids.len(),
        "Created NiFi user group"
    );
    Ok(entity)
}

/// Create the remote group with the given member user ids.
pub async fn create<A: TenantApi + ?Sized>(
    api: &A,
    group: &NifiUserGroup,
    user_ids: &[String],
) -> SyncResult<RevisionToken> {
    Ok(create_entity(api, group, user_ids).await?.token())
}

/// Bring the remote group, its members and its policy membership in line with the
/// declared spec.
///
/// `user_ids` are the remote ids of the referenced users.
pub async fn sync<A: TenantApi + ?Sized>(
    api: &A,
    group: &NifiUserGroup,
    user_ids: &[String],
    root_process_group_id: Option<&str>,
) -> SyncResult<RevisionToken> {
    let entity =
        with_conflict_retry("sync_user_group", || sync_members(api, group, user_ids)).await?;
    reconcile_membership(
        api,
        Tenant::Group(&entity.id),
        &entity.component.access_policies,
        &group.spec.access_policies,
        root_process_group_id,
    )
    .await?;
    Ok(entity.token())
}

async fn sync_members<A: TenantApi + ?Sized>(
    api: &A,
    group: &NifiUserGroup,
    user_ids: &[String],
) -> SyncResult<UserGroupEntity> {
    let id = stored_id(group.status.as_ref().and_then(|s| s.id.as_deref()));
    let current = match id {
        Some(id) => found(api.get_user_group(id).await)?,
        None => None,
    };
    let Some(entity) = current else {
        return create_entity(api, group, user_ids).await;
    };

    let identity = group.identity();
    if is_sync(&entity, &identity, user_ids) {
        debug!(id = %entity.id, "NiFi user group already in sync");
        return Ok(entity);
    }

    let mut component = entity.component.clone();
    component.identity = identity;
    component.users = members(user_ids);
    let updated = api.update_user_group(&entity.token(), &component).await?;
    info!(
        name = %group.name_any(),
        id = %updated.id,
        version = updated.revision.version,
        members = user_ids.len(),
        "Updated NiFi user group"
    );
    Ok(updated)
}

/// Delete the remote group; absent is success.
pub async fn remove<A: TenantApi + ?Sized>(api: &A, id: Option<&str>) -> SyncResult<()> {
    let Some(id) = stored_id(id) else {
        return Ok(());
    };
    with_conflict_retry("remove_user_group", || async move {
        let Some(entity) = found(api.get_user_group(id).await)? else {
            return Ok(());
        };
        api.remove_user_group(&entity.token()).await?;
        info!(id, "Removed NiFi user group");
        Ok(())
    })
    .await
}

#[cfg(test)]
#[path = "user_group_tests.rs"]
mod user_group_tests;
