// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! NiFi user synchronization.
//!
//! Users are keyed by identity in NiFi, so `create` first looks for an existing user
//! with the declared identity and adopts it instead of creating a duplicate. This
//! covers users created by hand and users whose status was lost.

use kube::ResourceExt;
use tracing::{debug, info};

use super::access_policy::{reconcile_membership, Tenant};
use super::{found, stored_id, with_conflict_retry};
use crate::crd::NifiUser;
use crate::errors::SyncResult;
use crate::nifi::types::{RevisionToken, UserDto, UserEntity, Versioned};
use crate::nifi::TenantApi;

/// True when the stored id designates a live remote user.
pub async fn exists<A: TenantApi + ?Sized>(api: &A, id: Option<&str>) -> SyncResult<bool> {
    let Some(id) = stored_id(id) else {
        return Ok(false);
    };
    Ok(found(api.get_user(id).await)?.is_some())
}

/// Remote user holding `identity`, if any.
pub async fn find_by_identity<A: TenantApi + ?Sized>(
    api: &A,
    identity: &str,
) -> SyncResult<Option<UserEntity>> {
    Ok(api
        .get_users()
        .await?
        .into_iter()
        .find(|u| u.component.identity == identity))
}

async fn create_or_adopt<A: TenantApi + ?Sized>(
    api: &A,
    user: &NifiUser,
) -> SyncResult<UserEntity> {
    let identity = user.identity();
    if let Some(existing) = find_by_identity(api, &identity).await? {
        info!(
            name = %user.name_any(),
            id = %existing.id,
            identity = %identity,
            "Adopted existing NiFi user"
        );
        return Ok(existing);
    }
    let entity = api
        .create_user(&UserDto {
            identity: identity.clone(),
            ..Default::default()
        })
        .await?;
    info!(
        name = %user.name_any(),
        id = %entity.id,
        identity = %identity,
        "Created NiFi user"
    );
    Ok(entity)
}

/// Create the remote user, or adopt one that already holds the identity.
pub async fn create<A: TenantApi + ?Sized>(api: &A, user: &NifiUser) -> SyncResult<RevisionToken> {
    Ok(create_or_adopt(api, user).await?.token())
}

/// Bring the remote user and its policy membership in line with the declared spec.
///
/// `root_process_group_id` resolves process-group policies that name no component.
pub async fn sync<A: TenantApi + ?Sized>(
    api: &A,
    user: &NifiUser,
    root_process_group_id: Option<&str>,
) -> SyncResult<RevisionToken> {
    let entity = with_conflict_retry("sync_user", || sync_identity(api, user)).await?;
    reconcile_membership(
        api,
        Tenant::User(&entity.id),
        &entity.component.access_policies,
        &user.spec.access_policies,
        root_process_group_id,
    )
    .await?;
    Ok(entity.token())
}

async fn sync_identity<A: TenantApi + ?Sized>(
    api: &A,
    user: &NifiUser,
) -> SyncResult<UserEntity> {
    let id = stored_id(user.status.as_ref().and_then(|s| s.id.as_deref()));
    let current = match id {
        Some(id) => found(api.get_user(id).await)?,
        None => None,
    };
    let Some(entity) = current else {
        return create_or_adopt(api, user).await;
    };

    let identity = user.identity();
    if entity.component.identity == identity {
        debug!(id = %entity.id, "NiFi user already in sync");
        return Ok(entity);
    }

    let mut component = entity.component.clone();
    component.identity = identity;
    let updated = api.update_user(&entity.token(), &component).await?;
    info!(
        name = %user.name_any(),
        id = %updated.id,
        version = updated.revision.version,
        "Updated NiFi user"
    );
    Ok(updated)
}

/// Delete the remote user; absent is success.
pub async fn remove<A: TenantApi + ?Sized>(api: &A, id: Option<&str>) -> SyncResult<()> {
    let Some(id) = stored_id(id) else {
        return Ok(());
    };
    with_conflict_retry("remove_user", || async move {
        let Some(entity) = found(api.get_user(id).await)? else {
            return Ok(());
        };
        api.remove_user(&entity.token()).await?;
        info!(id, "Removed NiFi user");
        Ok(())
    })
    .await
}

#[cfg(test)]
#[path = "user_tests.rs"]
mod user_tests;
