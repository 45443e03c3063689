// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Registry client synchronization.
//!
//! The remote registry client is named after the resource and carries the declared
//! `uri` and `description`.

use kube::ResourceExt;
use tracing::{debug, info};

use super::{found, stored_id, with_conflict_retry};
use crate::crd::NifiRegistryClient;
use crate::errors::SyncResult;
use crate::nifi::types::{RegistryClientDto, RegistryClientEntity, RevisionToken, Versioned};
use crate::nifi::ComponentApi;

/// Remote component built from the declared spec.
#[must_use]
pub fn desired(client: &NifiRegistryClient) -> RegistryClientDto {
    RegistryClientDto {
        id: None,
        name: client.name_any(),
        description: client.spec.description.clone().unwrap_or_default(),
        uri: client.spec.uri.clone(),
    }
}

fn is_sync(entity: &RegistryClientEntity, client: &NifiRegistryClient) -> bool {
    let want = desired(client);
    entity.component.name == want.name
        && entity.component.description == want.description
        && entity.component.uri == want.uri
}

/// True when the stored id designates a live remote registry client.
pub async fn exists<A: ComponentApi + ?Sized>(api: &A, id: Option<&str>) -> SyncResult<bool> {
    let Some(id) = stored_id(id) else {
        return Ok(false);
    };
    Ok(found(api.get_registry_client(id).await)?.is_some())
}

/// Create the remote registry client.
pub async fn create<A: ComponentApi + ?Sized>(
    api: &A,
    client: &NifiRegistryClient,
) -> SyncResult<RevisionToken> {
    let entity = api.create_registry_client(&desired(client)).await?;
    info!(
        name = %client.name_any(),
        id = %entity.id,
        "Created NiFi registry client"
    );
    Ok(entity.token())
}

/// Bring the remote registry client in line with the declared spec.
///
/// Creates it when the stored id is absent remotely.
pub async fn sync<A: ComponentApi + ?Sized>(
    api: &A,
    client: &NifiRegistryClient,
) -> SyncResult<RevisionToken> {
    with_conflict_retry("sync_registry_client", || sync_once(api, client)).await
}

async fn sync_once<A: ComponentApi + ?Sized>(
    api: &A,
    client: &NifiRegistryClient,
) -> SyncResult<RevisionToken> {
    let id = stored_id(client.status.as_ref().and_then(|s| s.id.as_deref()));
    let current = match id {
        Some(id) => found(api.get_registry_client(id).await)?,
        None => None,
    };
    let Some(entity) = current else {
        return create(api, client).await;
    };

    if is_sync(&entity, client) {
        debug!(id = %entity.id, "Registry client already in sync");
        return Ok(entity.token());
    }

    let mut component = desired(client);
    component.id = Some(entity.id.clone());
    let updated = api.update_registry_client(&entity.token(), &component).await?;
    info!(
        name = %client.name_any(),
        id = %updated.id,
        version = updated.revision.version,
        "Updated NiFi registry client"
    );
    Ok(updated.token())
}

/// Delete the remote registry client; absent is success.
pub async fn remove<A: ComponentApi + ?Sized>(api: &A, id: Option<&str>) -> SyncResult<()> {
    let Some(id) = stored_id(id) else {
        return Ok(());
    };
    with_conflict_retry("remove_registry_client", || async move {
        let Some(entity) = found(api.get_registry_client(id).await)? else {
            return Ok(());
        };
        api.remove_registry_client(&entity.token()).await?;
        info!(id, "Removed NiFi registry client");
        Ok(())
    })
    .await
}

#[cfg(test)]
#[path = "registry_client_tests.rs"]
mod registry_client_tests;
