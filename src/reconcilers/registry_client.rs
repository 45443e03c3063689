// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `NifiRegistryClient` reconciliation.

use async_trait::async_trait;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::warn;

use super::dependent::{self, ClusterDependent};
use super::references::ClusterBinding;
use crate::constants::KIND_NIFI_REGISTRY_CLIENT;
use crate::context::Context;
use crate::crd::{ClusterReference, NifiRegistryClient, RemoteEntityStatus};
use crate::errors::{ReconcileError, SyncResult};
use crate::events::{self, reasons, EventPublisher};
use crate::labels::FINALIZER_REGISTRY_CLIENT;
use crate::metrics;
use crate::nifi::NifiApi;
use crate::wrappers::registry_client;

/// Reconcile a `NifiRegistryClient`.
///
/// # Errors
///
/// See [`dependent::reconcile`].
pub async fn reconcile_nifi_registry_client(
    ctx: Arc<Context>,
    client: Arc<NifiRegistryClient>,
) -> Result<Action, ReconcileError> {
    dependent::reconcile(ctx, client).await
}

/// Create or update the remote registry client, recording `(id, version)`.
///
/// # Errors
///
/// Remote failures, after a `CreationFailed` or `SynchronizingFailed` event.
pub async fn sync_registry_client(
    api: &dyn NifiApi,
    events: &dyn EventPublisher,
    client: &NifiRegistryClient,
    status: &mut RemoteEntityStatus,
) -> SyncResult<()> {
    let name = client.name_any();
    let existed = registry_client::exists(api, status.id.as_deref()).await?;

    if !existed {
        events::normal(
            events,
            client,
            reasons::CREATING,
            format!("Creating registry client {name}"),
        )
        .await;
        let token = match registry_client::create(api, client).await {
            Ok(token) => token,
            Err(e) => {
                events::warning(
                    events,
                    client,
                    reasons::CREATION_FAILED,
                    format!("Failed to create registry client {name}: {e}"),
                )
                .await;
                return Err(e);
            }
        };
        metrics::record_resource_created(KIND_NIFI_REGISTRY_CLIENT);
        events::normal(
            events,
            client,
            reasons::CREATED,
            format!("Created registry client {name} with id {}", token.id),
        )
        .await;
        status.id = Some(token.id);
        status.version = token.version;
    }

    let view = NifiRegistryClient {
        status: Some(status.clone()),
        ..client.clone()
    };
    let token = match registry_client::sync(api, &view).await {
        Ok(token) => token,
        Err(e) => {
            warn!(name = %name, error = %e, "Failed to synchronize registry client");
            events::warning(
                events,
                client,
                reasons::SYNCHRONIZING_FAILED,
                format!("Failed to synchronize registry client {name}: {e}"),
            )
            .await;
            return Err(e);
        }
    };
    if existed && token.version != status.version {
        events::normal(
            events,
            client,
            reasons::SYNCHRONIZED,
            format!("Synchronized registry client {name} at version {}", token.version),
        )
        .await;
    }
    status.id = Some(token.id);
    status.version = token.version;
    Ok(())
}

/// Remove the remote registry client and forget its id.
///
/// # Errors
///
/// Remote failures, after a `RemoveError` event.
pub async fn remove_registry_client(
    api: &dyn NifiApi,
    events: &dyn EventPublisher,
    client: &NifiRegistryClient,
    status: &mut RemoteEntityStatus,
) -> SyncResult<()> {
    let name = client.name_any();
    events::normal(
        events,
        client,
        reasons::REMOVING,
        format!("Removing registry client {name}"),
    )
    .await;
    if let Err(e) = registry_client::remove(api, status.id.as_deref()).await {
        events::warning(
            events,
            client,
            reasons::REMOVE_ERROR,
            format!("Failed to remove registry client {name}: {e}"),
        )
        .await;
        return Err(e);
    }
    metrics::record_resource_deleted(KIND_NIFI_REGISTRY_CLIENT);
    events::normal(
        events,
        client,
        reasons::REMOVED,
        format!("Removed registry client {name}"),
    )
    .await;
    status.id = None;
    status.version = 0;
    Ok(())
}

#[async_trait]
impl ClusterDependent for NifiRegistryClient {
    type Status = RemoteEntityStatus;

    const KIND: &'static str = KIND_NIFI_REGISTRY_CLIENT;
    const OBLIGATIONS: &'static [&'static str] = &[FINALIZER_REGISTRY_CLIENT];

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
        sync_registry_client(binding.api.as_ref(), ctx.events.as_ref(), self, status).await
    }

    async fn remove(
        &self,
        ctx: &Context,
        binding: &ClusterBinding,
        status: &mut Self::Status,
    ) -> SyncResult<()> {
        remove_registry_client(binding.api.as_ref(), ctx.events.as_ref(), self, status).await
    }
}

#[cfg(test)]
#[path = "registry_client_tests.rs"]
mod registry_client_tests;
