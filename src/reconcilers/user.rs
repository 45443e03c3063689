// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `NifiUser` reconciliation.
//!
//! On a managed cluster with TLS, a user with `createCert` first gets a client
//! certificate from the cluster PKI; the remote user is only created once it is
//! issued. Deletion revokes the certificate after removing the remote user.

use async_trait::async_trait;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info};

use super::dependent::{self, ClusterDependent};
use super::references::ClusterBinding;
use crate::constants::KIND_NIFI_USER;
use crate::context::Context;
use crate::crd::{ClusterReference, NifiCluster, NifiUser, RemoteEntityStatus};
use crate::errors::{ReconcileError, SyncError, SyncResult};
use crate::events::{self, reasons, EventPublisher};
use crate::labels::{FINALIZER_USER, FINALIZER_USER_CERTIFICATE};
use crate::metrics;
use crate::nifi::NifiApi;
use crate::pki::PkiManager;
use crate::wrappers::user;

const WITH_CERTIFICATE: &[&str] = &[FINALIZER_USER, FINALIZER_USER_CERTIFICATE];
const WITHOUT_CERTIFICATE: &[&str] = &[FINALIZER_USER];

/// Reconcile a `NifiUser`.
///
/// # Errors
///
/// See [`dependent::reconcile`].
pub async fn reconcile_nifi_user(
    ctx: Arc<Context>,
    user: Arc<NifiUser>,
) -> Result<Action, ReconcileError> {
    dependent::reconcile(ctx, user).await
}

/// True when the cluster PKI issues a certificate for this user.
#[must_use]
pub fn needs_certificate(cluster: &NifiCluster, user: &NifiUser) -> bool {
    user.spec.create_cert && !cluster.spec.is_external() && cluster.spec.use_ssl()
}

/// Create or update the remote user and its access policies.
///
/// An existing remote user holding the same identity is adopted.
///
/// # Errors
///
/// Remote failures, after a warning event.
pub async fn sync_user(
    api: &dyn NifiApi,
    events: &dyn EventPublisher,
    nifi_user: &NifiUser,
    root_process_group_id: Option<&str>,
    status: &mut RemoteEntityStatus,
) -> SyncResult<()> {
    let name = nifi_user.name_any();
    let existed = user::exists(api, status.id.as_deref()).await?;

    if !existed {
        events::normal(
            events,
            nifi_user,
            reasons::CREATING,
            format!("Creating user {name}"),
        )
        .await;
        let token = match user::create(api, nifi_user).await {
            Ok(token) => token,
            Err(e) => {
                events::warning(
                    events,
                    nifi_user,
                    reasons::CREATION_FAILED,
                    format!("Failed to create user {name}: {e}"),
                )
                .await;
                return Err(e);
            }
        };
        metrics::record_resource_created(KIND_NIFI_USER);
        events::normal(
            events,
            nifi_user,
            reasons::CREATED,
            format!("Created user {name} with id {}", token.id),
        )
        .await;
        status.id = Some(token.id);
        status.version = token.version;
    }

    let view = NifiUser {
        status: Some(status.clone()),
        ..nifi_user.clone()
    };
    let token = match user::sync(api, &view, root_process_group_id).await {
        Ok(token) => token,
        Err(e) => {
            events::warning(
                events,
                nifi_user,
                reasons::SYNCHRONIZING_FAILED,
                format!("Failed to synchronize user {name}: {e}"),
            )
            .await;
            return Err(e);
        }
    };
    if existed && token.version != status.version {
        events::normal(
            events,
            nifi_user,
            reasons::SYNCHRONIZED,
            format!("Synchronized user {name} at version {}", token.version),
        )
        .await;
    }
    status.id = Some(token.id);
    status.version = token.version;
    Ok(())
}

/// Remove the remote user and forget its id.
///
/// # Errors
///
/// Remote failures, after a `RemoveError` event.
pub async fn remove_user(
    api: &dyn NifiApi,
    events: &dyn EventPublisher,
    nifi_user: &NifiUser,
    status: &mut RemoteEntityStatus,
) -> SyncResult<()> {
    let name = nifi_user.name_any();
    events::normal(
        events,
        nifi_user,
        reasons::REMOVING,
        format!("Removing user {name}"),
    )
    .await;
    if let Err(e) = user::remove(api, status.id.as_deref()).await {
        events::warning(
            events,
            nifi_user,
            reasons::REMOVE_ERROR,
            format!("Failed to remove user {name}: {e}"),
        )
        .await;
        return Err(e);
    }
    metrics::record_resource_deleted(KIND_NIFI_USER);
    events::normal(
        events,
        nifi_user,
        reasons::REMOVED,
        format!("Removed user {name}"),
    )
    .await;
    status.id = None;
    status.version = 0;
    Ok(())
}

async fn reconcile_certificate(
    ctx: &Context,
    cluster: &NifiCluster,
    nifi_user: &NifiUser,
    first_time: bool,
) -> SyncResult<()> {
    let pki = PkiManager::for_cluster(cluster);
    match pki.reconcile_user_certificate(&ctx.client, nifi_user).await {
        Ok(_) => {
            if first_time {
                events::normal(
                    ctx.events.as_ref(),
                    nifi_user,
                    reasons::RECONCILED_CERTIFICATE,
                    format!("Certificate issued in secret {}", nifi_user.secret_name()),
                )
                .await;
            }
            Ok(())
        }
        Err(e) if e.is_not_ready() => {
            events::normal(
                ctx.events.as_ref(),
                nifi_user,
                reasons::RECONCILING_CERTIFICATE,
                format!("Waiting for certificate in secret {}", nifi_user.secret_name()),
            )
            .await;
            Err(SyncError::Pki(e))
        }
        Err(e) => Err(SyncError::Pki(e)),
    }
}

#[async_trait]
impl ClusterDependent for NifiUser {
    type Status = RemoteEntityStatus;

    const KIND: &'static str = KIND_NIFI_USER;
    const OBLIGATIONS: &'static [&'static str] = WITH_CERTIFICATE;

    fn cluster_ref(&self) -> &ClusterReference {
        &self.spec.cluster_ref
    }

    fn current_status(&self) -> Option<&Self::Status> {
        self.status.as_ref()
    }

    fn obligations(&self) -> &'static [&'static str] {
        if self.spec.create_cert {
            WITH_CERTIFICATE
        } else {
            WITHOUT_CERTIFICATE
        }
    }

    async fn sync(
        &self,
        ctx: &Context,
        binding: &ClusterBinding,
        status: &mut Self::Status,
    ) -> SyncResult<()> {
        if needs_certificate(&binding.cluster, self) {
            reconcile_certificate(ctx, &binding.cluster, self, status.id.is_none()).await?;
        }
        let root = binding.root_process_group_id().await?;
        sync_user(
            binding.api.as_ref(),
            ctx.events.as_ref(),
            self,
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
        remove_user(binding.api.as_ref(), ctx.events.as_ref(), self, status).await
    }

    async fn discharge(
        &self,
        ctx: &Context,
        obligation: &str,
        target: Option<&ClusterBinding>,
        status: &mut Self::Status,
    ) -> SyncResult<()> {
        let Some(binding) = target else {
            debug!(user = %self.name_any(), obligation, "Cluster is gone, nothing to discharge");
            return Ok(());
        };
        if obligation == FINALIZER_USER_CERTIFICATE {
            if needs_certificate(&binding.cluster, self) {
                info!(user = %self.name_any(), "Revoking user certificate");
                PkiManager::for_cluster(&binding.cluster)
                    .finalize_user_certificate(&ctx.client, self)
                    .await?;
            }
            return Ok(());
        }
        self.remove(ctx, binding, status).await
    }
}

#[cfg(test)]
#[path = "user_tests.rs"]
mod user_tests;
