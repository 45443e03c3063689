// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `NifiParameterContext` reconciliation.
//!
//! Declared parameters are merged with the keys of every referenced secret, each
//! of which becomes a sensitive parameter. Changes are applied through a NiFi
//! update request that is polled across reconciles.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::dependent::{self, ClusterDependent};
use super::references::{self, ClusterBinding};
use crate::constants::KIND_NIFI_PARAMETER_CONTEXT;
use crate::context::Context;
use crate::crd::{ClusterReference, NifiParameterContext, NifiParameterContextStatus};
use crate::errors::{ReconcileError, SyncError, SyncResult};
use crate::events::{self, reasons, EventPublisher};
use crate::labels::FINALIZER_PARAMETER_CONTEXT;
use crate::metrics;
use crate::nifi::NifiApi;
use crate::wrappers::parameter_context;

/// Reconcile a `NifiParameterContext`.
///
/// # Errors
///
/// See [`dependent::reconcile`].
pub async fn reconcile_nifi_parameter_context(
    ctx: Arc<Context>,
    context: Arc<NifiParameterContext>,
) -> Result<Action, ReconcileError> {
    dependent::reconcile(ctx, context).await
}

/// Sensitive parameters contributed by `secrets`, one per data key.
///
/// Later secrets override earlier ones on duplicate keys.
///
/// # Errors
///
/// [`SyncError::Invalid`] when a value is not UTF-8.
pub fn secret_parameters(secrets: &[Secret]) -> SyncResult<BTreeMap<String, String>> {
    let mut parameters = BTreeMap::new();
    for secret in secrets {
        for (key, value) in secret.data.iter().flatten() {
            let value = String::from_utf8(value.0.clone()).map_err(|_| {
                SyncError::Invalid(format!(
                    "key {key} of secret {} is not valid UTF-8",
                    secret.name_any()
                ))
            })?;
            parameters.insert(key.clone(), value);
        }
    }
    Ok(parameters)
}

async fn read_secrets(
    ctx: &Context,
    context: &NifiParameterContext,
) -> SyncResult<BTreeMap<String, String>> {
    let namespace = context.namespace().unwrap_or_default();
    let mut secrets = Vec::with_capacity(context.spec.secret_refs.len());
    for reference in &context.spec.secret_refs {
        secrets.push(references::get::<Secret>(&ctx.client, "Secret", reference, &namespace).await?);
    }
    secret_parameters(&secrets)
}

/// Create or update the remote parameter context.
///
/// A submitted or running update request yields a pending error; the request is
/// recorded in `status` and polled on the next pass.
///
/// # Errors
///
/// Remote failures and failed update requests, after a warning event.
pub async fn sync_parameter_context(
    api: &dyn NifiApi,
    events: &dyn EventPublisher,
    context: &NifiParameterContext,
    secrets: &BTreeMap<String, String>,
    status: &mut NifiParameterContextStatus,
) -> SyncResult<()> {
    let name = context.name_any();
    let existed = parameter_context::exists(api, status.id.as_deref()).await?;
    let previous_request = status.latest_update_request.as_ref().map(|r| r.id.clone());
    let previous_version = status.version;

    if !existed {
        events::normal(
            events,
            context,
            reasons::CREATING,
            format!("Creating parameter context {name}"),
        )
        .await;
        status.id = None;
        status.latest_update_request = None;
    }

    let result = parameter_context::sync(api, context, secrets, status).await;

    if !existed && status.id.is_some() {
        metrics::record_resource_created(KIND_NIFI_PARAMETER_CONTEXT);
        events::normal(
            events,
            context,
            reasons::CREATED,
            format!(
                "Created parameter context {name} with id {}",
                status.id.as_deref().unwrap_or_default()
            ),
        )
        .await;
    }

    match &result {
        Ok(()) if existed && status.version != previous_version => {
            events::normal(
                events,
                context,
                reasons::SYNCHRONIZED,
                format!("Synchronized parameter context {name}"),
            )
            .await;
        }
        Ok(()) => {}
        Err(SyncError::Pending(condition)) => {
            let submitted = status.latest_update_request.as_ref().map(|r| r.id.clone());
            if submitted.is_some() && submitted != previous_request {
                events::normal(
                    events,
                    context,
                    reasons::SYNCHRONIZING,
                    format!("Updating parameter context {name}"),
                )
                .await;
            }
            debug!(name = %name, %condition, "Parameter context update in progress");
        }
        Err(e) => {
            let reason = if existed {
                reasons::SYNCHRONIZING_FAILED
            } else {
                reasons::CREATION_FAILED
            };
            events::warning(
                events,
                context,
                reason,
                format!("Failed to synchronize parameter context {name}: {e}"),
            )
            .await;
        }
    }
    result
}

/// Remove the remote parameter context and forget its id.
///
/// # Errors
///
/// Remote failures, after a `RemoveError` event.
pub async fn remove_parameter_context(
    api: &dyn NifiApi,
    events: &dyn EventPublisher,
    context: &NifiParameterContext,
    status: &mut NifiParameterContextStatus,
) -> SyncResult<()> {
    let name = context.name_any();
    events::normal(
        events,
        context,
        reasons::REMOVING,
        format!("Removing parameter context {name}"),
    )
    .await;
    if let Err(e) = parameter_context::remove(api, status.id.as_deref()).await {
        events::warning(
            events,
            context,
            reasons::REMOVE_ERROR,
            format!("Failed to remove parameter context {name}: {e}"),
        )
        .await;
        return Err(e);
    }
    metrics::record_resource_deleted(KIND_NIFI_PARAMETER_CONTEXT);
    events::normal(
        events,
        context,
        reasons::REMOVED,
        format!("Removed parameter context {name}"),
    )
    .await;
    status.id = None;
    status.version = 0;
    status.latest_update_request = None;
    Ok(())
}

#[async_trait]
impl ClusterDependent for NifiParameterContext {
    type Status = NifiParameterContextStatus;

    const KIND: &'static str = KIND_NIFI_PARAMETER_CONTEXT;
    const OBLIGATIONS: &'static [&'static str] = &[FINALIZER_PARAMETER_CONTEXT];

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
        let secrets = read_secrets(ctx, self).await?;
        sync_parameter_context(
            binding.api.as_ref(),
            ctx.events.as_ref(),
            self,
            &secrets,
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
        remove_parameter_context(binding.api.as_ref(), ctx.events.as_ref(), self, status).await
    }
}

#[cfg(test)]
#[path = "parameter_context_tests.rs"]
mod parameter_context_tests;
