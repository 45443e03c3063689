// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! NiFi parameter-context synchronization.
//!
//! Parameter contexts cannot be updated in place: a change is submitted as an
//! asynchronous update request that NiFi applies while stopping and restarting the
//! components referencing the context. The request is recorded in the resource status
//! and polled on the following reconciles.
//!
//! NiFi masks the value of sensitive parameters, so only their presence and
//! description are compared.

use std::collections::BTreeMap;

use kube::ResourceExt;
use tracing::{debug, info, warn};

use super::jobs::{parameter_context_request_status, JobState, RemoteJob};
use super::{found, stored_id, with_conflict_retry};
use crate::crd::{NifiParameterContext, NifiParameterContextStatus};
use crate::errors::{AsyncCondition, SyncError, SyncResult};
use crate::nifi::types::{
    ParameterContextDto, ParameterContextEntity, ParameterContextUpdateRequestEntity, ParameterDto,
    ParameterEntity, RevisionToken, Versioned,
};
use crate::nifi::ComponentApi;

/// Desired remote context.
///
/// Declared parameters come first; every secret key then becomes a sensitive
/// parameter, replacing a declared parameter of the same name.
#[must_use]
pub fn desired(
    context: &NifiParameterContext,
    secrets: &BTreeMap<String, String>,
) -> ParameterContextDto {
    let mut parameters: BTreeMap<&str, ParameterDto> = BTreeMap::new();
    for p in &context.spec.parameters {
        parameters.insert(
            &p.name,
            ParameterDto {
                name: p.name.clone(),
                description: p.description.clone(),
                sensitive: p.sensitive,
                value: p.value.clone(),
            },
        );
    }
    for (key, value) in secrets {
        parameters.insert(
            key,
            ParameterDto {
                name: key.clone(),
                description: None,
                sensitive: true,
                value: Some(value.clone()),
            },
        );
    }

    ParameterContextDto {
        id: None,
        name: context.name_any(),
        description: context.spec.description.clone().unwrap_or_default(),
        parameters: parameters
            .into_values()
            .map(|parameter| ParameterEntity { parameter })
            .collect(),
    }
}

fn same_parameter(remote: &ParameterDto, wanted: &ParameterDto) -> bool {
    remote.sensitive == wanted.sensitive
        && remote.description.as_deref().unwrap_or_default()
            == wanted.description.as_deref().unwrap_or_default()
        && (wanted.sensitive || remote.value == wanted.value)
}

fn is_sync(remote: &ParameterContextDto, wanted: &ParameterContextDto) -> bool {
    if remote.description != wanted.description
        || remote.parameters.len() != wanted.parameters.len()
    {
        return false;
    }
    wanted.parameters.iter().all(|w| {
        remote
            .parameters
            .iter()
            .any(|r| r.parameter.name == w.parameter.name && same_parameter(&r.parameter, &w.parameter))
    })
}

/// Update body: the desired parameters plus a bare entry for every remote parameter
/// that is no longer declared, which deletes it.
fn update_body(remote: &ParameterContextDto, wanted: &ParameterContextDto) -> ParameterContextDto {
    let mut body = wanted.clone();
    body.id.clone_from(&remote.id);
    for stale in remote
        .parameters
        .iter()
        .filter(|r| !wanted.parameters.iter().any(|w| w.parameter.name == r.parameter.name))
    {
        body.parameters.push(ParameterEntity {
            parameter: ParameterDto {
                name: stale.parameter.name.clone(),
                description: None,
                sensitive: stale.parameter.sensitive,
                value: None,
            },
        });
    }
    body
}

/// True when the stored id designates a live remote context.
pub async fn exists<A: ComponentApi + ?Sized>(api: &A, id: Option<&str>) -> SyncResult<bool> {
    let Some(id) = stored_id(id) else {
        return Ok(false);
    };
    Ok(found(api.get_parameter_context(id).await)?.is_some())
}

/// Create the remote context with all of its parameters.
pub async fn create<A: ComponentApi + ?Sized>(
    api: &A,
    context: &NifiParameterContext,
    secrets: &BTreeMap<String, String>,
) -> SyncResult<RevisionToken> {
    let entity = api
        .create_parameter_context(&desired(context, secrets))
        .await?;
    info!(
        name = %context.name_any(),
        id = %entity.id,
        parameters = entity.component.parameters.len(),
        "Created NiFi parameter context"
    );
    Ok(entity.token())
}

enum Step {
    Created(RevisionToken),
    InSync(RevisionToken),
    Submitted(RevisionToken, ParameterContextUpdateRequestEntity),
}

/// Bring the remote context in line with the declared parameters.
///
/// `status` is updated in place with the remote id, revision and the latest update
/// request, also when an error is returned, so the caller must persist it either way.
/// A submitted or still running update request yields
/// [`AsyncCondition::ParameterContextUpdating`].
pub async fn sync<A: ComponentApi + ?Sized>(
    api: &A,
    context: &NifiParameterContext,
    secrets: &BTreeMap<String, String>,
    status: &mut NifiParameterContextStatus,
) -> SyncResult<()> {
    poll_latest_request(api, status).await?;

    let id = stored_id(status.id.as_deref()).map(ToString::to_string);
    let wanted = desired(context, secrets);
    let step = with_conflict_retry("sync_parameter_context", || {
        sync_once(api, id.as_deref(), &wanted)
    })
    .await?;

    match step {
        Step::Created(token) => {
            info!(name = %context.name_any(), id = %token.id, "Created NiFi parameter context");
            record_token(status, &token);
            status.latest_update_request = None;
            Ok(())
        }
        Step::InSync(token) => {
            debug!(id = %token.id, "NiFi parameter context already in sync");
            record_token(status, &token);
            Ok(())
        }
        Step::Submitted(token, request) => {
            let snapshot = parameter_context_request_status(&request.request);
            let state = snapshot.job_state();
            info!(
                name = %context.name_any(),
                id = %token.id,
                request = %snapshot.id,
                "Submitted NiFi parameter context update"
            );
            record_token(status, &token);
            if let Some(revision) = &request.parameter_context_revision {
                status.version = revision.version;
            }
            status.latest_update_request = Some(snapshot);
            settle(state)
        }
    }
}

fn record_token(status: &mut NifiParameterContextStatus, token: &RevisionToken) {
    status.id = Some(token.id.clone());
    status.version = token.version;
}

fn settle(state: JobState) -> SyncResult<()> {
    match state {
        JobState::Submitted | JobState::Polling => {
            Err(SyncError::Pending(AsyncCondition::ParameterContextUpdating))
        }
        JobState::Finished => Ok(()),
        JobState::Failed(reason) => Err(SyncError::Invalid(format!(
            "parameter context update failed: {reason}"
        ))),
    }
}

/// Refresh the recorded update request while NiFi is still applying it.
async fn poll_latest_request<A: ComponentApi + ?Sized>(
    api: &A,
    status: &mut NifiParameterContextStatus,
) -> SyncResult<()> {
    let Some(context_id) = stored_id(status.id.as_deref()).map(ToString::to_string) else {
        return Ok(());
    };
    let Some(latest) = status
        .latest_update_request
        .as_ref()
        .filter(|r| r.job_state().is_running())
    else {
        return Ok(());
    };

    let request_id = latest.id.clone();
    match found(
        api.get_parameter_context_update_request(&context_id, &request_id)
            .await,
    )? {
        Some(request) => {
            let snapshot = parameter_context_request_status(&request.request);
            let state = snapshot.job_state();
            status.latest_update_request = Some(snapshot);
            if let JobState::Failed(reason) = &state {
                warn!(id = %context_id, request = %request_id, reason = %reason, "NiFi parameter context update failed");
            }
            settle(state)
        }
        None => {
            debug!(id = %context_id, request = %request_id, "Update request expired");
            status.latest_update_request = None;
            Ok(())
        }
    }
}

async fn sync_once<A: ComponentApi + ?Sized>(
    api: &A,
    id: Option<&str>,
    wanted: &ParameterContextDto,
) -> SyncResult<Step> {
    let current: Option<ParameterContextEntity> = match id {
        Some(id) => found(api.get_parameter_context(id).await)?,
        None => None,
    };
    let Some(entity) = current else {
        let created = api.create_parameter_context(wanted).await?;
        return Ok(Step::Created(created.token()));
    };

    if is_sync(&entity.component, wanted) {
        return Ok(Step::InSync(entity.token()));
    }

    let token = entity.token();
    let request = api
        .create_parameter_context_update_request(&token, &update_body(&entity.component, wanted))
        .await?;
    Ok(Step::Submitted(token, request))
}

/// Delete the remote context; absent is success.
pub async fn remove<A: ComponentApi + ?Sized>(api: &A, id: Option<&str>) -> SyncResult<()> {
    let Some(id) = stored_id(id) else {
        return Ok(());
    };
    with_conflict_retry("remove_parameter_context", || async move {
        let Some(entity) = found(api.get_parameter_context(id).await)? else {
            return Ok(());
        };
        api.remove_parameter_context(&entity.token()).await?;
        info!(id, "Removed NiFi parameter context");
        Ok(())
    })
    .await
}

#[cfg(test)]
#[path = "parameter_context_tests.rs"]
mod parameter_context_tests;
