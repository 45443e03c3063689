// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Managed Prometheus reporting task.
//!
//! A cluster declaring `metricsPort` gets one reporting task exposing every
//! component's metrics on that port. NiFi rejects configuration changes to a running
//! task, so a drifted task is stopped, updated, then started again. A task that is
//! still validating, or invalid after the update, surfaces as a pending condition.

use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{found, stored_id, with_conflict_retry};
use crate::constants::{
    COMPONENT_STATE_DISABLED, COMPONENT_STATE_RUNNING, COMPONENT_STATE_STOPPED,
    PROMETHEUS_REPORTING_TASK_NAME, PROMETHEUS_REPORTING_TASK_TYPE,
    REPORTING_TASK_PORT_PROPERTY, REPORTING_TASK_SEND_JVM_PROPERTY,
    REPORTING_TASK_STRATEGY_ALL_COMPONENTS, REPORTING_TASK_STRATEGY_PROPERTY,
    VALIDATION_STATUS_INVALID, VALIDATION_STATUS_VALIDATING,
};
use crate::crd::NifiCluster;
use crate::errors::{AsyncCondition, SyncError, SyncResult};
use crate::nifi::types::{ReportingTaskDto, ReportingTaskEntity, RevisionToken, Versioned};
use crate::nifi::ComponentApi;

const SEND_JVM: &str = "true";

/// Desired reporting task for a cluster, `None` when metrics are not enabled.
#[must_use]
pub fn desired(cluster: &NifiCluster) -> Option<ReportingTaskDto> {
    let port = cluster.spec.metrics_port?;
    let properties = BTreeMap::from([
        (
            REPORTING_TASK_PORT_PROPERTY.to_string(),
            Some(port.to_string()),
        ),
        (
            REPORTING_TASK_STRATEGY_PROPERTY.to_string(),
            Some(REPORTING_TASK_STRATEGY_ALL_COMPONENTS.to_string()),
        ),
        (
            REPORTING_TASK_SEND_JVM_PROPERTY.to_string(),
            Some(SEND_JVM.to_string()),
        ),
    ]);
    Some(ReportingTaskDto {
        id: None,
        name: PROMETHEUS_REPORTING_TASK_NAME.to_string(),
        type_: PROMETHEUS_REPORTING_TASK_TYPE.to_string(),
        properties,
        state: None,
    })
}

fn desired_or_invalid(cluster: &NifiCluster) -> SyncResult<ReportingTaskDto> {
    desired(cluster).ok_or_else(|| {
        SyncError::Invalid("cluster does not declare a metrics port".to_string())
    })
}

/// Only the name and the three managed properties are compared; NiFi fills in
/// defaults for every other property.
fn is_sync(entity: &ReportingTaskEntity, want: &ReportingTaskDto) -> bool {
    entity.component.name == want.name
        && want
            .properties
            .iter()
            .all(|(key, value)| entity.component.properties.get(key) == Some(value))
}

fn stored_task_id(cluster: &NifiCluster) -> Option<&str> {
    stored_id(
        cluster
            .status
            .as_ref()
            .and_then(|s| s.prometheus_reporting_task.as_ref())
            .map(|t| t.id.as_str()),
    )
}

/// True when the cluster status designates a live remote reporting task.
pub async fn exists<A: ComponentApi + ?Sized>(api: &A, cluster: &NifiCluster) -> SyncResult<bool> {
    let Some(id) = stored_task_id(cluster) else {
        return Ok(false);
    };
    Ok(found(api.get_reporting_task(id).await)?.is_some())
}

/// Create the reporting task. It starts stopped; [`sync`] starts it.
pub async fn create<A: ComponentApi + ?Sized>(
    api: &A,
    cluster: &NifiCluster,
) -> SyncResult<RevisionToken> {
    let entity = api.create_reporting_task(&desired_or_invalid(cluster)?).await?;
    info!(id = %entity.id, "Created managed Prometheus reporting task");
    Ok(entity.token())
}

/// Bring the reporting task in line with the cluster and make sure it runs.
pub async fn sync<A: ComponentApi + ?Sized>(
    api: &A,
    cluster: &NifiCluster,
) -> SyncResult<RevisionToken> {
    with_conflict_retry("sync_reporting_task", || sync_once(api, cluster)).await
}

async fn sync_once<A: ComponentApi + ?Sized>(
    api: &A,
    cluster: &NifiCluster,
) -> SyncResult<RevisionToken> {
    let want = desired_or_invalid(cluster)?;
    let current = match stored_task_id(cluster) {
        Some(id) => found(api.get_reporting_task(id).await)?,
        None => None,
    };
    let mut entity = match current {
        Some(entity) => entity,
        None => {
            let token = create(api, cluster).await?;
            api.get_reporting_task(&token.id).await?
        }
    };

    if !is_sync(&entity, &want) {
        if entity.status.validation_status.as_deref() == Some(VALIDATION_STATUS_VALIDATING) {
            return Err(SyncError::Pending(AsyncCondition::ReportingTaskValidating));
        }

        if entity.status.run_status.as_deref() == Some(COMPONENT_STATE_RUNNING) {
            debug!(id = %entity.id, "Stopping reporting task before update");
            entity = api
                .update_reporting_task_run_status(&entity.token(), COMPONENT_STATE_STOPPED)
                .await?;
        }

        let mut component = want;
        component.id = Some(entity.id.clone());
        entity = api.update_reporting_task(&entity.token(), &component).await?;
        info!(
            id = %entity.id,
            version = entity.revision.version,
            "Updated managed Prometheus reporting task"
        );
    }

    if entity.status.validation_status.as_deref() == Some(VALIDATION_STATUS_INVALID) {
        return Err(SyncError::Pending(AsyncCondition::ReportingTaskInvalid));
    }

    if matches!(
        entity.status.run_status.as_deref(),
        Some(COMPONENT_STATE_STOPPED | COMPONENT_STATE_DISABLED)
    ) {
        entity = api
            .update_reporting_task_run_status(&entity.token(), COMPONENT_STATE_RUNNING)
            .await?;
        info!(id = %entity.id, "Started managed Prometheus reporting task");
    }

    Ok(entity.token())
}

/// Delete the reporting task; absent is success.
///
/// A running task cannot be deleted, so it is stopped first.
pub async fn remove<A: ComponentApi + ?Sized>(api: &A, cluster: &NifiCluster) -> SyncResult<()> {
    let Some(id) = stored_task_id(cluster) else {
        return Ok(());
    };
    with_conflict_retry("remove_reporting_task", || async move {
        let Some(mut entity) = found(api.get_reporting_task(id).await)? else {
            return Ok(());
        };
        if entity.status.run_status.as_deref() == Some(COMPONENT_STATE_RUNNING) {
            entity = api
                .update_reporting_task_run_status(&entity.token(), COMPONENT_STATE_STOPPED)
                .await?;
        }
        api.remove_reporting_task(&entity.token()).await?;
        info!(id, "Removed managed Prometheus reporting task");
        Ok(())
    })
    .await
}

#[cfg(test)]
#[path = "reporting_task_tests.rs"]
mod reporting_task_tests;
