// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation controllers for NiFi resources.
//!
//! Each reconciler watches one custom resource kind and drives the remote NiFi
//! cluster toward the declared state.
//!
//! # Reconciliation Architecture
//!
//! nifikop follows the standard level-triggered controller pattern:
//!
//! 1. **Resolve** - Re-read every referenced resource (cluster, registry client,
//!    parameter context, users) from the API server
//! 2. **Synchronize** - Create, update or remove the remote NiFi entity through
//!    the [`crate::wrappers`]
//! 3. **Status** - Persist the outcome, including partial progress of remote jobs
//! 4. **Requeue** - Choose the next interval from the outcome
//!
//! Long-running remote jobs (drop requests, version updates, parameter context
//! updates) are never awaited in-process. The reconciler persists the job in status
//! and polls it on the next pass, requeued at the short interval.
//!
//! # Available Reconcilers
//!
//! - [`reconcile_nifi_cluster`] - Graceful node scaling, PKI, reporting task
//! - [`reconcile_nifi_registry_client`] - Registry clients
//! - [`reconcile_nifi_parameter_context`] - Parameter contexts and their update requests
//! - [`reconcile_nifi_user`] - Users, access policies and client certificates
//! - [`reconcile_nifi_user_group`] - User groups, membership and access policies
//! - [`reconcile_nifi_dataflow`] - Versioned dataflows
//!
//! Each of them splits into a thin Kubernetes layer (references, finalizers,
//! status write) and a core taking a [`crate::nifi::NifiApi`], exercised in unit
//! tests against the in-memory NiFi.

pub mod cluster;
pub mod dataflow;
pub mod dependent;
pub mod finalizers;
pub mod parameter_context;
pub mod references;
pub mod registry_client;
pub mod status;
pub mod user;
pub mod user_group;

pub use cluster::reconcile_nifi_cluster;
pub use dataflow::reconcile_nifi_dataflow;
pub use parameter_context::reconcile_nifi_parameter_context;
pub use registry_client::reconcile_nifi_registry_client;
pub use user::reconcile_nifi_user;
pub use user_group::reconcile_nifi_user_group;

use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::OperatorConfig;
use crate::constants::{
    CERTIFICATE_FATAL_REQUEUE, CERTIFICATE_NOT_READY_REQUEUE, KIND_NIFI_CLUSTER,
    KIND_NIFI_PARAMETER_CONTEXT, KIND_NIFI_REGISTRY_CLIENT, KIND_NIFI_USER,
};
use crate::context::Context;
use crate::errors::{LookupError, ReconcileError, SyncError, SyncResult};
use crate::events::{self, reasons, EventPublisher};
use crate::metrics;
use crate::pki::PkiError;
use crate::status_reasons::CONDITION_TYPE_READY;
use status::{find_condition, record_outcome, write_if_changed, ConditionedStatus, StatusWriter};

/// Which requeue interval a pass ends with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requeue {
    /// Steady state
    Normal,
    /// A remote job is still running
    Short,
    /// The certificate secret has not been issued yet
    CertificateNotReady,
    /// Certificate issuance failed
    CertificateFailed,
}

/// Base interval for `requeue`, before jitter.
#[must_use]
pub fn requeue_interval(config: &OperatorConfig, requeue: Requeue) -> Duration {
    match requeue {
        Requeue::Normal => config.requeue_interval(),
        Requeue::Short => config.short_requeue_interval(),
        Requeue::CertificateNotReady => CERTIFICATE_NOT_READY_REQUEUE,
        Requeue::CertificateFailed => CERTIFICATE_FATAL_REQUEUE,
    }
}

/// Random offset in `[0, max]`, at millisecond resolution.
fn jitter(max: Duration) -> Duration {
    let max_millis = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_millis == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::random::<u64>() % (max_millis.saturating_add(1)))
}

/// Requeue action with the configured jitter added.
///
/// Jitter keeps dependents of one cluster from polling it in lockstep.
#[must_use]
pub fn requeue(config: &OperatorConfig, requeue: Requeue) -> Action {
    Action::requeue(requeue_interval(config, requeue) + jitter(config.requeue_offset()))
}

/// Turn the result of a pass into the controller action.
///
/// This is the only place deciding between a requeue and a failure:
/// - success and an unready cluster requeue at the normal interval
/// - a pending remote job requeues at the short interval, without error
/// - certificate errors requeue at their dedicated intervals
/// - everything else fails the pass and goes through [`error_policy`]
///
/// # Errors
///
/// Returns the sync error, with context, for every outcome that is a failure.
pub fn conclude(
    kind: &str,
    config: &OperatorConfig,
    started: Instant,
    result: SyncResult<()>,
) -> Result<Action, ReconcileError> {
    let elapsed = started.elapsed();
    match result {
        Ok(()) => {
            metrics::record_reconciliation_success(kind, elapsed);
            Ok(requeue(config, Requeue::Normal))
        }
        Err(SyncError::Pending(condition)) => {
            debug!(kind, %condition, "Remote operation in progress, requeueing");
            metrics::record_reconciliation_requeue(kind, condition.reason());
            Ok(requeue(config, Requeue::Short))
        }
        Err(e) if e.is_cluster_not_ready() => {
            info!(kind, error = %e, "Waiting for cluster");
            metrics::record_reconciliation_requeue(kind, e.status_reason());
            Ok(requeue(config, Requeue::Normal))
        }
        Err(SyncError::Pki(PkiError::NotReady(reason))) => {
            debug!(kind, %reason, "Certificate not ready, requeueing");
            metrics::record_reconciliation_requeue(kind, "CertificateNotReady");
            Ok(requeue(config, Requeue::CertificateNotReady))
        }
        Err(SyncError::Pki(PkiError::Fatal(reason))) => {
            warn!(kind, %reason, "Certificate issuance failed");
            metrics::record_error(kind, "pki");
            metrics::record_reconciliation_error(kind, elapsed);
            Ok(requeue(config, Requeue::CertificateFailed))
        }
        Err(e) => {
            metrics::record_error(kind, e.metric_category());
            metrics::record_reconciliation_error(kind, elapsed);
            Err(ReconcileError::from(
                anyhow::Error::new(e).context(format!("failed to reconcile {kind}")),
            ))
        }
    }
}

/// Error policy shared by every controller: standard backoff requeue.
pub fn error_policy<K>(resource: Arc<K>, error: &ReconcileError, ctx: Arc<Context>) -> Action
where
    K: ResourceExt,
{
    warn!(
        name = %resource.name_any(),
        namespace = ?resource.namespace(),
        error = %error,
        "Reconciliation failed"
    );
    Action::requeue(ctx.config.error_requeue())
}

/// Event reason and type for a reference that could not be resolved.
///
/// Returns `(reason, is_warning)`, or `None` for errors that are not about a
/// reference.
#[must_use]
pub fn reference_event(error: &SyncError) -> Option<(&'static str, bool)> {
    let SyncError::Reference(lookup) = error else {
        return None;
    };
    match lookup {
        LookupError::NotReady { kind, .. } if *kind == KIND_NIFI_CLUSTER => {
            Some((reasons::REFERENCE_CLUSTER_NOT_READY, false))
        }
        LookupError::InconsistentClusterReferences(_) => {
            Some((reasons::REFERENCE_CLUSTER_ERROR, true))
        }
        LookupError::NotFound { kind, .. } | LookupError::NotReady { kind, .. } => {
            let reason = match *kind {
                KIND_NIFI_CLUSTER => reasons::REFERENCE_CLUSTER_ERROR,
                KIND_NIFI_REGISTRY_CLIENT => reasons::REFERENCE_REGISTRY_CLIENT_ERROR,
                KIND_NIFI_PARAMETER_CONTEXT => reasons::REFERENCE_PARAMETER_CONTEXT_ERROR,
                KIND_NIFI_USER => reasons::REFERENCE_USER_ERROR,
                _ => return None,
            };
            Some((reason, true))
        }
        LookupError::Kube(_) => None,
    }
}

fn is_ready<S: ConditionedStatus>(status: Option<&S>) -> bool {
    status
        .and_then(|s| find_condition(s.conditions(), CONDITION_TYPE_READY))
        .is_some_and(|c| c.status == "True")
}

/// The end of one reconcile pass: status, events, metrics and requeue.
pub struct ReconcilePass<'a, K> {
    pub kind: &'static str,
    pub config: &'a OperatorConfig,
    pub events: &'a dyn EventPublisher,
    pub writer: &'a dyn StatusWriter<K>,
    pub started: Instant,
}

impl<'a, K> ReconcilePass<'a, K>
where
    K: Resource<DynamicType = ()> + ResourceExt + Send + Sync,
{
    #[must_use]
    pub fn new(
        kind: &'static str,
        config: &'a OperatorConfig,
        events: &'a dyn EventPublisher,
        writer: &'a dyn StatusWriter<K>,
    ) -> Self {
        Self {
            kind,
            config,
            events,
            writer,
            started: Instant::now(),
        }
    }

    /// Record `result` on `status`, persist it if it changed and pick the requeue.
    ///
    /// The status is written whatever the outcome, so partial progress survives a
    /// failed pass.
    ///
    /// # Errors
    ///
    /// The sync error when the pass failed, or the status write error.
    pub async fn finish<S: ConditionedStatus>(
        &self,
        resource: &K,
        current: Option<&S>,
        mut status: S,
        result: SyncResult<()>,
    ) -> Result<Action, ReconcileError> {
        let was_ready = is_ready(current);
        record_outcome(&mut status, resource.meta().generation, &result);

        match &result {
            Ok(()) if !was_ready => {
                events::normal(
                    self.events,
                    resource,
                    reasons::RECONCILED,
                    format!("{} {} reconciled", self.kind, resource.name_any()),
                )
                .await;
            }
            Err(e) => {
                if let Some((reason, warning)) = reference_event(e) {
                    if warning {
                        events::warning(self.events, resource, reason, e.to_string()).await;
                    } else {
                        events::normal(self.events, resource, reason, e.to_string()).await;
                    }
                }
            }
            Ok(()) => {}
        }

        if let Err(e) = write_if_changed(self.writer, resource, current, &status).await {
            metrics::record_error(self.kind, "kube");
            metrics::record_reconciliation_error(self.kind, self.started.elapsed());
            return Err(ReconcileError::from(e.context(format!(
                "failed to update {} status of {}",
                self.kind,
                resource.name_any()
            ))));
        }

        conclude(self.kind, self.config, self.started, result)
    }
}
