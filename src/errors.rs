// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for entity synchronization and reconciliation.
//!
//! Three layers:
//! - [`crate::nifi::NifiError`]: what a single REST call returned
//! - [`SyncError`]: what a wrapper or the dataflow state machine returns, including
//!   [`SyncError::Pending`] for remote jobs still running
//! - [`ReconcileError`]: what a reconciler returns to the controller runtime
//!
//! Only the reconciler decides between a short requeue and a failure, by switching on
//! the [`SyncError`] kind.

use std::fmt;
use thiserror::Error;

use crate::clientconfig::ConfigError;
use crate::constants::KIND_NIFI_CLUSTER;
use crate::nifi::NifiError;
use crate::pki::PkiError;
use crate::status_reasons::{
    REASON_CERTIFICATE_FAILED, REASON_CERTIFICATE_NOT_READY, REASON_CONNECTION_DROPPING,
    REASON_FLOW_CONTROLLER_SERVICE_SCHEDULING, REASON_FLOW_DRAINING, REASON_FLOW_SCHEDULING,
    REASON_FLOW_SYNCING, REASON_FLOW_UPDATE_REQUEST_RUNNING, REASON_INCONSISTENT_CLUSTER_REFERENCES,
    REASON_NODE_SCALING, REASON_PARAMETER_CONTEXT_UPDATING, REASON_REFERENCE_NOT_FOUND, REASON_REFERENCE_NOT_READY,
    REASON_REPORTING_TASK_INVALID, REASON_REPORTING_TASK_VALIDATING,
};

/// A remote operation is still in progress.
///
/// Not a failure: the reconciler requeues at the short interval, emits no warning
/// event and does not escalate backoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AsyncCondition {
    /// A drop request is emptying a connection
    ConnectionDropping,
    /// Inputs are stopped and queues are draining
    FlowDraining,
    /// A version update or revert request is running
    FlowUpdateRequestRunning,
    /// Controller services are being enabled or disabled
    FlowControllerServiceScheduling,
    /// Components of the process group are starting
    FlowScheduling,
    /// The remote flow changed underneath a sync step
    FlowSyncing,
    /// A parameter-context update request is running
    ParameterContextUpdating,
    /// A reporting task is being validated
    ReportingTaskValidating,
    /// A reporting task was found invalid after an update
    ReportingTaskInvalid,
    /// A node is joining or leaving the cluster
    NodeScaling,
}

impl AsyncCondition {
    /// Condition reason recorded on the resource status.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ConnectionDropping => REASON_CONNECTION_DROPPING,
            Self::FlowDraining => REASON_FLOW_DRAINING,
            Self::FlowUpdateRequestRunning => REASON_FLOW_UPDATE_REQUEST_RUNNING,
            Self::FlowControllerServiceScheduling => REASON_FLOW_CONTROLLER_SERVICE_SCHEDULING,
            Self::FlowScheduling => REASON_FLOW_SCHEDULING,
            Self::FlowSyncing => REASON_FLOW_SYNCING,
            Self::ParameterContextUpdating => REASON_PARAMETER_CONTEXT_UPDATING,
            Self::ReportingTaskValidating => REASON_REPORTING_TASK_VALIDATING,
            Self::ReportingTaskInvalid => REASON_REPORTING_TASK_INVALID,
            Self::NodeScaling => REASON_NODE_SCALING,
        }
    }
}

impl fmt::Display for AsyncCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Failure resolving a cross-resource reference.
///
/// "Not found" and "found but not ready" are distinct so the reconciler can emit the
/// right event.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        name: String,
        namespace: String,
    },

    #[error("{kind} {namespace}/{name} is not ready: {reason}")]
    NotReady {
        kind: &'static str,
        name: String,
        namespace: String,
        reason: String,
    },

    /// Dependents of one resource point at different clusters.
    #[error("inconsistent cluster references: {0}")]
    InconsistentClusterReferences(String),

    #[error(transparent)]
    Kube(#[from] kube::Error),
}

impl LookupError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn kind(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { kind, .. } | Self::NotReady { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// Errors returned by synchronization wrappers and the dataflow state machine.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A remote job is still running; retry at the short interval.
    #[error("waiting on remote operation: {0}")]
    Pending(AsyncCondition),

    #[error(transparent)]
    Remote(#[from] NifiError),

    #[error(transparent)]
    Reference(#[from] LookupError),

    #[error(transparent)]
    Pki(#[from] PkiError),

    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The declared or observed state cannot be acted on.
    #[error("{0}")]
    Invalid(String),
}

impl SyncError {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    #[must_use]
    pub fn pending_condition(&self) -> Option<AsyncCondition> {
        match self {
            Self::Pending(condition) => Some(*condition),
            _ => None,
        }
    }

    /// True when the referenced cluster exists but is not usable yet.
    ///
    /// Dependents wait for the cluster without reporting a failure.
    #[must_use]
    pub fn is_cluster_not_ready(&self) -> bool {
        matches!(
            self,
            Self::Reference(LookupError::NotReady { kind, .. }) if *kind == KIND_NIFI_CLUSTER
        )
    }

    /// True when the error is a stale revision the caller may re-fetch and retry.
    #[must_use]
    pub fn is_revision_conflict(&self) -> bool {
        matches!(self, Self::Remote(e) if e.is_revision_conflict())
    }

    /// Condition reason recorded on the resource status.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::Pending(condition) => condition.reason(),
            Self::Remote(e) => crate::http_errors::map_nifi_error_to_reason(e).0,
            Self::Reference(LookupError::NotFound { .. }) => REASON_REFERENCE_NOT_FOUND,
            Self::Reference(LookupError::InconsistentClusterReferences(_)) => {
                REASON_INCONSISTENT_CLUSTER_REFERENCES
            }
            Self::Reference(_) => REASON_REFERENCE_NOT_READY,
            Self::Pki(PkiError::NotReady(_)) => REASON_CERTIFICATE_NOT_READY,
            Self::Pki(_) => REASON_CERTIFICATE_FAILED,
            Self::Kube(_) | Self::Config(_) | Self::Invalid(_) => "ReconcileError",
        }
    }

    /// Label used by the `errors_total` metric.
    #[must_use]
    pub fn metric_category(&self) -> &'static str {
        match self {
            Self::Pending(_) => "pending",
            Self::Remote(_) => "remote",
            Self::Reference(_) => "reference",
            Self::Pki(_) => "pki",
            Self::Kube(_) => "kube",
            Self::Config(_) => "config",
            Self::Invalid(_) => "invalid",
        }
    }
}

/// Result of a wrapper or state-machine step.
pub type SyncResult<T> = Result<T, SyncError>;

/// Error returned by reconcilers to the controller runtime.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct ReconcileError(#[from] anyhow::Error);

impl ReconcileError {
    /// The typed synchronization error at the root of the chain, if any.
    #[must_use]
    pub fn sync_error(&self) -> Option<&SyncError> {
        self.0.downcast_ref::<SyncError>()
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
