// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition reasons for NiFi resources.
//!
//! Reasons are programmatic identifiers in CamelCase that explain why a condition has
//! a particular status. Every resource carries a single encompassing `type: Ready`
//! condition; the reason tells an operator which step of the synchronization with the
//! remote NiFi cluster it is waiting on.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   state: OutOfSync
//!   conditions:
//!     - type: Ready
//!       status: "False"
//!       reason: ConnectionDropping
//!       message: "Dropping flowfiles queued in connection 3b1f..."
//! ```

// ============================================================================
// Condition Types
// ============================================================================

/// The single encompassing condition type carried by every resource
pub const CONDITION_TYPE_READY: &str = "Ready";

// ============================================================================
// Common Reasons (All Resources)
// ============================================================================

/// The remote entity matches the declared resource.
pub const REASON_SYNCHRONIZED: &str = "Synchronized";

/// Resources are being created or updated.
pub const REASON_PROGRESSING: &str = "Progressing";

/// The resource is being removed from the remote cluster.
pub const REASON_REMOVING: &str = "Removing";

// ============================================================================
// Reference Reasons
// ============================================================================

/// A referenced resource (cluster, registry client, parameter context, user) does not exist.
pub const REASON_REFERENCE_NOT_FOUND: &str = "ReferenceNotFound";

/// A referenced resource exists but has not been synchronized yet.
pub const REASON_REFERENCE_NOT_READY: &str = "ReferenceNotReady";

/// References of one resource point at different clusters.
pub const REASON_INCONSISTENT_CLUSTER_REFERENCES: &str = "InconsistentClusterReferences";

/// The referenced cluster does not report every node as connected.
pub const REASON_CLUSTER_NOT_READY: &str = "ClusterNotReady";

// ============================================================================
// Asynchronous Remote Job Reasons
// ============================================================================

/// Flowfiles queued in a connection are being dropped.
pub const REASON_CONNECTION_DROPPING: &str = "ConnectionDropping";

/// Input components are stopped and queues are draining.
pub const REASON_FLOW_DRAINING: &str = "FlowDraining";

/// A version update or revert request is running.
pub const REASON_FLOW_UPDATE_REQUEST_RUNNING: &str = "FlowUpdateRequestRunning";

/// Controller services of the flow are being enabled or disabled.
pub const REASON_FLOW_CONTROLLER_SERVICE_SCHEDULING: &str = "FlowControllerServiceScheduling";

/// Components of the flow are being started.
pub const REASON_FLOW_SCHEDULING: &str = "FlowScheduling";

/// The flow changed concurrently and is re-synchronized on the next pass.
pub const REASON_FLOW_SYNCING: &str = "FlowSyncing";

/// A parameter context update request is running.
pub const REASON_PARAMETER_CONTEXT_UPDATING: &str = "ParameterContextUpdating";

/// A node is being added to or removed from the cluster.
pub const REASON_NODE_SCALING: &str = "NodeScaling";

/// NiFi is still validating the reporting task.
pub const REASON_REPORTING_TASK_VALIDATING: &str = "ReportingTaskValidating";

/// NiFi reports the reporting task configuration as invalid.
pub const REASON_REPORTING_TASK_INVALID: &str = "ReportingTaskInvalid";

// ============================================================================
// Certificate Reasons
// ============================================================================

/// The user certificate has not been issued yet.
pub const REASON_CERTIFICATE_NOT_READY: &str = "CertificateNotReady";

/// Certificate issuance failed and will not succeed without intervention.
pub const REASON_CERTIFICATE_FAILED: &str = "CertificateFailed";

// ============================================================================
// NiFi HTTP Error Reasons
// ============================================================================

/// NiFi rejected the request as malformed (400).
pub const REASON_NIFI_BAD_REQUEST: &str = "NifiBadRequest";

/// The operator identity is not authenticated or authorized (401/403).
pub const REASON_NIFI_AUTH_FAILED: &str = "NifiAuthFailed";

/// The remote entity does not exist (404).
pub const REASON_NIFI_NOT_FOUND: &str = "NifiEntityNotFound";

/// The cached revision is stale (409).
pub const REASON_NIFI_REVISION_CONFLICT: &str = "NifiRevisionConflict";

/// NiFi failed while handling the request (500).
pub const REASON_NIFI_INTERNAL_ERROR: &str = "NifiInternalError";

/// A proxy or load balancer in front of NiFi failed (502/503/504).
pub const REASON_GATEWAY_ERROR: &str = "GatewayError";

/// NiFi could not be reached or answered with an unexpected code.
pub const REASON_NIFI_UNREACHABLE: &str = "NifiUnreachable";
