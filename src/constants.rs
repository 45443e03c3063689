// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the NiFi operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

use std::time::Duration;

// ============================================================================
// API Constants
// ============================================================================

/// API group for all NiFi CRDs
pub const API_GROUP: &str = "nifi.firestoned.io";

/// API version for all NiFi CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "nifi.firestoned.io/v1alpha1";

/// Kind name for `NifiCluster` resource
pub const KIND_NIFI_CLUSTER: &str = "NifiCluster";

/// Kind name for `NifiDataflow` resource
pub const KIND_NIFI_DATAFLOW: &str = "NifiDataflow";

/// Kind name for `NifiRegistryClient` resource
pub const KIND_NIFI_REGISTRY_CLIENT: &str = "NifiRegistryClient";

/// Kind name for `NifiUser` resource
pub const KIND_NIFI_USER: &str = "NifiUser";

/// Kind name for `NifiUserGroup` resource
pub const KIND_NIFI_USER_GROUP: &str = "NifiUserGroup";

/// Kind name for `NifiParameterContext` resource
pub const KIND_NIFI_PARAMETER_CONTEXT: &str = "NifiParameterContext";

/// Name used for event reporting and field management
pub const CONTROLLER_NAME: &str = "nifikop";

// ============================================================================
// NiFi REST API Constants
// ============================================================================

/// Path prefix of the NiFi REST API on every node
pub const NIFI_API_PATH: &str = "/nifi-api";

/// Default HTTPS listener port of a managed node
pub const DEFAULT_HTTPS_PORT: i32 = 8443;

/// Default HTTP listener port of a managed node
pub const DEFAULT_HTTP_PORT: i32 = 8080;

/// Default operation timeout for every remote call (seconds)
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 5;

/// Placeholder replaced by the node id in external node URI templates
pub const NODE_URI_TEMPLATE_PLACEHOLDER: &str = "%d";

/// Alias accepted by NiFi for the root process group id
pub const ROOT_PROCESS_GROUP_ALIAS: &str = "root";

/// Marker NiFi puts in the body of a 400 response caused by a stale revision
pub const STALE_REVISION_MARKER: &str = "is not the most up-to-date revision";

// ============================================================================
// NiFi Node Roles and Statuses
// ============================================================================

/// Role held by the node coordinating the cluster
pub const CLUSTER_COORDINATOR_ROLE: &str = "Cluster Coordinator";

/// Role held by the primary node
pub const PRIMARY_NODE_ROLE: &str = "Primary Node";

pub const NODE_STATUS_CONNECTING: &str = "CONNECTING";
pub const NODE_STATUS_CONNECTED: &str = "CONNECTED";
pub const NODE_STATUS_DISCONNECTING: &str = "DISCONNECTING";
pub const NODE_STATUS_DISCONNECTED: &str = "DISCONNECTED";
pub const NODE_STATUS_OFFLOADING: &str = "OFFLOADING";
pub const NODE_STATUS_OFFLOADED: &str = "OFFLOADED";
pub const NODE_STATUS_REMOVING: &str = "REMOVING";
pub const NODE_STATUS_REMOVED: &str = "REMOVED";

// ============================================================================
// NiFi Component States
// ============================================================================

/// Run state used to start components
pub const COMPONENT_STATE_RUNNING: &str = "RUNNING";

/// Run state used to stop components
pub const COMPONENT_STATE_STOPPED: &str = "STOPPED";

/// Run state of a disabled component
pub const COMPONENT_STATE_DISABLED: &str = "DISABLED";

/// Controller service activation state
pub const CONTROLLER_SERVICE_ENABLED: &str = "ENABLED";

/// Controller service deactivation state
pub const CONTROLLER_SERVICE_DISABLED: &str = "DISABLED";

/// Transitional controller service state while enabling
pub const CONTROLLER_SERVICE_ENABLING: &str = "ENABLING";

/// Transitional controller service state while disabling
pub const CONTROLLER_SERVICE_DISABLING: &str = "DISABLING";

/// Validation status reported while NiFi is still validating a component
pub const VALIDATION_STATUS_VALIDATING: &str = "VALIDATING";

/// Validation status reported for a component with an invalid configuration
pub const VALIDATION_STATUS_INVALID: &str = "INVALID";

/// Version control states of a process group that require a revert before any update
pub const VCI_LOCALLY_MODIFIED: &str = "LOCALLY_MODIFIED";
pub const VCI_LOCALLY_MODIFIED_AND_STALE: &str = "LOCALLY_MODIFIED_AND_STALE";

// ============================================================================
// Managed Reporting Task
// ============================================================================

/// Name of the operator managed Prometheus reporting task
pub const PROMETHEUS_REPORTING_TASK_NAME: &str = "managed-prometheus";

/// Java type of the Prometheus reporting task
pub const PROMETHEUS_REPORTING_TASK_TYPE: &str =
    "org.apache.nifi.reporting.prometheus.PrometheusReportingTask";

pub const REPORTING_TASK_PORT_PROPERTY: &str = "prometheus-reporting-task-metrics-endpoint-port";
pub const REPORTING_TASK_STRATEGY_PROPERTY: &str = "prometheus-reporting-task-metrics-strategy";
pub const REPORTING_TASK_SEND_JVM_PROPERTY: &str = "prometheus-reporting-task-metrics-send-jvm";
pub const REPORTING_TASK_STRATEGY_ALL_COMPONENTS: &str = "All Components";

// ============================================================================
// Controller Timing Constants
// ============================================================================

/// Default steady-state requeue interval (seconds)
pub const DEFAULT_REQUEUE_INTERVAL_SECS: u64 = 60;

/// Default upper bound for random jitter added to requeues (seconds)
pub const DEFAULT_REQUEUE_OFFSET_SECS: u64 = 5;

/// Default requeue used by the controller error policy (seconds)
pub const DEFAULT_ERROR_REQUEUE_SECS: u64 = 30;

/// Divisor applied to the requeue interval while an asynchronous remote job runs
pub const SHORT_REQUEUE_DIVISOR: u32 = 3;

/// Requeue while a user certificate is not yet issued
pub const CERTIFICATE_NOT_READY_REQUEUE: Duration = Duration::from_secs(5);

/// Requeue after a fatal PKI failure
pub const CERTIFICATE_FATAL_REQUEUE: Duration = Duration::from_secs(15);

/// Bounded number of re-fetch-and-retry attempts after a revision conflict
pub const MAX_REVISION_CONFLICT_RETRIES: usize = 3;

// ============================================================================
// PKI Secret Keys
// ============================================================================

/// Secret key holding a PEM certificate
pub const SECRET_KEY_TLS_CERT: &str = "tls.crt";

/// Secret key holding a PEM private key
pub const SECRET_KEY_TLS_KEY: &str = "tls.key";

/// Secret key holding the PEM CA certificate
pub const SECRET_KEY_CA_CERT: &str = "ca.crt";

/// Self-managed CA secret key holding the CA certificate
pub const SECRET_KEY_CA_CERT_SELF_MANAGED: &str = "caCert";

/// Self-managed CA secret key holding the CA private key
pub const SECRET_KEY_CA_KEY_SELF_MANAGED: &str = "caKey";

// ============================================================================
// Metrics Server
// ============================================================================

/// Default bind address of the `/metrics` endpoint
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Path served by the metrics endpoint
pub const METRICS_PATH: &str = "/metrics";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of Tokio worker threads
pub const TOKIO_WORKER_THREADS: usize = 4;
