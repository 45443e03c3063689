// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the NiFi operator.
//!
//! Every metric carries the namespace prefix `nifi_firestoned_io_` (prometheus-safe
//! version of "nifi.firestoned.io").
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - reconcile outcomes, durations and requeues
//! - **Remote Call Metrics** - NiFi REST calls by method and status class
//! - **Resource Lifecycle Metrics** - remote entities created and removed
//!
//! # Example
//!
//! ```rust,no_run
//! use nifikop::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("NifiDataflow", std::time::Duration::from_secs(1));
//! ```

use axum::{http::StatusCode, routing::get, Router};
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all nifikop metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "nifi_firestoned_io";

/// Global Prometheus metrics registry, exposed on `/metrics`.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn counter(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let opts = Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help);
    let counter = CounterVec::new(opts, labels).expect("valid counter definition");
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("counter registered once");
    counter
}

fn histogram(name: &str, help: &str, labels: &[&str], buckets: Vec<f64>) -> HistogramVec {
    let opts = HistogramOpts::new(format!("{METRICS_NAMESPACE}_{name}"), help).buckets(buckets);
    let histogram = HistogramVec::new(opts, labels).expect("valid histogram definition");
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("histogram registered once");
    histogram
}

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by resource type and outcome
///
/// Labels:
/// - `resource_type`: Kind of resource (e.g., `NifiDataflow`)
/// - `status`: Outcome (`success`, `error`, `requeue`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "reconciliations_total",
        "Total number of reconciliations by resource type and status",
        &["resource_type", "status"],
    )
});

/// Duration of reconciliations in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    histogram(
        "reconciliation_duration_seconds",
        "Duration of reconciliations in seconds by resource type",
        &["resource_type"],
        vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0],
    )
});

/// Total number of requeues
///
/// Labels:
/// - `resource_type`: Kind of resource
/// - `reason`: Condition that caused the requeue (e.g., `ConnectionDropping`)
pub static REQUEUE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "requeues_total",
        "Total number of requeue operations by resource type and reason",
        &["resource_type", "reason"],
    )
});

// ============================================================================
// Remote Call Metrics
// ============================================================================

/// Total number of NiFi REST calls
///
/// Labels:
/// - `method`: HTTP method
/// - `outcome`: `2xx`, `4xx`, `5xx`, `other` or `transport`
pub static NIFI_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "nifi_requests_total",
        "Total number of NiFi REST calls by method and outcome",
        &["method", "outcome"],
    )
});

/// Latency of NiFi REST calls in seconds
pub static NIFI_REQUEST_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    histogram(
        "nifi_request_duration_seconds",
        "Latency of NiFi REST calls in seconds by method",
        &["method"],
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
    )
});

// ============================================================================
// Resource Lifecycle Metrics
// ============================================================================

/// Total number of remote entities created
pub static RESOURCES_CREATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "resources_created_total",
        "Total number of remote entities created by resource type",
        &["resource_type"],
    )
});

/// Total number of remote entities removed
pub static RESOURCES_DELETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "resources_deleted_total",
        "Total number of remote entities removed by resource type",
        &["resource_type"],
    )
});

/// Total number of errors by resource type and category
///
/// Labels:
/// - `resource_type`: Kind of resource
/// - `error_type`: Category (`remote`, `reference`, `pki`, `kube`, `config`, `invalid`)
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter(
        "errors_total",
        "Total number of errors by resource type and error category",
        &["resource_type", "error_type"],
    )
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a short requeue caused by a remote job still running
pub fn record_reconciliation_requeue(resource_type: &str, reason: &str) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "requeue"])
        .inc();
    REQUEUE_TOTAL
        .with_label_values(&[resource_type, reason])
        .inc();
}

/// Record one NiFi REST call
///
/// # Arguments
/// * `method` - HTTP method
/// * `outcome` - Status class, or `transport` when no response was received
/// * `elapsed` - Time until the response (or failure)
pub fn record_nifi_request(method: &str, outcome: &str, elapsed: Duration) {
    NIFI_REQUESTS_TOTAL
        .with_label_values(&[method, outcome])
        .inc();
    NIFI_REQUEST_DURATION_SECONDS
        .with_label_values(&[method])
        .observe(elapsed.as_secs_f64());
}

/// Record a remote entity creation
pub fn record_resource_created(resource_type: &str) {
    RESOURCES_CREATED_TOTAL
        .with_label_values(&[resource_type])
        .inc();
}

/// Record a remote entity removal
pub fn record_resource_deleted(resource_type: &str) {
    RESOURCES_DELETED_TOTAL
        .with_label_values(&[resource_type])
        .inc();
}

/// Record an error
pub fn record_error(resource_type: &str, error_type: &str) {
    ERRORS_TOTAL
        .with_label_values(&[resource_type, error_type])
        .inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

/// `GET /metrics` handler.
///
/// # Errors
/// Returns 500 when the registry cannot be encoded
pub async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    gather_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Router serving the Prometheus endpoint.
pub fn metrics_router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}
