// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff.
//!
//! Two callers use it: Kubernetes API writes (finalizer and status patches) and
//! idempotent NiFi reads. NiFi creates, updates and deletes are never retried here:
//! a create that timed out may still have happened, and retrying it could produce a
//! duplicate remote entity.

use anyhow::Result;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::nifi::NifiError;

/// Maximum total time to spend retrying Kubernetes API calls (5 minutes)
const MAX_ELAPSED_TIME_SECS: u64 = 300;

/// Initial retry interval (100ms)
const INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Maximum interval between retries (30 seconds)
const MAX_INTERVAL_SECS: u64 = 30;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// NiFi read retry initial interval (50ms)
const NIFI_INITIAL_INTERVAL_MILLIS: u64 = 50;

/// NiFi read retry maximum interval (2 seconds)
const NIFI_MAX_INTERVAL_SECS: u64 = 2;

/// NiFi read retry maximum elapsed time (10 seconds), well inside one reconcile
const NIFI_MAX_ELAPSED_TIME_SECS: u64 = 10;

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Initial interval duration
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Maximum total elapsed time
    pub max_elapsed_time: Option<Duration>,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
    start_time: Instant,
}

impl ExponentialBackoff {
    fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            randomization_factor,
            start_time: Instant::now(),
        }
    }

    /// Get the next backoff interval, or None if max elapsed time exceeded.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.start_time.elapsed() >= max_elapsed {
                return None;
            }
        }

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        jitter(interval, self.randomization_factor)
    }
}

/// Spread `interval` uniformly over `±factor`.
#[must_use]
pub fn jitter(interval: Duration, factor: f64) -> Duration {
    if factor == 0.0 {
        return interval;
    }
    let secs = interval.as_secs_f64();
    let delta = secs * factor;
    // random::<f64>() is uniform in [0, 1)
    let jittered = secs - delta + rand::random::<f64>() * 2.0 * delta;
    Duration::from_secs_f64(jittered.max(0.0))
}

/// Create default exponential backoff configuration for Kubernetes API retries.
///
/// # Configuration
///
/// - **Initial interval**: 100ms
/// - **Max interval**: 30 seconds
/// - **Max elapsed time**: 5 minutes total
/// - **Multiplier**: 2.0 (exponential growth)
/// - **Randomization**: ±10% (prevents thundering herd)
#[must_use]
pub fn default_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(MAX_INTERVAL_SECS),
        Some(Duration::from_secs(MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Create exponential backoff configuration for NiFi reads.
///
/// A reconcile must not stall on an unreachable cluster: reads give up after ten
/// seconds and the next reconcile tries again.
///
/// # Retry Schedule
///
/// 1. 50ms
/// 2. 100ms
/// 3. 200ms
/// 4. 400ms
/// 5. 800ms
/// 6. 1.6s
/// 7. 2s (capped at max interval) until 10 seconds elapsed
#[must_use]
pub fn nifi_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(NIFI_INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(NIFI_MAX_INTERVAL_SECS),
        Some(Duration::from_secs(NIFI_MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Retry a Kubernetes API call with exponential backoff.
///
/// Automatically retries on transient errors (HTTP 429, 5xx) and fails immediately
/// on permanent errors (4xx client errors except 429).
///
/// # Errors
///
/// Returns error if:
/// - Non-retryable error encountered (4xx client error)
/// - Max elapsed time exceeded (5 minutes)
///
/// # Example
///
/// ```no_run
/// use kube::{Api, Client};
/// use nifikop::crd::NifiCluster;
/// use nifikop::retry::retry_api_call;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = Client::try_default().await?;
/// let api: Api<NifiCluster> = Api::namespaced(client, "nifi");
///
/// let cluster = retry_api_call(
///     || async { api.get("nifi").await },
///     "get cluster nifi"
/// ).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_api_call<T, F, Fut>(mut operation: F, operation_name: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, kube::Error>>,
{
    let mut backoff = default_backoff();
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Kubernetes API call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if !is_retryable_error(&e) {
                    error!(
                        operation = operation_name,
                        error = %e,
                        "Non-retryable Kubernetes API error, failing immediately"
                    );
                    return Err(e.into());
                }

                if let Some(duration) = backoff.next_backoff() {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?duration,
                        error = %e,
                        "Retryable Kubernetes API error, will retry"
                    );
                    tokio::time::sleep(duration).await;
                } else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Backoff exhausted, giving up"
                    );
                    return Err(anyhow::anyhow!(
                        "Backoff exhausted after {attempt} attempts: {e}"
                    ));
                }
            }
        }
    }
}

/// Retry an idempotent NiFi read with exponential backoff.
///
/// Only [`NifiError::is_transient`] failures are retried; the last error is returned
/// unchanged once the backoff is exhausted so callers can still switch on its kind.
///
/// # Errors
///
/// Returns the first non-transient error, or the last transient one.
pub async fn retry_nifi_read<T, F, Fut>(
    mut operation: F,
    operation_name: &str,
) -> Result<T, NifiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, NifiError>>,
{
    let mut backoff = nifi_backoff();
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => match backoff.next_backoff() {
                Some(duration) => {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?duration,
                        error = %e,
                        "Transient NiFi error, will retry"
                    );
                    tokio::time::sleep(duration).await;
                }
                None => return Err(e),
            },
        }
    }
}

/// Determine if a Kubernetes error is retryable.
///
/// Rate limiting (429), server errors (5xx) and service (connection) errors are
/// retryable; every other client error is not.
pub(crate) fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(api_err) => {
            api_err.code == 429 || (api_err.code >= 500 && api_err.code < 600)
        }
        kube::Error::Service(_) => true,
        _ => false,
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
