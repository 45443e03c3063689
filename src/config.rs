// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Operator configuration from command-line flags and environment variables.
//!
//! Logging is configured separately through `RUST_LOG` and `RUST_LOG_FORMAT`.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_ERROR_REQUEUE_SECS, DEFAULT_METRICS_BIND_ADDRESS, DEFAULT_OPERATION_TIMEOUT_SECS,
    DEFAULT_REQUEUE_INTERVAL_SECS, DEFAULT_REQUEUE_OFFSET_SECS, SHORT_REQUEUE_DIVISOR,
};

/// nifikop controller settings.
#[derive(Parser, Clone, Debug, PartialEq, Eq)]
#[command(name = "nifikop", version, about = "Apache NiFi Operator for Kubernetes")]
pub struct OperatorConfig {
    /// Steady-state requeue interval, in seconds
    #[arg(
        long,
        env = "NIFIKOP_REQUEUE_INTERVAL",
        default_value_t = DEFAULT_REQUEUE_INTERVAL_SECS
    )]
    pub requeue_interval: u64,

    /// Upper bound of the random jitter added to every requeue, in seconds
    #[arg(
        long,
        env = "NIFIKOP_REQUEUE_OFFSET",
        default_value_t = DEFAULT_REQUEUE_OFFSET_SECS
    )]
    pub requeue_offset: u64,

    /// Deadline of every NiFi REST call, in seconds
    #[arg(
        long,
        env = "NIFIKOP_OPERATION_TIMEOUT",
        default_value_t = DEFAULT_OPERATION_TIMEOUT_SECS
    )]
    pub operation_timeout: u64,

    /// Address the `/metrics` endpoint listens on
    #[arg(
        long,
        env = "NIFIKOP_METRICS_BIND_ADDRESS",
        default_value = DEFAULT_METRICS_BIND_ADDRESS
    )]
    pub metrics_bind_address: SocketAddr,

    /// Requeue interval after a failed reconciliation, in seconds
    #[arg(long, default_value_t = DEFAULT_ERROR_REQUEUE_SECS)]
    pub error_requeue: u64,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            requeue_interval: DEFAULT_REQUEUE_INTERVAL_SECS,
            requeue_offset: DEFAULT_REQUEUE_OFFSET_SECS,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT_SECS,
            metrics_bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            error_requeue: DEFAULT_ERROR_REQUEUE_SECS,
        }
    }
}

impl OperatorConfig {
    #[must_use]
    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_interval)
    }

    /// Interval used while a remote job is still running.
    #[must_use]
    pub fn short_requeue_interval(&self) -> Duration {
        self.requeue_interval() / SHORT_REQUEUE_DIVISOR
    }

    #[must_use]
    pub fn requeue_offset(&self) -> Duration {
        Duration::from_secs(self.requeue_offset)
    }

    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout)
    }

    #[must_use]
    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue)
    }
}
