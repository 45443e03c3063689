// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error taxonomy returned by every call against the NiFi REST API.
//!
//! Callers must distinguish [`NifiError::NotFound`] (the expected "create it" signal)
//! from [`NifiError::UnexpectedStatus`] (always a hard failure). A stale revision is
//! its own variant so wrappers can re-fetch and retry instead of failing.

use thiserror::Error;

/// Errors that can occur while talking to a NiFi cluster.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NifiError {
    /// The remote entity does not exist (HTTP 404).
    ///
    /// Never logged as an error: this drives create-on-first-sight logic.
    #[error("NiFi returned 404 for {method} {path}")]
    NotFound {
        /// HTTP method of the request
        method: String,
        /// API path relative to `/nifi-api`
        path: String,
    },

    /// NiFi answered with a non-success code other than 404 or a revision conflict.
    #[error("NiFi returned unexpected status {status} for {method} {path}: {body}")]
    UnexpectedStatus {
        /// HTTP method of the request
        method: String,
        /// API path relative to `/nifi-api`
        path: String,
        /// HTTP status code
        status: u16,
        /// Response body, as returned by NiFi
        body: String,
    },

    /// The revision carried by an update or delete no longer matches the remote entity.
    ///
    /// NiFi reports this as 400 (or 409) with a "not the most up-to-date revision" body.
    #[error("NiFi rejected stale revision {version} for {method} {path} ({status})")]
    RevisionConflict {
        /// HTTP method of the request
        method: String,
        /// API path relative to `/nifi-api`
        path: String,
        /// HTTP status code, 400 or 409
        status: u16,
        /// The version that was sent
        version: i64,
    },

    /// No response was received (connection error, TLS failure, operation timeout).
    #[error("transport failure calling {method} {path}: {reason}")]
    TransportFailure {
        /// HTTP method of the request
        method: String,
        /// API path relative to `/nifi-api`
        path: String,
        /// Underlying error
        reason: String,
    },

    /// No HTTP client could be selected for the request.
    #[error("no NiFi node client is available")]
    NoNodeClientsAvailable,

    /// The cluster describe call failed while building the client.
    ///
    /// A cluster that cannot be described is not usable at all.
    #[error("could not connect to NiFi nodes at {uri}: {reason}")]
    NodesUnreachable {
        /// Address used for the describe call
        uri: String,
        /// Underlying error
        reason: String,
    },

    /// A response could not be decoded into the expected entity.
    #[error("failed to decode NiFi response from {path}: {reason}")]
    Decode {
        /// API path relative to `/nifi-api`
        path: String,
        /// Decoder error
        reason: String,
    },

    /// The resolved client configuration cannot produce a usable client.
    #[error("invalid NiFi client configuration: {0}")]
    InvalidConfig(String),
}

impl NifiError {
    /// Returns true if the remote entity is absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the call failed because of a stale revision.
    #[must_use]
    pub fn is_revision_conflict(&self) -> bool {
        matches!(self, Self::RevisionConflict { .. })
    }

    /// Returns true for infrastructure trouble (no response at all).
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::TransportFailure { .. } | Self::NodesUnreachable { .. }
        )
    }

    /// Returns true if retrying the same idempotent read may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TransportFailure { .. } => true,
            Self::UnexpectedStatus { status, .. } => {
                matches!(status, 429 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    /// HTTP status code attached to the error, when the remote answered.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::UnexpectedStatus { status, .. } | Self::RevisionConflict { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}
