// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP error code mapping to Kubernetes status condition reasons.
//!
//! NiFi answers every REST call with a status code; this module turns the codes that
//! surface as reconcile failures into condition reasons so `kubectl describe` tells
//! an operator where to look.
//!
//! # Usage
//!
//! ```rust
//! use nifikop::http_errors::map_http_error_to_reason;
//!
//! let (reason, message) = map_http_error_to_reason(404);
//! assert_eq!(reason, "NifiEntityNotFound");
//!
//! let (reason, message) = map_http_error_to_reason(503);
//! assert_eq!(reason, "GatewayError");
//! ```

use crate::nifi::NifiError;
use crate::status_reasons::{
    REASON_GATEWAY_ERROR, REASON_NIFI_AUTH_FAILED, REASON_NIFI_BAD_REQUEST,
    REASON_NIFI_INTERNAL_ERROR, REASON_NIFI_NOT_FOUND, REASON_NIFI_REVISION_CONFLICT,
    REASON_NIFI_UNREACHABLE,
};

/// Map HTTP status code to condition reason and message.
///
/// # HTTP Code Mapping
///
/// | HTTP Code | Reason | Meaning |
/// |-----------|--------|---------|
/// | 400 | `NifiBadRequest` | Invalid request format |
/// | 401 | `NifiAuthFailed` | Authentication required |
/// | 403 | `NifiAuthFailed` | Insufficient permissions |
/// | 404 | `NifiEntityNotFound` | Entity not found |
/// | 409 | `NifiRevisionConflict` | Stale revision |
/// | 500 | `NifiInternalError` | Internal server error |
/// | 502 | `GatewayError` | Bad gateway |
/// | 503 | `GatewayError` | Service unavailable |
/// | 504 | `GatewayError` | Gateway timeout |
/// | Other | `NifiUnreachable` | Unexpected error |
#[must_use]
pub fn map_http_error_to_reason(status_code: u16) -> (&'static str, String) {
    match status_code {
        400 => (
            REASON_NIFI_BAD_REQUEST,
            "Invalid request to NiFi API (400)".into(),
        ),
        401 => (
            REASON_NIFI_AUTH_FAILED,
            "NiFi authentication required (401)".into(),
        ),
        403 => (
            REASON_NIFI_AUTH_FAILED,
            "NiFi authorization failed (403)".into(),
        ),
        404 => (
            REASON_NIFI_NOT_FOUND,
            "Entity not found in NiFi (404)".into(),
        ),
        409 => (
            REASON_NIFI_REVISION_CONFLICT,
            "NiFi rejected a stale revision (409)".into(),
        ),
        500 => (
            REASON_NIFI_INTERNAL_ERROR,
            "NiFi API internal error (500)".into(),
        ),
        502 => (
            REASON_GATEWAY_ERROR,
            "Bad gateway reaching NiFi (502)".into(),
        ),
        503 => (
            REASON_GATEWAY_ERROR,
            "NiFi service unavailable (503)".into(),
        ),
        504 => (
            REASON_GATEWAY_ERROR,
            "Gateway timeout reaching NiFi (504)".into(),
        ),
        _ => (
            REASON_NIFI_UNREACHABLE,
            format!("Unexpected HTTP error from NiFi ({status_code})"),
        ),
    }
}

/// Map a remote client error to a condition reason and message.
///
/// Transport failures never carried a status code and map to `NifiUnreachable`.
#[must_use]
pub fn map_nifi_error_to_reason(error: &NifiError) -> (&'static str, String) {
    if error.is_revision_conflict() {
        return (REASON_NIFI_REVISION_CONFLICT, error.to_string());
    }
    match error.status_code() {
        Some(code) => {
            let (reason, _) = map_http_error_to_reason(code);
            (reason, error.to_string())
        }
        None => (REASON_NIFI_UNREACHABLE, error.to_string()),
    }
}

