// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Entity synchronization wrappers.
//!
//! Every wrapper exposes the same four operations for its entity kind:
//!
//! - `exists`: a stored remote id is present and the remote entity answers `GET`
//! - `create`: post a scratch entity built from the declared spec
//! - `sync`: fetch, create when absent, update in place when the remote drifted
//! - `remove`: fetch (absent is a no-op) and delete at the fetched revision
//!
//! Wrappers take the narrowest capability trait they need, generic over `?Sized`
//! so a reconciler can pass `&*Arc<dyn NifiApi>` and tests can pass a fake.
//! Each returns the entity's [`RevisionToken`] so the caller can persist the
//! `(id, version)` pair it observed.
//!
//! Updates and deletes are compare-and-swap on the revision version. A stale
//! version fails with a revision conflict, which [`with_conflict_retry`] answers by
//! re-running the whole fetch-then-write step a bounded number of times.
//!
//! [`RevisionToken`]: crate::nifi::types::RevisionToken

pub mod access_policy;
pub mod dataflow;
pub mod jobs;
pub mod parameter_context;
pub mod registry_client;
pub mod reporting_task;
pub mod user;
pub mod user_group;

use std::future::Future;
use tracing::debug;

use crate::constants::MAX_REVISION_CONFLICT_RETRIES;
use crate::errors::SyncResult;
use crate::nifi::NifiResult;

/// Turn a `NotFound` answer into `None`.
///
/// Absence is the expected "create it" signal; every other error is propagated.
pub(crate) fn found<T>(result: NifiResult<T>) -> NifiResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Stored remote id, ignoring empty strings.
pub(crate) fn stored_id(id: Option<&str>) -> Option<&str> {
    id.filter(|id| !id.is_empty())
}

/// Run a fetch-then-write step, re-running it after a revision conflict.
///
/// `step` must re-read the remote entity on every call so the retried write carries
/// the current revision. Gives up after [`MAX_REVISION_CONFLICT_RETRIES`] attempts
/// and returns the last conflict.
pub async fn with_conflict_retry<T, F, Fut>(operation: &str, mut step: F) -> SyncResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SyncResult<T>>,
{
    let mut attempt = 1;
    loop {
        match step().await {
            Err(e) if e.is_revision_conflict() && attempt < MAX_REVISION_CONFLICT_RETRIES => {
                debug!(
                    operation,
                    attempt,
                    error = %e,
                    "Stale revision, re-fetching before retry"
                );
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
