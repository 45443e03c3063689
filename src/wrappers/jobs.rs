// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Asynchronous NiFi requests tracked across reconciles.
//!
//! Drop, flow update and parameter-context update requests are never awaited in
//! process. The last poll result is persisted in the resource status and the next
//! reconcile polls again. [`JobState`] is derived from that persisted snapshot.

use std::fmt;

use crate::crd::{DataflowUpdateRequestType, DropRequest, ParameterContextUpdateRequest, UpdateRequest};
use crate::nifi::types::{DropRequestDto, ParameterContextUpdateRequestDto, VersionedFlowUpdateRequestDto};

/// Lifecycle of a remote request as last observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobState {
    /// Accepted by NiFi, no progress reported yet
    Submitted,
    /// In progress
    Polling,
    Finished,
    /// Ended with the given reason
    Failed(String),
}

impl JobState {
    /// True while NiFi is still working on the request.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Submitted | Self::Polling)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted => f.write_str("Submitted"),
            Self::Polling => f.write_str("Polling"),
            Self::Finished => f.write_str("Finished"),
            Self::Failed(reason) => write!(f, "Failed: {reason}"),
        }
    }
}

/// A persisted snapshot of a remote request.
pub trait RemoteJob {
    fn request_id(&self) -> &str;
    fn is_complete(&self) -> bool;
    fn percent_completed(&self) -> i32;
    fn failure_reason(&self) -> Option<&str>;

    fn job_state(&self) -> JobState {
        if let Some(reason) = self.failure_reason().filter(|r| !r.is_empty()) {
            return JobState::Failed(reason.to_string());
        }
        if self.is_complete() {
            JobState::Finished
        } else if self.percent_completed() > 0 {
            JobState::Polling
        } else {
            JobState::Submitted
        }
    }
}

impl RemoteJob for DropRequest {
    fn request_id(&self) -> &str {
        &self.id
    }

    fn is_complete(&self) -> bool {
        self.finished
    }

    fn percent_completed(&self) -> i32 {
        self.percent_completed
    }

    fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }
}

impl RemoteJob for UpdateRequest {
    fn request_id(&self) -> &str {
        &self.id
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn percent_completed(&self) -> i32 {
        self.percent_completed
    }

    fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }
}

impl RemoteJob for ParameterContextUpdateRequest {
    fn request_id(&self) -> &str {
        &self.id
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn percent_completed(&self) -> i32 {
        self.percent_completed
    }

    fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }
}

/// Status snapshot of a drop request on `connection_id`.
#[must_use]
pub fn drop_request_status(connection_id: &str, dto: &DropRequestDto) -> DropRequest {
    DropRequest {
        connection_id: connection_id.to_string(),
        id: dto.id.clone(),
        uri: dto.uri.clone(),
        last_updated: dto.last_updated.clone(),
        finished: dto.finished,
        failure_reason: dto.failure_reason.clone(),
        percent_completed: dto.percent_completed,
        current_count: dto.current_count,
        current_size: dto.current_size,
        original_count: dto.original_count,
        original_size: dto.original_size,
        dropped_count: dto.dropped_count,
        dropped_size: dto.dropped_size,
        state: dto.state.clone(),
    }
}

/// Status snapshot of a flow update or revert request.
#[must_use]
pub fn update_request_status(
    kind: DataflowUpdateRequestType,
    dto: &VersionedFlowUpdateRequestDto,
) -> UpdateRequest {
    UpdateRequest {
        r#type: kind,
        id: dto.request_id.clone(),
        uri: dto.uri.clone(),
        last_updated: dto.last_updated.clone(),
        complete: dto.complete,
        failure_reason: dto.failure_reason.clone(),
        percent_completed: dto.percent_completed,
        state: dto.state.clone(),
    }
}

/// Status snapshot of a parameter-context update request.
#[must_use]
pub fn parameter_context_request_status(
    dto: &ParameterContextUpdateRequestDto,
) -> ParameterContextUpdateRequest {
    ParameterContextUpdateRequest {
        id: dto.request_id.clone(),
        uri: dto.uri.clone(),
        last_updated: dto.last_updated.clone(),
        complete: dto.complete,
        failure_reason: dto.failure_reason.clone(),
        percent_completed: dto.percent_completed,
        state: dto.state.clone(),
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod jobs_tests;
