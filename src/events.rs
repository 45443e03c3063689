// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes Event recording for nifikop controllers.
//!
//! Every lifecycle transition of a resource emits an Event visible with
//! `kubectl describe`. Events are fire-and-forget: a failed publish is logged as a
//! warning and never fails reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use std::sync::Mutex;
use tracing::warn;

/// Publishes Kubernetes Events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an Event on `resource_ref`.
    ///
    /// * `reason` - machine-readable reason, see [`reasons`]
    /// * `action` - what was attempted, see [`actions`]
    /// * `note` - optional human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Publish a `Normal` event on a resource.
pub async fn normal<K>(events: &dyn EventPublisher, resource: &K, reason: &str, note: String)
where
    K: Resource<DynamicType = ()>,
{
    events
        .publish(
            &resource.object_ref(&()),
            EventType::Normal,
            reason,
            actions::RECONCILE,
            Some(note),
        )
        .await;
}

/// Publish a `Warning` event on a resource.
pub async fn warning<K>(events: &dyn EventPublisher, resource: &K, reason: &str, note: String)
where
    K: Resource<DynamicType = ()>,
{
    events
        .publish(
            &resource.object_ref(&()),
            EventType::Warning,
            reason,
            actions::RECONCILE,
            Some(note),
        )
        .await;
}

/// Publisher backed by `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// The controller name appears as the reporting component of every Event.
    #[must_use]
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason,
                action,
                object = ?resource_ref.name,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// Publisher that drops every event.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// One event captured by [`RecordingEventPublisher`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    pub object: Option<String>,
    pub warning: bool,
    pub reason: String,
    pub note: Option<String>,
}

/// Publisher that keeps every event in memory, for tests.
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Reasons of every recorded event, in order.
    #[must_use]
    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }

    /// Number of `Warning` events.
    #[must_use]
    pub fn warnings(&self) -> usize {
        self.events().iter().filter(|e| e.warning).count()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        _action: &str,
        note: Option<String>,
    ) {
        if let Ok(mut events) = self.events.lock() {
            events.push(RecordedEvent {
                object: resource_ref.name.clone(),
                warning: type_ == EventType::Warning,
                reason: reason.to_string(),
                note,
            });
        }
    }
}

/// Event reasons, shown in the REASON column of `kubectl get events`.
pub mod reasons {
    pub const RECONCILING: &str = "Reconciling";
    pub const RECONCILED: &str = "Reconciled";

    pub const CREATING: &str = "Creating";
    pub const CREATED: &str = "Created";
    pub const CREATION_FAILED: &str = "CreationFailed";

    pub const SYNCHRONIZING: &str = "Synchronizing";
    pub const SYNCHRONIZED: &str = "Synchronized";
    pub const SYNCHRONIZING_FAILED: &str = "SynchronizingFailed";

    pub const STARTING: &str = "Starting";
    pub const STARTING_FAILED: &str = "StartingFailed";
    pub const RAN: &str = "Ran";

    pub const REMOVING: &str = "Removing";
    pub const REMOVED: &str = "Removed";
    pub const REMOVE_ERROR: &str = "RemoveError";

    pub const REFERENCE_CLUSTER_ERROR: &str = "ReferenceClusterError";
    pub const REFERENCE_REGISTRY_CLIENT_ERROR: &str = "ReferenceRegistryClientError";
    pub const REFERENCE_PARAMETER_CONTEXT_ERROR: &str = "ReferenceParameterContextError";
    pub const REFERENCE_USER_ERROR: &str = "ReferenceUserError";
    pub const REFERENCE_CLUSTER_NOT_READY: &str = "ReferenceClusterNotReady";

    pub const RECONCILING_CERTIFICATE: &str = "ReconcilingCertificate";
    pub const RECONCILED_CERTIFICATE: &str = "ReconciledCertificate";

    /// Graceful node scale step
    pub const SCALING: &str = "Scaling";
}

/// Event actions, shown in the ACTION column of `kubectl get events`.
pub mod actions {
    pub const RECONCILE: &str = "Reconcile";
}
