// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers and the status write path.
//!
//! Every nifikop status carries a single `Ready` condition and `observedGeneration`
//! next to its resource-specific fields. A reconcile pass mutates an in-memory copy
//! of the status and hands it to a [`StatusWriter`] once, at the end, whatever the
//! outcome. Pending remote jobs and partial progress are therefore persisted even
//! when the pass fails.
//!
//! The write is skipped when nothing changed, since every status patch produces an
//! "object updated" watch event and a new reconcile.
//!
//! # Example
//!
//! ```rust,ignore
//! use nifikop::reconcilers::status::{record_outcome, write_if_changed, KubeStatusWriter};
//!
//! let mut status = client.status.clone().unwrap_or_default();
//! let result = registry_client::sync(&*api, &client).await.map(|_| ());
//! record_outcome(&mut status, client.metadata.generation, &result);
//! write_if_changed(&KubeStatusWriter::new(ctx.client.clone()), &client, client.status.as_ref(), &status).await?;
//! ```

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use kube::api::{Patch, PatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Debug;
use std::sync::Mutex;
use tracing::debug;

use crate::crd::{
    Condition, NifiClusterStatus, NifiDataflowStatus, NifiParameterContextStatus,
    RemoteEntityStatus,
};
use crate::errors::SyncResult;
use crate::retry::retry_api_call;
use crate::status_reasons::{CONDITION_TYPE_READY, REASON_SYNCHRONIZED};

/// Create a new condition stamped with the current time.
///
/// # Example
///
/// ```rust
/// # use nifikop::reconcilers::status::create_condition;
/// let condition = create_condition("Ready", "True", "Synchronized", "In sync with NiFi");
/// assert_eq!(condition.r#type, "Ready");
/// assert_eq!(condition.status, "True");
/// ```
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in place.
///
/// `lastTransitionTime` only moves when the condition status flips.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Compare two condition lists, ignoring transition times.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    current.len() == new.len()
        && new.iter().all(|n| {
            find_condition(current, &n.r#type).is_some_and(|c| {
                c.status == n.status && c.reason == n.reason && c.message == n.message
            })
        })
}

/// A status with a `Ready` condition and an observed generation.
pub trait ConditionedStatus: Serialize + Clone + PartialEq + Default + Send + Sync {
    fn conditions(&self) -> &[Condition];
    fn conditions_mut(&mut self) -> &mut Vec<Condition>;
    fn set_observed_generation(&mut self, generation: Option<i64>);
}

macro_rules! conditioned_status {
    ($($status:ty),+ $(,)?) => {
        $(
            impl ConditionedStatus for $status {
                fn conditions(&self) -> &[Condition] {
                    &self.conditions
                }

                fn conditions_mut(&mut self) -> &mut Vec<Condition> {
                    &mut self.conditions
                }

                fn set_observed_generation(&mut self, generation: Option<i64>) {
                    self.observed_generation = generation;
                }
            }
        )+
    };
}

conditioned_status!(
    RemoteEntityStatus,
    NifiDataflowStatus,
    NifiParameterContextStatus,
    NifiClusterStatus,
);

/// Record the result of a reconcile pass as the `Ready` condition.
///
/// Success is `True/Synchronized`. A pending remote job or a failure is `False` with
/// the reason of the error, so `kubectl get` shows what the resource is waiting on.
pub fn record_outcome<S: ConditionedStatus>(
    status: &mut S,
    generation: Option<i64>,
    result: &SyncResult<()>,
) {
    match result {
        Ok(()) => update_condition_in_memory(
            status.conditions_mut(),
            CONDITION_TYPE_READY,
            "True",
            REASON_SYNCHRONIZED,
            "Synchronized with NiFi",
        ),
        Err(e) => update_condition_in_memory(
            status.conditions_mut(),
            CONDITION_TYPE_READY,
            "False",
            e.status_reason(),
            &e.to_string(),
        ),
    }
    status.set_observed_generation(generation);
}

/// Persists the status subresource of a resource.
#[async_trait]
pub trait StatusWriter<K>: Send + Sync {
    /// Merge `status` into the status subresource of `resource`.
    async fn write(&self, resource: &K, status: Value) -> Result<()>;
}

/// Writes status with `Api::patch_status` and a JSON merge patch.
#[derive(Clone)]
pub struct KubeStatusWriter {
    client: Client,
}

impl KubeStatusWriter {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<K> StatusWriter<K> for KubeStatusWriter
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + DeserializeOwned
        + Send
        + Sync,
{
    async fn write(&self, resource: &K, status: Value) -> Result<()> {
        let namespace = resource.namespace().unwrap_or_default();
        let name = resource.name_any();
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        let patch = json!({ "status": status });
        let (api, name, patch) = (&api, &name, &patch);
        retry_api_call(
            || async move {
                api.patch_status(name, &PatchParams::default(), &Patch::Merge(patch))
                    .await
            },
            &format!("patch status of {} {namespace}/{name}", K::kind(&())),
        )
        .await?;
        Ok(())
    }
}

/// One write captured by [`RecordingStatusWriter`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedStatus {
    pub name: String,
    pub status: Value,
}

/// Keeps every write in memory, for tests.
#[derive(Default)]
pub struct RecordingStatusWriter {
    writes: Mutex<Vec<RecordedStatus>>,
}

impl RecordingStatusWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn writes(&self) -> Vec<RecordedStatus> {
        self.writes
            .lock()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }

    /// Last written status, deserialized.
    #[must_use]
    pub fn last<S: DeserializeOwned>(&self) -> Option<S> {
        self.writes()
            .last()
            .and_then(|w| serde_json::from_value(w.status.clone()).ok())
    }
}

#[async_trait]
impl<K> StatusWriter<K> for RecordingStatusWriter
where
    K: ResourceExt + Send + Sync,
{
    async fn write(&self, resource: &K, status: Value) -> Result<()> {
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(RecordedStatus {
                name: resource.name_any(),
                status,
            });
        }
        Ok(())
    }
}

/// Merge-patch body turning `current` into `new`.
///
/// Optional fields are omitted when unset, and a merge patch leaves omitted keys
/// untouched, so every key present before and absent now is sent as `null`.
#[must_use]
pub fn merge_patch_body(current: Option<&Value>, new: Value) -> Value {
    match (current, new) {
        (Some(Value::Object(old)), Value::Object(mut fields)) => {
            for (key, old_value) in old {
                match fields.remove(key) {
                    Some(value) => {
                        let merged = merge_patch_body(Some(old_value), value);
                        fields.insert(key.clone(), merged);
                    }
                    None => {
                        fields.insert(key.clone(), Value::Null);
                    }
                }
            }
            Value::Object(fields)
        }
        (_, new) => new,
    }
}

/// Write `new` unless it equals the status already stored on the resource.
///
/// Returns `true` when a write happened.
///
/// # Errors
///
/// Serialization or Kubernetes API failures.
pub async fn write_if_changed<K, S>(
    writer: &dyn StatusWriter<K>,
    resource: &K,
    current: Option<&S>,
    new: &S,
) -> Result<bool>
where
    K: ResourceExt + Send + Sync,
    S: ConditionedStatus,
{
    if current == Some(new) {
        debug!(name = %resource.name_any(), "Status unchanged, skipping update");
        return Ok(false);
    }
    let previous = current.map(serde_json::to_value).transpose()?;
    let body = merge_patch_body(previous.as_ref(), serde_json::to_value(new)?);
    writer.write(resource, body).await?;
    Ok(true)
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
