// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management for nifikop resources.
//!
//! A resource carries one finalizer per deletion obligation: a piece of external
//! state it owns (remote entity, issued certificate, PKI material). Deletion runs
//! each obligation in order and removes its finalizer as soon as it is discharged,
//! so an interrupted deletion resumes with only the obligations still pending.
//!
//! # Example
//!
//! ```rust,ignore
//! use nifikop::labels::{FINALIZER_USER, FINALIZER_USER_CERTIFICATE};
//! use nifikop::reconcilers::finalizers::{ensure_finalizers, is_deleting, pending, remove_finalizers};
//!
//! const OBLIGATIONS: &[&str] = &[FINALIZER_USER, FINALIZER_USER_CERTIFICATE];
//!
//! if is_deleting(&user) {
//!     let mut discharged = Vec::new();
//!     for obligation in pending(&user, OBLIGATIONS) {
//!         discharge(obligation).await?;
//!         discharged.push(obligation);
//!         remove_finalizers(&client, &user, &discharged).await?;
//!     }
//!     return Ok(());
//! }
//! ensure_finalizers(&client, &user, OBLIGATIONS).await?;
//! ```

use anyhow::Result;
use kube::api::{Patch, PatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt::Debug;
use tracing::info;

use crate::retry::retry_api_call;

/// True once Kubernetes has set a deletion timestamp on the resource.
#[must_use]
pub fn is_deleting<T: Resource>(resource: &T) -> bool {
    resource.meta().deletion_timestamp.is_some()
}

/// True when `finalizer` is present on the resource.
#[must_use]
pub fn has_finalizer<T: Resource>(resource: &T, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|x| x == finalizer))
}

/// Obligations from `obligations` still held by the resource, in declaration order.
#[must_use]
pub fn pending<'a, T: Resource>(resource: &T, obligations: &[&'a str]) -> Vec<&'a str> {
    obligations
        .iter()
        .copied()
        .filter(|o| has_finalizer(resource, o))
        .collect()
}

/// Finalizer list with every obligation present, or `None` when nothing is missing.
#[must_use]
pub fn with_obligations<T: Resource>(resource: &T, obligations: &[&str]) -> Option<Vec<String>> {
    let mut finalizers = resource.meta().finalizers.clone().unwrap_or_default();
    let before = finalizers.len();
    for obligation in obligations {
        if !finalizers.iter().any(|f| f == obligation) {
            finalizers.push((*obligation).to_string());
        }
    }
    (finalizers.len() != before).then_some(finalizers)
}

async fn patch_finalizers<T>(client: &Client, resource: &T, finalizers: &[String]) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + DeserializeOwned,
{
    let namespace = resource.namespace().unwrap_or_default();
    let name = resource.name_any();
    let api: Api<T> = Api::namespaced(client.clone(), &namespace);
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    let (api, name, patch) = (&api, &name, &patch);
    retry_api_call(
        || async move {
            api.patch(name, &PatchParams::default(), &Patch::Merge(patch))
                .await
        },
        &format!("patch finalizers of {} {namespace}/{name}", T::kind(&())),
    )
    .await?;
    Ok(())
}

/// Add every missing obligation in a single patch.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn ensure_finalizers<T>(client: &Client, resource: &T, obligations: &[&str]) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + DeserializeOwned,
{
    let Some(finalizers) = with_obligations(resource, obligations) else {
        return Ok(());
    };
    info!(
        kind = %T::kind(&()),
        namespace = %resource.namespace().unwrap_or_default(),
        name = %resource.name_any(),
        ?obligations,
        "Adding finalizers"
    );
    patch_finalizers(client, resource, &finalizers).await
}

/// Finalizer list without `discharged`, or `None` when none of them is present.
#[must_use]
pub fn without_obligations<T: Resource>(resource: &T, discharged: &[&str]) -> Option<Vec<String>> {
    let finalizers = resource.meta().finalizers.clone().unwrap_or_default();
    let before = finalizers.len();
    let kept: Vec<String> = finalizers
        .into_iter()
        .filter(|f| !discharged.contains(&f.as_str()))
        .collect();
    (kept.len() != before).then_some(kept)
}

/// Remove discharged obligations.
///
/// `discharged` holds every obligation discharged so far in this pass: the patch
/// replaces the whole list, and the in-memory resource still carries the earlier ones.
/// Idempotent: nothing is sent when none of them is present.
///
/// # Errors
///
/// Returns an error if the API patch operation fails.
pub async fn remove_finalizers<T>(client: &Client, resource: &T, discharged: &[&str]) -> Result<()>
where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + DeserializeOwned,
{
    let Some(finalizers) = without_obligations(resource, discharged) else {
        return Ok(());
    };
    info!(
        kind = %T::kind(&()),
        namespace = %resource.namespace().unwrap_or_default(),
        name = %resource.name_any(),
        ?discharged,
        "Removing finalizers"
    );
    patch_finalizers(client, resource, &finalizers).await
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
