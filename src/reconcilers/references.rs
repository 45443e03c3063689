// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cross-resource reference resolution.
//!
//! References are re-read from the API server on every reconcile. A missing
//! resource is [`LookupError::NotFound`]; a resource that exists but has not been
//! synchronized yet (no remote id, cluster nodes still connecting) is
//! [`LookupError::NotReady`].
//!
//! Dependents also carry two pieces of metadata describing the cluster they are
//! bound to: the [`NIFI_CLUSTER_LABEL`] label, used to select every dependent of a
//! cluster, and the [`LAST_CLUSTER_REF_ANNOTATION`] annotation, used to detect a
//! `clusterRef` change and remove the entity from the previous cluster first.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Patch, PatchParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info};

use crate::clientconfig::ClusterConnect;
use crate::constants::KIND_NIFI_CLUSTER;
use crate::context::Context;
use crate::crd::{ClusterReference, NifiCluster, ResourceReference};
use crate::errors::{LookupError, SyncResult};
use crate::labels::{LAST_CLUSTER_REF_ANNOTATION, NIFI_CLUSTER_LABEL};
use crate::nifi::NifiApi;
use crate::retry::retry_api_call;

/// Fetch the resource a reference points at.
///
/// # Errors
///
/// [`LookupError::NotFound`] when it does not exist, [`LookupError::Kube`] on API
/// failures.
pub async fn get<K>(
    client: &Client,
    kind: &'static str,
    reference: &ResourceReference,
    namespace: &str,
) -> Result<K, LookupError>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + DeserializeOwned,
{
    let namespace = reference.namespace_or(namespace);
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    api.get_opt(&reference.name)
        .await?
        .ok_or_else(|| LookupError::NotFound {
            kind,
            name: reference.name.clone(),
            namespace: namespace.to_string(),
        })
}

/// Remote id of a referenced entity, or `NotReady` until it has one.
///
/// # Errors
///
/// [`LookupError::NotReady`] when `id` is unset.
pub fn require_remote_id(
    kind: &'static str,
    reference: &ResourceReference,
    namespace: &str,
    id: Option<&str>,
) -> Result<String, LookupError> {
    id.map(ToString::to_string)
        .ok_or_else(|| LookupError::NotReady {
            kind,
            name: reference.name.clone(),
            namespace: reference.namespace_or(namespace).to_string(),
            reason: "not synchronized with NiFi yet".to_string(),
        })
}

/// Check that every `(kind, clusterRef)` of the references of one resource points
/// at the same cluster as `expected`.
///
/// # Errors
///
/// [`LookupError::InconsistentClusterReferences`] naming the first mismatch.
pub fn ensure_same_cluster(
    expected: &ClusterReference,
    namespace: &str,
    others: &[(&str, &ClusterReference, &str)],
) -> Result<(), LookupError> {
    let expected = expected.resolved(namespace);
    for (kind, reference, other_namespace) in others {
        let resolved = reference.resolved(other_namespace);
        if resolved != expected {
            return Err(LookupError::InconsistentClusterReferences(format!(
                "{kind} is bound to cluster {resolved}, expected {expected}"
            )));
        }
    }
    Ok(())
}

/// A resolved cluster with a ready client.
#[derive(Clone)]
pub struct ClusterBinding {
    pub cluster: NifiCluster,
    pub connect: ClusterConnect,
    pub api: Arc<dyn NifiApi>,
}

impl ClusterBinding {
    /// Root process group id: the declared one, the one recorded in status, or the
    /// one NiFi reports.
    ///
    /// # Errors
    ///
    /// Remote failures fetching the root process group.
    pub async fn root_process_group_id(&self) -> SyncResult<String> {
        if let Some(id) = self.cluster.root_process_group_id() {
            return Ok(id.to_string());
        }
        let root = self
            .api
            .get_process_group(crate::constants::ROOT_PROCESS_GROUP_ALIAS)
            .await?;
        Ok(root.id)
    }
}

fn not_ready(cluster: &NifiCluster, reason: &str) -> LookupError {
    LookupError::NotReady {
        kind: KIND_NIFI_CLUSTER,
        name: cluster.name_any(),
        namespace: cluster.namespace().unwrap_or_default(),
        reason: reason.to_string(),
    }
}

/// Resolve a cluster reference into a client.
///
/// # Errors
///
/// `NotFound` when the cluster does not exist, `NotReady` when it is being deleted
/// or not every node is connected, configuration or remote errors otherwise.
pub async fn connect_cluster(
    ctx: &Context,
    reference: &ClusterReference,
    namespace: &str,
) -> SyncResult<ClusterBinding> {
    let cluster: NifiCluster = get(&ctx.client, KIND_NIFI_CLUSTER, reference, namespace).await?;
    if cluster.metadata.deletion_timestamp.is_some() {
        return Err(not_ready(&cluster, "cluster is being deleted").into());
    }
    bind(ctx, cluster).await
}

/// Build a client for an already fetched cluster.
///
/// # Errors
///
/// Same as [`connect_cluster`], minus the lookup.
pub async fn bind(ctx: &Context, cluster: NifiCluster) -> SyncResult<ClusterBinding> {
    let connect = ctx.config_manager(&cluster).build_connect(&ctx.client).await?;
    if !connect.is_ready(ctx.factory.as_ref()).await {
        return Err(not_ready(&cluster, "not every node is connected").into());
    }
    let api = ctx.factory.connect(connect.config()).await?;
    Ok(ClusterBinding {
        cluster,
        connect,
        api,
    })
}

/// Cluster to remove a dependent from, during its deletion.
///
/// `None` when the cluster is gone or being deleted: the remote entity goes away
/// with it and the obligation is discharged without a remote call.
///
/// # Errors
///
/// `NotReady` while the cluster exists but is not reachable.
pub async fn removal_target(
    ctx: &Context,
    reference: &ClusterReference,
    namespace: &str,
) -> SyncResult<Option<ClusterBinding>> {
    let cluster: NifiCluster =
        match get(&ctx.client, KIND_NIFI_CLUSTER, reference, namespace).await {
            Ok(cluster) => cluster,
            Err(e) if e.is_not_found() => {
                debug!(cluster = %reference, "Cluster is gone, nothing to remove");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
    if cluster.metadata.deletion_timestamp.is_some() {
        debug!(cluster = %reference, "Cluster is being deleted, nothing to remove");
        return Ok(None);
    }
    bind(ctx, cluster).await.map(Some)
}

/// Cluster reference recorded on the resource at its last successful bind.
#[must_use]
pub fn last_cluster_ref(meta: &ObjectMeta) -> Option<ClusterReference> {
    let value = meta.annotations.as_ref()?.get(LAST_CLUSTER_REF_ANNOTATION)?;
    match value.split_once('/') {
        Some((namespace, name)) if !name.is_empty() => {
            Some(ResourceReference::namespaced(name, namespace))
        }
        _ if !value.is_empty() => Some(ResourceReference::new(value.clone())),
        _ => None,
    }
}

/// Annotation value for a resolved cluster reference.
#[must_use]
pub fn cluster_ref_annotation(reference: &ClusterReference, namespace: &str) -> String {
    format!("{}/{}", reference.namespace_or(namespace), reference.name)
}

/// The previous cluster, when the resource was bound to another one before.
#[must_use]
pub fn previous_cluster(
    meta: &ObjectMeta,
    current: &ClusterReference,
    namespace: &str,
) -> Option<ClusterReference> {
    let last = last_cluster_ref(meta)?.resolved(namespace);
    (last != current.resolved(namespace)).then_some(last)
}

/// Metadata merge patch binding a dependent to a cluster, or `None` when the label
/// and annotation are already in place.
#[must_use]
pub fn cluster_binding_patch(
    meta: &ObjectMeta,
    label: &str,
    reference: &ClusterReference,
    namespace: &str,
) -> Option<Value> {
    let annotation = cluster_ref_annotation(reference, namespace);
    let label_set = meta
        .labels
        .as_ref()
        .and_then(|l| l.get(NIFI_CLUSTER_LABEL))
        .is_some_and(|v| v == label);
    let annotation_set = meta
        .annotations
        .as_ref()
        .and_then(|a| a.get(LAST_CLUSTER_REF_ANNOTATION))
        .is_some_and(|v| *v == annotation);
    if label_set && annotation_set {
        return None;
    }
    Some(json!({
        "metadata": {
            "labels": { NIFI_CLUSTER_LABEL: label },
            "annotations": { LAST_CLUSTER_REF_ANNOTATION: annotation },
        }
    }))
}

/// Label the resource with its cluster and record the bound cluster reference.
///
/// # Errors
///
/// Kubernetes API failures.
pub async fn bind_to_cluster<K>(
    client: &Client,
    resource: &K,
    binding: &ClusterBinding,
    reference: &ClusterReference,
) -> anyhow::Result<()>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + DeserializeOwned,
{
    let namespace = resource.namespace().unwrap_or_default();
    let label = binding.connect.cluster_label_string();
    let Some(patch) = cluster_binding_patch(resource.meta(), &label, reference, &namespace)
    else {
        return Ok(());
    };
    let name = resource.name_any();
    info!(
        kind = %K::kind(&()),
        namespace = %namespace,
        name = %name,
        cluster = %label,
        "Binding resource to cluster"
    );
    let api: Api<K> = Api::namespaced(client.clone(), &namespace);
    let (api, name, patch) = (&api, &name, &patch);
    retry_api_call(
        || async move {
            api.patch(name, &PatchParams::default(), &Patch::Merge(patch))
                .await
        },
        &format!("patch cluster binding of {} {namespace}/{name}", K::kind(&())),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
#[path = "references_tests.rs"]
mod references_tests;
