// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Node pods of a managed cluster.
//!
//! The operator never creates node pods; graceful downscale only deletes the pod
//! of a node once NiFi has offloaded it.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams};
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info};

use crate::crd::NifiCluster;
use crate::errors::SyncResult;
use crate::labels::{NIFI_CLUSTER_LABEL, NIFI_NODE_ID_LABEL};

/// Pod operations the scale state machine needs.
#[async_trait]
pub trait NodePods: Send + Sync {
    /// Delete every pod of the node; absent is success.
    async fn delete(&self, cluster: &NifiCluster, node_id: i32) -> SyncResult<()>;

    /// True while a pod of the node still exists, terminating ones included.
    async fn exists(&self, cluster: &NifiCluster, node_id: i32) -> SyncResult<bool>;
}

/// Label selector matching the pods of one node.
#[must_use]
pub fn node_selector(cluster: &NifiCluster, node_id: i32) -> String {
    format!(
        "{NIFI_CLUSTER_LABEL}={},{NIFI_NODE_ID_LABEL}={node_id}",
        cluster.name_any()
    )
}

/// [`NodePods`] backed by the Kubernetes API.
pub struct KubeNodePods {
    client: Client,
}

impl KubeNodePods {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, cluster: &NifiCluster) -> Api<Pod> {
        Api::namespaced(
            self.client.clone(),
            &cluster.namespace().unwrap_or_default(),
        )
    }
}

#[async_trait]
impl NodePods for KubeNodePods {
    async fn delete(&self, cluster: &NifiCluster, node_id: i32) -> SyncResult<()> {
        let api = self.api(cluster);
        let lp = ListParams::default().labels(&node_selector(cluster, node_id));
        for pod in api.list(&lp).await?.items {
            let name = pod.name_any();
            match api.delete(&name, &DeleteParams::default()).await {
                Ok(_) => info!(pod = %name, node_id, "Deleted node pod"),
                Err(kube::Error::Api(ae)) if ae.code == 404 => {
                    debug!(pod = %name, "Node pod already deleted");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn exists(&self, cluster: &NifiCluster, node_id: i32) -> SyncResult<bool> {
        let lp = ListParams::default().labels(&node_selector(cluster, node_id));
        Ok(!self.api(cluster).list(&lp).await?.items.is_empty())
    }
}
