// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests for the NiFi operator
//!
//! These tests need a Kubernetes cluster with the CRDs installed. The resource
//! tests also expect the operator to be running against a reachable NiFi cluster
//! named `nifi` in the test namespace.
//!
//! Run with: cargo test --test simple_integration -- --ignored

#![allow(clippy::manual_let_else)]

mod common;

use common::{create_test_namespace, delete_test_namespace, get_kube_client_or_skip, wait_for};
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{CustomResourceExt, ResourceExt};
use nifikop::crd::{
    NifiCluster, NifiDataflow, NifiParameterContext, NifiRegistryClient, NifiUser, NifiUserGroup,
};
use nifikop::labels::FINALIZER_REGISTRY_CLIENT;
use serde_json::json;

// ============================================================================
// Basic Connectivity Tests
// ============================================================================

#[tokio::test]
#[ignore] // Run with: cargo test --test simple_integration -- --ignored
async fn test_kubernetes_connectivity() {
    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let namespaces: Api<Namespace> = Api::all(client);
    let ns_list = namespaces
        .list(&ListParams::default().limit(5))
        .await
        .unwrap_or_else(|e| panic!("Failed to list namespaces: {e}"));

    assert!(!ns_list.items.is_empty(), "Expected at least one namespace");
}

#[tokio::test]
#[ignore]
async fn test_crds_installed() {
    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let crds: Api<CustomResourceDefinition> = Api::all(client);
    let expected = [
        NifiCluster::crd_name(),
        NifiUser::crd_name(),
        NifiUserGroup::crd_name(),
        NifiRegistryClient::crd_name(),
        NifiParameterContext::crd_name(),
        NifiDataflow::crd_name(),
    ];

    for name in expected {
        match crds.get(name).await {
            Ok(crd) => println!("✓ Found CRD {}", crd.spec.names.kind),
            Err(e) => panic!("CRD {name} not installed (kubectl apply -f deploy/crds/): {e}"),
        }
    }
}

// ============================================================================
// Resource Tests
// ============================================================================

#[tokio::test]
#[ignore]
async fn test_cluster_create_read_delete() {
    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let namespace = "nifikop-test-cluster";
    create_test_namespace(&client, namespace)
        .await
        .unwrap_or_else(|e| panic!("Failed to create namespace: {e}"));

    let clusters: Api<NifiCluster> = Api::namespaced(client.clone(), namespace);
    let cluster: NifiCluster = serde_json::from_value(json!({
        "apiVersion": "nifi.firestoned.io/v1alpha1",
        "kind": "NifiCluster",
        "metadata": { "name": "external", "namespace": namespace },
        "spec": {
            "type": "external",
            "nodeUriTemplate": "nifi-%d.nifi-headless.nifi.svc.cluster.local:8080",
            "nifiUri": "nifi.nifi.svc.cluster.local",
            "rootProcessGroupId": "root",
            "nodes": [{ "id": 0 }],
        },
    }))
    .unwrap();

    match clusters.create(&PostParams::default(), &cluster).await {
        Ok(created) => assert_eq!(created.metadata.name.as_deref(), Some("external")),
        Err(kube::Error::Api(ae)) if ae.code == 409 => println!("  NifiCluster already exists"),
        Err(e) => panic!("Failed to create NifiCluster: {e}"),
    }

    let retrieved = clusters
        .get("external")
        .await
        .unwrap_or_else(|e| panic!("Failed to retrieve NifiCluster: {e}"));
    assert!(retrieved.spec.is_external());
    assert_eq!(retrieved.spec.nodes.len(), 1);

    let _ = clusters.delete("external", &DeleteParams::default()).await;
    delete_test_namespace(&client, namespace).await;
}

#[tokio::test]
#[ignore]
async fn test_registry_client_gets_finalizer_and_id() {
    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let namespace = "nifikop-test";
    let registries: Api<NifiRegistryClient> = Api::namespaced(client.clone(), namespace);
    let registry: NifiRegistryClient = serde_json::from_value(json!({
        "apiVersion": "nifi.firestoned.io/v1alpha1",
        "kind": "NifiRegistryClient",
        "metadata": { "name": "registry", "namespace": namespace },
        "spec": {
            "uri": "http://nifi-registry:18080",
            "clusterRef": { "name": "nifi" },
        },
    }))
    .unwrap();

    match registries.create(&PostParams::default(), &registry).await {
        Ok(_) => println!("✓ Created NifiRegistryClient"),
        Err(kube::Error::Api(ae)) if ae.code == 409 => {}
        Err(e) => panic!("Failed to create NifiRegistryClient: {e}"),
    }

    let synced = wait_for(&registries, "registry", 30, |r| {
        r.status.as_ref().is_some_and(|s| s.id.is_some())
    })
    .await
    .expect("registry client was never synchronized");

    assert!(synced.finalizers().iter().any(|f| f == FINALIZER_REGISTRY_CLIENT));

    registries
        .delete("registry", &DeleteParams::default())
        .await
        .unwrap_or_else(|e| panic!("Failed to delete NifiRegistryClient: {e}"));
    for _ in 0..30 {
        if matches!(registries.get_opt("registry").await, Ok(None)) {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    }
    panic!("registry client finalizer was never released");
}

#[test]
fn test_unit_tests_work() {
    assert_eq!(NifiCluster::crd_name(), "nificlusters.nifi.firestoned.io");
}
