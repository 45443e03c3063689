// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label, annotation and finalizer constants used across all reconcilers.
//!
//! Finalizers are modelled as deletion obligations: a resource carries one finalizer
//! per piece of external state it owns, and deletion completes once each of them has
//! been discharged (see [`crate::reconcilers::finalizers`]).

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for a unique name identifying the instance of an application
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

/// Value for `app.kubernetes.io/part-of` and `managed-by`
pub const PART_OF_NIFIKOP: &str = "nifikop";

// ============================================================================
// NiFi-Specific Labels
// ============================================================================

/// Label binding a dependent resource to the cluster it is synchronized against
pub const NIFI_CLUSTER_LABEL: &str = "nifi.firestoned.io/cluster";

/// Label carried by node pods with the NiFi node id
pub const NIFI_NODE_ID_LABEL: &str = "nifi.firestoned.io/node-id";

// ============================================================================
// NiFi-Specific Annotations
// ============================================================================

/// Annotation recording the last cluster reference a dependent was bound to
pub const LAST_CLUSTER_REF_ANNOTATION: &str = "nifi.firestoned.io/last-cluster-ref";

// ============================================================================
// Finalizers (deletion obligations)
// ============================================================================

/// Obligation: the remote NiFi registry client must be removed
pub const FINALIZER_REGISTRY_CLIENT: &str = "nifiregistryclients.nifi.firestoned.io/finalizer";

/// Obligation: the remote process group of a dataflow must be removed
pub const FINALIZER_DATAFLOW: &str = "nifidataflows.nifi.firestoned.io/finalizer";

/// Obligation: the remote NiFi user must be removed
pub const FINALIZER_USER: &str = "nifiusers.nifi.firestoned.io/finalizer";

/// Obligation: the user certificate must be revoked
pub const FINALIZER_USER_CERTIFICATE: &str = "nifiusers.nifi.firestoned.io/certificate";

/// Obligation: the remote NiFi user group must be removed
pub const FINALIZER_USER_GROUP: &str = "nifiusergroups.nifi.firestoned.io/finalizer";

/// Obligation: the remote parameter context must be removed
pub const FINALIZER_PARAMETER_CONTEXT: &str =
    "nifiparametercontexts.nifi.firestoned.io/finalizer";

/// Obligation: the managed reporting task of a cluster must be removed
pub const FINALIZER_CLUSTER_REPORTING_TASK: &str =
    "nificlusters.nifi.firestoned.io/reporting-task";

/// Obligation: the cluster PKI material must be removed
pub const FINALIZER_CLUSTER_PKI: &str = "nificlusters.nifi.firestoned.io/pki";
