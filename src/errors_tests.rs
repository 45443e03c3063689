// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for synchronization error types

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::status_reasons::{REASON_NIFI_NOT_FOUND, REASON_NIFI_UNREACHABLE};

    #[test]
    fn test_async_condition_reasons() {
        assert_eq!(
            AsyncCondition::ConnectionDropping.reason(),
            "ConnectionDropping"
        );
        assert_eq!(AsyncCondition::FlowDraining.to_string(), "FlowDraining");
        assert_eq!(
            AsyncCondition::ReportingTaskValidating.reason(),
            "ReportingTaskValidating"
        );
    }

    #[test]
    fn test_pending_is_not_a_failure() {
        let err = SyncError::Pending(AsyncCondition::FlowUpdateRequestRunning);
        assert!(err.is_pending());
        assert_eq!(
            err.pending_condition(),
            Some(AsyncCondition::FlowUpdateRequestRunning)
        );
        assert_eq!(err.status_reason(), "FlowUpdateRequestRunning");

        let err = SyncError::Invalid("bad".into());
        assert!(!err.is_pending());
        assert_eq!(err.pending_condition(), None);
    }

    #[test]
    fn test_remote_errors_map_to_nifi_reasons() {
        let err: SyncError = NifiError::NotFound {
            method: "GET".into(),
            path: "/process-groups/x".into(),
        }
        .into();
        assert_eq!(err.status_reason(), REASON_NIFI_NOT_FOUND);
        assert_eq!(err.metric_category(), "remote");

        let err: SyncError = NifiError::NoNodeClientsAvailable.into();
        assert_eq!(err.status_reason(), REASON_NIFI_UNREACHABLE);
    }

    #[test]
    fn test_revision_conflict_detection() {
        let err: SyncError = NifiError::RevisionConflict {
            method: "PUT".into(),
            path: "/tenants/users/u".into(),
            status: 409,
            version: 3,
        }
        .into();
        assert!(err.is_revision_conflict());
        assert!(!SyncError::Invalid("x".into()).is_revision_conflict());
    }

    #[test]
    fn test_lookup_reasons() {
        let not_found = SyncError::Reference(LookupError::NotFound {
            kind: "NifiCluster",
            name: "nifi".into(),
            namespace: "data".into(),
        });
        assert_eq!(not_found.status_reason(), "ReferenceNotFound");

        let not_ready = SyncError::Reference(LookupError::NotReady {
            kind: "NifiRegistryClient",
            name: "registry".into(),
            namespace: "data".into(),
            reason: "no id".into(),
        });
        assert_eq!(not_ready.status_reason(), "ReferenceNotReady");

        let inconsistent = SyncError::Reference(LookupError::InconsistentClusterReferences(
            "a != b".into(),
        ));
        assert_eq!(inconsistent.status_reason(), "InconsistentClusterReferences");
    }

    #[test]
    fn test_cluster_not_ready_is_only_the_cluster() {
        let cluster = SyncError::Reference(LookupError::NotReady {
            kind: "NifiCluster",
            name: "nifi".into(),
            namespace: "data".into(),
            reason: "nodes connecting".into(),
        });
        assert!(cluster.is_cluster_not_ready());

        let registry = SyncError::Reference(LookupError::NotReady {
            kind: "NifiRegistryClient",
            name: "registry".into(),
            namespace: "data".into(),
            reason: "no id".into(),
        });
        assert!(!registry.is_cluster_not_ready());
        assert_eq!(
            SyncError::Pending(AsyncCondition::NodeScaling).status_reason(),
            "NodeScaling"
        );
    }

    #[test]
    fn test_lookup_kind() {
        let err = LookupError::NotFound {
            kind: "NifiUser",
            name: "alice".into(),
            namespace: "data".into(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.kind(), Some("NifiUser"));
        assert_eq!(err.to_string(), "NifiUser data/alice not found");
    }

    #[test]
    fn test_pki_reasons() {
        assert_eq!(
            SyncError::Pki(PkiError::NotReady("secret".into())).status_reason(),
            "CertificateNotReady"
        );
        assert_eq!(
            SyncError::Pki(PkiError::Fatal("no issuer".into())).status_reason(),
            "CertificateFailed"
        );
    }

    #[test]
    fn test_reconcile_error_keeps_sync_error() {
        let err = ReconcileError::from(anyhow::Error::new(SyncError::Pending(
            AsyncCondition::FlowScheduling,
        )));
        assert!(err
            .sync_error()
            .is_some_and(|e| e.pending_condition() == Some(AsyncCondition::FlowScheduling)));

        let plain = ReconcileError::from(anyhow::anyhow!("boom"));
        assert!(plain.sync_error().is_none());
        assert_eq!(plain.to_string(), "boom");
    }
}
