// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `finalizers.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{NifiUser, NifiUserSpec, ResourceReference};
    use crate::labels::{FINALIZER_USER, FINALIZER_USER_CERTIFICATE};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    const OBLIGATIONS: &[&str] = &[FINALIZER_USER, FINALIZER_USER_CERTIFICATE];

    fn user(finalizers: &[&str]) -> NifiUser {
        let mut user = NifiUser::new(
            "alice",
            NifiUserSpec {
                identity: None,
                secret_name: None,
                cluster_ref: ResourceReference::new("nifi"),
                create_cert: true,
                dns_names: vec![],
                access_policies: vec![],
            },
        );
        user.metadata.namespace = Some("nifi".to_string());
        if !finalizers.is_empty() {
            user.metadata.finalizers =
                Some(finalizers.iter().map(ToString::to_string).collect());
        }
        user
    }

    #[test]
    fn test_is_deleting() {
        let mut resource = user(&[]);
        assert!(!is_deleting(&resource));

        resource.metadata.deletion_timestamp = Some(Time(k8s_openapi::jiff::Timestamp::now()));
        assert!(is_deleting(&resource));
    }

    #[test]
    fn test_pending_keeps_declaration_order() {
        let resource = user(&[FINALIZER_USER_CERTIFICATE, "other/finalizer", FINALIZER_USER]);

        assert_eq!(
            pending(&resource, OBLIGATIONS),
            vec![FINALIZER_USER, FINALIZER_USER_CERTIFICATE]
        );
        assert!(pending(&user(&[]), OBLIGATIONS).is_empty());
    }

    #[test]
    fn test_with_obligations_adds_only_missing() {
        let resource = user(&["other/finalizer", FINALIZER_USER]);

        let finalizers = with_obligations(&resource, OBLIGATIONS).unwrap();

        assert_eq!(
            finalizers,
            vec![
                "other/finalizer".to_string(),
                FINALIZER_USER.to_string(),
                FINALIZER_USER_CERTIFICATE.to_string()
            ]
        );
        assert!(with_obligations(&user(OBLIGATIONS), OBLIGATIONS).is_none());
    }

    #[test]
    fn test_without_obligations_keeps_foreign_finalizers() {
        let resource = user(&[FINALIZER_USER, "other/finalizer", FINALIZER_USER_CERTIFICATE]);

        assert_eq!(
            without_obligations(&resource, &[FINALIZER_USER]).unwrap(),
            vec![
                "other/finalizer".to_string(),
                FINALIZER_USER_CERTIFICATE.to_string()
            ]
        );
        assert_eq!(
            without_obligations(&resource, OBLIGATIONS).unwrap(),
            vec!["other/finalizer".to_string()]
        );
        assert!(without_obligations(&user(&["other/finalizer"]), OBLIGATIONS).is_none());
    }
}
