// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! cert-manager PKI backend.
//!
//! Certificates are requested as `cert-manager.io/v1` `Certificate` objects and read
//! back from the secrets cert-manager populates. Without an explicit `issuerRef`, a
//! CA chain is bootstrapped per cluster:
//!
//! ```text
//! {cluster}-selfsigned-issuer ──signs──▶ {cluster}-ca-certificate
//!                                              │
//!                        {cluster}-issuer ◀────┘ (CA issuer)
//!                              │
//!                              ├──▶ {cluster}-controller (operator client cert)
//!                              └──▶ one Certificate per NifiUser
//! ```

use kube::api::{DeleteParams, DynamicObject, PostParams};
use kube::core::GroupVersionKind;
use kube::discovery::ApiResource;
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use tracing::{debug, info};

use super::{
    ca_secret_name, controller_secret_name, delete_secret, issuer_name, read_tls_secret,
    spiffe_id, PkiError, TlsMaterial, UserCertificate,
};
use crate::crd::{IssuerReference, NifiCluster, NifiUser};

const CERT_MANAGER_GROUP: &str = "cert-manager.io";
const CERT_MANAGER_VERSION: &str = "v1";

fn certificate_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        CERT_MANAGER_GROUP,
        CERT_MANAGER_VERSION,
        "Certificate",
    ))
}

fn issuer_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        CERT_MANAGER_GROUP,
        CERT_MANAGER_VERSION,
        "Issuer",
    ))
}

/// cert-manager backend bound to one cluster.
#[derive(Clone, Debug)]
pub struct CertManagerPki {
    cluster: NifiCluster,
}

impl CertManagerPki {
    #[must_use]
    pub fn new(cluster: NifiCluster) -> Self {
        Self { cluster }
    }

    fn name(&self) -> String {
        self.cluster.name_any()
    }

    fn namespace(&self) -> String {
        self.cluster.namespace().unwrap_or_else(|| "default".to_string())
    }

    /// Issuer signing node, controller and user certificates.
    #[must_use]
    pub fn issuer(&self) -> IssuerReference {
        self.cluster
            .spec
            .listeners
            .ssl
            .as_ref()
            .and_then(|ssl| ssl.issuer_ref.clone())
            .unwrap_or_else(|| IssuerReference {
                name: issuer_name(&self.name()),
                kind: "Issuer".to_string(),
            })
    }

    fn uses_bootstrapped_issuer(&self) -> bool {
        self.cluster
            .spec
            .listeners
            .ssl
            .as_ref()
            .and_then(|ssl| ssl.issuer_ref.as_ref())
            .is_none()
    }

    /// Objects making up the cluster CA chain, in creation order.
    #[must_use]
    pub fn ca_chain_objects(&self) -> Vec<(ApiResource, DynamicObject)> {
        let name = self.name();
        let namespace = self.namespace();
        let selfsigned = format!("{name}-selfsigned-issuer");
        let ca_secret = ca_secret_name(&name);

        let issuer_ar = issuer_resource();
        let cert_ar = certificate_resource();

        let selfsigned_issuer = DynamicObject::new(&selfsigned, &issuer_ar)
            .within(&namespace)
            .data(json!({ "spec": { "selfSigned": {} } }));

        let ca_certificate = DynamicObject::new(&ca_secret, &cert_ar)
            .within(&namespace)
            .data(json!({
                "spec": {
                    "isCA": true,
                    "commonName": format!("{name}-ca"),
                    "secretName": ca_secret,
                    "privateKey": { "algorithm": "ECDSA", "size": 256 },
                    "issuerRef": { "name": selfsigned, "kind": "Issuer", "group": CERT_MANAGER_GROUP }
                }
            }));

        let ca_issuer = DynamicObject::new(&issuer_name(&name), &issuer_ar)
            .within(&namespace)
            .data(json!({ "spec": { "ca": { "secretName": ca_secret } } }));

        vec![
            (issuer_ar.clone(), selfsigned_issuer),
            (cert_ar, ca_certificate),
            (issuer_ar, ca_issuer),
        ]
    }

    /// `Certificate` for the operator's own client identity.
    #[must_use]
    pub fn controller_certificate(&self) -> DynamicObject {
        let name = controller_secret_name(&self.name());
        let issuer = self.issuer();
        DynamicObject::new(&name, &certificate_resource())
            .within(&self.namespace())
            .data(json!({
                "spec": {
                    "commonName": name,
                    "secretName": name,
                    "privateKey": { "encoding": "PKCS8" },
                    "usages": ["client auth", "server auth"],
                    "issuerRef": { "name": issuer.name, "kind": issuer.kind, "group": CERT_MANAGER_GROUP }
                }
            }))
    }

    /// `Certificate` for a user, owned by the `NifiUser`.
    #[must_use]
    pub fn user_certificate(&self, user: &NifiUser) -> DynamicObject {
        let user_name = user.name_any();
        let user_namespace = user.namespace().unwrap_or_else(|| self.namespace());
        let issuer = self.issuer();

        let mut spec = json!({
            "commonName": user.identity(),
            "secretName": user.secret_name(),
            "privateKey": { "encoding": "PKCS8" },
            "uris": [spiffe_id(&self.name(), &user_namespace, &user_name)],
            "usages": ["client auth", "server auth"],
            "issuerRef": { "name": issuer.name, "kind": issuer.kind, "group": CERT_MANAGER_GROUP }
        });
        if !user.spec.dns_names.is_empty() {
            spec["dnsNames"] = json!(user.spec.dns_names);
        }

        let mut certificate = DynamicObject::new(&user_name, &certificate_resource())
            .within(&user_namespace)
            .data(json!({ "spec": spec }));
        if let Some(owner) = user.controller_owner_ref(&()) {
            certificate.meta_mut().owner_references = Some(vec![owner]);
        }
        certificate
    }

    pub(crate) async fn reconcile_pki(&self, client: &Client) -> Result<(), PkiError> {
        if self.uses_bootstrapped_issuer() {
            for (resource, object) in self.ca_chain_objects() {
                create_if_absent(client, &resource, &object).await?;
            }
        }
        create_if_absent(client, &certificate_resource(), &self.controller_certificate()).await?;
        Ok(())
    }

    pub(crate) async fn finalize_pki(&self, client: &Client) -> Result<(), PkiError> {
        let namespace = self.namespace();
        let controller = controller_secret_name(&self.name());
        delete_if_present(client, &certificate_resource(), &namespace, &controller).await?;
        delete_secret(client, &namespace, &controller).await?;

        if self.uses_bootstrapped_issuer() {
            for (resource, object) in self.ca_chain_objects().into_iter().rev() {
                delete_if_present(client, &resource, &namespace, &object.name_any()).await?;
            }
            delete_secret(client, &namespace, &ca_secret_name(&self.name())).await?;
        }
        info!(cluster = %self.name(), namespace = %namespace, "Removed cert-manager PKI");
        Ok(())
    }

    pub(crate) async fn reconcile_user_certificate(
        &self,
        client: &Client,
        user: &NifiUser,
    ) -> Result<UserCertificate, PkiError> {
        let certificate = self.user_certificate(user);
        create_if_absent(client, &certificate_resource(), &certificate).await?;

        let namespace = user.namespace().unwrap_or_else(|| self.namespace());
        read_tls_secret(client, &namespace, &user.secret_name()).await
    }

    pub(crate) async fn finalize_user_certificate(
        &self,
        client: &Client,
        user: &NifiUser,
    ) -> Result<(), PkiError> {
        let namespace = user.namespace().unwrap_or_else(|| self.namespace());
        delete_if_present(client, &certificate_resource(), &namespace, &user.name_any()).await?;
        delete_secret(client, &namespace, &user.secret_name()).await
    }

    pub(crate) async fn controller_tls_config(
        &self,
        client: &Client,
    ) -> Result<TlsMaterial, PkiError> {
        read_tls_secret(
            client,
            &self.namespace(),
            &controller_secret_name(&self.name()),
        )
        .await
    }
}

async fn create_if_absent(
    client: &Client,
    resource: &ApiResource,
    object: &DynamicObject,
) -> Result<(), PkiError> {
    let namespace = object.namespace().unwrap_or_else(|| "default".to_string());
    let name = object.name_any();
    let api: Api<DynamicObject> = Api::namespaced_with(client.clone(), &namespace, resource);

    if api.get_opt(&name).await?.is_some() {
        debug!(kind = %resource.kind, name = %name, namespace = %namespace, "cert-manager object exists");
        return Ok(());
    }
    match api.create(&PostParams::default(), object).await {
        Ok(_) => {
            info!(kind = %resource.kind, name = %name, namespace = %namespace, "Created cert-manager object");
            Ok(())
        }
        Err(kube::Error::Api(e)) if e.code == 409 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn delete_if_present(
    client: &Client,
    resource: &ApiResource,
    namespace: &str,
    name: &str,
) -> Result<(), PkiError> {
    let api: Api<DynamicObject> = Api::namespaced_with(client.clone(), namespace, resource);
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "certmanager_tests.rs"]
mod certmanager_tests;
