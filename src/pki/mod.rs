// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Certificate backends for clusters listening on TLS.
//!
//! A cluster selects its backend with `spec.listeners.ssl.pkiBackend`:
//!
//! - [`certmanager`] asks cert-manager for `Certificate` objects and waits for the
//!   issued secrets
//! - [`selfmanaged`] keeps a CA in a secret and signs certificates itself with `rcgen`
//!
//! Both expose the same capability set through [`PkiManager`]. Every operation has a
//! three-way outcome: ready, [`PkiError::NotReady`] (retry shortly) or fatal.

pub mod certmanager;
pub mod selfmanaged;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::constants::{SECRET_KEY_CA_CERT, SECRET_KEY_TLS_CERT, SECRET_KEY_TLS_KEY};
use crate::crd::{NifiCluster, NifiUser, PkiBackend};

/// PEM-encoded CA, certificate and private key.
#[derive(Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub ca_pem: String,
    pub cert_pem: String,
    pub key_pem: String,
}

// Keep private keys out of logs.
impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("ca_pem", &format!("{} bytes", self.ca_pem.len()))
            .field("cert_pem", &format!("{} bytes", self.cert_pem.len()))
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

/// Certificate bundle issued for a `NifiUser`.
pub type UserCertificate = TlsMaterial;

impl TlsMaterial {
    /// Read `ca.crt`, `tls.crt` and `tls.key` from a secret.
    ///
    /// # Errors
    ///
    /// Names the first key that is missing, empty or not UTF-8.
    pub fn from_secret(secret: &Secret) -> Result<Self, String> {
        let data = secret.data.as_ref().ok_or("secret has no data")?;
        let read = |key: &str| -> Result<String, String> {
            let value = data
                .get(key)
                .filter(|v| !v.0.is_empty())
                .ok_or_else(|| format!("key {key} is missing or empty"))?;
            String::from_utf8(value.0.clone()).map_err(|_| format!("key {key} is not valid UTF-8"))
        };
        Ok(Self {
            ca_pem: read(SECRET_KEY_CA_CERT)?,
            cert_pem: read(SECRET_KEY_TLS_CERT)?,
            key_pem: read(SECRET_KEY_TLS_KEY)?,
        })
    }

    /// Secret data in the `kubernetes.io/tls` layout plus `ca.crt`.
    #[must_use]
    pub fn to_secret_data(&self) -> BTreeMap<String, ByteString> {
        BTreeMap::from([
            (
                SECRET_KEY_CA_CERT.to_string(),
                ByteString(self.ca_pem.clone().into_bytes()),
            ),
            (
                SECRET_KEY_TLS_CERT.to_string(),
                ByteString(self.cert_pem.clone().into_bytes()),
            ),
            (
                SECRET_KEY_TLS_KEY.to_string(),
                ByteString(self.key_pem.clone().into_bytes()),
            ),
        ])
    }
}

/// Outcome of a PKI operation that did not succeed.
#[derive(Error, Debug)]
pub enum PkiError {
    /// Material is being issued; retry shortly.
    #[error("{0} is not ready yet")]
    NotReady(String),

    /// Material can never be produced as configured.
    #[error("PKI failure: {0}")]
    Fatal(String),

    #[error(transparent)]
    Kube(#[from] kube::Error),
}

impl PkiError {
    #[must_use]
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady(_))
    }
}

/// Name of the secret holding the operator's client certificate for a cluster.
#[must_use]
pub fn controller_secret_name(cluster_name: &str) -> String {
    format!("{cluster_name}-controller")
}

/// Name of the secret holding the cluster CA.
#[must_use]
pub fn ca_secret_name(cluster_name: &str) -> String {
    format!("{cluster_name}-ca-certificate")
}

/// Default cert-manager issuer of a cluster.
#[must_use]
pub fn issuer_name(cluster_name: &str) -> String {
    format!("{cluster_name}-issuer")
}

/// SPIFFE URI SAN put on user certificates.
#[must_use]
pub fn spiffe_id(cluster_name: &str, namespace: &str, user_name: &str) -> String {
    format!("spiffe://{cluster_name}/ns/{namespace}/nifiuser/{user_name}")
}

/// PKI backend of one cluster.
#[derive(Clone, Debug)]
pub enum PkiManager {
    CertManager(certmanager::CertManagerPki),
    SelfManaged(selfmanaged::SelfManagedPki),
}

impl PkiManager {
    #[must_use]
    pub fn for_cluster(cluster: &NifiCluster) -> Self {
        let backend = cluster
            .spec
            .listeners
            .ssl
            .as_ref()
            .map(|ssl| ssl.pki_backend)
            .unwrap_or_default();
        match backend {
            PkiBackend::CertManager => {
                Self::CertManager(certmanager::CertManagerPki::new(cluster.clone()))
            }
            PkiBackend::SelfManaged => {
                Self::SelfManaged(selfmanaged::SelfManagedPki::new(cluster.clone()))
            }
        }
    }

    /// Ensure cluster-wide material exists (CA, controller certificate).
    ///
    /// # Errors
    ///
    /// [`PkiError::NotReady`] while material is being issued.
    pub async fn reconcile_pki(&self, client: &Client) -> Result<(), PkiError> {
        match self {
            Self::CertManager(pki) => pki.reconcile_pki(client).await,
            Self::SelfManaged(pki) => pki.reconcile_pki(client).await,
        }
    }

    /// Remove cluster-wide material.
    ///
    /// # Errors
    ///
    /// Kubernetes API failures other than absence.
    pub async fn finalize_pki(&self, client: &Client) -> Result<(), PkiError> {
        match self {
            Self::CertManager(pki) => pki.finalize_pki(client).await,
            Self::SelfManaged(pki) => pki.finalize_pki(client).await,
        }
    }

    /// Ensure a certificate exists for `user` and return it once issued.
    ///
    /// # Errors
    ///
    /// [`PkiError::NotReady`] until the user secret is fully populated.
    pub async fn reconcile_user_certificate(
        &self,
        client: &Client,
        user: &NifiUser,
    ) -> Result<UserCertificate, PkiError> {
        match self {
            Self::CertManager(pki) => pki.reconcile_user_certificate(client, user).await,
            Self::SelfManaged(pki) => pki.reconcile_user_certificate(client, user).await,
        }
    }

    /// Revoke the certificate of `user`.
    ///
    /// # Errors
    ///
    /// Kubernetes API failures other than absence.
    pub async fn finalize_user_certificate(
        &self,
        client: &Client,
        user: &NifiUser,
    ) -> Result<(), PkiError> {
        match self {
            Self::CertManager(pki) => pki.finalize_user_certificate(client, user).await,
            Self::SelfManaged(pki) => pki.finalize_user_certificate(client, user).await,
        }
    }

    /// TLS material the operator uses to call the cluster.
    ///
    /// # Errors
    ///
    /// [`PkiError::NotReady`] until the controller certificate is issued.
    pub async fn controller_tls_config(&self, client: &Client) -> Result<TlsMaterial, PkiError> {
        match self {
            Self::CertManager(pki) => pki.controller_tls_config(client).await,
            Self::SelfManaged(pki) => pki.controller_tls_config(client).await,
        }
    }
}

/// Read TLS material from a secret that may not be populated yet.
pub(crate) async fn read_tls_secret(
    client: &Client,
    namespace: &str,
    name: &str,
) -> Result<TlsMaterial, PkiError> {
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = api
        .get_opt(name)
        .await?
        .ok_or_else(|| PkiError::NotReady(format!("secret {namespace}/{name}")))?;
    TlsMaterial::from_secret(&secret)
        .map_err(|reason| PkiError::NotReady(format!("secret {namespace}/{name} ({reason})")))
}

/// Create a secret, treating "already exists" as success.
pub(crate) async fn create_secret(client: &Client, secret: &Secret) -> Result<(), PkiError> {
    let namespace = secret.metadata.namespace.as_deref().unwrap_or("default");
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
    match api.create(&PostParams::default(), secret).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 409 => {
            debug!(secret = ?secret.metadata.name, "Secret already exists");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete a secret, treating absence as success.
pub(crate) async fn delete_secret(
    client: &Client,
    namespace: &str,
    name: &str,
) -> Result<(), PkiError> {
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}
