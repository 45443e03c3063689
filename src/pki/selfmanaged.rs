// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Self-managed PKI backend.
//!
//! The operator is its own certificate authority: the CA certificate and key live in
//! the `{cluster}-ca-certificate` secret (`caCert`/`caKey`), and the controller and
//! user certificates are signed locally with `rcgen` and stored as TLS secrets.
//! Secrets are created once and never rewritten, so a restarted operator reuses the
//! same CA.

use chrono::{Datelike, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::{Api, Client, Resource, ResourceExt};
use rcgen::{
    date_time_ymd, string::Ia5String, BasicConstraints, CertificateParams, DistinguishedName,
    DnType, DnValue, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair, KeyUsagePurpose, SanType,
};
use std::collections::BTreeMap;
use tracing::info;

use super::{
    ca_secret_name, controller_secret_name, create_secret, delete_secret, read_tls_secret,
    spiffe_id, PkiError, TlsMaterial, UserCertificate,
};
use crate::constants::{SECRET_KEY_CA_CERT_SELF_MANAGED, SECRET_KEY_CA_KEY_SELF_MANAGED};
use crate::crd::{NifiCluster, NifiUser};

/// Validity of every certificate issued by this backend.
pub const VALIDITY_YEARS: i32 = 10;

const ORGANIZATIONAL_UNIT: &str = "NiFi";

/// PEM-encoded CA certificate and key.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateAuthority {
    pub cert_pem: String,
    pub key_pem: String,
}

impl std::fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("cert_pem", &format!("{} bytes", self.cert_pem.len()))
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

/// Set a validity window starting today.
#[allow(clippy::cast_possible_truncation)]
fn set_validity(params: &mut CertificateParams) {
    let today = Utc::now().date_naive();
    params.not_before = date_time_ymd(today.year(), today.month() as u8, today.day() as u8);
    // Day 28 exists in every month, so Feb 29 never overflows.
    params.not_after = date_time_ymd(
        today.year() + VALIDITY_YEARS,
        today.month() as u8,
        today.day().min(28) as u8,
    );
}

fn distinguished_name(common_name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, DnValue::Utf8String(common_name.to_string()));
    dn.push(
        DnType::OrganizationalUnitName,
        DnValue::Utf8String(ORGANIZATIONAL_UNIT.to_string()),
    );
    dn
}

fn ia5(value: &str) -> Result<Ia5String, PkiError> {
    Ia5String::try_from(value.to_string())
        .map_err(|e| PkiError::Fatal(format!("invalid subject alternative name '{value}': {e}")))
}

impl CertificateAuthority {
    /// Generate a self-signed CA.
    ///
    /// # Errors
    ///
    /// [`PkiError::Fatal`] when key generation or signing fails.
    pub fn generate(common_name: &str) -> Result<Self, PkiError> {
        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        set_validity(&mut params);

        let key_pair = KeyPair::generate()
            .map_err(|e| PkiError::Fatal(format!("failed to generate CA key: {e}")))?;
        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| PkiError::Fatal(format!("failed to self-sign CA: {e}")))?;

        Ok(Self {
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
        })
    }

    /// Issue a client/server certificate signed by this CA.
    ///
    /// # Errors
    ///
    /// [`PkiError::Fatal`] on invalid names or signing failures.
    pub fn issue(
        &self,
        common_name: &str,
        dns_names: &[String],
        uris: &[String],
    ) -> Result<TlsMaterial, PkiError> {
        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(common_name);
        params.is_ca = IsCa::NoCa;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ClientAuth,
            ExtendedKeyUsagePurpose::ServerAuth,
        ];
        set_validity(&mut params);

        let mut sans = Vec::with_capacity(dns_names.len() + uris.len());
        for name in dns_names {
            sans.push(SanType::DnsName(ia5(name)?));
        }
        for uri in uris {
            sans.push(SanType::URI(ia5(uri)?));
        }
        params.subject_alt_names = sans;

        let key_pair = KeyPair::generate()
            .map_err(|e| PkiError::Fatal(format!("failed to generate key for {common_name}: {e}")))?;
        let ca_key = KeyPair::from_pem(&self.key_pem)
            .map_err(|e| PkiError::Fatal(format!("failed to load CA key: {e}")))?;
        let issuer = Issuer::from_ca_cert_pem(&self.cert_pem, &ca_key)
            .map_err(|e| PkiError::Fatal(format!("failed to load CA certificate: {e}")))?;
        let cert = params
            .signed_by(&key_pair, &issuer)
            .map_err(|e| PkiError::Fatal(format!("failed to sign {common_name}: {e}")))?;

        Ok(TlsMaterial {
            ca_pem: self.cert_pem.clone(),
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
        })
    }

    fn from_secret(secret: &Secret) -> Option<Self> {
        let data = secret.data.as_ref()?;
        let read = |key: &str| {
            data.get(key)
                .filter(|v| !v.0.is_empty())
                .and_then(|v| String::from_utf8(v.0.clone()).ok())
        };
        Some(Self {
            cert_pem: read(SECRET_KEY_CA_CERT_SELF_MANAGED)?,
            key_pem: read(SECRET_KEY_CA_KEY_SELF_MANAGED)?,
        })
    }

    fn to_secret(&self, name: &str, namespace: &str) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([
                (
                    SECRET_KEY_CA_CERT_SELF_MANAGED.to_string(),
                    ByteString(self.cert_pem.clone().into_bytes()),
                ),
                (
                    SECRET_KEY_CA_KEY_SELF_MANAGED.to_string(),
                    ByteString(self.key_pem.clone().into_bytes()),
                ),
            ])),
            ..Default::default()
        }
    }
}

/// Build a `kubernetes.io/tls` secret holding `material`.
#[must_use]
pub fn tls_secret(name: &str, namespace: &str, material: &TlsMaterial) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        type_: Some("kubernetes.io/tls".to_string()),
        data: Some(material.to_secret_data()),
        ..Default::default()
    }
}

/// Self-managed backend bound to one cluster.
#[derive(Clone, Debug)]
pub struct SelfManagedPki {
    cluster: NifiCluster,
}

impl SelfManagedPki {
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

    /// Load the cluster CA, creating it on first use.
    async fn ensure_ca(&self, client: &Client) -> Result<CertificateAuthority, PkiError> {
        let namespace = self.namespace();
        let name = ca_secret_name(&self.name());
        let api: Api<Secret> = Api::namespaced(client.clone(), &namespace);

        if let Some(secret) = api.get_opt(&name).await? {
            return CertificateAuthority::from_secret(&secret).ok_or_else(|| {
                PkiError::Fatal(format!(
                    "secret {namespace}/{name} lacks {SECRET_KEY_CA_CERT_SELF_MANAGED}/{SECRET_KEY_CA_KEY_SELF_MANAGED}"
                ))
            });
        }

        let ca = CertificateAuthority::generate(&format!("{}-ca", self.name()))?;
        create_secret(client, &ca.to_secret(&name, &namespace)).await?;
        info!(cluster = %self.name(), namespace = %namespace, "Created self-managed cluster CA");

        // Re-read so a concurrent creator's CA wins.
        let secret = api
            .get_opt(&name)
            .await?
            .ok_or_else(|| PkiError::NotReady(format!("secret {namespace}/{name}")))?;
        CertificateAuthority::from_secret(&secret)
            .ok_or_else(|| PkiError::NotReady(format!("secret {namespace}/{name}")))
    }

    async fn ensure_controller_secret(&self, client: &Client) -> Result<TlsMaterial, PkiError> {
        let namespace = self.namespace();
        let name = controller_secret_name(&self.name());
        let api: Api<Secret> = Api::namespaced(client.clone(), &namespace);

        if api.get_opt(&name).await?.is_none() {
            let ca = self.ensure_ca(client).await?;
            let material = ca.issue(&name, &[], &[])?;
            create_secret(client, &tls_secret(&name, &namespace, &material)).await?;
            info!(cluster = %self.name(), secret = %name, "Issued controller certificate");
        }
        read_tls_secret(client, &namespace, &name).await
    }

    pub(crate) async fn reconcile_pki(&self, client: &Client) -> Result<(), PkiError> {
        self.ensure_ca(client).await?;
        self.ensure_controller_secret(client).await?;
        Ok(())
    }

    pub(crate) async fn finalize_pki(&self, client: &Client) -> Result<(), PkiError> {
        let namespace = self.namespace();
        delete_secret(client, &namespace, &controller_secret_name(&self.name())).await?;
        delete_secret(client, &namespace, &ca_secret_name(&self.name())).await?;
        info!(cluster = %self.name(), namespace = %namespace, "Removed self-managed PKI");
        Ok(())
    }

    pub(crate) async fn reconcile_user_certificate(
        &self,
        client: &Client,
        user: &NifiUser,
    ) -> Result<UserCertificate, PkiError> {
        let namespace = user.namespace().unwrap_or_else(|| self.namespace());
        let secret_name = user.secret_name();
        let api: Api<Secret> = Api::namespaced(client.clone(), &namespace);

        if api.get_opt(&secret_name).await?.is_none() {
            let ca = self.ensure_ca(client).await?;
            let uri = spiffe_id(&self.name(), &namespace, &user.name_any());
            let material = ca.issue(&user.identity(), &user.spec.dns_names, &[uri])?;

            let mut secret = tls_secret(&secret_name, &namespace, &material);
            if let Some(owner) = user.controller_owner_ref(&()) {
                secret.metadata.owner_references = Some(vec![owner]);
            }
            create_secret(client, &secret).await?;
            info!(user = %user.name_any(), secret = %secret_name, "Issued user certificate");
        }
        read_tls_secret(client, &namespace, &secret_name).await
    }

    pub(crate) async fn finalize_user_certificate(
        &self,
        client: &Client,
        user: &NifiUser,
    ) -> Result<(), PkiError> {
        let namespace = user.namespace().unwrap_or_else(|| self.namespace());
        delete_secret(client, &namespace, &user.secret_name()).await
    }

    pub(crate) async fn controller_tls_config(
        &self,
        client: &Client,
    ) -> Result<TlsMaterial, PkiError> {
        self.ensure_controller_secret(client).await
    }
}

#[cfg(test)]
#[path = "selfmanaged_tests.rs"]
mod selfmanaged_tests;
