//! Serving certificates for the conversion webhook
//!
//! The API server calls conversion webhooks over HTTPS only. On startup a
//! self-signed CA and a server certificate for the webhook service are
//! loaded from a Secret, or generated and stored there. The CA goes into
//! the `caBundle` of every CRD the webhook converts.
//!
//! ```text
//! Self-signed CA (kverso-webhook-ca)
//!     └── Server cert (<service>.<namespace>.svc)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Patch, PatchParams, PostParams};
use kube::Api;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose, SanType,
};
use thiserror::Error;
use tracing::info;

/// Validity of the CA certificate (10 years)
pub const CA_VALIDITY_DAYS: u32 = 3650;

/// Validity of the server certificate (1 year)
pub const SERVER_VALIDITY_DAYS: u32 = 365;

const CA_COMMON_NAME: &str = "kverso-webhook-ca";
const ORGANIZATION: &str = "kverso";

/// Secret keys holding the certificate data
pub const SECRET_CA_CERT_KEY: &str = "ca.crt";
pub const SECRET_SERVER_CERT_KEY: &str = "tls.crt";
pub const SECRET_SERVER_KEY_KEY: &str = "tls.key";

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to generate certificate: {0}")]
    Generate(#[from] rcgen::Error),

    #[error("invalid DNS name {name}: {message}")]
    DnsName { name: String, message: String },

    #[error("secret {secret} has no {key}")]
    MissingKey { secret: String, key: &'static str },

    #[error("failed to parse certificate: {0}")]
    Parse(String),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("invalid PEM data")]
    InvalidPem,
}

/// CA and server certificate of the webhook, PEM encoded
#[derive(Clone)]
pub struct CertificateBundle {
    pub ca_cert_pem: String,
    pub server_cert_pem: String,
    pub server_key_pem: String,
}

impl std::fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("ca_cert_pem", &self.ca_cert_pem)
            .field("server_cert_pem", &self.server_cert_pem)
            .field("server_key_pem", &"<redacted>")
            .finish()
    }
}

impl CertificateBundle {
    /// CA certificate as base64-encoded DER, the format of `caBundle`
    pub fn ca_bundle_base64(&self) -> Result<String, TlsError> {
        use base64::{engine::general_purpose::STANDARD, Engine};

        let pem = pem::parse(&self.ca_cert_pem)
            .map_err(|e| TlsError::Parse(format!("CA certificate: {}", e)))?;
        Ok(STANDARD.encode(pem.contents()))
    }

    fn from_secret_data(
        secret_name: &str,
        data: &BTreeMap<String, ByteString>,
    ) -> Result<Self, TlsError> {
        let read = |key: &'static str| {
            data.get(key)
                .map(|b| String::from_utf8_lossy(&b.0).to_string())
                .ok_or_else(|| TlsError::MissingKey {
                    secret: secret_name.to_string(),
                    key,
                })
        };

        Ok(Self {
            ca_cert_pem: read(SECRET_CA_CERT_KEY)?,
            server_cert_pem: read(SECRET_SERVER_CERT_KEY)?,
            server_key_pem: read(SECRET_SERVER_KEY_KEY)?,
        })
    }

    fn to_secret_data(&self) -> BTreeMap<String, ByteString> {
        [
            (SECRET_CA_CERT_KEY, &self.ca_cert_pem),
            (SECRET_SERVER_CERT_KEY, &self.server_cert_pem),
            (SECRET_SERVER_KEY_KEY, &self.server_key_pem),
        ]
        .into_iter()
        .map(|(key, pem)| (key.to_string(), ByteString(pem.as_bytes().to_vec())))
        .collect()
    }
}

/// DNS names under which the API server reaches the service
pub fn service_dns_names(service_name: &str, namespace: &str) -> Vec<String> {
    vec![
        service_name.to_string(),
        format!("{}.{}", service_name, namespace),
        format!("{}.{}.svc", service_name, namespace),
        format!("{}.{}.svc.cluster.local", service_name, namespace),
    ]
}

fn validity(params: &mut CertificateParams, days: u32) {
    let now = time::OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + time::Duration::days(i64::from(days));
}

fn generate_ca() -> Result<(Certificate, KeyPair), TlsError> {
    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, CA_COMMON_NAME);
    params
        .distinguished_name
        .push(DnType::OrganizationName, ORGANIZATION);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    validity(&mut params, CA_VALIDITY_DAYS);

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;
    Ok((cert, key_pair))
}

fn generate_server_cert(
    ca_cert: &Certificate,
    ca_key: &KeyPair,
    service_name: &str,
    namespace: &str,
) -> Result<(String, String), TlsError> {
    let mut params = CertificateParams::default();
    params
        .distinguished_name
        .push(DnType::CommonName, service_name);
    params
        .distinguished_name
        .push(DnType::OrganizationName, ORGANIZATION);

    params.subject_alt_names = service_dns_names(service_name, namespace)
        .into_iter()
        .map(|name| {
            name.clone()
                .try_into()
                .map(SanType::DnsName)
                .map_err(|e: rcgen::Error| TlsError::DnsName {
                    name,
                    message: e.to_string(),
                })
        })
        .collect::<Result<_, _>>()?;

    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
    validity(&mut params, SERVER_VALIDITY_DAYS);

    let key_pair = KeyPair::generate()?;
    let cert = params.signed_by(&key_pair, ca_cert, ca_key)?;
    Ok((cert.pem(), key_pair.serialize_pem()))
}

/// Generate a CA and a server certificate for `service_name` in `namespace`
pub fn generate_certificate_bundle(
    service_name: &str,
    namespace: &str,
) -> Result<CertificateBundle, TlsError> {
    let (ca_cert, ca_key) = generate_ca()?;
    let (server_cert_pem, server_key_pem) =
        generate_server_cert(&ca_cert, &ca_key, service_name, namespace)?;

    Ok(CertificateBundle {
        ca_cert_pem: ca_cert.pem(),
        server_cert_pem,
        server_key_pem,
    })
}

/// Load the bundle from a Secret, `None` if the Secret does not exist
pub async fn load_from_secret(
    client: &kube::Client,
    namespace: &str,
    secret_name: &str,
) -> Result<Option<CertificateBundle>, TlsError> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);

    let Some(secret) = secrets.get_opt(secret_name).await? else {
        return Ok(None);
    };
    let data = secret.data.unwrap_or_default();
    CertificateBundle::from_secret_data(secret_name, &data).map(Some)
}

/// Store the bundle in a Secret, creating or updating it
pub async fn save_to_secret(
    client: &kube::Client,
    namespace: &str,
    secret_name: &str,
    bundle: &CertificateBundle,
) -> Result<(), TlsError> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);

    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(secret_name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                "app.kubernetes.io/managed-by".to_string(),
                ORGANIZATION.to_string(),
            )])),
            ..Default::default()
        },
        type_: Some("kubernetes.io/tls".to_string()),
        data: Some(bundle.to_secret_data()),
        ..Default::default()
    };

    match secrets.create(&PostParams::default(), &secret).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(err)) if err.code == 409 => {
            secrets
                .patch(secret_name, &PatchParams::default(), &Patch::Merge(&secret))
                .await?;
            Ok(())
        }
        Err(e) => Err(TlsError::Kube(e)),
    }
}

/// Load the webhook certificates, generating and storing them on first start
pub async fn initialize_tls(
    client: &kube::Client,
    service_name: &str,
    namespace: &str,
    secret_name: &str,
) -> Result<CertificateBundle, TlsError> {
    if let Some(bundle) = load_from_secret(client, namespace, secret_name).await? {
        info!(secret = secret_name, "Loaded TLS certificates from Secret");
        return Ok(bundle);
    }

    info!(secret = secret_name, "No TLS certificates found, generating");
    let bundle = generate_certificate_bundle(service_name, namespace)?;
    save_to_secret(client, namespace, secret_name, &bundle).await?;
    info!(secret = secret_name, "Saved TLS certificates to Secret");

    Ok(bundle)
}

/// Build a rustls server configuration from the bundle
pub fn build_rustls_config(
    bundle: &CertificateBundle,
) -> Result<Arc<rustls::ServerConfig>, TlsError> {
    use rustls::pki_types::CertificateDer;
    use rustls_pemfile::{certs, private_key};
    use std::io::BufReader;

    let cert_chain: Vec<CertificateDer<'static>> =
        certs(&mut BufReader::new(bundle.server_cert_pem.as_bytes()))
            .filter_map(|r| r.ok())
            .collect();
    if cert_chain.is_empty() {
        return Err(TlsError::InvalidPem);
    }

    let key = private_key(&mut BufReader::new(bundle.server_key_pem.as_bytes()))
        .map_err(|e| TlsError::Parse(format!("private key: {}", e)))?
        .ok_or(TlsError::InvalidPem)?;

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| TlsError::Parse(format!("protocol versions: {}", e)))?
    .with_no_client_auth()
    .with_single_cert(cert_chain, key)
    .map_err(|e| TlsError::Parse(format!("server config: {}", e)))?;

    Ok(Arc::new(config))
}

#[cfg(test)]
#[path = "tls_test.rs"]
mod tests;
