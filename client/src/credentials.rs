use std::sync::Arc;
use log::{debug, info};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use crate::errors::ConfigurationError;

pub const CA_VAR: &str = "GSCLI_CLIENT_CA";
pub const CERT_VAR: &str = "GSCLI_CLIENT_CERT";
pub const KEY_VAR: &str = "GSCLI_CLIENT_KEY";

/// Where server certificates are anchored.
#[derive(Debug, Clone)]
pub enum TrustRoots {
    /// No CA was supplied; use the platform default anchors.
    SystemDefault,
    /// Anchors parsed from `GSCLI_CLIENT_CA`.
    Custom(RootCertStore),
}

impl TrustRoots {
    fn root_store(&self) -> RootCertStore {
        match self {
            TrustRoots::SystemDefault => RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            },
            TrustRoots::Custom(store) => store.clone(),
        }
    }
}

/// Validated TLS material for one run: trust anchors plus the client identity.
#[derive(Debug, Clone)]
pub struct CredentialBundle {
    pub trust: TrustRoots,
    tls: Arc<ClientConfig>,
}

impl CredentialBundle {
    /// rustls config carrying the client certificate, shared by the backend
    /// and router connections.
    pub fn tls_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.tls)
    }
}

/// Loads credentials from the process environment.
pub fn load() -> Result<CredentialBundle, ConfigurationError> {
    load_with(|name| std::env::var(name).ok())
}

/// Loads credentials through `lookup`, which maps a variable name to its value.
pub fn load_with<F>(lookup: F) -> Result<CredentialBundle, ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    let trust = match non_empty(&lookup, CA_VAR) {
        None => {
            info!("No CA specified in {CA_VAR}. Using default root pool.");
            TrustRoots::SystemDefault
        }
        Some(raw) => {
            let pem = decode_pem(CA_VAR, &raw)?;
            TrustRoots::Custom(custom_pool(&pem)?)
        }
    };

    let cert_pem = decode_pem(CERT_VAR, &required(&lookup, CERT_VAR)?)?;
    let key_pem = decode_pem(KEY_VAR, &required(&lookup, KEY_VAR)?)?;

    let chain = CertificateDer::pem_slice_iter(cert_pem.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigurationError::KeyPair(format!("certificate PEM in {CERT_VAR}: {e}")))?;
    if chain.is_empty() {
        return Err(ConfigurationError::KeyPair(format!("no certificate found in {CERT_VAR}")));
    }
    let key = PrivateKeyDer::from_pem_slice(key_pem.as_bytes())
        .map_err(|e| ConfigurationError::KeyPair(format!("private key PEM in {KEY_VAR}: {e}")))?;
    debug!("Loaded client certificate chain of {} cert(s)", chain.len());

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let tls = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ConfigurationError::KeyPair(e.to_string()))?
        .with_root_certificates(trust.root_store())
        .with_client_auth_cert(chain, key)
        .map_err(|e| ConfigurationError::KeyPair(e.to_string()))?;

    Ok(CredentialBundle { trust, tls: Arc::new(tls) })
}

// unset and empty are treated the same
fn non_empty<F>(lookup: &F, var: &'static str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var).filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, var).ok_or(ConfigurationError::Missing(var))
}

/// Each variable holds a JSON string literal wrapping the PEM text.
fn decode_pem(var: &'static str, raw: &str) -> Result<String, ConfigurationError> {
    serde_json::from_str::<String>(raw).map_err(|source| ConfigurationError::NotJsonString { var, source })
}

fn custom_pool(pem: &str) -> Result<RootCertStore, ConfigurationError> {
    let trust_err = |reason: String| ConfigurationError::TrustPool { var: CA_VAR, reason };
    let mut store = RootCertStore::empty();
    for cert in CertificateDer::pem_slice_iter(pem.as_bytes()) {
        let cert = cert.map_err(|e| trust_err(e.to_string()))?;
        store.add(cert).map_err(|e| trust_err(e.to_string()))?;
    }
    if store.is_empty() {
        return Err(trust_err("no certificates found".into()));
    }
    Ok(store)
}
