use std::fmt;
use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, Url};
use rustls::ClientConfig;
use serde::{Deserialize, Serialize};
use crate::errors::{AuthError, ConfigurationError};

/// Identity this tool authenticates as.
pub const SERVICE_NAME: &str = "group_settings_cli";
/// Service the issued token is scoped to.
pub const AUDIENCE: &str = "com.digitallumens.client-service";

const AUTH_SERVICE_PATH: &str = "auth/service";

/// Opaque session token issued by the backend.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Exchanges the client certificate for a session token.
#[async_trait]
pub trait BackendAuth: Send + Sync {
    async fn auth_service(&self, service: &str) -> Result<SessionToken, AuthError>;
}

#[derive(Serialize)]
struct AuthServiceRequest<'a> {
    service: &'a str,
    audience: &'a str,
}

#[derive(Deserialize)]
struct AuthServiceReply {
    token: SessionToken,
}

/// HTTPS client for the backend auth endpoint, presenting the client
/// certificate during the TLS handshake.
pub struct BackendClient {
    auth_url: Url,
    http: Client,
}

impl BackendClient {
    pub fn new(uri: &str, tls: &ClientConfig) -> Result<Self, ConfigurationError> {
        let auth_url = auth_url(uri)?;
        let http = Client::builder()
            .use_preconfigured_tls(tls.clone())
            .build()
            .map_err(ConfigurationError::HttpClient)?;
        debug!("Backend auth endpoint is {auth_url}");
        Ok(Self { auth_url, http })
    }
}

#[async_trait]
impl BackendAuth for BackendClient {
    async fn auth_service(&self, service: &str) -> Result<SessionToken, AuthError> {
        info!("Authenticating as {service} against {}", self.auth_url);
        let response = self
            .http
            .post(self.auth_url.clone())
            .json(&AuthServiceRequest { service, audience: AUDIENCE })
            .send()
            .await
            .map_err(AuthError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected { status: status.as_u16(), body });
        }

        let reply: AuthServiceReply = response.json().await.map_err(AuthError::Decode)?;
        if reply.token.as_str().is_empty() {
            return Err(AuthError::EmptyToken);
        }
        debug!("Backend issued a session token");
        Ok(reply.token)
    }
}

fn auth_url(uri: &str) -> Result<Url, ConfigurationError> {
    let endpoint_err = |reason: String| ConfigurationError::Endpoint { uri: uri.to_string(), reason };
    let mut base = Url::parse(uri).map_err(|e| endpoint_err(e.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(endpoint_err(format!("unsupported scheme {:?}", base.scheme())));
    }
    // join() replaces the last segment unless the path is a directory
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(AUTH_SERVICE_PATH).map_err(|e| endpoint_err(e.to_string()))
}
