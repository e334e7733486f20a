//! HTTP client for Vault.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Certificate, Client, Method, RequestBuilder, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::response::SecretResponse;
use crate::error::{ConnectionError, VaultError};

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";
const WRAP_TTL_HEADER: &str = "X-Vault-Wrap-TTL";

/// Everything needed to build a [`VaultClient`].
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Base address, e.g. `https://127.0.0.1:8200`.
    pub address: String,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Extra PEM root certificate to trust.
    pub ca_cert: Option<PathBuf>,
    /// Enterprise namespace sent with every request.
    pub namespace: Option<String>,
    /// Per-request timeout. The transport default applies when unset.
    pub timeout: Option<Duration>,
    /// Bearer token sent with every request.
    pub token: Option<SecretString>,
}

/// Vault REST API client.
///
/// Construction never touches the network.
#[derive(Debug, Clone)]
pub struct VaultClient {
    http: Client,
    address: String,
    namespace: Option<String>,
    token: Option<SecretString>,
}

impl VaultClient {
    fn user_agent() -> String {
        format!("destruct/{}", env!("CARGO_PKG_VERSION"))
    }

    /// Build a client from resolved options.
    pub fn connect(options: &ConnectOptions) -> Result<Self, ConnectionError> {
        let address = normalize_address(&options.address)?;

        let mut builder = Client::builder().user_agent(Self::user_agent());
        if options.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(path) = &options.ca_cert {
            builder = builder.add_root_certificate(load_ca_cert(path)?);
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ConnectionError::Build)?;

        tracing::debug!(
            address = %address,
            insecure = options.insecure,
            authenticated = options.token.is_some(),
            "Configured Vault client"
        );

        Ok(Self {
            http,
            address,
            namespace: options.namespace.clone(),
            token: options.token.clone(),
        })
    }

    /// The normalized base address (no trailing slash).
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Copy of this client that authenticates as `token`.
    pub fn with_token(&self, token: SecretString) -> Self {
        Self {
            token: Some(token),
            ..self.clone()
        }
    }

    /// `POST /v1/<path>` with a JSON body.
    ///
    /// When `wrap_ttl` is set Vault wraps the response and returns only
    /// `wrap_info`. Returns `None` for an empty (204) response.
    pub async fn write<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        wrap_ttl: Option<Duration>,
    ) -> Result<Option<SecretResponse>, VaultError> {
        let mut req = self.request(Method::POST, path).json(body);
        if let Some(ttl) = wrap_ttl {
            req = req.header(WRAP_TTL_HEADER, ttl.as_secs().to_string());
        }
        tracing::debug!(path, wrapped = wrap_ttl.is_some(), "Vault write");
        self.send(req).await
    }

    /// `GET /v1/<path>`.
    pub async fn read(&self, path: &str) -> Result<Option<SecretResponse>, VaultError> {
        tracing::debug!(path, "Vault read");
        self.send(self.request(Method::GET, path)).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, self.url(path))
            .header("Accept", "application/json");
        if let Some(token) = &self.token {
            req = req.header(TOKEN_HEADER, token.expose_secret());
        }
        if let Some(namespace) = &self.namespace {
            req = req.header(NAMESPACE_HEADER, namespace.as_str());
        }
        req
    }

    async fn send(&self, req: RequestBuilder) -> Result<Option<SecretResponse>, VaultError> {
        let resp = req.send().await.map_err(VaultError::Transport)?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(VaultError::Transport)?;

        if !status.is_success() {
            return Err(VaultError::Api {
                status,
                errors: parse_errors(&body),
            });
        }
        if status == StatusCode::NO_CONTENT || body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let response: SecretResponse =
            serde_json::from_slice(&body).map_err(VaultError::Decode)?;
        for warning in response.warnings.iter().flatten() {
            tracing::warn!(%warning, "Vault returned a warning");
        }
        Ok(Some(response))
    }
}

/// Vault's error envelope: `{"errors": ["..."]}`.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

fn parse_errors(body: &[u8]) -> Vec<String> {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => parsed.errors,
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            if text.is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            }
        }
    }
}

fn normalize_address(address: &str) -> Result<String, ConnectionError> {
    let invalid = |reason: String| ConnectionError::InvalidAddress {
        address: address.to_string(),
        reason,
    };

    let trimmed = address.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {other:?}"))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    Ok(trimmed.to_string())
}

fn load_ca_cert(path: &Path) -> Result<Certificate, ConnectionError> {
    let pem = std::fs::read(path).map_err(|source| ConnectionError::ReadCaCert {
        path: path.to_path_buf(),
        source,
    })?;
    Certificate::from_pem(&pem).map_err(|source| ConnectionError::InvalidCaCert {
        path: path.to_path_buf(),
        source,
    })
}
