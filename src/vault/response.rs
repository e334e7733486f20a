//! Vault's generic response envelope.

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Body returned by Vault for logical reads and writes.
#[derive(Default, Deserialize)]
pub struct SecretResponse {
    #[serde(default)]
    pub request_id: String,

    /// Secret data, present on reads and unwraps.
    #[serde(default)]
    pub data: Option<Map<String, Value>>,

    /// Present when the response was wrapped.
    #[serde(default)]
    pub wrap_info: Option<WrapInfo>,

    /// Present when the request created a token.
    #[serde(default)]
    pub auth: Option<AuthInfo>,

    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

impl fmt::Debug for SecretResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data_keys = self
            .data
            .as_ref()
            .map(|data| data.keys().collect::<Vec<_>>());
        f.debug_struct("SecretResponse")
            .field("request_id", &self.request_id)
            .field("data_keys", &data_keys)
            .field("wrap_info", &self.wrap_info)
            .field("auth", &self.auth)
            .field("warnings", &self.warnings)
            .finish()
    }
}

/// Details of a response-wrapping token.
#[derive(Deserialize)]
pub struct WrapInfo {
    pub token: String,
    /// Seconds until the wrapping token expires.
    #[serde(default)]
    pub ttl: u64,
    #[serde(default)]
    pub accessor: Option<String>,
    #[serde(default)]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub creation_path: Option<String>,
}

impl fmt::Debug for WrapInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapInfo")
            .field("token", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .field("accessor", &self.accessor)
            .field("creation_time", &self.creation_time)
            .field("creation_path", &self.creation_path)
            .finish()
    }
}

/// Token details returned by `auth/token/create`.
#[derive(Deserialize)]
pub struct AuthInfo {
    pub client_token: String,
    #[serde(default)]
    pub accessor: Option<String>,
    #[serde(default)]
    pub policies: Vec<String>,
    /// Seconds until the token expires.
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

impl fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthInfo")
            .field("client_token", &"[REDACTED]")
            .field("accessor", &self.accessor)
            .field("policies", &self.policies)
            .field("lease_duration", &self.lease_duration)
            .field("renewable", &self.renewable)
            .finish()
    }
}
