//! Cubbyhole strategy.
//!
//! A fresh token is created with exactly two uses: the first writes the
//! payload into the token's cubbyhole, the second reads it back. Vault revokes
//! the token after its last use, which destroys the cubbyhole with it.
//!
//! The child token gets an explicit policy list instead of inheriting the
//! caller's policies. Vault's `default` policy is what grants access to the
//! token's own cubbyhole.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::{Payload, SecretExchange, Strategy, CUBBYHOLE_TOKEN_PREFIX, PAYLOAD_KEY};
use crate::error::{RetrieveError, StoreError};
use crate::vault::VaultClient;

const CREATE_TOKEN_PATH: &str = "auth/token/create";
const TOKEN_USES: u32 = 2;

/// Policies given to the limited-use token unless configured otherwise.
pub const DEFAULT_TOKEN_POLICIES: &[&str] = &["default"];

#[derive(Debug, Serialize)]
struct CreateTokenRequest<'a> {
    ttl: String,
    explicit_max_ttl: String,
    num_uses: u32,
    renewable: bool,
    policies: &'a [String],
    no_default_policy: bool,
    display_name: &'static str,
}

impl<'a> CreateTokenRequest<'a> {
    fn new(ttl: Duration, policies: &'a [String]) -> Self {
        let ttl = format!("{}s", ttl.as_secs());
        Self {
            explicit_max_ttl: ttl.clone(),
            ttl,
            num_uses: TOKEN_USES,
            renewable: false,
            policies,
            // Vault adds `default` on its own unless told not to.
            no_default_policy: !policies.iter().any(|p| p == "default"),
            display_name: PAYLOAD_KEY,
        }
    }
}

fn cubbyhole_path() -> String {
    format!("cubbyhole/{PAYLOAD_KEY}")
}

/// Stores the payload in the cubbyhole of a two-use token.
#[derive(Debug, Clone)]
pub struct CubbyholeExchange {
    policies: Vec<String>,
}

impl CubbyholeExchange {
    /// Exchange whose tokens carry exactly `policies`.
    pub fn with_policies(policies: Vec<String>) -> Self {
        Self { policies }
    }

    pub fn policies(&self) -> &[String] {
        &self.policies
    }
}

impl Default for CubbyholeExchange {
    fn default() -> Self {
        Self::with_policies(DEFAULT_TOKEN_POLICIES.iter().map(|p| p.to_string()).collect())
    }
}

#[async_trait]
impl SecretExchange for CubbyholeExchange {
    fn name(&self) -> &str {
        "cubbyhole"
    }

    async fn store(
        &self,
        client: &VaultClient,
        ttl: Duration,
        payload: &Payload,
    ) -> Result<SecretString, StoreError> {
        let response = client
            .write(
                CREATE_TOKEN_PATH,
                &CreateTokenRequest::new(ttl, &self.policies),
                None,
            )
            .await
            .map_err(StoreError::CreateToken)?;

        let auth = response
            .and_then(|r| r.auth)
            .filter(|auth| !auth.client_token.is_empty())
            .ok_or(StoreError::MissingToken)?;
        tracing::debug!(
            accessor = auth.accessor.as_deref().unwrap_or(""),
            lease_duration = auth.lease_duration,
            policies = ?auth.policies,
            "Created limited-use token"
        );

        let token = format!("{CUBBYHOLE_TOKEN_PREFIX}{}", auth.client_token);
        client
            .with_token(SecretString::from(auth.client_token))
            .write(&cubbyhole_path(), payload, None)
            .await
            .map_err(StoreError::Write)?;

        Ok(SecretString::from(token))
    }

    async fn retrieve(
        &self,
        client: &VaultClient,
        token: &SecretString,
    ) -> Result<Payload, RetrieveError> {
        Strategy::Cubbyhole.check_token(token)?;
        let vault_token = token
            .expose_secret()
            .strip_prefix(CUBBYHOLE_TOKEN_PREFIX)
            .unwrap_or_default()
            .to_string();

        let response = client
            .with_token(SecretString::from(vault_token))
            .read(&cubbyhole_path())
            .await?;

        response
            .and_then(|r| r.data)
            .map(Payload::from_data)
            .ok_or(RetrieveError::MissingPayload)
    }
}
