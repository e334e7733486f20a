//! Response-wrapping strategy.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::json;

use super::{Payload, SecretExchange, Strategy};
use crate::error::{RetrieveError, StoreError};
use crate::vault::VaultClient;

const WRAP_PATH: &str = "sys/wrapping/wrap";
const UNWRAP_PATH: &str = "sys/wrapping/unwrap";

/// Stores the payload with `sys/wrapping/wrap`; the wrapping token is the
/// single-use token. One round trip each way.
#[derive(Debug, Clone, Copy, Default)]
pub struct WrappingExchange;

#[async_trait]
impl SecretExchange for WrappingExchange {
    fn name(&self) -> &str {
        "wrap"
    }

    async fn store(
        &self,
        client: &VaultClient,
        ttl: Duration,
        payload: &Payload,
    ) -> Result<SecretString, StoreError> {
        let response = client
            .write(WRAP_PATH, payload, Some(ttl))
            .await
            .map_err(StoreError::Write)?;

        let wrap_info = response
            .and_then(|r| r.wrap_info)
            .filter(|info| !info.token.is_empty())
            .ok_or(StoreError::MissingToken)?;

        tracing::debug!(
            accessor = wrap_info.accessor.as_deref().unwrap_or(""),
            ttl = wrap_info.ttl,
            "Wrapped secret"
        );

        Ok(SecretString::from(wrap_info.token))
    }

    async fn retrieve(
        &self,
        client: &VaultClient,
        token: &SecretString,
    ) -> Result<Payload, RetrieveError> {
        Strategy::Wrap.check_token(token)?;

        // Authenticating as the wrapping token lets Vault unwrap it without a body.
        let response = client
            .with_token(token.clone())
            .write(UNWRAP_PATH, &json!({}), None)
            .await?;

        response
            .and_then(|r| r.data)
            .map(Payload::from_data)
            .ok_or(RetrieveError::MissingPayload)
    }
}
