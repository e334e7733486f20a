//! The store/retrieve protocol.
//!
//! A secret is stored behind a token that Vault honours exactly once. Two
//! strategies are available:
//!
//! - [`WrappingExchange`]: Vault response wrapping (`sys/wrapping/wrap`).
//! - [`CubbyholeExchange`]: a two-use token whose cubbyhole holds the secret.
//!
//! Both give the same guarantees: the first successful retrieve returns the
//! payload and every later attempt fails with [`RetrieveError::Gone`], as does
//! an attempt after the TTL has elapsed. Vault enforces this, not us.
//!
//! Tokens issued by the cubbyhole strategy carry [`CUBBYHOLE_TOKEN_PREFIX`], so
//! [`Strategy::of_token`] can tell which mechanism a token belongs to and an
//! exchange never spends a token it cannot redeem.

mod cubbyhole;
mod wrapping;

pub use cubbyhole::{CubbyholeExchange, DEFAULT_TOKEN_POLICIES};
pub use wrapping::WrappingExchange;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{RetrieveError, StoreError};
use crate::vault::VaultClient;

/// Key the secret is stored under. It is the tool's own name.
pub const PAYLOAD_KEY: &str = "destruct";

/// Prefix on tokens handed out by [`CubbyholeExchange`]. Vault tokens never
/// contain a colon.
pub const CUBBYHOLE_TOKEN_PREFIX: &str = "cubbyhole:";

/// Key/value data stored behind a single-use token.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, String>);

impl Payload {
    /// Payload holding `secret` under [`PAYLOAD_KEY`].
    pub fn new(secret: &SecretString) -> Self {
        let mut data = BTreeMap::new();
        data.insert(PAYLOAD_KEY.to_string(), secret.expose_secret().to_string());
        Self(data)
    }

    /// Build a payload from Vault response data.
    ///
    /// Non-string values are kept in their JSON form.
    pub fn from_data(data: Map<String, Value>) -> Self {
        let data = data
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();
        Self(data)
    }

    /// The value stored under [`PAYLOAD_KEY`].
    pub fn secret(&self) -> Option<&str> {
        self.get(PAYLOAD_KEY)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("keys", &self.0.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Which Vault mechanism keeps the secret.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Strategy {
    /// Vault response wrapping.
    #[default]
    Wrap,
    /// Limited-use token plus its private cubbyhole.
    Cubbyhole,
}

impl Strategy {
    /// Build the exchange implementing this strategy.
    pub fn exchange(self) -> Box<dyn SecretExchange> {
        match self {
            Strategy::Wrap => Box::new(WrappingExchange),
            Strategy::Cubbyhole => Box::new(CubbyholeExchange::default()),
        }
    }

    /// The strategy that issued `token`.
    pub fn of_token(token: &SecretString) -> Self {
        if token.expose_secret().starts_with(CUBBYHOLE_TOKEN_PREFIX) {
            Strategy::Cubbyhole
        } else {
            Strategy::Wrap
        }
    }

    /// Fail without a request when `token` was issued by another strategy.
    fn check_token(self, token: &SecretString) -> Result<(), RetrieveError> {
        let issued_by = Strategy::of_token(token);
        if issued_by == self {
            Ok(())
        } else {
            Err(RetrieveError::WrongStrategy {
                issued_by,
                used: self,
            })
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Wrap => f.write_str("wrap"),
            Strategy::Cubbyhole => f.write_str("cubbyhole"),
        }
    }
}

/// Stores a payload behind a single-use token and redeems it once.
#[async_trait]
pub trait SecretExchange: Send + Sync {
    fn name(&self) -> &str;

    /// Store `payload` for at most `ttl` and return the single-use token.
    ///
    /// `client` must carry a token allowed to wrap or to create tokens.
    /// Nothing is returned unless the payload was stored.
    async fn store(
        &self,
        client: &VaultClient,
        ttl: Duration,
        payload: &Payload,
    ) -> Result<SecretString, StoreError>;

    /// Redeem `token`, returning the payload stored behind it.
    ///
    /// Issues exactly one request, authenticated as `token`, or none when the
    /// token belongs to another strategy.
    async fn retrieve(
        &self,
        client: &VaultClient,
        token: &SecretString,
    ) -> Result<Payload, RetrieveError>;
}
