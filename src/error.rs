//! Error types for every stage of a run.
//!
//! Each stage has its own enum so callers (and tests) can tell a usage
//! mistake from a connectivity problem from a consumed token. [`Error`]
//! unifies them at the command boundary.

use std::path::PathBuf;

use reqwest::StatusCode;

use crate::exchange::Strategy;

/// Missing or unreadable command input. Raised before any backend call.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("secret input is required: pass it as arguments or pipe it on stdin")]
    MissingSecret,

    #[error("token is required")]
    MissingToken,

    #[error("failed to read secret from stdin")]
    ReadStdin(#[source] std::io::Error),
}

/// Invalid configuration from the config file, environment or flags.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}", path.display())]
    ParseFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("ttl must be greater than zero")]
    InvalidTtl,

    #[error("token_policies must name at least one policy")]
    NoPolicies,
}

/// Failure to build the Vault client. No request has been sent yet.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("invalid Vault address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to read CA certificate {}", path.display())]
    ReadCaCert {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid CA certificate {}", path.display())]
    InvalidCaCert {
        path: PathBuf,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to configure HTTP client")]
    Build(#[source] reqwest::Error),
}

/// A single Vault request that did not produce a usable response.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("network error communicating with Vault")]
    Transport(#[source] reqwest::Error),

    #[error("Vault returned {status}{}", format_errors(.errors))]
    Api {
        status: StatusCode,
        errors: Vec<String>,
    },

    #[error("unexpected response body from Vault")]
    Decode(#[source] serde_json::Error),
}

impl VaultError {
    /// True when the request never got an HTTP answer (DNS, connect, TLS, timeout).
    pub fn is_transport(&self) -> bool {
        matches!(self, VaultError::Transport(_))
    }

    /// HTTP status returned by Vault, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            VaultError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn format_errors(errors: &[String]) -> String {
    if errors.is_empty() {
        String::new()
    } else {
        format!(": {}", errors.join("; "))
    }
}

/// Failure while creating the single-use credential or storing the payload.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create limited-use token")]
    CreateToken(#[source] VaultError),

    #[error("failed to store secret")]
    Write(#[source] VaultError),

    #[error("Vault response did not include a token")]
    MissingToken,
}

/// Failure while redeeming a single-use token.
#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    /// The token was consumed, expired or never existed.
    #[error("secret is gone: the token was already used, has expired, or is invalid")]
    Gone,

    #[error("could not reach Vault")]
    Transport(#[source] VaultError),

    #[error("Vault rejected the request")]
    Backend(#[source] VaultError),

    #[error("Vault response did not include a secret")]
    MissingPayload,

    /// The token belongs to the other strategy. Nothing was sent, so the
    /// secret is still stored.
    #[error("token was issued by the {issued_by} strategy and cannot be redeemed with {used}")]
    WrongStrategy { issued_by: Strategy, used: Strategy },
}

impl From<VaultError> for RetrieveError {
    fn from(err: VaultError) -> Self {
        // Vault answers 400 for an invalid wrapping token, 403 for a revoked
        // or unknown token, 404 for an empty cubbyhole.
        match err.status().map(|status| status.as_u16()) {
            Some(400 | 403 | 404) => RetrieveError::Gone,
            _ if err.is_transport() => RetrieveError::Transport(err),
            _ => RetrieveError::Backend(err),
        }
    }
}

/// Any error a command can end with.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Retrieve(#[from] RetrieveError),
}
