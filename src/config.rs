//! Layered settings resolution.
//!
//! Settings are resolved once, before any network call, in this order (later
//! layers win):
//!
//! 1. built-in defaults
//! 2. the token helper file (`~/.vault-token`), for the token only
//! 3. the optional `destruct.toml` config file
//! 4. `VAULT_*` environment variables
//! 5. command-line flags
//!
//! Retrieve only needs to know where Vault is, so [`Settings::for_retrieve`]
//! skips the caller's token and the TTL.
//!
//! ```toml
//! vault_addr = "https://vault.internal:8200"
//! ca_cert = "/etc/ssl/vault-ca.pem"
//! namespace = "team-a"
//! ttl = "24h"
//! timeout = "30s"
//! strategy = "cubbyhole"
//! token_policies = ["default"]
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::duration::{deserialize_duration_opt, parse_duration};
use crate::error::ConfigError;
use crate::exchange::{CubbyholeExchange, SecretExchange, Strategy, DEFAULT_TOKEN_POLICIES};
use crate::vault::ConnectOptions;

/// Default Vault address.
pub const DEFAULT_ADDRESS: &str = "https://127.0.0.1:8200";

/// Default lifetime of a stored secret (15 days).
pub const DEFAULT_TTL: Duration = Duration::from_secs(360 * 60 * 60);

pub const VAULT_ADDR: &str = "VAULT_ADDR";
pub const VAULT_TOKEN: &str = "VAULT_TOKEN";
pub const VAULT_SKIP_VERIFY: &str = "VAULT_SKIP_VERIFY";
pub const VAULT_CACERT: &str = "VAULT_CACERT";
pub const VAULT_NAMESPACE: &str = "VAULT_NAMESPACE";
pub const VAULT_CLIENT_TIMEOUT: &str = "VAULT_CLIENT_TIMEOUT";
pub const VAULT_WRAP_TTL: &str = "VAULT_WRAP_TTL";

const ENV_VARS: [&str; 7] = [
    VAULT_ADDR,
    VAULT_TOKEN,
    VAULT_SKIP_VERIFY,
    VAULT_CACERT,
    VAULT_NAMESPACE,
    VAULT_CLIENT_TIMEOUT,
    VAULT_WRAP_TTL,
];

/// Snapshot of the `VAULT_*` environment variables this tool reads.
#[derive(Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the variables from the current process.
    pub fn from_process() -> Self {
        Self::from_pairs(
            ENV_VARS
                .iter()
                .filter_map(|name| std::env::var(name).ok().map(|value| (*name, value))),
        )
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `name`, treating empty values as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.vars.keys().collect();
        names.sort();
        f.debug_struct("Environment").field("set", &names).finish()
    }
}

/// Contents of the optional TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub vault_addr: Option<String>,
    pub insecure: Option<bool>,
    pub ca_cert: Option<PathBuf>,
    pub namespace: Option<String>,
    #[serde(deserialize_with = "deserialize_duration_opt")]
    pub ttl: Option<Duration>,
    #[serde(deserialize_with = "deserialize_duration_opt")]
    pub timeout: Option<Duration>,
    pub strategy: Option<Strategy>,
    /// Policies for the limited-use token of the cubbyhole strategy.
    pub token_policies: Option<Vec<String>>,
    /// Token helper file. Defaults to `~/.vault-token`.
    pub token_helper: Option<PathBuf>,
}

impl FileConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load config from a file, or return the empty config if it doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./destruct.toml` if it exists in the current directory
/// 2. `<config dir>/destruct/destruct.toml` (e.g. `~/.config/destruct/destruct.toml`)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("destruct.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("destruct").join("destruct.toml");
    }

    local_config
}

/// The token file written by `vault login`.
pub fn default_token_helper_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".vault-token"))
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub vault_addr: Option<String>,
    pub token: Option<SecretString>,
    pub ttl: Option<Duration>,
    /// A flag can only turn verification off, never back on.
    pub insecure: bool,
    pub strategy: Option<Strategy>,
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub address: String,
    pub insecure: bool,
    pub ca_cert: Option<PathBuf>,
    pub namespace: Option<String>,
    pub timeout: Option<Duration>,
    pub token: Option<SecretString>,
    pub ttl: Duration,
    pub strategy: Strategy,
    pub token_policies: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            insecure: false,
            ca_cert: None,
            namespace: None,
            timeout: None,
            token: None,
            ttl: DEFAULT_TTL,
            strategy: Strategy::default(),
            token_policies: DEFAULT_TOKEN_POLICIES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl Settings {
    /// Resolve settings for `store` from every layer.
    pub fn for_store(
        file: &FileConfig,
        env: &Environment,
        flags: &Overrides,
    ) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();

        let helper = file.token_helper.clone().or_else(default_token_helper_path);
        if let Some(path) = helper {
            settings.token = read_token_helper(&path);
        }

        settings.apply_file(file);
        settings.apply_env(env)?;
        settings.apply_store_env(env)?;
        settings.apply_flags(flags);

        if settings.ttl.is_zero() {
            return Err(ConfigError::InvalidTtl);
        }
        if settings.token_policies.is_empty() {
            return Err(ConfigError::NoPolicies);
        }
        Ok(settings)
    }

    /// Resolve settings for `retrieve`.
    ///
    /// The token helper, `VAULT_TOKEN` and `VAULT_WRAP_TTL` are not read, so
    /// the result never carries a caller token.
    pub fn for_retrieve(
        file: &FileConfig,
        env: &Environment,
        flags: &Overrides,
    ) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        settings.apply_file(file);
        settings.apply_env(env)?;
        settings.apply_flags(&Overrides {
            token: None,
            ttl: None,
            ..flags.clone()
        });
        Ok(settings)
    }

    fn apply_file(&mut self, file: &FileConfig) {
        if let Some(address) = &file.vault_addr {
            self.address = address.clone();
        }
        if let Some(insecure) = file.insecure {
            self.insecure = insecure;
        }
        if let Some(ca_cert) = &file.ca_cert {
            self.ca_cert = Some(ca_cert.clone());
        }
        if let Some(namespace) = &file.namespace {
            self.namespace = Some(namespace.clone());
        }
        if let Some(ttl) = file.ttl {
            self.ttl = ttl;
        }
        if let Some(timeout) = file.timeout {
            self.timeout = Some(timeout);
        }
        if let Some(strategy) = file.strategy {
            self.strategy = strategy;
        }
        if let Some(policies) = &file.token_policies {
            self.token_policies = policies.clone();
        }
    }

    fn apply_env(&mut self, env: &Environment) -> Result<(), ConfigError> {
        if let Some(address) = env.get(VAULT_ADDR) {
            self.address = address.to_string();
        }
        if let Some(value) = env.get(VAULT_SKIP_VERIFY) {
            self.insecure = parse_bool(value).ok_or_else(|| ConfigError::InvalidEnv {
                name: VAULT_SKIP_VERIFY,
                value: value.to_string(),
                reason: "expected a boolean".to_string(),
            })?;
        }
        if let Some(path) = env.get(VAULT_CACERT) {
            self.ca_cert = Some(PathBuf::from(path));
        }
        if let Some(namespace) = env.get(VAULT_NAMESPACE) {
            self.namespace = Some(namespace.to_string());
        }
        if let Some(value) = env.get(VAULT_CLIENT_TIMEOUT) {
            self.timeout = Some(env_duration(VAULT_CLIENT_TIMEOUT, value)?);
        }
        Ok(())
    }

    fn apply_store_env(&mut self, env: &Environment) -> Result<(), ConfigError> {
        if let Some(token) = env.get(VAULT_TOKEN) {
            self.token = Some(SecretString::from(token.to_string()));
        }
        if let Some(value) = env.get(VAULT_WRAP_TTL) {
            self.ttl = env_duration(VAULT_WRAP_TTL, value)?;
        }
        Ok(())
    }

    fn apply_flags(&mut self, flags: &Overrides) {
        if let Some(address) = &flags.vault_addr {
            self.address = address.clone();
        }
        if let Some(token) = &flags.token {
            self.token = Some(token.clone());
        }
        if let Some(ttl) = flags.ttl {
            self.ttl = ttl;
        }
        if flags.insecure {
            self.insecure = true;
        }
        if let Some(strategy) = flags.strategy {
            self.strategy = strategy;
        }
    }

    /// The exchange that stores secrets with these settings.
    pub fn exchange(&self) -> Box<dyn SecretExchange> {
        match self.strategy {
            Strategy::Cubbyhole => Box::new(CubbyholeExchange::with_policies(
                self.token_policies.clone(),
            )),
            Strategy::Wrap => self.strategy.exchange(),
        }
    }

    /// Options for connecting as the configured token.
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            address: self.address.clone(),
            insecure: self.insecure,
            ca_cert: self.ca_cert.clone(),
            namespace: self.namespace.clone(),
            timeout: self.timeout,
            token: self.token.clone(),
        }
    }
}

/// Read a token helper file. Missing or unreadable files mean "no token".
fn read_token_helper(path: &Path) -> Option<SecretString> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let token = contents.trim();
            (!token.is_empty()).then(|| SecretString::from(token.to_string()))
        }
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "No token helper file");
            None
        }
    }
}

/// Booleans as spelled by Go's `strconv.ParseBool`, which Vault uses.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn env_duration(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).map_err(|err| ConfigError::InvalidEnv {
        name,
        value: value.to_string(),
        reason: err.to_string(),
    })
}
