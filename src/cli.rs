//! Command-line surface and dispatch.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;

use crate::app;
use crate::config::{default_config_path, Environment, FileConfig, Overrides, Settings};
use crate::duration::parse_duration;
use crate::error::{Error, RetrieveError, UsageError};
use crate::exchange::Strategy;
use crate::input::read_secret;

/// Printed when no subcommand is given.
pub const BANNER: &str = "This message will self-destruct";

#[derive(Debug, Parser)]
#[command(name = "destruct", version)]
#[command(about = "Store or retrieve Vault secrets that will auto-delete after being retrieved once.")]
pub struct Cli {
    /// Path to config file [default: ./destruct.toml or ~/.config/destruct/destruct.toml]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// How Vault keeps the secret on store; retrieve detects it from the token
    #[arg(long, value_enum, global = true)]
    pub strategy: Option<Strategy>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store secrets
    #[command(visible_alias = "s")]
    Store(StoreArgs),

    /// Retrieve secrets
    #[command(visible_alias = "r")]
    Retrieve(RetrieveArgs),
}

/// Flags shared by both commands.
#[derive(Debug, Args)]
pub struct VaultArgs {
    /// Vault service hostname/IP and port [env: VAULT_ADDR] [default: https://127.0.0.1:8200]
    #[arg(short = 'a', long = "vault-addr")]
    pub vault_addr: Option<String>,

    /// Allow invalid SSL cert on Vault service [env: VAULT_SKIP_VERIFY]
    #[arg(short = 'k', long)]
    pub insecure: bool,
}

#[derive(Debug, Args)]
pub struct StoreArgs {
    #[command(flatten)]
    pub vault: VaultArgs,

    /// Vault token with access to create self-destructing token [env: VAULT_TOKEN]
    #[arg(short, long)]
    pub token: Option<String>,

    /// How long the secret waits to be retrieved [env: VAULT_WRAP_TTL] [default: 360h]
    #[arg(long, value_parser = parse_ttl)]
    pub ttl: Option<Duration>,

    /// Secret to store; read from piped stdin when omitted
    pub secret: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RetrieveArgs {
    #[command(flatten)]
    pub vault: VaultArgs,

    /// Single-use token printed by `store`
    pub token: Option<String>,
}

fn parse_ttl(value: &str) -> Result<Duration, String> {
    parse_duration(value).map_err(|err| err.to_string())
}

impl StoreArgs {
    fn overrides(&self, strategy: Option<Strategy>) -> Overrides {
        Overrides {
            vault_addr: self.vault.vault_addr.clone(),
            token: self.token.clone().map(SecretString::from),
            ttl: self.ttl,
            insecure: self.vault.insecure,
            strategy,
        }
    }
}

impl RetrieveArgs {
    fn overrides(&self, strategy: Option<Strategy>) -> Overrides {
        Overrides {
            vault_addr: self.vault.vault_addr.clone(),
            insecure: self.vault.insecure,
            strategy,
            ..Overrides::default()
        }
    }
}

/// What a successful command prints to stdout.
#[derive(Debug)]
pub enum Output {
    Banner,
    Token(SecretString),
    Secret(SecretString),
}

/// Run one parsed command.
///
/// Usage errors are raised before settings are resolved or any request is
/// sent. `stdin` is only read by `store` when no secret arguments are given.
pub async fn dispatch<R: Read>(
    cli: &Cli,
    env: &Environment,
    stdin: Option<R>,
) -> Result<Output, Error> {
    let Some(command) = &cli.command else {
        return Ok(Output::Banner);
    };

    match command {
        Command::Store(args) => {
            let secret = read_secret(&args.secret, stdin)?;
            let file = load_config(cli)?;
            let settings = Settings::for_store(&file, env, &args.overrides(cli.strategy))?;
            log_settings(&settings);
            let token = app::store(&settings, secret).await?;
            Ok(Output::Token(token))
        }
        Command::Retrieve(args) => {
            let token = args
                .token
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or(UsageError::MissingToken)?;
            let token = SecretString::from(token.to_string());
            let file = load_config(cli)?;
            let settings = Settings::for_retrieve(&file, env, &args.overrides(cli.strategy))?;
            log_settings(&settings);
            let payload = app::retrieve(&settings, token).await?;
            let secret = payload.secret().ok_or(RetrieveError::MissingPayload)?;
            Ok(Output::Secret(SecretString::from(secret.to_string())))
        }
    }
}

fn load_config(cli: &Cli) -> Result<FileConfig, Error> {
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::load_or_default(&default_config_path())?,
    };
    Ok(file)
}

fn log_settings(settings: &Settings) {
    tracing::debug!(
        address = %settings.address,
        strategy = %settings.strategy,
        insecure = settings.insecure,
        "Resolved settings"
    );
}
