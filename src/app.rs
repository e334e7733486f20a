//! Command handlers, independent of the CLI parser.

use secrecy::SecretString;

use crate::config::Settings;
use crate::duration::format_duration;
use crate::error::Error;
use crate::exchange::{Payload, Strategy};
use crate::vault::{ConnectOptions, VaultClient};

/// Store `secret` and return the single-use token that retrieves it.
pub async fn store(settings: &Settings, secret: SecretString) -> Result<SecretString, Error> {
    if settings.token.is_none() {
        tracing::warn!("No Vault token configured; the store request will be unauthenticated");
    }

    let client = VaultClient::connect(&settings.connect_options())?;
    let exchange = settings.exchange();
    let payload = Payload::new(&secret);

    let token = exchange.store(&client, settings.ttl, &payload).await?;
    tracing::info!(
        strategy = exchange.name(),
        ttl = %format_duration(settings.ttl),
        "Stored secret"
    );
    Ok(token)
}

/// Redeem `token` and return the payload stored behind it.
///
/// The strategy is taken from the token itself, not from `settings`. The
/// single-use token is the only credential sent; any configured Vault token
/// is left out.
pub async fn retrieve(settings: &Settings, token: SecretString) -> Result<Payload, Error> {
    let client = VaultClient::connect(&ConnectOptions {
        token: None,
        ..settings.connect_options()
    })?;

    let strategy = Strategy::of_token(&token);
    if strategy != settings.strategy {
        tracing::debug!(
            configured = %settings.strategy,
            issued_by = %strategy,
            "Using the strategy that issued the token"
        );
    }
    let exchange = strategy.exchange();

    let payload = exchange.retrieve(&client, &token).await?;
    tracing::info!(strategy = exchange.name(), "Retrieved secret; token is now spent");
    Ok(payload)
}
