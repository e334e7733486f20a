//! Thin adapter over Vault's HTTP API.
//!
//! Only the handful of endpoints the store/retrieve protocol needs are
//! exercised, but requests are plain `POST`/`GET` calls against `/v1/<path>`
//! so any logical path works.

mod client;
mod response;

pub use client::{ConnectOptions, VaultClient};
pub use response::{AuthInfo, SecretResponse, WrapInfo};
