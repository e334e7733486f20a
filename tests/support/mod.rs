//! In-memory Vault double that enforces single use and expiry.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Token allowed to wrap secrets and create child tokens.
pub const ROOT_TOKEN: &str = "s.root";

#[derive(Default)]
struct State {
    next_id: u64,
    wrapped: HashMap<String, Wrapped>,
    tokens: HashMap<String, Limited>,
    requests: usize,
}

struct Wrapped {
    data: Value,
    expires_at: Instant,
}

struct Limited {
    uses_left: u64,
    expires_at: Instant,
    cubbyhole: Option<Value>,
}

impl State {
    fn issue(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("s.{prefix}-{}", self.next_id)
    }

    /// Spend one use of a limited token. Vault revokes it after the last use.
    fn use_token(&mut self, token: &str) -> Option<&mut Limited> {
        let valid = self
            .tokens
            .get(token)
            .is_some_and(|t| t.uses_left > 0 && Instant::now() < t.expires_at);
        if !valid {
            self.tokens.remove(token);
            return None;
        }
        let entry = self.tokens.get_mut(token)?;
        entry.uses_left -= 1;
        Some(entry)
    }
}

#[derive(Clone, Copy)]
enum Route {
    Wrap,
    Unwrap,
    CreateToken,
    CubbyholeWrite,
    CubbyholeRead,
}

struct Handler {
    vault: FakeVault,
    route: Route,
}

fn header<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

fn vault_error(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({ "errors": [message] }))
}

fn parse_secs(value: &str) -> Option<u64> {
    value.trim().trim_end_matches('s').parse().ok()
}

impl Respond for Handler {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let token = header(request, "x-vault-token").unwrap_or("").to_string();
        let mut state = self.vault.state.lock().unwrap();
        state.requests += 1;

        match self.route {
            Route::Wrap => {
                if token != ROOT_TOKEN {
                    return vault_error(403, "permission denied");
                }
                let ttl = header(request, "x-vault-wrap-ttl")
                    .and_then(parse_secs)
                    .unwrap_or(300);
                let data: Value = match serde_json::from_slice(&request.body) {
                    Ok(data) => data,
                    Err(_) => return vault_error(400, "failed to parse JSON input"),
                };
                let wrapping_token = state.issue("wrap");
                state.wrapped.insert(
                    wrapping_token.clone(),
                    Wrapped {
                        data,
                        expires_at: Instant::now() + Duration::from_secs(ttl),
                    },
                );
                ResponseTemplate::new(200).set_body_json(json!({
                    "request_id": "",
                    "lease_id": "",
                    "renewable": false,
                    "lease_duration": 0,
                    "data": null,
                    "wrap_info": {
                        "token": wrapping_token,
                        "accessor": "accessor",
                        "ttl": ttl,
                        "creation_time": "2026-10-19T00:00:00Z",
                        "creation_path": "sys/wrapping/wrap"
                    },
                    "warnings": null,
                    "auth": null
                }))
            }
            Route::Unwrap => match state.wrapped.remove(&token) {
                Some(wrapped) if Instant::now() < wrapped.expires_at => {
                    ResponseTemplate::new(200).set_body_json(json!({ "data": wrapped.data }))
                }
                _ => vault_error(400, "wrapping token is not valid or does not exist"),
            },
            Route::CreateToken => {
                if token != ROOT_TOKEN {
                    return vault_error(403, "permission denied");
                }
                let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
                let ttl = body["explicit_max_ttl"]
                    .as_str()
                    .and_then(parse_secs)
                    .unwrap_or(300);
                let uses = body["num_uses"].as_u64().unwrap_or(0);
                let client_token = state.issue("limited");
                state.tokens.insert(
                    client_token.clone(),
                    Limited {
                        uses_left: uses,
                        expires_at: Instant::now() + Duration::from_secs(ttl),
                        cubbyhole: None,
                    },
                );
                ResponseTemplate::new(200).set_body_json(json!({
                    "auth": {
                        "client_token": client_token,
                        "accessor": "accessor",
                        "policies": ["root"],
                        "lease_duration": ttl,
                        "renewable": false
                    }
                }))
            }
            Route::CubbyholeWrite => {
                let data: Option<Value> = serde_json::from_slice(&request.body).ok();
                match state.use_token(&token) {
                    Some(entry) => {
                        entry.cubbyhole = data;
                        ResponseTemplate::new(204)
                    }
                    None => vault_error(403, "permission denied"),
                }
            }
            Route::CubbyholeRead => {
                let (data, exhausted) = match state.use_token(&token) {
                    Some(entry) => (entry.cubbyhole.clone(), entry.uses_left == 0),
                    None => return vault_error(403, "permission denied"),
                };
                if exhausted {
                    state.tokens.remove(&token);
                }
                match data {
                    Some(data) => ResponseTemplate::new(200).set_body_json(json!({ "data": data })),
                    None => ResponseTemplate::new(404).set_body_json(json!({ "errors": [] })),
                }
            }
        }
    }
}

/// Vault double mounted on a wiremock server.
#[derive(Clone, Default)]
pub struct FakeVault {
    state: Arc<Mutex<State>>,
}

impl FakeVault {
    pub async fn start() -> (MockServer, FakeVault) {
        let server = MockServer::start().await;
        let vault = FakeVault::default();

        let routes = [
            ("POST", "/v1/sys/wrapping/wrap", Route::Wrap),
            ("POST", "/v1/sys/wrapping/unwrap", Route::Unwrap),
            ("POST", "/v1/auth/token/create", Route::CreateToken),
            ("POST", "/v1/cubbyhole/destruct", Route::CubbyholeWrite),
            ("GET", "/v1/cubbyhole/destruct", Route::CubbyholeRead),
        ];
        for (verb, route_path, route) in routes {
            Mock::given(method(verb))
                .and(path(route_path))
                .respond_with(Handler {
                    vault: vault.clone(),
                    route,
                })
                .mount(&server)
                .await;
        }

        (server, vault)
    }

    /// Number of requests the double has answered.
    pub fn requests(&self) -> usize {
        self.state.lock().unwrap().requests
    }

    /// Number of stored secrets that can still be redeemed.
    pub fn live_secrets(&self) -> usize {
        let state = self.state.lock().unwrap();
        let now = Instant::now();
        state.wrapped.values().filter(|w| now < w.expires_at).count()
            + state
                .tokens
                .values()
                .filter(|t| now < t.expires_at && t.uses_left > 0 && t.cubbyhole.is_some())
                .count()
    }
}

/// Write a config file that keeps tests away from the real token helper.
pub fn write_isolated_config(dir: &Path) -> std::path::PathBuf {
    let config = dir.join("destruct.toml");
    let helper = dir.join("vault-token");
    std::fs::write(
        &config,
        format!("token_helper = {:?}\n", helper.display().to_string()),
    )
    .unwrap();
    config
}
