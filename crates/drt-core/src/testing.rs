//! In-memory stand-in for the host application's RPC server.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    auth::Authorizer,
    errors::Error,
    rpc::{
        client::RpcClient,
        port::{Connector, Endpoint, Transport},
        protocol::{ERR_INVALID_CHANNEL, ERR_INVALID_TOKEN, ERR_OAUTH2},
    },
    Result,
};

pub const AUTH_CODE: &str = "code-123";
pub const FRESH_TOKEN: &str = "fresh-token";

#[derive(Clone, Default)]
pub struct FakeHost {
    pub valid_tokens: Vec<String>,
    pub channels: HashMap<String, Value>,
    pub selected_voice: Option<Value>,
    /// Never send READY.
    pub silent: bool,
    /// Emit an unrelated dispatch before every response.
    pub noisy: bool,
    /// Deny the consent dialog.
    pub deny_authorize: bool,
    /// Frames delivered before READY.
    pub preamble: Vec<Value>,
    sent: Arc<Mutex<Vec<Value>>>,
    closed: Arc<AtomicUsize>,
    hung_up: Arc<AtomicBool>,
}

impl FakeHost {
    pub fn with_tokens(tokens: &[&str]) -> Self {
        Self {
            valid_tokens: tokens.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn add_channel(&mut self, id: &str, messages: &[(&str, &str)]) {
        let messages: Vec<Value> = messages
            .iter()
            .enumerate()
            .map(|(i, (author, content))| {
                json!({
                    "id": format!("{id}-{i}"),
                    "content": content,
                    "timestamp": format!("2024-02-18T12:00:{:02}.000000+00:00", i % 60),
                    "author": { "id": format!("{i}"), "username": author }
                })
            })
            .collect();
        self.channels.insert(
            id.to_string(),
            json!({ "id": id, "name": format!("channel-{id}"), "type": 0, "messages": messages }),
        );
    }

    pub fn set_voice_channel(&mut self, id: &str, name: &str, members: &[&str]) {
        let states: Vec<Value> = members
            .iter()
            .enumerate()
            .map(|(i, m)| {
                json!({
                    "user": { "id": format!("{}", 100 + i), "username": m },
                    "volume": 100.0,
                    "mute": false
                })
            })
            .collect();
        self.selected_voice = Some(json!({
            "id": id, "name": name, "type": 2, "guild_id": "1", "voice_states": states
        }));
    }

    pub fn transport(&self) -> FakeTransport {
        let mut inbox: VecDeque<Value> = self.preamble.iter().cloned().collect();
        if !self.silent {
            inbox.push_back(json!({
                "cmd": "DISPATCH", "evt": "READY", "nonce": null,
                "data": { "v": 1, "config": {}, "user": { "id": "1", "username": "tester" } }
            }));
        }
        FakeTransport {
            host: self.clone(),
            inbox,
        }
    }

    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }

    /// Make every open transport to this host fail as if the client quit.
    pub fn hang_up(&self) {
        self.hung_up.store(true, Ordering::SeqCst);
    }

    /// Number of transports to this host that were closed.
    pub fn closes(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn sent_commands(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|f| f["cmd"].as_str().map(|s| s.to_string()))
            .collect()
    }

    fn respond(&self, frame: &Value) -> Vec<Value> {
        self.sent.lock().unwrap().push(frame.clone());
        let cmd = frame["cmd"].as_str().unwrap_or_default();
        let nonce = frame["nonce"].clone();
        let args = &frame["args"];

        let ok = |data: Value| json!({ "cmd": cmd, "evt": null, "nonce": nonce, "data": data });
        let err = |code: i64, message: &str| {
            json!({
                "cmd": cmd,
                "evt": "ERROR",
                "nonce": nonce,
                "data": { "code": code, "message": message }
            })
        };

        let reply = match cmd {
            "AUTHORIZE" if self.deny_authorize => err(ERR_OAUTH2, "OAuth2 Error: access_denied"),
            "AUTHORIZE" => ok(json!({ "code": AUTH_CODE })),
            "AUTHENTICATE" => {
                let token = args["access_token"].as_str().unwrap_or_default();
                if self.valid_tokens.iter().any(|t| t == token) {
                    ok(json!({
                        "application": { "id": "207646673902501888", "name": "StreamKit" },
                        "user": { "id": "1", "username": "tester" },
                        "scopes": ["rpc", "messages.read"],
                        "expires": "2030-01-01T00:00:00.000Z"
                    }))
                } else {
                    err(ERR_INVALID_TOKEN, "Invalid access token")
                }
            }
            "GET_CHANNEL" => {
                let id = args["channel_id"].as_str().unwrap_or_default();
                match self.channels.get(id) {
                    Some(ch) => ok(ch.clone()),
                    None => err(ERR_INVALID_CHANNEL, &format!("Invalid channel id: {id}")),
                }
            }
            "GET_SELECTED_VOICE_CHANNEL" => ok(self.selected_voice.clone().unwrap_or(Value::Null)),
            "SET_USER_VOICE_SETTINGS" => ok(args.clone()),
            _ => err(4002, "Invalid command"),
        };

        let mut out = Vec::new();
        if self.noisy {
            out.push(json!({
                "cmd": "DISPATCH",
                "evt": "VOICE_STATE_UPDATE",
                "nonce": null,
                "data": {}
            }));
        }
        out.push(reply);
        out
    }
}

pub struct FakeTransport {
    host: FakeHost,
    inbox: VecDeque<Value>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&mut self, frame: &Value) -> Result<()> {
        if self.host.hung_up.load(Ordering::SeqCst) {
            return Err(Error::Closed {
                code: 1000,
                message: "host went away".to_string(),
            });
        }
        let replies = self.host.respond(frame);
        self.inbox.extend(replies);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Value> {
        match self.inbox.pop_front() {
            Some(v) => Ok(v),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.host.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector that maps endpoints to fake hosts; unmapped endpoints refuse.
#[derive(Default)]
pub struct FakeConnector {
    pub hosts: HashMap<Endpoint, FakeHost>,
    attempts: Mutex<Vec<Endpoint>>,
}

impl FakeConnector {
    pub fn with(mut self, endpoint: Endpoint, host: FakeHost) -> Self {
        self.hosts.insert(endpoint, host);
        self
    }

    pub fn attempts(&self) -> Vec<Endpoint> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>> {
        self.attempts.lock().unwrap().push(endpoint.clone());
        match self.hosts.get(endpoint) {
            Some(host) => Ok(Box::new(host.transport())),
            None => Err(Error::Transport(format!("{endpoint}: connection refused"))),
        }
    }
}

/// Authorizer that runs the consent step and hands out `FRESH_TOKEN`.
#[derive(Default)]
pub struct CountingAuthorizer {
    calls: AtomicUsize,
}

impl CountingAuthorizer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authorizer for CountingAuthorizer {
    async fn authorize(&self, rpc: &mut RpcClient, scopes: &[String]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let code = rpc.authorize(scopes).await?;
        assert_eq!(code, AUTH_CODE);
        Ok(FRESH_TOKEN.to_string())
    }
}
