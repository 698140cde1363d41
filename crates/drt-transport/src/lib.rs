//! Local transport adapters (IPC sockets / named pipes and loopback WebSocket).
//!
//! This crate implements the `drt-core` Connector port.

use std::time::Duration;

use async_trait::async_trait;

use drt_core::{
    config::Config,
    errors::Error,
    rpc::port::{Connector, Endpoint, Transport},
    Result,
};

pub mod ipc;
pub mod ws;

/// Connects to host application endpoints on this machine.
#[derive(Clone, Debug)]
pub struct LocalConnector {
    client_id: String,
    origin: String,
    http: reqwest::Client,
}

impl LocalConnector {
    pub fn new(client_id: impl Into<String>, origin: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self {
            client_id: client_id.into(),
            origin: origin.into(),
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(cfg.client_id.clone(), cfg.origin.clone())
    }
}

#[async_trait]
impl Connector for LocalConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>> {
        match endpoint {
            Endpoint::Ipc { index } => Ok(Box::new(ipc::connect(*index, &self.client_id).await?)),
            Endpoint::WebSocket { port } => {
                let base = format!("http://127.0.0.1:{port}");
                if !ws::is_rpc_port(&self.http, &base).await {
                    return Err(Error::Transport(format!(
                        "{endpoint}: no RPC server answering"
                    )));
                }
                let url = ws::ws_url(*port, &self.client_id);
                Ok(Box::new(ws::WsTransport::connect(&url, &self.origin).await?))
            }
        }
    }
}
