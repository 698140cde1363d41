use std::fmt;

use async_trait::async_trait;

use crate::{config::TransportKind, Result};

/// Number of `discord-ipc-N` sockets the host application may listen on.
pub const IPC_SOCKET_COUNT: u8 = 10;
/// First loopback port of the WebSocket RPC server.
pub const WS_PORT_START: u16 = 6463;
pub const WS_PORT_COUNT: u16 = 10;

/// One local place a host application instance may be listening.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Ipc { index: u8 },
    WebSocket { port: u16 },
}

impl Endpoint {
    /// The fixed candidate list for a transport kind, in probing order.
    pub fn candidates(kind: TransportKind) -> Vec<Endpoint> {
        match kind {
            TransportKind::Ipc => (0..IPC_SOCKET_COUNT)
                .map(|index| Endpoint::Ipc { index })
                .collect(),
            TransportKind::WebSocket => (0..WS_PORT_COUNT)
                .map(|i| Endpoint::WebSocket {
                    port: WS_PORT_START + i,
                })
                .collect(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Ipc { index } => write!(f, "ipc:discord-ipc-{index}"),
            Endpoint::WebSocket { port } => write!(f, "ws:127.0.0.1:{port}"),
        }
    }
}

/// A connected, framed JSON channel to the host application.
///
/// Implementations answer transport keepalives (IPC ping) themselves and only
/// surface RPC frames from `recv`.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, frame: &serde_json::Value) -> Result<()>;
    async fn recv(&mut self) -> Result<serde_json::Value>;
    async fn close(&mut self) -> Result<()>;
}

/// Opens transports to endpoints. One connect is one attempt: no internal retry.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>>;
}
