//! Loopback WebSocket transport (`ws://127.0.0.1:6463..6472`).

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::ORIGIN, HeaderValue},
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use drt_core::{errors::Error, rpc::port::Transport, Result};

pub const RPC_VERSION: u32 = 1;

pub fn ws_url(port: u16, client_id: &str) -> String {
    format!("ws://127.0.0.1:{port}/?v={RPC_VERSION}&client_id={client_id}&encoding=json")
}

/// The host's HTTP server answers `404` on `/`; anything else is not our RPC server.
pub async fn is_rpc_port(http: &reqwest::Client, base_url: &str) -> bool {
    match http.get(base_url).send().await {
        Ok(resp) => resp.status() == reqwest::StatusCode::NOT_FOUND,
        Err(e) => {
            debug!(url = %base_url, error = %e, "port probe failed");
            false
        }
    }
}

pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    /// Open the socket with the given `Origin`; the host rejects unknown origins.
    pub async fn connect(url: &str, origin: &str) -> Result<Self> {
        let mut req = url
            .into_client_request()
            .map_err(|e| Error::Transport(format!("invalid websocket url {url}: {e}")))?;
        let origin = HeaderValue::from_str(origin)
            .map_err(|e| Error::Transport(format!("invalid origin {origin}: {e}")))?;
        req.headers_mut().insert(ORIGIN, origin);

        let (stream, _resp) = connect_async(req)
            .await
            .map_err(|e| Error::Transport(format!("{url}: {e}")))?;
        Ok(Self { stream })
    }
}

fn ws_err(e: tokio_tungstenite::tungstenite::Error) -> Error {
    Error::Transport(format!("websocket error: {e}"))
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, frame: &serde_json::Value) -> Result<()> {
        let text = serde_json::to_string(frame)?;
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(ws_err)
    }

    async fn recv(&mut self) -> Result<serde_json::Value> {
        loop {
            let Some(msg) = self.stream.next().await else {
                return Err(Error::Transport("websocket closed".to_string()));
            };
            match msg.map_err(ws_err)? {
                Message::Text(text) => return Ok(serde_json::from_str(text.as_str())?),
                Message::Binary(data) => return Ok(serde_json::from_slice(&data)?),
                Message::Close(frame) => {
                    let (code, message) = frame
                        .map(|f| (i64::from(u16::from(f.code)), f.reason.as_str().to_string()))
                        .unwrap_or((0, "closed".to_string()));
                    return Err(Error::Closed { code, message });
                }
                // Pongs are queued by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.close(None).await.map_err(ws_err)
    }
}
