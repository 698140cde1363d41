//! Local socket transport (`discord-ipc-N`).
//!
//! Frames are an 8-byte little-endian header `(opcode, length)` followed by
//! `length` bytes of UTF-8 JSON.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use drt_core::{errors::Error, rpc::port::Transport, Result};

pub const HANDSHAKE_VERSION: u32 = 1;
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    Handshake = 0,
    Frame = 1,
    Close = 2,
    Ping = 3,
    Pong = 4,
}

impl Opcode {
    fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Handshake),
            1 => Some(Self::Frame),
            2 => Some(Self::Close),
            3 => Some(Self::Ping),
            4 => Some(Self::Pong),
            _ => None,
        }
    }
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    w: &mut W,
    op: Opcode,
    payload: &serde_json::Value,
) -> Result<()> {
    let body = serde_json::to_vec(payload)?;
    let len = u32::try_from(body.len())
        .map_err(|_| Error::Transport(format!("frame too large: {} bytes", body.len())))?;

    let mut buf = Vec::with_capacity(8 + body.len());
    buf.extend_from_slice(&(op as u32).to_le_bytes());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&body);
    w.write_all(&buf).await?;
    w.flush().await?;
    Ok(())
}

pub async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> Result<(Opcode, serde_json::Value)> {
    let mut header = [0u8; 8];
    r.read_exact(&mut header).await.map_err(map_eof)?;
    let op_raw = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;

    let op = Opcode::from_u32(op_raw)
        .ok_or_else(|| Error::Transport(format!("unknown ipc opcode {op_raw}")))?;
    if len > MAX_FRAME_LEN {
        return Err(Error::Transport(format!("ipc frame too large: {len} bytes")));
    }

    let mut body = vec![0u8; len];
    r.read_exact(&mut body).await.map_err(map_eof)?;
    let payload = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body)?
    };
    Ok((op, payload))
}

fn map_eof(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::Transport("ipc connection closed".to_string())
    } else {
        Error::Io(e)
    }
}

/// RPC transport over any byte stream speaking the IPC framing.
pub struct IpcTransport<S> {
    stream: S,
}

impl<S> IpcTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Send the opening handshake; the host answers with a `READY` frame.
    pub async fn handshake(mut stream: S, client_id: &str) -> Result<Self> {
        write_frame(
            &mut stream,
            Opcode::Handshake,
            &json!({ "v": HANDSHAKE_VERSION, "client_id": client_id }),
        )
        .await?;
        Ok(Self { stream })
    }
}

#[async_trait]
impl<S> Transport for IpcTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, frame: &serde_json::Value) -> Result<()> {
        write_frame(&mut self.stream, Opcode::Frame, frame).await
    }

    async fn recv(&mut self) -> Result<serde_json::Value> {
        loop {
            let (op, payload) = read_frame(&mut self.stream).await?;
            match op {
                Opcode::Frame => return Ok(payload),
                Opcode::Ping => {
                    debug!("ipc ping");
                    write_frame(&mut self.stream, Opcode::Pong, &payload).await?;
                }
                Opcode::Pong => continue,
                Opcode::Close => {
                    return Err(Error::Closed {
                        code: payload.get("code").and_then(|c| c.as_i64()).unwrap_or(0),
                        message: payload
                            .get("message")
                            .and_then(|m| m.as_str())
                            .unwrap_or("closed")
                            .to_string(),
                    })
                }
                Opcode::Handshake => {
                    return Err(Error::Transport(
                        "unexpected handshake frame from host".to_string(),
                    ))
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        let _ = write_frame(&mut self.stream, Opcode::Close, &json!({})).await;
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Directory holding the IPC sockets, from the usual temp-dir variables.
#[cfg(unix)]
pub fn socket_dir(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .iter()
        .find_map(|k| lookup(k).filter(|v| !v.is_empty()))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

#[cfg(unix)]
pub fn socket_path(index: u8) -> PathBuf {
    socket_dir(|k| std::env::var(k).ok()).join(format!("discord-ipc-{index}"))
}

#[cfg(windows)]
pub fn socket_path(index: u8) -> PathBuf {
    PathBuf::from(format!(r"\\?\pipe\discord-ipc-{index}"))
}

#[cfg(unix)]
pub type IpcStream = tokio::net::UnixStream;

#[cfg(windows)]
pub type IpcStream = tokio::net::windows::named_pipe::NamedPipeClient;

#[cfg(unix)]
pub async fn open(path: &std::path::Path) -> Result<IpcStream> {
    tokio::net::UnixStream::connect(path)
        .await
        .map_err(|e| Error::Transport(format!("{}: {e}", path.display())))
}

#[cfg(windows)]
pub async fn open(path: &std::path::Path) -> Result<IpcStream> {
    tokio::net::windows::named_pipe::ClientOptions::new()
        .open(path)
        .map_err(|e| Error::Transport(format!("{}: {e}", path.display())))
}

/// Connect to `discord-ipc-<index>` and perform the handshake.
pub async fn connect(index: u8, client_id: &str) -> Result<IpcTransport<IpcStream>> {
    let path = socket_path(index);
    debug!(path = %path.display(), "opening ipc socket");
    let stream = open(&path).await?;
    IpcTransport::handshake(stream, client_id).await
}
