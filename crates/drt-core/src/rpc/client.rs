use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::{
    domain::{Authenticated, Channel, ChannelId, Ready, VoiceSettings},
    errors::Error,
    rpc::{
        port::Transport,
        protocol::{Command, Request, Response},
    },
    Result,
};

/// RPC client bound to one connected transport.
///
/// Requests are strictly sequential: each call sends one frame and reads until
/// the response with the matching nonce arrives. Dispatched events received in
/// between are logged and dropped.
pub struct RpcClient {
    transport: Box<dyn Transport>,
    client_id: String,
    timeout: Duration,
    ready: Ready,
    session: Option<Authenticated>,
}

impl RpcClient {
    /// Wait for the host's `READY` dispatch on a freshly connected transport.
    pub async fn start(
        mut transport: Box<dyn Transport>,
        client_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let ready = match tokio::time::timeout(timeout, wait_ready(transport.as_mut())).await {
            Ok(r) => r,
            Err(_) => Err(Error::Timeout("READY".to_string())),
        };
        let ready = match ready {
            Ok(r) => r,
            Err(e) => {
                let _ = transport.close().await;
                return Err(e);
            }
        };

        Ok(Self {
            transport,
            client_id: client_id.into(),
            timeout,
            ready,
            session: None,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn ready(&self) -> &Ready {
        &self.ready
    }

    /// The last successful `AUTHENTICATE` on this connection.
    pub fn session(&self) -> Option<&Authenticated> {
        self.session.as_ref()
    }

    pub async fn request(
        &mut self,
        cmd: Command,
        args: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let timeout = self.timeout;
        self.request_with_timeout(cmd, args, Some(timeout)).await
    }

    async fn request_with_timeout(
        &mut self,
        cmd: Command,
        args: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<serde_json::Value> {
        let nonce = uuid::Uuid::new_v4().to_string();
        let frame = serde_json::to_value(Request {
            cmd,
            args,
            nonce: nonce.clone(),
        })?;
        self.transport.send(&frame).await?;

        let fut = read_response(self.transport.as_mut(), &nonce);
        let resp = match timeout {
            Some(d) => tokio::time::timeout(d, fut)
                .await
                .map_err(|_| Error::Timeout(cmd.as_str().to_string()))??,
            None => fut.await?,
        };
        resp.into_data()
    }

    async fn request_as<T: DeserializeOwned>(
        &mut self,
        cmd: Command,
        args: serde_json::Value,
    ) -> Result<T> {
        let data = self.request(cmd, args).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Ask the host application for user consent and return the authorization code.
    ///
    /// Not bounded by the request timeout: the host shows a dialog and waits on the user.
    pub async fn authorize(&mut self, scopes: &[String]) -> Result<String> {
        let args = json!({ "client_id": self.client_id, "scopes": scopes });
        let data = self
            .request_with_timeout(Command::Authorize, args, None)
            .await?;
        data.get("code")
            .and_then(|c| c.as_str())
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .ok_or_else(|| Error::Auth("AUTHORIZE response had no code".to_string()))
    }

    pub async fn authenticate(&mut self, access_token: &str) -> Result<Authenticated> {
        let auth: Authenticated = self
            .request_as(
                Command::Authenticate,
                json!({ "access_token": access_token }),
            )
            .await?;
        self.session = Some(auth.clone());
        Ok(auth)
    }

    pub async fn get_channel(&mut self, channel_id: &ChannelId) -> Result<Channel> {
        self.request_as(Command::GetChannel, json!({ "channel_id": channel_id }))
            .await
    }

    /// `None` when the authenticated user is not in a voice channel.
    pub async fn get_selected_voice_channel(&mut self) -> Result<Option<Channel>> {
        let data = self
            .request(Command::GetSelectedVoiceChannel, json!({}))
            .await?;
        if data.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(data)?))
    }

    pub async fn set_user_voice_settings(
        &mut self,
        settings: &VoiceSettings,
    ) -> Result<VoiceSettings> {
        settings.validate()?;
        self.request_as(
            Command::SetUserVoiceSettings,
            serde_json::to_value(settings)?,
        )
        .await
    }

    pub async fn close(mut self) -> Result<()> {
        self.transport.close().await
    }
}

async fn wait_ready(transport: &mut dyn Transport) -> Result<Ready> {
    loop {
        let raw = transport.recv().await?;
        let resp: Response = serde_json::from_value(raw)?;
        if resp.is_ready() {
            return Ok(serde_json::from_value(resp.data)?);
        }
        if resp.is_error() {
            resp.into_data()?;
            continue;
        }
        debug!(cmd = %resp.cmd, evt = ?resp.evt, "ignoring frame before READY");
    }
}

async fn read_response(transport: &mut dyn Transport, nonce: &str) -> Result<Response> {
    loop {
        let raw = transport.recv().await?;
        let resp: Response = serde_json::from_value(raw)?;
        if resp.nonce.as_deref() == Some(nonce) {
            return Ok(resp);
        }
        debug!(cmd = %resp.cmd, evt = ?resp.evt, "ignoring unrelated frame");
    }
}
