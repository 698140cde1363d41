use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// RPC commands this workspace issues (plus `DISPATCH` for server events).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Dispatch,
    Authorize,
    Authenticate,
    GetChannel,
    GetSelectedVoiceChannel,
    SetUserVoiceSettings,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Dispatch => "DISPATCH",
            Command::Authorize => "AUTHORIZE",
            Command::Authenticate => "AUTHENTICATE",
            Command::GetChannel => "GET_CHANNEL",
            Command::GetSelectedVoiceChannel => "GET_SELECTED_VOICE_CHANNEL",
            Command::SetUserVoiceSettings => "SET_USER_VOICE_SETTINGS",
        }
    }
}

pub const EVT_READY: &str = "READY";
pub const EVT_ERROR: &str = "ERROR";

// Error codes the host returns in `ERROR` events.
pub const ERR_INVALID_CHANNEL: i64 = 4005;
pub const ERR_INVALID_TOKEN: i64 = 4009;
pub const ERR_OAUTH2: i64 = 5000;

/// Outbound request envelope.
#[derive(Clone, Debug, Serialize)]
pub struct Request {
    pub cmd: Command,
    pub args: serde_json::Value,
    pub nonce: String,
}

/// Inbound frame: either a response (has a nonce) or a dispatched event.
#[derive(Clone, Debug, Deserialize)]
pub struct Response {
    /// Kept as a string so unknown commands from newer hosts still parse.
    pub cmd: String,
    #[serde(default)]
    pub evt: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Clone, Debug, Deserialize)]
struct ErrorData {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

impl Response {
    pub fn is_error(&self) -> bool {
        self.evt.as_deref() == Some(EVT_ERROR)
    }

    pub fn is_ready(&self) -> bool {
        self.cmd == Command::Dispatch.as_str() && self.evt.as_deref() == Some(EVT_READY)
    }

    /// Unwrap the payload, turning an `ERROR` event into `Error::Rpc`.
    pub fn into_data(self) -> Result<serde_json::Value, Error> {
        if self.is_error() {
            let e: ErrorData = serde_json::from_value(self.data).unwrap_or(ErrorData {
                code: 0,
                message: "unknown error".to_string(),
            });
            return Err(Error::Rpc {
                code: e.code,
                message: e.message,
            });
        }
        Ok(self.data)
    }
}
