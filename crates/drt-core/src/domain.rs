use std::fmt;

use serde::{Deserialize, Serialize};

/// Snowflake id of a channel (kept as the string the host application sends).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

/// Snowflake id of a user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl ChannelId {
    /// Parse a user-supplied channel id. Snowflakes are non-empty decimal strings.
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self(s.to_string()))
    }
}

impl UserId {
    pub fn parse(raw: &str) -> Option<Self> {
        ChannelId::parse(raw).map(|c| Self(c.0))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Payload of the `READY` dispatch the host sends right after connecting.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Ready {
    #[serde(default)]
    pub v: u32,
    #[serde(default)]
    pub user: Option<User>,
}

/// Result of a successful `AUTHENTICATE`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Authenticated {
    pub application: Application,
    pub user: User,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expires: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub author: User,
    #[serde(default)]
    pub content: String,
    /// RFC 3339 timestamp as sent by the host application.
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct VoiceState {
    pub user: User,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub mute: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub voice_states: Vec<VoiceState>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pan {
    pub left: f64,
    pub right: f64,
}

/// Arguments (and result) of `SET_USER_VOICE_SETTINGS`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pan: Option<Pan>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mute: Option<bool>,
}

pub const MAX_VOICE_VOLUME: f64 = 200.0;

impl VoiceSettings {
    pub fn volume(user_id: UserId, volume: f64) -> Self {
        Self {
            user_id,
            volume: Some(volume),
            pan: None,
            mute: None,
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if let Some(v) = self.volume {
            if !(0.0..=MAX_VOICE_VOLUME).contains(&v) {
                return Err(crate::Error::InvalidInput(format!(
                    "volume must be between 0 and {MAX_VOICE_VOLUME}, got {v}"
                )));
            }
        }
        if let Some(p) = self.pan {
            if !(0.0..=1.0).contains(&p.left) || !(0.0..=1.0).contains(&p.right) {
                return Err(crate::Error::InvalidInput(format!(
                    "pan values must be between 0 and 1, got left={} right={}",
                    p.left, p.right
                )));
            }
        }
        Ok(())
    }
}
