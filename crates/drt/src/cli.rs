use clap::{Args, Parser, Subcommand};

use drt_core::{
    config::TransportKind,
    domain::{ChannelId, Pan, UserId, VoiceSettings},
    errors::Error,
    Result,
};

#[derive(Debug, Parser)]
#[command(
    name = "drt",
    version,
    about = "Export channel messages and inspect voice state through the local chat client RPC"
)]
pub struct Cli {
    /// Transport to probe (overrides DRT_TRANSPORT).
    #[arg(long, global = true, value_parser = parse_transport)]
    pub transport: Option<TransportKind>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Prompt for channel ids and export each channel's messages until input ends.
    Export {
        /// Channel offered as the default for the first prompt.
        #[arg(long)]
        channel: Option<String>,
    },

    /// Export one channel, then optionally run one voice action.
    Fetch {
        channel: String,

        /// Print the currently selected voice channel afterwards.
        #[arg(long, conflicts_with = "user")]
        voice: bool,

        #[command(flatten)]
        settings: VoiceArgs,
    },

    /// Find the client whose user is in a voice channel and print its members.
    Voice {
        #[command(flatten)]
        settings: VoiceArgs,
    },
}

#[derive(Debug, Args)]
pub struct VoiceArgs {
    /// User whose voice settings to change (with --volume and/or --pan-left/--pan-right).
    #[arg(long)]
    pub user: Option<String>,

    /// Output volume for that user (0-200, 100 is normal).
    #[arg(long, requires = "user")]
    pub volume: Option<f64>,

    #[arg(long, requires_all = ["user", "pan_right"])]
    pub pan_left: Option<f64>,

    #[arg(long, requires_all = ["user", "pan_left"])]
    pub pan_right: Option<f64>,
}

impl VoiceArgs {
    pub fn to_settings(&self) -> Result<Option<VoiceSettings>> {
        let Some(raw) = &self.user else {
            return Ok(None);
        };
        let user_id = UserId::parse(raw)
            .ok_or_else(|| Error::InvalidInput(format!("not a user id: {raw}")))?;
        let pan = match (self.pan_left, self.pan_right) {
            (Some(left), Some(right)) => Some(Pan { left, right }),
            _ => None,
        };
        if self.volume.is_none() && pan.is_none() {
            return Err(Error::InvalidInput(
                "--user needs --volume or --pan-left/--pan-right".to_string(),
            ));
        }
        let settings = VoiceSettings {
            user_id,
            volume: self.volume,
            pan,
            mute: None,
        };
        settings.validate()?;
        Ok(Some(settings))
    }
}

pub fn parse_channel(raw: &str) -> Result<ChannelId> {
    ChannelId::parse(raw).ok_or_else(|| Error::InvalidInput(format!("not a channel id: {raw}")))
}

fn parse_transport(raw: &str) -> std::result::Result<TransportKind, String> {
    TransportKind::parse(raw).ok_or_else(|| format!("unknown transport `{raw}` (ipc, websocket)"))
}
