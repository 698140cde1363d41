use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tracing::{error, info};

use crate::{
    domain::{Channel, ChannelId, VoiceSettings},
    errors::Error,
    export::ChannelExporter,
    rpc::client::RpcClient,
    Result,
};

/// Source of interactive answers (stdin in production).
#[async_trait]
pub trait Prompt: Send {
    /// `Ok(None)` means input is closed.
    async fn ask(&mut self, question: &str, default: Option<&str>) -> Result<Option<String>>;
}

pub struct StdinPrompt {
    lines: Lines<BufReader<Stdin>>,
    out: Stdout,
}

impl StdinPrompt {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            out: tokio::io::stdout(),
        }
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prompt for StdinPrompt {
    async fn ask(&mut self, question: &str, default: Option<&str>) -> Result<Option<String>> {
        let text = match default {
            Some(d) => format!("{question} ({d}): "),
            None => format!("{question}: "),
        };
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await?;
        Ok(self.lines.next_line().await?)
    }
}

/// Auxiliary action for one-shot runs.
#[derive(Clone, Debug, PartialEq)]
pub enum Auxiliary {
    ShowVoiceChannel,
    SetVoiceSettings(VoiceSettings),
}

/// What a one-shot action produced.
#[derive(Clone, Debug, Default)]
pub struct OneShotReport {
    pub exported: Option<(ChannelId, usize)>,
    pub voice_channel: Option<Channel>,
    pub voice_settings: Option<VoiceSettings>,
}

/// Fetch a channel and write its export. Returns the number of messages written.
pub async fn export_channel(
    rpc: &mut RpcClient,
    exporter: &ChannelExporter,
    channel_id: &ChannelId,
) -> Result<usize> {
    let channel = rpc.get_channel(channel_id).await?;
    let path = exporter.export(channel_id, &channel.messages)?;
    info!(
        channel = %channel_id,
        name = %channel.name,
        messages = channel.messages.len(),
        path = %path.display(),
        "exported channel"
    );
    Ok(channel.messages.len())
}

/// Prompt for channel ids forever, exporting each one.
///
/// Per-channel failures are logged and the user is asked again. The loop ends
/// when the prompt reports closed input, or with an error once the connection
/// to the host is lost.
pub async fn interactive_export(
    rpc: &mut RpcClient,
    exporter: &ChannelExporter,
    prompt: &mut dyn Prompt,
    initial: Option<ChannelId>,
) -> Result<()> {
    let mut previous = initial;

    loop {
        let answer = prompt
            .ask("Channel ID", previous.as_ref().map(|c| c.0.as_str()))
            .await?;
        let Some(answer) = answer else {
            info!("input closed, stopping");
            return Ok(());
        };

        let channel_id = if answer.trim().is_empty() {
            match &previous {
                Some(p) => p.clone(),
                None => continue,
            }
        } else {
            match ChannelId::parse(&answer) {
                Some(id) => id,
                None => {
                    error!(input = %answer.trim(), "not a channel id");
                    continue;
                }
            }
        };
        previous = Some(channel_id.clone());

        match export_channel(rpc, exporter, &channel_id).await {
            Ok(_) => {}
            Err(e) if e.is_connection_lost() => return Err(e),
            Err(e) => error!(channel = %channel_id, error = %e, "failed to export channel"),
        }
    }
}

/// Export one channel (if given) and run one auxiliary action.
pub async fn one_shot(
    rpc: &mut RpcClient,
    exporter: &ChannelExporter,
    channel_id: Option<&ChannelId>,
    aux: Option<&Auxiliary>,
) -> Result<OneShotReport> {
    if channel_id.is_none() && aux.is_none() {
        return Err(Error::InvalidInput(
            "nothing to do: no channel id and no action".to_string(),
        ));
    }

    let mut report = OneShotReport::default();

    if let Some(id) = channel_id {
        let n = export_channel(rpc, exporter, id).await?;
        report.exported = Some((id.clone(), n));
    }

    match aux {
        Some(Auxiliary::ShowVoiceChannel) => {
            report.voice_channel = rpc.get_selected_voice_channel().await?;
        }
        Some(Auxiliary::SetVoiceSettings(settings)) => {
            let applied = rpc.set_user_voice_settings(settings).await?;
            info!(user = %applied.user_id, volume = ?applied.volume, "voice settings applied");
            report.voice_settings = Some(applied);
        }
        None => {}
    }

    Ok(report)
}

/// Human-readable summary of a voice channel and who is in it.
pub fn describe_voice_channel(channel: &Channel) -> String {
    let mut out = format!("{} ({})", channel.name, channel.id);
    for state in &channel.voice_states {
        let name = state
            .nick
            .as_deref()
            .or(state.user.global_name.as_deref())
            .unwrap_or(state.user.username.as_str());
        out.push_str(&format!("\n  - {name} [{}]", state.user.id));
        if let Some(v) = state.volume {
            out.push_str(&format!(" volume={v}"));
        }
        if state.mute {
            out.push_str(" muted");
        }
    }
    out
}
