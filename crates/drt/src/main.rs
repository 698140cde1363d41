use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use tracing::error;

use drt_core::{
    auth::AuthFlow,
    commands::{describe_voice_channel, interactive_export, one_shot, Auxiliary, StdinPrompt},
    config::Config,
    export::ChannelExporter,
    probe::{AnyInstance, InVoiceChannel, Prober},
    store::TokenStore,
    Result,
};
use drt_oauth::authorizer_from_config;
use drt_transport::LocalConnector;

mod cli;

use cli::{parse_channel, Cli, Command};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = drt_core::logging::init("drt") {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "drt failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut cfg = Config::load()?;
    if let Some(t) = cli.transport {
        cfg.transport = t;
    }

    let prober = Prober::from_config(Arc::new(LocalConnector::from_config(&cfg)?), &cfg);
    let auth = AuthFlow::new(
        TokenStore::in_dir(&cfg.store_dir),
        authorizer_from_config(&cfg)?,
        cfg.scopes.clone(),
    );
    let exporter = ChannelExporter::new(&cfg.export_dir);

    match cli.command {
        Command::Export { channel } => {
            let initial = channel.as_deref().map(parse_channel).transpose()?;
            let mut session = prober.run(&auth, &mut AnyInstance).await?;
            let mut prompt = StdinPrompt::new();
            let result =
                interactive_export(&mut session.rpc, &exporter, &mut prompt, initial).await;
            let _ = session.rpc.close().await;
            result
        }

        Command::Fetch {
            channel,
            voice,
            settings,
        } => {
            let channel_id = parse_channel(&channel)?;
            let aux = if voice {
                Some(Auxiliary::ShowVoiceChannel)
            } else {
                settings.to_settings()?.map(Auxiliary::SetVoiceSettings)
            };

            let mut session = prober.run(&auth, &mut AnyInstance).await?;
            let result =
                one_shot(&mut session.rpc, &exporter, Some(&channel_id), aux.as_ref()).await;
            let _ = session.rpc.close().await;
            let report = result?;

            if let Some((id, count)) = &report.exported {
                println!(
                    "Exported {count} messages to {}",
                    exporter.path_for(id).display()
                );
            }
            if voice {
                match &report.voice_channel {
                    Some(vc) => println!("{}", describe_voice_channel(vc)),
                    None => println!("Not in a voice channel"),
                }
            }
            if let Some(applied) = &report.voice_settings {
                println!("Updated voice settings for {}", applied.user_id);
            }
            Ok(())
        }

        Command::Voice { settings } => {
            let settings = settings.to_settings()?;
            let mut session = prober.run(&auth, &mut InVoiceChannel).await?;
            println!("{}", describe_voice_channel(&session.output));

            let result = match settings {
                Some(s) => one_shot(
                    &mut session.rpc,
                    &exporter,
                    None,
                    Some(&Auxiliary::SetVoiceSettings(s)),
                )
                .await
                .map(|r| {
                    if let Some(applied) = r.voice_settings {
                        println!("Updated voice settings for {}", applied.user_id);
                    }
                }),
                None => Ok(()),
            };
            let _ = session.rpc.close().await;
            result
        }
    }
}
