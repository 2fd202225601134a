use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

use sabercast::{ChatService, Config, DisabledTracker, EspeakSynthesizer, SpeakerRegistry, SpeechService};

/// Sabercast - Beat Saber stream companion
#[derive(Parser)]
#[command(name = "sabercast", version, about)]
struct Cli {
    /// Config file path (defaults to the platform config dir)
    #[arg(short, long, env = "SABERCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Speak one message through the pipeline and exit
    Speak {
        /// Text to speak
        text: String,

        /// Chat username to speak as (a throwaway character otherwise)
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Speak a raw SSML document with an explicit voice
    SpeakSsml {
        /// Voice name
        voice: String,
        /// SSML document
        ssml: String,
    },
    /// List installed synthesizer voices
    Voices,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,sabercast=info",
        1 => "info,sabercast=debug",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    tracing::debug!(?config, "loaded configuration");

    // Composition root: every service object is constructed here and
    // injected downward; nothing global, nothing static.
    let registry = Arc::new(SpeakerRegistry::new(config.audio.max_pitch_factor));
    let synthesizer = Arc::new(EspeakSynthesizer::new(&config.speech.engine_binary));
    let vr = Arc::new(DisabledTracker);

    let speech = Arc::new(SpeechService::new(&config, Arc::clone(&registry), synthesizer, vr).await?);
    let chat = ChatService::new(Arc::clone(&speech), registry);

    match cli.command {
        Some(Command::Speak { text, user }) => {
            let ticket = chat.speak(user.as_deref(), &text);
            let _ = ticket.finished.await;
            Ok(())
        }
        Some(Command::SpeakSsml { voice, ssml }) => {
            speech.speak_ssml(&voice, &ssml).await?;
            Ok(())
        }
        Some(Command::Voices) => {
            for voice in speech.voices()? {
                println!("{:12} {}", voice.language, voice.name);
            }
            Ok(())
        }
        None => run_console(&chat).await,
    }
}

/// Interactive chat console: the stand-in for a connected chat client.
///
/// `<user>: <message>` speaks as that user, `<user>: !<command>` runs a
/// chat command, a bare line is an announcement.
async fn run_console(chat: &ChatService) -> anyhow::Result<()> {
    println!("sabercast console - '<user>: <message>' to speak, '<user>: !<command>' for commands");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(':') {
            Some((user, rest)) => {
                let user = user.trim();
                let rest = rest.trim();
                if let Some(command) = rest.strip_prefix('!') {
                    println!("{}", chat.dispatch_command(user, command));
                } else {
                    chat.speak(Some(user), rest);
                }
            }
            None => {
                chat.speak(None, line);
            }
        }
    }

    Ok(())
}
