//! Out-of-process speech synthesis worker
//!
//! Spawned by the worker pool with a loopback port as its only positional
//! argument. Exits on its own after sitting idle.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sabercast::speech::{EspeakSynthesizer, host};

/// Sabercast speech worker
#[derive(Parser)]
#[command(name = "sabercast-speechd", version, about)]
struct Cli {
    /// Loopback port to listen on
    port: u16,

    /// Exit after this many seconds without requests
    #[arg(long, env = "SABERCAST_IDLE_TIMEOUT", default_value = "60")]
    idle_timeout: u64,

    /// Synthesis engine binary
    #[arg(long, env = "SABERCAST_ENGINE", default_value = "espeak-ng")]
    engine: String,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let synthesizer = Arc::new(EspeakSynthesizer::new(&cli.engine));
    let idle_timeout = Duration::from_secs(cli.idle_timeout);

    match host::serve(cli.port, synthesizer, idle_timeout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}
