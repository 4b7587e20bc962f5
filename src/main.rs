//! speakboard: moderated text-to-speech message board server.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use speakboard::config::Config;
use speakboard::synth::GoogleTranslateSynthesizer;
use speakboard::{api, bootstrap};

#[derive(Parser, Debug)]
#[command(name = "speakboard", about = "Moderated text-to-speech message board")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory for messages.json and banned.json (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging (suppress noisy hyper/reqwest internals)
    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info")
    } else {
        EnvFilter::new("info,hyper=warn,reqwest=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("speakboard starting");

    let mut config = Config::load(args.config.as_deref());
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }
    info!(
        "Speech language: {}, max {} chars, timeout {}s",
        config.speech.language, config.speech.max_text_chars, config.speech.timeout_secs
    );

    let synthesizer = Arc::new(GoogleTranslateSynthesizer::new(&config.speech)?);
    let state = bootstrap::build_state(&config, synthesizer)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    api::serve(state, &addr).await?;

    Ok(())
}
