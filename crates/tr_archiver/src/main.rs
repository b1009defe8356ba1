use clap::Parser;
use std::path::PathBuf;
use tr_archiver::services::processor::CallProcessor;
use tr_archiver::Config;
use tracing::{error, info};

/// Archive one recorded call's artifacts and print their public URLs.
#[derive(Parser, Debug)]
#[command(name = "tr-archiver", version, about)]
struct Cli {
    /// System short name, as configured under `systems`
    system: String,

    /// Path to the recorded call audio; metadata and transcoded artifacts
    /// are expected alongside it
    audio_path: PathBuf,

    /// Configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so the URL report on stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if Config::write_default_if_missing(&cli.config)? {
        info!(
            path = %cli.config.display(),
            "Wrote a starter configuration, edit it and run again"
        );
        return Ok(());
    }

    let config = Config::load(&cli.config).map_err(|e| {
        error!("Failed to load config: {}", e);
        e
    })?;

    let processor = CallProcessor::new(config);
    let urls = processor.process(&cli.system, &cli.audio_path).await?;

    println!("{}", serde_json::to_string_pretty(&urls)?);
    Ok(())
}
