//! Outbox relay
//!
//! Moves committed outbox records from PostgreSQL to NATS JetStream.

mod config;
mod startup;

use clap::Parser;
use config::ConfigLoader;
use std::path::PathBuf;

/// CLI arguments for outbox-relay
#[derive(clap::Parser, Debug)]
#[command(name = "outbox-relay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Transactional outbox relay: PostgreSQL to NATS JetStream", long_about = None)]
struct Args {
    /// .env file loaded before reading OUTBOX_* variables
    #[arg(short, long, env = "OUTBOX_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    setup_logging(args.debug)?;

    let config = ConfigLoader::new(args.env_file).load()?;

    startup::run(config).await
}

/// Setup logging based on debug flag.
fn setup_logging(debug: bool) -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let level = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}
