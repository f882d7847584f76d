use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Duration;

use viaipe_agent::collector::Collector;
use viaipe_agent::config::{AgentConfig, load_config};
use viaipe_agent::retry::retry_indefinitely;
use viaipe_agent::source::ViaIpeSource;
use viaipe_agent::storage::PostgresSink;
use viaipe_agent::util::logging;

/// Command line arguments for the agent
#[derive(Parser, Debug)]
#[command(name = "viaipe-agent", about = "ViaIpe telemetry collection agent")]
struct Args {
    /// Path to an optional TOML configuration file; VIAIPE-prefixed
    /// environment variables override file values
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config: AgentConfig = load_config(args.config.as_deref())?;
    logging::init(&config.log_level);

    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    info!(
        "Starting ViaIpe collection agent v{} on {}",
        viaipe_agent::VERSION,
        host
    );

    let source = ViaIpeSource::new(&config.api)?;

    // The agent is useless without its sink: block here until the database
    // accepts a connection, however long that takes.
    let sink = retry_indefinitely(
        || PostgresSink::connect(&config.connection, config.summary_table.clone()),
        Duration::from_secs(config.connect_retry_delay),
        "Failed to connect to PostgreSQL",
    )
    .await;

    let collector = Collector::new(source, sink, Duration::from_secs(config.collection_interval));

    tokio::select! {
        _ = collector.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt signal, shutting down");
        }
    }

    Ok(())
}
