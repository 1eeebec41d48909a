//! mqexport Multiplexer Binary
//!
//! Handles one export-job event: lists the projects under the job's scope and
//! publishes one work unit per (project, metric).

use mqexport::bus::read_event;
use mqexport::config::{ClientFactory, MultiplexerConfig};
use mqexport::dispatch::multiplex;
use mqexport::telemetry::init_logging;

use clap::Parser;
use tracing::info;

/// mqexport Multiplexer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bus event JSON file, or '-' for stdin
    #[arg(long, env = "MQEXPORT_EVENT", default_value = "-")]
    event: String,

    /// Topic work units are published to (overrides TARGET_PUBSUB_TOPIC)
    #[arg(long)]
    target_topic: Option<String>,

    /// Maximum concurrent publishes (overrides MQEXPORT_DISPATCH_CONCURRENCY)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    init_logging("mqexport-multiplexer", &args.log_level)?;

    let mut config = MultiplexerConfig::from_env()?;
    if let Some(topic) = args.target_topic {
        config.target_topic = Some(topic);
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency.max(1);
    }
    info!(
        backend = config.backend.as_str(),
        concurrency = config.concurrency,
        "Starting mqexport multiplexer"
    );

    let ctx = ClientFactory::multiplex_context(&config)?;
    let event = read_event(&args.event).await?;
    let summary = multiplex(&event, &ctx).await?;

    info!(
        projects = summary.projects,
        messages = summary.messages,
        "Multiplexer finished"
    );
    Ok(())
}
