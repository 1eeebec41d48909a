//! mqexport Exporter Binary
//!
//! Handles one work-unit event: runs each listed query against each listed
//! project and appends the results to the warehouse.

use mqexport::bus::read_event;
use mqexport::config::{ClientFactory, ExporterConfig};
use mqexport::export::export_metric_data;
use mqexport::telemetry::init_logging;

use clap::Parser;
use tracing::info;

/// mqexport Exporter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bus event JSON file, or '-' for stdin
    #[arg(long, env = "MQEXPORT_EVENT", default_value = "-")]
    event: String,

    /// Destination project (overrides PROJECT_ID)
    #[arg(long)]
    project_id: Option<String>,

    /// Destination dataset (overrides BIGQUERY_DATASET)
    #[arg(long)]
    dataset: Option<String>,

    /// Maximum concurrent exports (overrides MQEXPORT_EXPORT_CONCURRENCY)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    init_logging("mqexport-exporter", &args.log_level)?;

    let mut config = ExporterConfig::from_env()?;
    if args.project_id.is_some() {
        config.project_id = args.project_id;
    }
    if args.dataset.is_some() {
        config.dataset = args.dataset;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency.max(1);
    }
    info!(
        backend = config.backend.as_str(),
        concurrency = config.concurrency,
        "Starting mqexport exporter"
    );

    let ctx = ClientFactory::export_context(&config)?;
    let event = read_event(&args.event).await?;
    let summary = export_metric_data(&event, &ctx).await?;

    info!(
        exports = summary.exports,
        rows = summary.total_rows(),
        "Exporter finished"
    );
    Ok(())
}
