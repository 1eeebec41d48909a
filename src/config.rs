//! Environment-based configuration and client wiring
//!
//! Each binary reads its settings once per invocation. Missing destination
//! settings are kept as `None` and only fail when an operation needs them.

use crate::bus::{MemoryBus, StaticInventory};
use crate::dispatch::MultiplexContext;
use crate::export::ExportContext;
use crate::gcp::GcpSession;
use crate::monitoring::MemoryMonitoring;
use crate::pool::{DISPATCH_CONCURRENCY, EXPORT_CONCURRENCY};
use crate::warehouse::MemoryWarehouse;
use crate::{Error, Result};

use std::sync::Arc;
use tracing::info;

pub const PROJECT_ID: &str = "PROJECT_ID";
pub const BIGQUERY_DATASET: &str = "BIGQUERY_DATASET";
pub const TARGET_PUBSUB_TOPIC: &str = "TARGET_PUBSUB_TOPIC";

/// Which implementation backs the remote capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// In-process doubles, for local runs
    #[default]
    Memory,
    Gcp,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Gcp => "gcp",
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "gcp" | "google" => Ok(Backend::Gcp),
            other => Err(Error::Config(format!(
                "Unknown MQEXPORT_BACKEND: {other}. Use 'memory' or 'gcp'"
            ))),
        }
    }
}

/// Settings of the exporter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterConfig {
    /// `PROJECT_ID`: project owning the destination dataset
    pub project_id: Option<String>,
    /// `BIGQUERY_DATASET`
    pub dataset: Option<String>,
    /// `BIGQUERY_TABLE`; tables are named after metrics instead
    pub default_table: Option<String>,
    /// `PUBSUB_TOPIC`: topic the exporter is triggered from
    pub source_topic: Option<String>,
    pub backend: Backend,
    pub concurrency: usize,
}

impl ExporterConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            project_id: non_empty(lookup(PROJECT_ID)),
            dataset: non_empty(lookup(BIGQUERY_DATASET)),
            default_table: non_empty(lookup("BIGQUERY_TABLE")),
            source_topic: non_empty(lookup("PUBSUB_TOPIC")),
            backend: parse_backend(&lookup)?,
            concurrency: parse_limit(
                &lookup,
                "MQEXPORT_EXPORT_CONCURRENCY",
                EXPORT_CONCURRENCY,
            )?,
        })
    }
}

/// Settings of the multiplexer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiplexerConfig {
    /// `TARGET_PUBSUB_TOPIC`: topic work units are published to
    pub target_topic: Option<String>,
    pub backend: Backend,
    pub concurrency: usize,
}

impl MultiplexerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            target_topic: non_empty(lookup(TARGET_PUBSUB_TOPIC)),
            backend: parse_backend(&lookup)?,
            concurrency: parse_limit(
                &lookup,
                "MQEXPORT_DISPATCH_CONCURRENCY",
                DISPATCH_CONCURRENCY,
            )?,
        })
    }
}

/// Builds capability handles for the configured backend.
pub struct ClientFactory;

impl ClientFactory {
    /// Clients and settings for one exporter invocation
    pub fn export_context(config: &ExporterConfig) -> Result<ExportContext> {
        let ctx = match config.backend {
            Backend::Memory => {
                info!("Using in-memory monitoring and warehouse (development mode)");
                ExportContext::new(
                    Arc::new(MemoryMonitoring::new()),
                    Arc::new(MemoryWarehouse::new()),
                )
            }
            Backend::Gcp => {
                let session = GcpSession::from_env()?;
                info!("Using Cloud Monitoring and BigQuery REST clients");
                ExportContext::new(
                    Arc::new(session.monitoring()),
                    Arc::new(session.warehouse()),
                )
            }
        };
        let mut ctx = ctx.with_concurrency(config.concurrency);
        ctx.export_project = config.project_id.clone();
        ctx.dataset = config.dataset.clone();
        Ok(ctx)
    }

    /// Clients and settings for one multiplexer invocation
    pub fn multiplex_context(config: &MultiplexerConfig) -> Result<MultiplexContext> {
        let ctx = match config.backend {
            Backend::Memory => {
                info!("Using in-memory inventory and bus (development mode)");
                MultiplexContext::new(Arc::new(StaticInventory::new()), Arc::new(MemoryBus::new()))
            }
            Backend::Gcp => {
                let session = GcpSession::from_env()?;
                info!("Using Cloud Asset and Pub/Sub REST clients");
                MultiplexContext::new(Arc::new(session.inventory()), Arc::new(session.publisher()))
            }
        };
        let mut ctx = ctx.with_concurrency(config.concurrency);
        ctx.target_topic = config.target_topic.clone();
        Ok(ctx)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// A setting that an operation cannot run without.
pub fn require<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str> {
    value.ok_or_else(|| Error::Config(format!("{name} is not set")))
}

fn parse_backend(lookup: &impl Fn(&str) -> Option<String>) -> Result<Backend> {
    match non_empty(lookup("MQEXPORT_BACKEND")) {
        Some(raw) => raw.parse(),
        None => Ok(Backend::default()),
    }
}

fn parse_limit(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: usize,
) -> Result<usize> {
    let Some(raw) = non_empty(lookup(name)) else {
        return Ok(default);
    };
    match raw.parse::<usize>() {
        Ok(0) | Err(_) => Err(Error::Config(format!(
            "{name} must be a positive integer, got '{raw}'"
        ))),
        Ok(limit) => Ok(limit),
    }
}
