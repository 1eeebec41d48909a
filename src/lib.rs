//! # mqexport
//!
//! Periodic export of monitoring query results into a columnar analytics
//! warehouse.
//!
//! ## Pipeline
//!
//! - **Multiplexer** ([`dispatch`]): takes an export job (a scope plus named
//!   query templates), lists every project under the scope, resolves the
//!   time-bucket placeholders of each template and publishes one work unit
//!   per (project, metric) to the bus.
//! - **Exporter** ([`export`]): takes a work unit, runs each query against
//!   its project, infers the destination table schema from the result
//!   ([`schema`]), creates the table on first use and streams the points in
//!   as flat rows ([`warehouse`]).
//!
//! Both stages fan out on a bounded [`pool::WorkerPool`]; a failing unit
//! never stops its siblings, and all failures surface together once every
//! unit has finished.
//!
//! Remote systems are reached through capability traits
//! ([`monitoring::MonitoringClient`], [`warehouse::WarehouseClient`],
//! [`bus::Publisher`], [`bus::AssetInventory`]) with in-memory
//! implementations for local runs and REST implementations in [`gcp`].

pub mod bus;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod export;
pub mod gcp;
pub mod monitoring;
pub mod pool;
pub mod schema;
pub mod telemetry;
pub mod warehouse;

mod error;
#[cfg(test)]
mod testing;

pub use error::{AggregateError, ApiStatus, Error, Result, UnitFailure};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::bus::{BusEvent, ExportJobRequest, WorkUnit};
    pub use crate::config::{ClientFactory, ExporterConfig, MultiplexerConfig};
    pub use crate::dispatch::{multiplex, DispatchSummary, MultiplexContext};
    pub use crate::export::{export_metric_data, ExportContext, ExportSummary};
    pub use crate::{ApiStatus, Error, Result};
}
