//! Exporter: query results into warehouse tables
//!
//! [`export_metric_data`] handles one work-unit event. Each (project, metric)
//! pair is exported by [`export_metric`] into the table named after the
//! sanitized metric, with rows built by [`RowMaterializer`].

mod exporter;
mod handler;
mod rows;

pub use exporter::export_metric;
pub use handler::{export_metric_data, ExportContext, ExportSummary};
pub use rows::{label_cell, materialize_rows, point_cell, RowMaterializer};
