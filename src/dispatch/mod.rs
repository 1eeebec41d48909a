//! Multiplexer: fan-out of export jobs into work units
//!
//! [`multiplex`] handles one job event. Projects under the job's scope are
//! listed and one [`WorkUnit`](crate::bus::WorkUnit) per (project, metric)
//! is published, with time-bucket placeholders resolved.

mod bucket;
mod dispatcher;
mod handler;

pub use bucket::{resolve_placeholders, TimeBucket};
pub use dispatcher::{DispatchSummary, Dispatcher};
pub use handler::{multiplex, MultiplexContext};
