//! Monitoring query capability
//!
//! The exporter only needs one call: run a query scoped to a project and get
//! back a page of time series. Paging and retries are layered on top of that
//! call here so every backend gets them for free.

mod memory;
mod pager;
mod retry;
mod types;

pub use memory::MemoryMonitoring;
pub use pager::QueryPager;
pub use retry::RetryPolicy;
pub use types::{
    LabelValue, PartialError, PointData, QueryPage, QueryRequest, TimeInterval, TimeSeriesData,
    TypedValue,
};

use crate::Result;
use async_trait::async_trait;

/// Monitoring query interface
///
/// Implementations are request/response only and safe to share across
/// concurrent exporters.
#[async_trait]
pub trait MonitoringClient: Send + Sync {
    /// Run one page of a time-series query.
    async fn query_time_series(&self, request: &QueryRequest) -> Result<QueryPage>;
}
