//! Exporter entry point: one bus event in, every listed export run

use super::exporter::export_metric;
use crate::bus::{BusEvent, WorkUnit};
use crate::config::{require, BIGQUERY_DATASET, PROJECT_ID};
use crate::monitoring::{MonitoringClient, RetryPolicy};
use crate::pool::{WorkerPool, EXPORT_CONCURRENCY};
use crate::schema::sanitize_key;
use crate::warehouse::{TableId, WarehouseClient};
use crate::Result;

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

/// Clients and settings shared by every export of one invocation
#[derive(Clone)]
pub struct ExportContext {
    pub monitoring: Arc<dyn MonitoringClient>,
    pub warehouse: Arc<dyn WarehouseClient>,
    /// Project owning the destination dataset
    pub export_project: Option<String>,
    pub dataset: Option<String>,
    pub retry: RetryPolicy,
    pub concurrency: usize,
}

impl ExportContext {
    pub fn new(monitoring: Arc<dyn MonitoringClient>, warehouse: Arc<dyn WarehouseClient>) -> Self {
        Self {
            monitoring,
            warehouse,
            export_project: None,
            dataset: None,
            retry: RetryPolicy::default(),
            concurrency: EXPORT_CONCURRENCY,
        }
    }

    pub fn with_destination(mut self, project: impl Into<String>, dataset: impl Into<String>) -> Self {
        self.export_project = Some(project.into());
        self.dataset = Some(dataset.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    fn destination(&self) -> Result<(&str, &str)> {
        let project = require(PROJECT_ID, self.export_project.as_deref())?;
        let dataset = require(BIGQUERY_DATASET, self.dataset.as_deref())?;
        Ok((project, dataset))
    }
}

/// Result of one exporter invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub exports: usize,
    /// Rows submitted per source project
    pub rows_by_project: BTreeMap<String, u64>,
}

impl ExportSummary {
    pub fn total_rows(&self) -> u64 {
        self.rows_by_project.values().sum()
    }
}

struct ExportOutcome {
    project: String,
    rows: u64,
}

/// Export every (project, metric) pair named by the event's work unit.
///
/// An event without data is a no-op. All exports run to completion on a
/// bounded pool; if any of them failed the invocation fails with every
/// failure attached.
pub async fn export_metric_data(event: &BusEvent, ctx: &ExportContext) -> Result<ExportSummary> {
    let Some(unit) = event.decode::<WorkUnit>()? else {
        return Ok(ExportSummary::default());
    };
    if unit.export_count() == 0 {
        return Ok(ExportSummary::default());
    }

    let (export_project, dataset) = ctx.destination()?;
    let mut pool = WorkerPool::new("export", ctx.concurrency);
    for project in &unit.projects {
        for (metric, query) in &unit.queries {
            let target = TableId::new(export_project, dataset, sanitize_key(metric));
            let ctx = ctx.clone();
            let project = project.clone();
            let query = query.clone();
            pool.submit(format!("{project}:{metric}"), async move {
                let rows = export_metric(
                    &target,
                    &query,
                    &project,
                    ctx.monitoring.as_ref(),
                    ctx.warehouse.as_ref(),
                    &ctx.retry,
                )
                .await?;
                Ok(ExportOutcome { project, rows })
            });
        }
    }

    let report = pool.join().await;
    let (failed, total) = (report.failed(), report.total);
    let mut rows_by_project: BTreeMap<String, u64> = BTreeMap::new();
    for (_, outcome) in &report.successes {
        *rows_by_project.entry(outcome.project.clone()).or_default() += outcome.rows;
    }
    for (project, rows) in &rows_by_project {
        info!("Finished exporting {rows} data points for project {project}");
    }

    if let Err(e) = report.into_result() {
        error!("Failures occurred while processing {failed}/{total} queries!");
        return Err(e);
    }
    Ok(ExportSummary {
        exports: total,
        rows_by_project,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiStatus;
    use crate::testing::LogCapture;
    use crate::Error;
    use crate::monitoring::{
        LabelValue, MemoryMonitoring, PointData, QueryPage, TimeInterval, TimeSeriesData,
        TypedValue,
    };
    use crate::schema::{
        LabelDescriptor, LabelValueType, MetricKind, PointDescriptor, PointValueType,
        TimeSeriesDescriptor,
    };
    use crate::warehouse::MemoryWarehouse;

    fn page(points: usize) -> QueryPage {
        QueryPage {
            time_series_descriptor: TimeSeriesDescriptor {
                label_descriptors: vec![LabelDescriptor::new("zone", LabelValueType::String)],
                point_descriptors: vec![PointDescriptor::new(
                    "value.count",
                    PointValueType::Int64,
                    MetricKind::Cumulative,
                    "1",
                )],
            },
            time_series_data: vec![TimeSeriesData {
                label_values: vec![LabelValue::string("us-east1-b")],
                point_data: (0..points)
                    .map(|i| PointData {
                        values: vec![TypedValue::int64(i as i64)],
                        time_interval: TimeInterval {
                            start_time: Some("2024-01-01T00:00:00Z".parse().unwrap()),
                            end_time: "2024-01-01T00:05:00Z".parse().unwrap(),
                        },
                    })
                    .collect(),
            }],
            ..Default::default()
        }
    }

    fn context(monitoring: Arc<MemoryMonitoring>, warehouse: Arc<MemoryWarehouse>) -> ExportContext {
        ExportContext::new(monitoring, warehouse).with_destination("exports", "metrics")
    }

    fn event(unit: &WorkUnit) -> BusEvent {
        BusEvent::from_message(unit).unwrap()
    }

    #[tokio::test]
    async fn test_exports_into_sanitized_table() {
        let monitoring = Arc::new(MemoryMonitoring::new());
        monitoring.insert_pages("proj-a", "fetch x", vec![page(4)]);
        let warehouse = Arc::new(MemoryWarehouse::new());

        let unit = WorkUnit::single("proj-a", "compute/instance.cpu", "fetch x");
        let summary = export_metric_data(&event(&unit), &context(monitoring, warehouse.clone()))
            .await
            .unwrap();

        assert_eq!(summary.exports, 1);
        assert_eq!(summary.total_rows(), 4);
        let id = TableId::new("exports", "metrics", "compute_instance_cpu");
        assert_eq!(warehouse.row_count(&id), 4);
    }

    #[tokio::test]
    async fn test_event_without_data_is_noop() {
        let monitoring = Arc::new(MemoryMonitoring::new());
        let warehouse = Arc::new(MemoryWarehouse::new());
        let summary = export_metric_data(
            &BusEvent::default(),
            &context(monitoring.clone(), warehouse.clone()),
        )
        .await
        .unwrap();
        assert_eq!(summary, ExportSummary::default());
        assert_eq!(monitoring.request_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_destination_is_config_error() {
        let monitoring = Arc::new(MemoryMonitoring::new());
        let warehouse = Arc::new(MemoryWarehouse::new());
        let ctx = ExportContext::new(monitoring, warehouse);
        let unit = WorkUnit::single("proj-a", "cpu", "fetch x");
        let err = export_metric_data(&event(&unit), &ctx).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("PROJECT_ID"), "{err}");

        let ctx = ctx.with_destination("exports", "metrics");
        let ctx = ExportContext {
            dataset: None,
            ..ctx
        };
        let err = export_metric_data(&event(&unit), &ctx).await.unwrap_err();
        assert!(err.to_string().contains("BIGQUERY_DATASET"), "{err}");
    }

    #[tokio::test]
    async fn test_one_failure_fails_invocation_after_all_exports() {
        let monitoring = Arc::new(MemoryMonitoring::new());
        monitoring.insert_pages("proj-a", "fetch cpu", vec![page(2)]);
        monitoring.insert_pages("proj-a", "fetch mem", vec![page(3)]);
        monitoring.fail_next("proj-a", "fetch disk", ApiStatus::PermissionDenied, 1);
        let warehouse = Arc::new(MemoryWarehouse::new());

        let mut unit = WorkUnit::single("proj-a", "cpu", "fetch cpu");
        unit.queries.insert("mem".into(), "fetch mem".into());
        unit.queries.insert("disk".into(), "fetch disk".into());

        let (logs, _guard) = LogCapture::install();
        let err = export_metric_data(&event(&unit), &context(monitoring, warehouse.clone()))
            .await
            .unwrap_err();

        let output = logs.contents();
        assert!(
            output.contains("Finished exporting 5 data points for project proj-a"),
            "{output}"
        );
        assert!(
            output.contains("Failures occurred while processing 1/3 queries!"),
            "{output}"
        );
        match err {
            Error::Aggregate(agg) => {
                assert_eq!(agg.failed, 1);
                assert_eq!(agg.total, 3);
                assert_eq!(agg.failures[0].label, "proj-a:disk");
            }
            other => panic!("expected aggregate failure, got {other}"),
        }
        assert_eq!(warehouse.row_count(&TableId::new("exports", "metrics", "cpu")), 2);
        assert_eq!(warehouse.row_count(&TableId::new("exports", "metrics", "mem")), 3);
    }

    #[tokio::test]
    async fn test_rows_grouped_by_project() {
        let monitoring = Arc::new(MemoryMonitoring::new());
        monitoring.insert_pages("proj-a", "fetch cpu", vec![page(2)]);
        monitoring.insert_pages("proj-b", "fetch cpu", vec![page(5)]);
        let warehouse = Arc::new(MemoryWarehouse::new());

        let mut unit = WorkUnit::single("proj-a", "cpu", "fetch cpu");
        unit.projects.push("proj-b".into());

        let summary = export_metric_data(&event(&unit), &context(monitoring, warehouse.clone()))
            .await
            .unwrap();
        assert_eq!(summary.rows_by_project.get("proj-a"), Some(&2));
        assert_eq!(summary.rows_by_project.get("proj-b"), Some(&5));
        assert_eq!(warehouse.table_count(), 1);
    }
}
