//! Export of one (project, query) pair into one warehouse table

use super::rows::RowMaterializer;
use crate::monitoring::{MonitoringClient, QueryPager, QueryRequest, RetryPolicy};
use crate::schema::infer_schema;
use crate::warehouse::{ensure_table, TableId, WarehouseClient};
use crate::Result;

use tracing::{debug, error, warn};

/// Run `query` against `project` and append every resulting point to
/// `target`. Returns the number of rows submitted.
///
/// A result without data touches no table. Otherwise the table is created
/// from the result's descriptor when missing, and each series is inserted
/// as it is read. Rows rejected by the warehouse are logged and still
/// counted.
pub async fn export_metric(
    target: &TableId,
    query: &str,
    project: &str,
    monitoring: &dyn MonitoringClient,
    warehouse: &dyn WarehouseClient,
    retry: &RetryPolicy,
) -> Result<u64> {
    let request = QueryRequest::for_project(project, query);
    let mut pager = QueryPager::start(monitoring, retry, request).await?;
    if !pager.has_data() {
        debug!("No data for project {project} into {target}");
        log_partial_errors(project, &pager);
        return Ok(0);
    }

    let copied = copy_series(&mut pager, target, warehouse).await;
    log_partial_errors(project, &pager);
    let exported = copied?;

    metrics::counter!("mqexport_rows_exported_total").increment(exported);
    debug!(
        rows = exported,
        pages = pager.pages_fetched(),
        "Exported {project} into {target}"
    );
    Ok(exported)
}

/// Create the table if needed and insert every remaining series.
async fn copy_series(
    pager: &mut QueryPager<'_>,
    target: &TableId,
    warehouse: &dyn WarehouseClient,
) -> Result<u64> {
    let schema = infer_schema(pager.descriptor());
    let table = ensure_table(warehouse, target.clone(), schema).await?;
    let materializer = RowMaterializer::new(pager.descriptor());

    let mut exported = 0u64;
    while let Some(series) = pager.next_series().await? {
        let rows = materializer.materialize(&series);
        if rows.is_empty() {
            continue;
        }
        let insert_errors = warehouse.insert_rows(&table, &rows).await?;
        for e in &insert_errors {
            warn!("Insert error for {}: {}", table.id, e);
        }
        exported += rows.len() as u64;
    }
    Ok(exported)
}

fn log_partial_errors(project: &str, pager: &QueryPager<'_>) {
    for e in pager.partial_errors() {
        error!("Partial error in getting metrics for {project}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiStatus;
    use crate::monitoring::{
        LabelValue, MemoryMonitoring, PartialError, PointData, QueryPage, TimeInterval,
        TimeSeriesData, TypedValue,
    };
    use crate::schema::{
        LabelDescriptor, LabelValueType, MetricKind, PointDescriptor, PointValueType,
        TimeSeriesDescriptor,
    };
    use crate::testing::LogCapture;
    use crate::warehouse::MemoryWarehouse;
    use std::time::Duration;

    const QUERY: &str = "fetch gce_instance::compute.googleapis.com/instance/cpu/utilization";

    fn descriptor() -> TimeSeriesDescriptor {
        TimeSeriesDescriptor {
            label_descriptors: vec![LabelDescriptor::new("resource.zone", LabelValueType::String)],
            point_descriptors: vec![PointDescriptor::new(
                "value.utilization",
                PointValueType::Double,
                MetricKind::Gauge,
                "10^2.%",
            )],
        }
    }

    fn series(zone: &str, points: usize) -> TimeSeriesData {
        TimeSeriesData {
            label_values: vec![LabelValue::string(zone)],
            point_data: (0..points)
                .map(|i| PointData {
                    values: vec![TypedValue::double(i as f64)],
                    time_interval: TimeInterval {
                        start_time: None,
                        end_time: format!("2024-01-01T10:0{i}:00Z").parse().unwrap(),
                    },
                })
                .collect(),
        }
    }

    fn page(data: Vec<TimeSeriesData>, next: &str) -> QueryPage {
        QueryPage {
            time_series_descriptor: descriptor(),
            time_series_data: data,
            next_page_token: next.to_string(),
            partial_errors: vec![],
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_millis(1),
            multiplier: 2,
            max_backoff: Duration::from_millis(4),
            deadline: Duration::from_secs(5),
        }
    }

    fn target() -> TableId {
        TableId::new("export-proj", "metrics", "cpu")
    }

    #[tokio::test]
    async fn test_exports_all_pages() {
        let monitoring = MemoryMonitoring::new();
        monitoring.insert_pages(
            "proj-a",
            QUERY,
            vec![
                page(vec![series("us-central1-a", 3), series("us-central1-b", 2)], "1"),
                page(vec![series("europe-west1-b", 4)], ""),
            ],
        );
        let warehouse = MemoryWarehouse::new();

        let rows = export_metric(&target(), QUERY, "proj-a", &monitoring, &warehouse, &fast_retry())
            .await
            .unwrap();

        assert_eq!(rows, 9);
        assert_eq!(warehouse.row_count(&target()), 9);
        assert_eq!(warehouse.insert_calls(), 3);
        assert_eq!(warehouse.create_calls(), 1);
        assert_eq!(monitoring.request_count(), 2);

        let table = warehouse.table(&target()).unwrap();
        assert_eq!(
            table.schema.column_names().collect::<Vec<_>>(),
            vec!["start_time", "end_time", "resource_zone", "value_utilization"]
        );
    }

    #[tokio::test]
    async fn test_no_data_touches_no_table() {
        let monitoring = MemoryMonitoring::new();
        monitoring.insert_pages("proj-a", QUERY, vec![page(vec![], "")]);
        let warehouse = MemoryWarehouse::new();

        let rows = export_metric(&target(), QUERY, "proj-a", &monitoring, &warehouse, &fast_retry())
            .await
            .unwrap();

        assert_eq!(rows, 0);
        assert_eq!(warehouse.exists_calls(), 0);
        assert_eq!(warehouse.create_calls(), 0);
        assert_eq!(warehouse.table_count(), 0);
    }

    #[tokio::test]
    async fn test_existing_table_is_not_recreated() {
        let monitoring = MemoryMonitoring::new();
        monitoring.insert_pages("proj-a", QUERY, vec![page(vec![series("z", 1)], "")]);
        monitoring.insert_pages("proj-b", QUERY, vec![page(vec![series("z", 2)], "")]);
        let warehouse = MemoryWarehouse::new();

        export_metric(&target(), QUERY, "proj-a", &monitoring, &warehouse, &fast_retry())
            .await
            .unwrap();
        export_metric(&target(), QUERY, "proj-b", &monitoring, &warehouse, &fast_retry())
            .await
            .unwrap();

        assert_eq!(warehouse.create_calls(), 1);
        assert_eq!(warehouse.exists_calls(), 2);
        assert_eq!(warehouse.row_count(&target()), 3);
    }

    #[tokio::test]
    async fn test_transient_query_failures_are_retried() {
        let monitoring = MemoryMonitoring::new();
        monitoring.insert_pages("proj-a", QUERY, vec![page(vec![series("z", 2)], "")]);
        monitoring.fail_next("proj-a", QUERY, ApiStatus::ServiceUnavailable, 2);
        let warehouse = MemoryWarehouse::new();

        let rows = export_metric(&target(), QUERY, "proj-a", &monitoring, &warehouse, &fast_retry())
            .await
            .unwrap();

        assert_eq!(rows, 2);
        assert_eq!(monitoring.request_count(), 3);
    }

    #[tokio::test]
    async fn test_permanent_query_failure_propagates() {
        let monitoring = MemoryMonitoring::new();
        monitoring.fail_next("proj-a", QUERY, ApiStatus::PermissionDenied, 1);
        let warehouse = MemoryWarehouse::new();

        let err = export_metric(&target(), QUERY, "proj-a", &monitoring, &warehouse, &fast_retry())
            .await
            .unwrap_err();

        assert_eq!(err.api_status(), Some(ApiStatus::PermissionDenied));
        assert_eq!(monitoring.request_count(), 1);
        assert_eq!(warehouse.table_count(), 0);
    }

    #[tokio::test]
    async fn test_partial_errors_do_not_fail_export() {
        let monitoring = MemoryMonitoring::new();
        let mut first = page(vec![series("z", 1)], "");
        first.partial_errors.push(PartialError {
            code: 7,
            message: "some series unavailable".into(),
        });
        monitoring.insert_pages("proj-a", QUERY, vec![first]);
        let warehouse = MemoryWarehouse::new();

        let rows = export_metric(&target(), QUERY, "proj-a", &monitoring, &warehouse, &fast_retry())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_insert_failure_propagates() {
        let monitoring = MemoryMonitoring::new();
        monitoring.insert_pages("proj-a", QUERY, vec![page(vec![series("z", 1)], "")]);
        let warehouse = MemoryWarehouse::new();
        warehouse.fail_inserts_into("cpu", ApiStatus::PermissionDenied);

        let err = export_metric(&target(), QUERY, "proj-a", &monitoring, &warehouse, &fast_retry())
            .await
            .unwrap_err();
        assert_eq!(err.api_status(), Some(ApiStatus::PermissionDenied));
    }

    #[tokio::test]
    async fn test_partial_errors_logged_when_insert_fails() {
        let monitoring = MemoryMonitoring::new();
        let mut first = page(vec![series("z", 2)], "");
        first.partial_errors.push(PartialError {
            code: 14,
            message: "backend shard unavailable".into(),
        });
        monitoring.insert_pages("proj-a", QUERY, vec![first]);
        let warehouse = MemoryWarehouse::new();
        warehouse.fail_inserts_into("cpu", ApiStatus::PermissionDenied);

        let (logs, _guard) = LogCapture::install();
        let err = export_metric(&target(), QUERY, "proj-a", &monitoring, &warehouse, &fast_retry())
            .await
            .unwrap_err();

        assert_eq!(err.api_status(), Some(ApiStatus::PermissionDenied));
        let output = logs.contents();
        assert!(
            output.contains("Partial error in getting metrics for proj-a"),
            "{output}"
        );
        assert!(output.contains("backend shard unavailable"), "{output}");
    }
}
