//! BigQuery `tables.get`, `tables.insert` and `tabledata.insertAll`

use super::GcpSession;
use crate::schema::TableSchema;
use crate::warehouse::{
    InsertError, Row, TableHandle, TableId, TimePartitioning, WarehouseClient,
};
use crate::Result;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const BIGQUERY_API: &str = "https://bigquery.googleapis.com/bigquery/v2";

pub struct BigQueryWarehouse {
    session: GcpSession,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TableReference<'a> {
    project_id: &'a str,
    dataset_id: &'a str,
    table_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TableResource<'a> {
    table_reference: TableReference<'a>,
    schema: &'a TableSchema,
    time_partitioning: &'a TimePartitioning,
}

#[derive(Serialize)]
struct InsertAllRow<'a> {
    json: &'a Row,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllRequest<'a> {
    rows: Vec<InsertAllRow<'a>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<RowErrors>,
}

#[derive(Debug, Deserialize)]
struct RowErrors {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

impl BigQueryWarehouse {
    pub fn new(session: GcpSession) -> Self {
        Self {
            session,
            base_url: BIGQUERY_API.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn tables_url(&self, id: &TableId) -> String {
        format!(
            "{}/projects/{}/datasets/{}/tables",
            self.base_url, id.project, id.dataset
        )
    }

    fn table_url(&self, id: &TableId) -> String {
        format!("{}/{}", self.tables_url(id), id.table)
    }
}

fn table_resource(table: &TableHandle) -> TableResource<'_> {
    TableResource {
        table_reference: TableReference {
            project_id: &table.id.project,
            dataset_id: &table.id.dataset,
            table_id: &table.id.table,
        },
        schema: &table.schema,
        time_partitioning: &table.time_partitioning,
    }
}

fn flatten_insert_errors(response: InsertAllResponse) -> Vec<InsertError> {
    response
        .insert_errors
        .into_iter()
        .map(|row| InsertError {
            index: row.index,
            message: row
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.reason, e.message))
                .collect::<Vec<_>>()
                .join("; "),
        })
        .collect()
}

#[async_trait]
impl WarehouseClient for BigQueryWarehouse {
    async fn table_exists(&self, id: &TableId) -> Result<bool> {
        let request = self
            .session
            .http
            .get(self.table_url(id))
            .query(&[("fields", "id")]);
        match self.session.send(request).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_table(&self, table: &TableHandle) -> Result<()> {
        let request = self
            .session
            .http
            .post(self.tables_url(&table.id))
            .json(&table_resource(table));
        self.session.send(request).await?;
        Ok(())
    }

    async fn insert_rows(&self, table: &TableHandle, rows: &[Row]) -> Result<Vec<InsertError>> {
        let body = InsertAllRequest {
            rows: rows.iter().map(|json| InsertAllRow { json }).collect(),
        };
        let request = self
            .session
            .http
            .post(format!("{}/insertAll", self.table_url(&table.id)))
            .json(&body);
        let response: InsertAllResponse = self.session.send_json(request).await?;
        Ok(flatten_insert_errors(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::TokenSource;
    use crate::schema::{FieldType, TableField};
    use crate::warehouse::CellValue;

    fn warehouse() -> BigQueryWarehouse {
        BigQueryWarehouse::new(GcpSession::new(
            reqwest::Client::new(),
            TokenSource::Static("t".into()),
        ))
    }

    #[test]
    fn test_table_urls() {
        let id = TableId::new("exports", "metrics", "cpu");
        assert_eq!(
            warehouse().table_url(&id),
            "https://bigquery.googleapis.com/bigquery/v2/projects/exports/datasets/metrics/tables/cpu"
        );
    }

    #[test]
    fn test_table_resource_body() {
        let table = TableHandle::new(
            TableId::new("exports", "metrics", "cpu"),
            TableSchema::new(vec![
                TableField::new("start_time", FieldType::Timestamp),
                TableField::new("end_time", FieldType::Timestamp).required(),
                TableField::new("value", FieldType::Float).description("GAUGE metric, 1"),
            ]),
        );
        let body = serde_json::to_value(table_resource(&table)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "tableReference": {"projectId": "exports", "datasetId": "metrics", "tableId": "cpu"},
                "schema": {"fields": [
                    {"name": "start_time", "type": "TIMESTAMP", "mode": "NULLABLE"},
                    {"name": "end_time", "type": "TIMESTAMP", "mode": "REQUIRED"},
                    {"name": "value", "type": "FLOAT", "mode": "NULLABLE", "description": "GAUGE metric, 1"}
                ]},
                "timePartitioning": {"type": "DAY", "expirationMs": "7776000000", "field": "end_time"}
            })
        );
    }

    #[test]
    fn test_insert_all_body() {
        let mut row = Row::new();
        row.insert("zone".into(), CellValue::String("a".into()));
        row.insert("count".into(), CellValue::Int64(3));
        let rows = vec![row];
        let body = InsertAllRequest {
            rows: rows.iter().map(|json| InsertAllRow { json }).collect(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"rows": [{"json": {"count": 3, "zone": "a"}}]})
        );
    }

    #[test]
    fn test_insert_errors_are_flattened() {
        let response: InsertAllResponse = serde_json::from_str(
            r#"{"kind": "bigquery#tableDataInsertAllResponse",
                "insertErrors": [{"index": 2, "errors": [
                    {"reason": "invalid", "message": "no such field: bogus"},
                    {"reason": "stopped", "message": ""}
                ]}]}"#,
        )
        .unwrap();
        let errors = flatten_insert_errors(response);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].index, 2);
        assert!(errors[0].message.starts_with("invalid: no such field: bogus"));
    }

    #[test]
    fn test_clean_insert_has_no_errors() {
        let response: InsertAllResponse =
            serde_json::from_str(r#"{"kind": "bigquery#tableDataInsertAllResponse"}"#).unwrap();
        assert!(flatten_insert_errors(response).is_empty());
    }
}
