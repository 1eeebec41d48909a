//! Analytics warehouse capability
//!
//! Three calls are needed: check a table exists, create it, and stream rows
//! into it. [`ensure_table`] builds idempotent provisioning on top.

mod memory;
mod provision;
mod row;

pub use memory::MemoryWarehouse;
pub use provision::{create_table, ensure_table};
pub use row::{CellValue, Row};

use crate::schema::{TableSchema, END_TIME_FIELD};
use crate::Result;

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use std::fmt;

/// Partition expiration applied to every exported table (90 days)
pub const PARTITION_EXPIRATION_MS: i64 = 1000 * 60 * 60 * 24 * 90;

/// Fully-qualified table identifier, `<project>.<dataset>.<table>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableId {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartitionKind {
    Day,
}

/// Time-based partitioning of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePartitioning {
    #[serde(rename = "type")]
    pub kind: PartitionKind,
    #[serde(serialize_with = "int64_as_string")]
    pub expiration_ms: i64,
    pub field: String,
}

impl TimePartitioning {
    /// Daily partitions on `end_time`, expiring after 90 days
    pub fn daily_end_time() -> Self {
        Self {
            kind: PartitionKind::Day,
            expiration_ms: PARTITION_EXPIRATION_MS,
            field: END_TIME_FIELD.to_string(),
        }
    }
}

fn int64_as_string<S: Serializer>(v: &i64, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&v.to_string())
}

/// A destination table as computed locally
///
/// The schema is the locally inferred one; it is not re-read from the
/// warehouse after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct TableHandle {
    pub id: TableId,
    pub schema: TableSchema,
    pub time_partitioning: TimePartitioning,
}

impl TableHandle {
    pub fn new(id: TableId, schema: TableSchema) -> Self {
        Self {
            id,
            schema,
            time_partitioning: TimePartitioning::daily_end_time(),
        }
    }
}

/// Row rejected by the warehouse during a streaming insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertError {
    /// Index of the row in the submitted batch
    pub index: usize,
    pub message: String,
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.index, self.message)
    }
}

/// Warehouse client interface
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Whether a table with this id exists.
    async fn table_exists(&self, id: &TableId) -> Result<bool>;

    /// Create a table. Fails with an `AlreadyExists`/`Conflict` API error when
    /// the table is already there.
    async fn create_table(&self, table: &TableHandle) -> Result<()>;

    /// Stream rows into a table. Per-row rejections are returned, not raised.
    async fn insert_rows(&self, table: &TableHandle, rows: &[Row]) -> Result<Vec<InsertError>>;
}
