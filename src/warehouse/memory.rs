//! In-memory columnar warehouse
//!
//! Each table keeps its inserted rows as Arrow record batches built against
//! the schema the table was created with. Used for local runs and tests;
//! call counters make provisioning behavior observable.

use super::{CellValue, InsertError, Row, TableHandle, TableId, WarehouseClient};
use crate::error::ApiStatus;
use crate::schema::{FieldMode, FieldType, TableSchema};
use crate::{Error, Result};

use arrow_array::builder::{
    BooleanBuilder, Float64Builder, Int64Builder, StringBuilder, TimestampMicrosecondBuilder,
};
use arrow_array::{ArrayRef, RecordBatch};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

struct MemoryTable {
    handle: TableHandle,
    batches: Vec<RecordBatch>,
    row_count: usize,
}

#[derive(Default)]
pub struct MemoryWarehouse {
    tables: DashMap<TableId, MemoryTable>,
    stale_lookups: AtomicBool,
    create_failure: RwLock<Option<ApiStatus>>,
    insert_failures: DashMap<String, ApiStatus>,
    exists_calls: AtomicUsize,
    create_calls: AtomicUsize,
    insert_calls: AtomicUsize,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every existence check miss, as if another writer created the
    /// table between lookup and create.
    pub fn with_stale_lookups(self) -> Self {
        self.stale_lookups.store(true, Ordering::Relaxed);
        self
    }

    /// Fail every create call with `status`.
    pub fn fail_creates(&self, status: ApiStatus) {
        *self.create_failure.write() = Some(status);
    }

    /// Fail every insert into tables named `table` with `status`.
    pub fn fail_inserts_into(&self, table: &str, status: ApiStatus) {
        self.insert_failures.insert(table.to_string(), status);
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::Relaxed)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::Relaxed)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::Relaxed)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<TableId> = self.tables.iter().map(|t| t.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Definition the table was created with
    pub fn table(&self, id: &TableId) -> Option<TableHandle> {
        self.tables.get(id).map(|t| t.handle.clone())
    }

    pub fn row_count(&self, id: &TableId) -> usize {
        self.tables.get(id).map(|t| t.row_count).unwrap_or(0)
    }

    pub fn batches(&self, id: &TableId) -> Vec<RecordBatch> {
        self.tables
            .get(id)
            .map(|t| t.batches.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WarehouseClient for MemoryWarehouse {
    async fn table_exists(&self, id: &TableId) -> Result<bool> {
        self.exists_calls.fetch_add(1, Ordering::Relaxed);
        if self.stale_lookups.load(Ordering::Relaxed) {
            return Ok(false);
        }
        Ok(self.tables.contains_key(id))
    }

    async fn create_table(&self, table: &TableHandle) -> Result<()> {
        self.create_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(status) = *self.create_failure.read() {
            return Err(Error::api(status, format!("cannot create {}", table.id)));
        }
        match self.tables.entry(table.id.clone()) {
            Entry::Occupied(_) => Err(Error::api(
                ApiStatus::AlreadyExists,
                format!("Already Exists: Table {}", table.id),
            )),
            Entry::Vacant(slot) => {
                slot.insert(MemoryTable {
                    handle: table.clone(),
                    batches: Vec::new(),
                    row_count: 0,
                });
                Ok(())
            }
        }
    }

    async fn insert_rows(&self, table: &TableHandle, rows: &[Row]) -> Result<Vec<InsertError>> {
        self.insert_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(status) = self.insert_failures.get(&table.id.table) {
            return Err(Error::api(*status, format!("insert into {} rejected", table.id)));
        }
        let mut stored = self.tables.get_mut(&table.id).ok_or_else(|| {
            Error::api(ApiStatus::NotFound, format!("Not found: Table {}", table.id))
        })?;

        // Rows are checked against the stored schema, not the caller's copy
        let (accepted, errors) = validate_rows(&stored.handle.schema, rows);
        if !accepted.is_empty() {
            let batch = rows_to_batch(&stored.handle.schema, &accepted)?;
            stored.row_count += batch.num_rows();
            stored.batches.push(batch);
        }
        Ok(errors)
    }
}

fn validate_rows<'a>(schema: &TableSchema, rows: &'a [Row]) -> (Vec<&'a Row>, Vec<InsertError>) {
    let mut accepted = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        match validate_row(schema, row) {
            Ok(()) => accepted.push(row),
            Err(message) => errors.push(InsertError { index, message }),
        }
    }
    (accepted, errors)
}

fn validate_row(schema: &TableSchema, row: &Row) -> std::result::Result<(), String> {
    for (column, value) in row {
        let field = schema
            .field(column)
            .ok_or_else(|| format!("no such field: {column}"))?;
        if field.field_type != value.field_type() {
            return Err(format!(
                "field {column} expects {}, got {}",
                field.field_type.as_str(),
                value.field_type().as_str()
            ));
        }
    }
    for field in &schema.fields {
        if field.mode == FieldMode::Required && !row.contains_key(&field.name) {
            return Err(format!("missing required field: {}", field.name));
        }
    }
    Ok(())
}

fn rows_to_batch(schema: &TableSchema, rows: &[&Row]) -> Result<RecordBatch> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.len());
    for field in &schema.fields {
        let cells = rows.iter().map(|row| row.get(&field.name));
        let column: ArrayRef = match field.field_type {
            FieldType::String => {
                let mut builder = StringBuilder::new();
                for cell in cells {
                    match cell {
                        Some(CellValue::String(v)) => builder.append_value(v),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            FieldType::Bool => {
                let mut builder = BooleanBuilder::new();
                for cell in cells {
                    match cell {
                        Some(CellValue::Bool(v)) => builder.append_value(*v),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            FieldType::Int64 => {
                let mut builder = Int64Builder::new();
                for cell in cells {
                    match cell {
                        Some(CellValue::Int64(v)) => builder.append_value(*v),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            FieldType::Float => {
                let mut builder = Float64Builder::new();
                for cell in cells {
                    match cell {
                        Some(CellValue::Float(v)) => builder.append_value(*v),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
            FieldType::Timestamp => {
                let mut builder = TimestampMicrosecondBuilder::new().with_timezone("UTC");
                for cell in cells {
                    match cell {
                        Some(CellValue::Timestamp(v)) => builder.append_value(v.timestamp_micros()),
                        _ => builder.append_null(),
                    }
                }
                Arc::new(builder.finish())
            }
        };
        columns.push(column);
    }
    Ok(RecordBatch::try_new(schema.to_arrow(), columns)?)
}
