//! Warehouse table schema
//!
//! An ordered list of typed columns. The same schema is sent to the cloud
//! warehouse on table creation and converted to Arrow for the in-memory
//! warehouse.

use arrow_schema::{DataType, Field, Schema, SchemaRef, TimeUnit};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Warehouse scalar column types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    String,
    Bool,
    Int64,
    Float,
    Timestamp,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Bool => "BOOL",
            Self::Int64 => "INT64",
            Self::Float => "FLOAT",
            Self::Timestamp => "TIMESTAMP",
        }
    }

    /// Arrow type used by the columnar in-memory warehouse
    pub fn arrow_type(&self) -> DataType {
        match self {
            Self::String => DataType::Utf8,
            Self::Bool => DataType::Boolean,
            Self::Int64 => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
}

/// One column of a warehouse table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub mode: FieldMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TableField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode: FieldMode::Nullable,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.mode = FieldMode::Required;
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Convert to Arrow field, carrying the description as metadata
    pub fn to_arrow(&self) -> Field {
        let mut field = Field::new(
            &self.name,
            self.field_type.arrow_type(),
            self.mode == FieldMode::Nullable,
        );
        if let Some(ref desc) = self.description {
            let mut metadata = HashMap::new();
            metadata.insert("description".to_string(), desc.clone());
            field = field.with_metadata(metadata);
        }
        field
    }
}

/// Ordered warehouse schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<TableField>,
}

impl TableSchema {
    pub fn new(fields: Vec<TableField>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&TableField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn to_arrow(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.fields.iter().map(TableField::to_arrow).collect::<Vec<_>>(),
        ))
    }
}
