//! Flat warehouse rows

use crate::schema::FieldType;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// A typed scalar cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Bool(bool),
    Int64(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

impl CellValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            CellValue::String(_) => FieldType::String,
            CellValue::Bool(_) => FieldType::Bool,
            CellValue::Int64(_) => FieldType::Int64,
            CellValue::Float(_) => FieldType::Float,
            CellValue::Timestamp(_) => FieldType::Timestamp,
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CellValue::String(v) => serializer.serialize_str(v),
            CellValue::Bool(v) => serializer.serialize_bool(*v),
            CellValue::Int64(v) => serializer.serialize_i64(*v),
            // JSON has no non-finite numbers; the warehouse accepts these spellings
            CellValue::Float(v) if v.is_nan() => serializer.serialize_str("NaN"),
            CellValue::Float(v) if v.is_infinite() && *v > 0.0 => {
                serializer.serialize_str("Infinity")
            }
            CellValue::Float(v) if v.is_infinite() => serializer.serialize_str("-Infinity"),
            CellValue::Float(v) => serializer.serialize_f64(*v),
            CellValue::Timestamp(v) => {
                serializer.serialize_str(&v.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
        }
    }
}

/// Column name to value; one per label combination and point in time
pub type Row = BTreeMap<String, CellValue>;
