//! Schema inference from a time-series descriptor
//!
//! Column order is fixed: `start_time`, `end_time`, one column per label in
//! descriptor order, then one column per point in descriptor order.

use super::descriptor::{LabelValueType, PointValueType, TimeSeriesDescriptor};
use super::table::{FieldType, TableField, TableSchema};

use regex::Regex;
use std::sync::LazyLock;

pub const START_TIME_FIELD: &str = "start_time";
pub const END_TIME_FIELD: &str = "end_time";

static NON_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-zA-Z0-9_]").expect("valid sanitizer regex"));

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
///
/// Distinct keys may sanitize to the same column name; collisions are not
/// resolved here.
pub fn sanitize_key(key: &str) -> String {
    NON_IDENTIFIER.replace_all(key, "_").into_owned()
}

pub fn label_field_type(value_type: LabelValueType) -> FieldType {
    match value_type {
        LabelValueType::String => FieldType::String,
        LabelValueType::Bool => FieldType::Bool,
        LabelValueType::Int64 => FieldType::Int64,
    }
}

/// DOUBLE becomes FLOAT; everything else keeps its name.
pub fn point_field_type(value_type: PointValueType) -> FieldType {
    match value_type {
        PointValueType::Double => FieldType::Float,
        PointValueType::Int64 => FieldType::Int64,
        PointValueType::Bool => FieldType::Bool,
        PointValueType::String => FieldType::String,
    }
}

/// Derive the warehouse schema for a query result.
pub fn infer_schema(descriptor: &TimeSeriesDescriptor) -> TableSchema {
    let mut fields = Vec::with_capacity(
        2 + descriptor.label_descriptors.len() + descriptor.point_descriptors.len(),
    );
    fields.push(TableField::new(START_TIME_FIELD, FieldType::Timestamp));
    fields.push(TableField::new(END_TIME_FIELD, FieldType::Timestamp).required());

    for label in &descriptor.label_descriptors {
        fields.push(
            TableField::new(sanitize_key(&label.key), label_field_type(label.value_type))
                .description(label.description.clone()),
        );
    }

    for point in &descriptor.point_descriptors {
        fields.push(
            TableField::new(sanitize_key(&point.key), point_field_type(point.value_type))
                .description(format!("{} metric, {}", point.metric_kind.as_str(), point.unit)),
        );
    }

    TableSchema::new(fields)
}
