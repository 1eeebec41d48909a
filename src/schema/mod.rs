//! Schema definitions for exported metrics
//!
//! A monitoring query returns a [`TimeSeriesDescriptor`]; [`infer_schema`]
//! turns it into the [`TableSchema`] of the destination warehouse table.

mod descriptor;
mod inference;
mod table;

pub use descriptor::{
    LabelDescriptor,
    LabelValueType,
    MetricKind,
    PointDescriptor,
    PointValueType,
    TimeSeriesDescriptor,
};
pub use inference::{
    infer_schema,
    label_field_type,
    point_field_type,
    sanitize_key,
    END_TIME_FIELD,
    START_TIME_FIELD,
};
pub use table::{FieldMode, FieldType, TableField, TableSchema};
