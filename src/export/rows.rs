//! Flattening of time series into warehouse rows

use crate::monitoring::{LabelValue, TimeSeriesData, TypedValue};
use crate::schema::{
    sanitize_key, LabelValueType, PointValueType, TimeSeriesDescriptor, END_TIME_FIELD,
    START_TIME_FIELD,
};
use crate::warehouse::{CellValue, Row};

/// Cell for a label value read through its declared type.
///
/// Returns `None` when the declared accessor is not populated; the column is
/// then left out of the row.
pub fn label_cell(value: &LabelValue, value_type: LabelValueType) -> Option<CellValue> {
    match value_type {
        LabelValueType::String => value.string_value.clone().map(CellValue::String),
        LabelValueType::Bool => value.bool_value.map(CellValue::Bool),
        LabelValueType::Int64 => value.int64_value.map(CellValue::Int64),
    }
}

/// Cell for a point value read through its declared type.
pub fn point_cell(value: &TypedValue, value_type: PointValueType) -> Option<CellValue> {
    match value_type {
        PointValueType::Bool => value.bool_value.map(CellValue::Bool),
        PointValueType::Int64 => value.int64_value.map(CellValue::Int64),
        PointValueType::Double => value.double_value.map(CellValue::Float),
        PointValueType::String => value.string_value.clone().map(CellValue::String),
    }
}

/// Builds rows for every series of one query result.
///
/// Column names are sanitized once per descriptor.
pub struct RowMaterializer {
    labels: Vec<(String, LabelValueType)>,
    points: Vec<(String, PointValueType)>,
}

impl RowMaterializer {
    pub fn new(descriptor: &TimeSeriesDescriptor) -> Self {
        Self {
            labels: descriptor
                .label_descriptors
                .iter()
                .map(|d| (sanitize_key(&d.key), d.value_type))
                .collect(),
            points: descriptor
                .point_descriptors
                .iter()
                .map(|d| (sanitize_key(&d.key), d.value_type))
                .collect(),
        }
    }

    /// One row per point of `series`.
    ///
    /// Label columns are shared by every row. Values are paired with
    /// descriptors positionally; extra values on either side are ignored.
    pub fn materialize(&self, series: &TimeSeriesData) -> Vec<Row> {
        let mut base = Row::new();
        for ((key, value_type), value) in self.labels.iter().zip(&series.label_values) {
            if let Some(cell) = label_cell(value, *value_type) {
                base.insert(key.clone(), cell);
            }
        }

        series
            .point_data
            .iter()
            .map(|point| {
                let mut row = base.clone();
                if let Some(start) = point.time_interval.start_time {
                    row.insert(START_TIME_FIELD.to_string(), CellValue::Timestamp(start));
                }
                row.insert(
                    END_TIME_FIELD.to_string(),
                    CellValue::Timestamp(point.time_interval.end_time),
                );
                for ((key, value_type), value) in self.points.iter().zip(&point.values) {
                    if let Some(cell) = point_cell(value, *value_type) {
                        row.insert(key.clone(), cell);
                    }
                }
                row
            })
            .collect()
    }
}

/// Rows of a single series against `descriptor`
pub fn materialize_rows(descriptor: &TimeSeriesDescriptor, series: &TimeSeriesData) -> Vec<Row> {
    RowMaterializer::new(descriptor).materialize(series)
}
