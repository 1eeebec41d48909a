//! Time-series descriptor returned by a monitoring query
//!
//! The descriptor describes the shape of every series in a query result:
//! one label descriptor per dimension and one point descriptor per value
//! column. Enum values outside the supported set are rejected at decode time.

use serde::{Deserialize, Serialize};

/// Value type of a label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LabelValueType {
    /// Labels default to strings when the type is omitted on the wire
    #[default]
    String,
    Bool,
    Int64,
}

impl LabelValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Bool => "BOOL",
            Self::Int64 => "INT64",
        }
    }
}

/// Value type of a point column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointValueType {
    Bool,
    Int64,
    Double,
    String,
}

impl PointValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "BOOL",
            Self::Int64 => "INT64",
            Self::Double => "DOUBLE",
            Self::String => "STRING",
        }
    }
}

/// Metric kind of a point column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricKind {
    #[default]
    MetricKindUnspecified,
    Gauge,
    Delta,
    Cumulative,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetricKindUnspecified => "METRIC_KIND_UNSPECIFIED",
            Self::Gauge => "GAUGE",
            Self::Delta => "DELTA",
            Self::Cumulative => "CUMULATIVE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelDescriptor {
    pub key: String,
    #[serde(default)]
    pub value_type: LabelValueType,
    #[serde(default)]
    pub description: String,
}

impl LabelDescriptor {
    pub fn new(key: impl Into<String>, value_type: LabelValueType) -> Self {
        Self {
            key: key.into(),
            value_type,
            description: String::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointDescriptor {
    pub key: String,
    pub value_type: PointValueType,
    #[serde(default)]
    pub metric_kind: MetricKind,
    #[serde(default)]
    pub unit: String,
}

impl PointDescriptor {
    pub fn new(
        key: impl Into<String>,
        value_type: PointValueType,
        metric_kind: MetricKind,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value_type,
            metric_kind,
            unit: unit.into(),
        }
    }
}

/// Labels plus point columns of a query result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesDescriptor {
    #[serde(default)]
    pub label_descriptors: Vec<LabelDescriptor>,
    #[serde(default)]
    pub point_descriptors: Vec<PointDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_wire_descriptor() {
        let json = r#"{
            "labelDescriptors": [
                {"key": "resource.project_id"},
                {"key": "metric.response_code", "valueType": "INT64", "description": "HTTP code"}
            ],
            "pointDescriptors": [
                {"key": "value.utilization", "valueType": "DOUBLE", "metricKind": "GAUGE", "unit": "10^2.%"}
            ]
        }"#;
        let descriptor: TimeSeriesDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.label_descriptors[0].value_type, LabelValueType::String);
        assert_eq!(descriptor.label_descriptors[1].value_type, LabelValueType::Int64);
        assert_eq!(descriptor.label_descriptors[1].description, "HTTP code");
        assert_eq!(descriptor.point_descriptors[0].value_type, PointValueType::Double);
        assert_eq!(descriptor.point_descriptors[0].metric_kind, MetricKind::Gauge);
    }

    #[test]
    fn test_unsupported_value_type_fails_fast() {
        let json = r#"{"pointDescriptors": [{"key": "v", "valueType": "DISTRIBUTION"}]}"#;
        assert!(serde_json::from_str::<TimeSeriesDescriptor>(json).is_err());

        let missing = r#"{"pointDescriptors": [{"key": "v"}]}"#;
        assert!(serde_json::from_str::<TimeSeriesDescriptor>(missing).is_err());
    }

    #[test]
    fn test_empty_descriptor() {
        let descriptor: TimeSeriesDescriptor = serde_json::from_str("{}").unwrap();
        assert!(descriptor.label_descriptors.is_empty());
        assert!(descriptor.point_descriptors.is_empty());
    }
}
