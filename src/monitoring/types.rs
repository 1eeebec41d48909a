//! Wire types of the monitoring query API

use crate::schema::TimeSeriesDescriptor;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One query call, scoped to a single project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Resource name, `projects/<project>`
    #[serde(skip)]
    pub name: String,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

impl QueryRequest {
    pub fn for_project(project: &str, query: impl Into<String>) -> Self {
        Self {
            name: format!("projects/{project}"),
            query: query.into(),
            page_size: None,
            page_token: None,
        }
    }

    pub fn with_page_token(&self, token: impl Into<String>) -> Self {
        Self {
            page_token: Some(token.into()),
            ..self.clone()
        }
    }
}

/// Label value; exactly one accessor is populated on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bool_value: Option<bool>,
    #[serde(
        default,
        deserialize_with = "de_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub int64_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
}

impl LabelValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            string_value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn bool(value: bool) -> Self {
        Self {
            bool_value: Some(value),
            ..Default::default()
        }
    }

    pub fn int64(value: i64) -> Self {
        Self {
            int64_value: Some(value),
            ..Default::default()
        }
    }
}

/// Point value; exactly one accessor is populated on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bool_value: Option<bool>,
    #[serde(
        default,
        deserialize_with = "de_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub int64_value: Option<i64>,
    #[serde(
        default,
        deserialize_with = "de_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub double_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
}

impl TypedValue {
    pub fn bool(value: bool) -> Self {
        Self {
            bool_value: Some(value),
            ..Default::default()
        }
    }

    pub fn int64(value: i64) -> Self {
        Self {
            int64_value: Some(value),
            ..Default::default()
        }
    }

    pub fn double(value: f64) -> Self {
        Self {
            double_value: Some(value),
            ..Default::default()
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self {
            string_value: Some(value.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: DateTime<Utc>,
}

/// Values of every point column at one time interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointData {
    #[serde(default)]
    pub values: Vec<TypedValue>,
    pub time_interval: TimeInterval,
}

/// A single series: label values plus its points
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesData {
    #[serde(default)]
    pub label_values: Vec<LabelValue>,
    #[serde(default)]
    pub point_data: Vec<PointData>,
}

/// Inline error reported by the query response for part of the result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for PartialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)
    }
}

/// One page of a query response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    #[serde(default)]
    pub time_series_descriptor: TimeSeriesDescriptor,
    #[serde(default)]
    pub time_series_data: Vec<TimeSeriesData>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub next_page_token: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partial_errors: Vec<PartialError>,
}

impl QueryPage {
    pub fn next_token(&self) -> Option<&str> {
        if self.next_page_token.is_empty() {
            None
        } else {
            Some(&self.next_page_token)
        }
    }
}

// int64 travels as a JSON string, but numbers are accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

fn de_opt_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<WireNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(WireNumber::Int(v)) => Ok(Some(v)),
        Some(WireNumber::Float(v)) => Err(serde::de::Error::custom(format!(
            "expected integer, got {v}"
        ))),
        Some(WireNumber::Text(s)) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid int64 '{s}': {e}"))),
    }
}

fn de_opt_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<WireNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(WireNumber::Int(v)) => Ok(Some(v as f64)),
        Some(WireNumber::Float(v)) => Ok(Some(v)),
        Some(WireNumber::Text(s)) => match s.as_str() {
            "NaN" => Ok(Some(f64::NAN)),
            "Infinity" => Ok(Some(f64::INFINITY)),
            "-Infinity" => Ok(Some(f64::NEG_INFINITY)),
            other => other
                .parse::<f64>()
                .map(Some)
                .map_err(|e| serde::de::Error::custom(format!("invalid double '{other}': {e}"))),
        },
    }
}
