//! Trigger and work-unit messages
//!
//! Both travel as base64-encoded JSON in the `data` field of a bus event.

use crate::{Error, Result};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::io::AsyncReadExt;

/// Inbound request for the multiplexer: one logical export job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportJobRequest {
    pub job_name: String,
    /// Resource-hierarchy path projects are enumerated under
    pub scope: String,
    /// Metric name to query template
    pub metrics: BTreeMap<String, String>,
}

/// A (project, metric) export task published by the multiplexer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    #[serde(default)]
    pub projects: Vec<String>,
    /// Metric name to resolved query
    #[serde(default)]
    pub queries: BTreeMap<String, String>,
}

impl WorkUnit {
    pub fn single(
        project: impl Into<String>,
        metric: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        let mut queries = BTreeMap::new();
        queries.insert(metric.into(), query.into());
        Self {
            projects: vec![project.into()],
            queries,
        }
    }

    /// Number of (project, query) exports this unit expands to
    pub fn export_count(&self) -> usize {
        self.projects.len() * self.queries.len()
    }
}

/// Background-function event delivered by the bus
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusEvent {
    /// Base64-encoded payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl BusEvent {
    /// Wrap raw payload bytes the way the bus delivers them
    pub fn from_bytes(payload: &[u8]) -> Self {
        Self {
            data: Some(STANDARD.encode(payload)),
            attributes: BTreeMap::new(),
        }
    }

    pub fn from_message<T: Serialize>(message: &T) -> Result<Self> {
        Ok(Self {
            data: Some(encode_payload(message)?),
            attributes: BTreeMap::new(),
        })
    }

    /// Decode the payload, or `None` when the event carries no data.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.data.as_deref().map(decode_payload::<T>).transpose()
    }
}

/// Encode a message as base64 JSON
pub fn encode_payload<T: Serialize>(message: &T) -> Result<String> {
    Ok(STANDARD.encode(serde_json::to_vec(message)?))
}

/// Decode a base64 JSON message
pub fn decode_payload<T: DeserializeOwned>(data: &str) -> Result<T> {
    let bytes = STANDARD.decode(data.trim())?;
    let text = String::from_utf8(bytes)?;
    serde_json::from_str(&text).map_err(|e| Error::InvalidMessage(e.to_string()))
}

/// Parse a bus event from its JSON form; blank input is an empty event.
pub fn parse_event(raw: &str) -> Result<BusEvent> {
    if raw.trim().is_empty() {
        return Ok(BusEvent::default());
    }
    serde_json::from_str(raw).map_err(|e| Error::InvalidMessage(format!("bad event: {e}")))
}

/// Read a bus event from a JSON file, or from stdin when `source` is `-`.
pub async fn read_event(source: &str) -> Result<BusEvent> {
    let raw = if source == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        tokio::fs::read_to_string(source).await?
    };
    parse_event(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_work_unit_wire_format() {
        let unit = WorkUnit::single("proj-a", "cpu", "fetch gce_instance");
        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"projects": ["proj-a"], "queries": {"cpu": "fetch gce_instance"}})
        );
        assert_eq!(unit.export_count(), 1);
    }

    #[test]
    fn test_decode_job_request() {
        let payload = encode_payload(&serde_json::json!({
            "job_name": "nightly",
            "scope": "organizations/123",
            "metrics": {"cpu": "fetch x | within ROUNDED_HOUR"}
        }))
        .unwrap();
        let job: ExportJobRequest = decode_payload(&payload).unwrap();
        assert_eq!(job.job_name, "nightly");
        assert_eq!(job.scope, "organizations/123");
        assert_eq!(job.metrics.len(), 1);
    }

    #[test]
    fn test_missing_job_fields_are_invalid() {
        let payload = encode_payload(&serde_json::json!({"job_name": "x"})).unwrap();
        let err = decode_payload::<ExportJobRequest>(&payload).unwrap_err();
        assert!(matches!(err, Error::InvalidMessage(_)));
    }

    #[test]
    fn test_bad_base64_is_a_decode_error() {
        let err = decode_payload::<WorkUnit>("%%%").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_event_without_data() {
        let event: BusEvent = serde_json::from_str(r#"{"attributes": {"k": "v"}}"#).unwrap();
        assert_eq!(event.decode::<WorkUnit>().unwrap(), None);
    }

    #[test]
    fn test_work_unit_missing_keys_default_to_empty() {
        let event = BusEvent::from_bytes(b"{}");
        let unit: WorkUnit = event.decode().unwrap().unwrap();
        assert_eq!(unit.export_count(), 0);
    }

    #[tokio::test]
    async fn test_read_event_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"data": "e30=", "attributes": {{"origin": "scheduler"}}}}"#).unwrap();
        let event = read_event(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(event.data.as_deref(), Some("e30="));
        assert_eq!(event.attributes.get("origin").map(String::as_str), Some("scheduler"));
    }

    #[tokio::test]
    async fn test_missing_event_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = read_event(path.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_parse_event_rejects_garbage() {
        assert!(matches!(parse_event("not json"), Err(Error::InvalidMessage(_))));
        assert_eq!(parse_event("  ").unwrap(), BusEvent::default());
    }
}
