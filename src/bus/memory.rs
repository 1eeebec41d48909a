//! In-memory bus and inventory for local runs and tests

use super::{AssetInventory, AssetPage, BusEvent, ListAssetsRequest, Publisher};
use crate::error::ApiStatus;
use crate::{Error, Result};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};

/// A message accepted by [`MemoryBus`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub id: String,
    pub topic: String,
    pub data: Vec<u8>,
}

impl PublishedMessage {
    /// The event an exporter would be triggered with for this message
    pub fn to_event(&self) -> BusEvent {
        BusEvent::from_bytes(&self.data)
    }
}

/// Records published messages; can reject payloads matching a pattern.
#[derive(Default)]
pub struct MemoryBus {
    published: Mutex<Vec<PublishedMessage>>,
    reject_containing: RwLock<Vec<String>>,
    attempts: AtomicU64,
    next_id: AtomicU64,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every publish whose payload contains `needle`.
    pub fn reject_payloads_containing(&self, needle: impl Into<String>) {
        self.reject_containing.write().push(needle.into());
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().clone()
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().len()
    }

    /// Publish calls received, accepted or not
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Publisher for MemoryBus {
    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<String> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if topic.is_empty() {
            return Err(Error::api(ApiStatus::InvalidArgument, "topic name is empty"));
        }
        let text = String::from_utf8_lossy(&data);
        if self
            .reject_containing
            .read()
            .iter()
            .any(|needle| text.contains(needle.as_str()))
        {
            return Err(Error::api(
                ApiStatus::ServiceUnavailable,
                format!("publish to {topic} rejected"),
            ));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        self.published.lock().push(PublishedMessage {
            id: id.clone(),
            topic: topic.to_string(),
            data,
        });
        Ok(id)
    }
}

/// Fixed asset listing keyed by parent scope
#[derive(Default)]
pub struct StaticInventory {
    assets: DashMap<String, Vec<String>>,
    page_size_cap: RwLock<Option<usize>>,
    requests: Mutex<Vec<ListAssetsRequest>>,
}

impl StaticInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_assets(&self, parent: &str, names: Vec<String>) {
        self.assets.insert(parent.to_string(), names);
    }

    /// Serve at most `cap` names per page regardless of the requested size.
    pub fn set_page_size_cap(&self, cap: usize) {
        *self.page_size_cap.write() = Some(cap);
    }

    pub fn requests(&self) -> Vec<ListAssetsRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AssetInventory for StaticInventory {
    async fn list_assets(&self, request: &ListAssetsRequest) -> Result<AssetPage> {
        self.requests.lock().push(request.clone());
        let Some(names) = self.assets.get(&request.parent) else {
            return Err(Error::api(
                ApiStatus::PermissionDenied,
                format!("no access to {}", request.parent),
            ));
        };

        let offset = match request.page_token.as_deref() {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|_| {
                Error::api(ApiStatus::InvalidArgument, format!("bad page token '{token}'"))
            })?,
        };
        let mut size = request.page_size.max(1) as usize;
        if let Some(cap) = *self.page_size_cap.read() {
            size = size.min(cap);
        }
        let end = (offset + size).min(names.len());
        let page = names.get(offset..end).unwrap_or_default().to_vec();
        Ok(AssetPage {
            names: page,
            next_page_token: (end < names.len()).then(|| end.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_records_message() {
        let bus = MemoryBus::new();
        let id = bus.publish("topic-a", b"{}".to_vec()).await.unwrap();
        assert_eq!(id, "0");
        let published = bus.published();
        assert_eq!(published[0].topic, "topic-a");
        assert_eq!(published[0].to_event().data.as_deref(), Some("e30="));
    }

    #[tokio::test]
    async fn test_rejected_payloads() {
        let bus = MemoryBus::new();
        bus.reject_payloads_containing("bad-proj");
        assert!(bus.publish("t", b"bad-proj".to_vec()).await.is_err());
        assert!(bus.publish("t", b"good-proj".to_vec()).await.is_ok());
        assert_eq!(bus.attempts(), 2);
        assert_eq!(bus.published_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_topic_is_rejected() {
        let bus = MemoryBus::new();
        assert!(bus.publish("", b"{}".to_vec()).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_scope_is_denied() {
        let inventory = StaticInventory::new();
        let err = inventory
            .list_assets(&ListAssetsRequest::projects_under("folders/9"))
            .await
            .unwrap_err();
        assert_eq!(err.api_status(), Some(ApiStatus::PermissionDenied));
    }
}
