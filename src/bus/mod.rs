//! Message bus and asset inventory capabilities
//!
//! The multiplexer lists projects through an [`AssetInventory`] and
//! publishes one [`WorkUnit`] per (project, metric) through a [`Publisher`].

mod memory;
mod message;

pub use memory::{MemoryBus, PublishedMessage, StaticInventory};
pub use message::{
    decode_payload, encode_payload, parse_event, read_event, BusEvent, ExportJobRequest, WorkUnit,
};

use crate::Result;
use async_trait::async_trait;

/// Asset type listed to discover projects under a scope
pub const PROJECT_ASSET_TYPE: &str = "compute.googleapis.com/Project";

/// Page size used when listing assets
pub const ASSET_PAGE_SIZE: u32 = 1000;

/// Bus publisher interface
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `data` to `topic`, returning the bus-assigned message id.
    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListAssetsRequest {
    pub parent: String,
    pub asset_types: Vec<String>,
    pub page_size: u32,
    pub page_token: Option<String>,
}

impl ListAssetsRequest {
    /// Request for every project under `scope`
    pub fn projects_under(scope: &str) -> Self {
        Self {
            parent: scope.to_string(),
            asset_types: vec![PROJECT_ASSET_TYPE.to_string()],
            page_size: ASSET_PAGE_SIZE,
            page_token: None,
        }
    }
}

/// One page of asset names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetPage {
    pub names: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Asset inventory interface
#[async_trait]
pub trait AssetInventory: Send + Sync {
    async fn list_assets(&self, request: &ListAssetsRequest) -> Result<AssetPage>;
}

/// Project id of an asset name: its last `/`-separated segment.
pub fn project_id_from_asset(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Lazily walks every project under a scope, one page at a time.
pub struct ProjectLister<'a> {
    inventory: &'a dyn AssetInventory,
    request: ListAssetsRequest,
    pending: std::collections::VecDeque<String>,
    exhausted: bool,
}

impl<'a> ProjectLister<'a> {
    pub fn new(inventory: &'a dyn AssetInventory, scope: &str) -> Self {
        Self {
            inventory,
            request: ListAssetsRequest::projects_under(scope),
            pending: Default::default(),
            exhausted: false,
        }
    }

    /// Next project id, or `None` once every page was consumed.
    pub async fn next_project(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(name) = self.pending.pop_front() {
                return Ok(Some(project_id_from_asset(&name).to_string()));
            }
            if self.exhausted {
                return Ok(None);
            }
            let page = self.inventory.list_assets(&self.request).await?;
            self.pending.extend(page.names);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => self.request.page_token = Some(token),
                None => self.exhausted = true,
            }
        }
    }
}
