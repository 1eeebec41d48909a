//! Cloud Asset Inventory `assets.list`

use super::GcpSession;
use crate::bus::{AssetInventory, AssetPage, ListAssetsRequest};
use crate::Result;

use async_trait::async_trait;
use serde::Deserialize;

const CLOUD_ASSET_API: &str = "https://cloudasset.googleapis.com/v1";

pub struct CloudAssetInventory {
    session: GcpSession,
    base_url: String,
}

#[derive(Deserialize)]
struct Asset {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListAssetsResponse {
    #[serde(default)]
    assets: Vec<Asset>,
    #[serde(default)]
    next_page_token: String,
}

impl From<ListAssetsResponse> for AssetPage {
    fn from(response: ListAssetsResponse) -> Self {
        AssetPage {
            names: response.assets.into_iter().map(|a| a.name).collect(),
            next_page_token: Some(response.next_page_token).filter(|t| !t.is_empty()),
        }
    }
}

impl CloudAssetInventory {
    pub fn new(session: GcpSession) -> Self {
        Self {
            session,
            base_url: CLOUD_ASSET_API.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn list_url(&self, parent: &str) -> String {
        format!("{}/{}/assets", self.base_url, parent)
    }
}

fn query_params(request: &ListAssetsRequest) -> Vec<(&'static str, String)> {
    let mut params: Vec<(&'static str, String)> = request
        .asset_types
        .iter()
        .map(|t| ("assetTypes", t.clone()))
        .collect();
    params.push(("pageSize", request.page_size.to_string()));
    if let Some(token) = &request.page_token {
        params.push(("pageToken", token.clone()));
    }
    params
}

#[async_trait]
impl AssetInventory for CloudAssetInventory {
    async fn list_assets(&self, request: &ListAssetsRequest) -> Result<AssetPage> {
        let http = self
            .session
            .http
            .get(self.list_url(&request.parent))
            .query(&query_params(request));
        let response: ListAssetsResponse = self.session.send_json(http).await?;
        Ok(response.into())
    }
}
