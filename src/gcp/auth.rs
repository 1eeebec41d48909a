//! Bearer tokens for the REST clients

use crate::error::ApiStatus;
use crate::{Error, Result};

use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before they expire
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Where access tokens come from
pub enum TokenSource {
    /// A fixed token, e.g. from `gcloud auth print-access-token`
    Static(String),
    /// The instance metadata server, cached until shortly before expiry
    MetadataServer {
        url: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

pub struct CachedToken {
    token: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

impl TokenSource {
    /// `GOOGLE_OAUTH_ACCESS_TOKEN` when set, the metadata server otherwise
    pub fn from_env() -> Self {
        match std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
        {
            Some(token) => TokenSource::Static(token),
            None => TokenSource::metadata_server(METADATA_TOKEN_URL),
        }
    }

    pub fn metadata_server(url: impl Into<String>) -> Self {
        TokenSource::MetadataServer {
            url: url.into(),
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self, http: &Client) -> Result<String> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::MetadataServer { url, cached } => {
                let mut cached = cached.lock().await;
                if let Some(current) = cached.as_ref() {
                    if Instant::now() < current.refresh_at {
                        return Ok(current.token.clone());
                    }
                }
                let fresh = fetch_metadata_token(http, url).await?;
                let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(REFRESH_MARGIN);
                debug!(expires_in = fresh.expires_in, "Fetched access token from metadata server");
                *cached = Some(CachedToken {
                    token: fresh.access_token.clone(),
                    refresh_at: Instant::now() + lifetime,
                });
                Ok(fresh.access_token)
            }
        }
    }
}

async fn fetch_metadata_token(http: &Client, url: &str) -> Result<MetadataToken> {
    let response = http
        .get(url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::api(
            ApiStatus::from_http(status.as_u16(), None),
            format!("metadata server refused token request: {status}"),
        ));
    }
    Ok(response.json::<MetadataToken>().await?)
}
