//! REST clients for the Google Cloud capabilities
//!
//! Every client shares one [`GcpSession`]: an HTTP client plus a bearer
//! token source. Non-success responses are mapped onto [`ApiStatus`] from
//! the HTTP code and the `error.status` field of the response body.

mod asset;
mod auth;
mod bigquery;
mod monitoring;
mod pubsub;

pub use asset::CloudAssetInventory;
pub use auth::TokenSource;
pub use bigquery::BigQueryWarehouse;
pub use monitoring::CloudMonitoring;
pub use pubsub::PubSubPublisher;

use crate::error::ApiStatus;
use crate::{Error, Result};

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared HTTP client and credentials
#[derive(Clone)]
pub struct GcpSession {
    http: Client,
    tokens: Arc<TokenSource>,
}

impl GcpSession {
    pub fn new(http: Client, tokens: TokenSource) -> Self {
        Self {
            http,
            tokens: Arc::new(tokens),
        }
    }

    /// Session with default HTTP settings and credentials from the environment
    pub fn from_env() -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::new(http, TokenSource::from_env()))
    }

    pub fn monitoring(&self) -> CloudMonitoring {
        CloudMonitoring::new(self.clone())
    }

    pub fn warehouse(&self) -> BigQueryWarehouse {
        BigQueryWarehouse::new(self.clone())
    }

    pub fn publisher(&self) -> PubSubPublisher {
        PubSubPublisher::new(self.clone())
    }

    pub fn inventory(&self) -> CloudAssetInventory {
        CloudAssetInventory::new(self.clone())
    }

    /// Attach a bearer token and send the request.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let token = self.tokens.token(&self.http).await?;
        let response = request.bearer_auth(token).send().await?;
        check_status(response).await
    }

    /// Send the request and decode a JSON response body.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return serde_json::from_str("{}").map_err(Error::from);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(api_error(status.as_u16(), &body))
}

/// Classify a failed response from its code and body.
fn api_error(code: u16, body: &str) -> Error {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => Error::api(
            ApiStatus::from_http(code, envelope.error.status.as_deref()),
            envelope.error.message,
        ),
        Err(_) => Error::api(ApiStatus::from_http(code, None), body.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_status_refines_code() {
        let body = r#"{"error": {"code": 409, "message": "Already Exists: Table p:d.t", "status": "ALREADY_EXISTS"}}"#;
        let err = api_error(409, body);
        assert_eq!(err.api_status(), Some(ApiStatus::AlreadyExists));
        assert!(err.is_already_exists());

        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        let err = api_error(429, body);
        assert_eq!(err.api_status(), Some(ApiStatus::ResourceExhausted));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_unparseable_body_falls_back_to_code() {
        let err = api_error(502, "<html>Bad Gateway</html>");
        assert_eq!(err.api_status(), Some(ApiStatus::BadGateway));
        assert!(err.to_string().contains("Bad Gateway"));
    }

    #[test]
    fn test_permission_denied_is_not_retryable() {
        let body = r#"{"error": {"code": 403, "message": "denied", "status": "PERMISSION_DENIED"}}"#;
        let err = api_error(403, body);
        assert_eq!(err.api_status(), Some(ApiStatus::PermissionDenied));
        assert!(!err.is_retryable());
    }
}
