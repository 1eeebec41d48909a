//! Pub/Sub `topics.publish`

use super::GcpSession;
use crate::bus::Publisher;
use crate::error::ApiStatus;
use crate::{Error, Result};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

const PUBSUB_API: &str = "https://pubsub.googleapis.com/v1";

pub struct PubSubPublisher {
    session: GcpSession,
    base_url: String,
}

#[derive(Serialize)]
struct PubsubMessage {
    data: String,
}

#[derive(Serialize)]
struct PublishRequest {
    messages: Vec<PubsubMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

impl PubSubPublisher {
    pub fn new(session: GcpSession) -> Self {
        Self {
            session,
            base_url: PUBSUB_API.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `topic` is the full `projects/<p>/topics/<t>` resource name.
    fn publish_url(&self, topic: &str) -> String {
        format!("{}/{}:publish", self.base_url, topic)
    }
}

fn publish_request(data: &[u8]) -> PublishRequest {
    PublishRequest {
        messages: vec![PubsubMessage {
            data: STANDARD.encode(data),
        }],
    }
}

#[async_trait]
impl Publisher for PubSubPublisher {
    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<String> {
        if topic.is_empty() {
            return Err(Error::api(ApiStatus::InvalidArgument, "topic name is empty"));
        }
        let request = self
            .session
            .http
            .post(self.publish_url(topic))
            .json(&publish_request(&data));
        let response: PublishResponse = self.session.send_json(request).await?;
        response
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| Error::Internal(format!("publish to {topic} returned no message id")))
    }
}
