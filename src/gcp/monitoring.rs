//! Cloud Monitoring `timeSeries:query`

use super::GcpSession;
use crate::monitoring::{MonitoringClient, QueryPage, QueryRequest};
use crate::Result;

use async_trait::async_trait;

const MONITORING_API: &str = "https://monitoring.googleapis.com/v3";

pub struct CloudMonitoring {
    session: GcpSession,
    base_url: String,
}

impl CloudMonitoring {
    pub fn new(session: GcpSession) -> Self {
        Self {
            session,
            base_url: MONITORING_API.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn query_url(&self, request: &QueryRequest) -> String {
        format!("{}/{}/timeSeries:query", self.base_url, request.name)
    }
}

#[async_trait]
impl MonitoringClient for CloudMonitoring {
    async fn query_time_series(&self, request: &QueryRequest) -> Result<QueryPage> {
        let http = self.session.http.post(self.query_url(request)).json(request);
        self.session.send_json(http).await
    }
}
