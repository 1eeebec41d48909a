//! In-memory monitoring backend for local runs and tests
//!
//! Results are registered per `(project, query)` as a list of pages. Failures
//! can be scripted to exercise the retry path.

use super::types::{QueryPage, QueryRequest};
use super::MonitoringClient;
use crate::error::ApiStatus;
use crate::{Error, Result};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;

type ResultKey = (String, String);

#[derive(Default)]
pub struct MemoryMonitoring {
    results: DashMap<ResultKey, Vec<QueryPage>>,
    failures: DashMap<ResultKey, VecDeque<(ApiStatus, String)>>,
    requests: Mutex<Vec<QueryRequest>>,
}

impl MemoryMonitoring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the pages returned for `query` against `project`.
    pub fn insert_pages(&self, project: &str, query: &str, pages: Vec<QueryPage>) {
        self.results.insert(key(project, query), pages);
    }

    /// Fail the next `times` calls for `(project, query)` with `status`.
    pub fn fail_next(&self, project: &str, query: &str, status: ApiStatus, times: usize) {
        let mut queue = self.failures.entry(key(project, query)).or_default();
        for _ in 0..times {
            queue.push_back((status, format!("scripted {status} failure")));
        }
    }

    /// Every request received, in arrival order
    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

fn key(project: &str, query: &str) -> ResultKey {
    (format!("projects/{project}"), query.to_string())
}

#[async_trait]
impl MonitoringClient for MemoryMonitoring {
    async fn query_time_series(&self, request: &QueryRequest) -> Result<QueryPage> {
        self.requests.lock().push(request.clone());

        let key = (request.name.clone(), request.query.clone());
        if let Some(mut queue) = self.failures.get_mut(&key) {
            if let Some((status, message)) = queue.pop_front() {
                return Err(Error::api(status, message));
            }
        }

        let Some(pages) = self.results.get(&key) else {
            return Ok(QueryPage::default());
        };
        let index = match request.page_token.as_deref() {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|_| {
                Error::api(ApiStatus::InvalidArgument, format!("bad page token '{token}'"))
            })?,
        };
        let mut page = pages.get(index).cloned().unwrap_or_default();
        page.next_page_token = if index + 1 < pages.len() {
            (index + 1).to_string()
        } else {
            String::new()
        };
        Ok(page)
    }
}
