//! Lazy iteration over a paged query result
//!
//! The first page is fetched eagerly so callers can inspect the descriptor
//! and detect an empty result. Later pages are fetched on demand, each under
//! the same retry policy.

use super::types::{PartialError, QueryPage, QueryRequest, TimeSeriesData};
use super::{MonitoringClient, RetryPolicy};
use crate::schema::TimeSeriesDescriptor;
use crate::Result;

use std::collections::VecDeque;

pub struct QueryPager<'a> {
    client: &'a dyn MonitoringClient,
    policy: &'a RetryPolicy,
    request: QueryRequest,
    descriptor: TimeSeriesDescriptor,
    first_page_empty: bool,
    pending: VecDeque<TimeSeriesData>,
    next_page_token: Option<String>,
    partial_errors: Vec<PartialError>,
    pages_fetched: usize,
}

impl<'a> QueryPager<'a> {
    /// Issue the query and fetch its first page.
    pub async fn start(
        client: &'a dyn MonitoringClient,
        policy: &'a RetryPolicy,
        request: QueryRequest,
    ) -> Result<QueryPager<'a>> {
        let first = fetch(client, policy, &request).await?;
        let mut pager = Self {
            client,
            policy,
            request,
            descriptor: TimeSeriesDescriptor::default(),
            first_page_empty: first.time_series_data.is_empty(),
            pending: VecDeque::new(),
            next_page_token: None,
            partial_errors: Vec::new(),
            pages_fetched: 0,
        };
        pager.descriptor = first.time_series_descriptor.clone();
        pager.absorb(first);
        Ok(pager)
    }

    /// Descriptor of the result, taken from the first page
    pub fn descriptor(&self) -> &TimeSeriesDescriptor {
        &self.descriptor
    }

    /// Whether the first page carried any series
    pub fn has_data(&self) -> bool {
        !self.first_page_empty
    }

    /// Inline errors seen on every page fetched so far
    pub fn partial_errors(&self) -> &[PartialError] {
        &self.partial_errors
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Next series of the result, fetching the next page when needed.
    pub async fn next_series(&mut self) -> Result<Option<TimeSeriesData>> {
        loop {
            if let Some(series) = self.pending.pop_front() {
                return Ok(Some(series));
            }
            let Some(token) = self.next_page_token.take() else {
                return Ok(None);
            };
            let request = self.request.with_page_token(token);
            let page = fetch(self.client, self.policy, &request).await?;
            self.absorb(page);
        }
    }

    fn absorb(&mut self, page: QueryPage) {
        self.pages_fetched += 1;
        self.next_page_token = page.next_token().map(str::to_string);
        self.partial_errors.extend(page.partial_errors);
        self.pending.extend(page.time_series_data);
    }
}

async fn fetch(
    client: &dyn MonitoringClient,
    policy: &RetryPolicy,
    request: &QueryRequest,
) -> Result<QueryPage> {
    policy
        .run("query_time_series", || client.query_time_series(request))
        .await
}
