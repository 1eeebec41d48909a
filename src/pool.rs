//! Bounded fan-out of independent units of work
//!
//! Every unit is spawned as soon as it is submitted and waits for one of
//! `limit` permits before running. [`WorkerPool::join`] awaits all of them;
//! a failing unit never cancels its siblings. Failures are collected and
//! surfaced once, as an [`AggregateError`].

use crate::error::{AggregateError, UnitFailure};
use crate::{Error, Result};

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};
use tracing::{debug, error};

/// Worker limit of the exporter's per-metric fan-out
pub const EXPORT_CONCURRENCY: usize = 10;

/// Worker limit of the multiplexer's per-message fan-out
pub const DISPATCH_CONCURRENCY: usize = 50;

pub struct WorkerPool<T> {
    name: &'static str,
    permits: Arc<Semaphore>,
    tasks: JoinSet<Result<T>>,
    labels: HashMap<Id, String>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Create a pool running at most `limit` units at once.
    pub fn new(name: &'static str, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            name,
            permits: Arc::new(Semaphore::new(limit)),
            tasks: JoinSet::new(),
            labels: HashMap::new(),
        }
    }

    /// Submit a unit. It starts as soon as a permit is free.
    pub fn submit<F>(&mut self, label: impl Into<String>, unit: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let permits = self.permits.clone();
        let handle = self.tasks.spawn(async move {
            match permits.acquire_owned().await {
                Ok(_permit) => unit.await,
                Err(e) => Err(Error::Internal(format!("worker pool closed: {e}"))),
            }
        });
        self.labels.insert(handle.id(), label.into());
    }

    /// Wait for every submitted unit and collect their outcomes.
    pub async fn join(mut self) -> PoolReport<T> {
        let total = self.labels.len();
        let mut report = PoolReport {
            total,
            successes: Vec::with_capacity(total),
            failures: Vec::new(),
        };
        while let Some(joined) = self.tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(e) => (
                    e.id(),
                    Err(Error::Internal(format!("work unit task failed: {e}"))),
                ),
            };
            let label = self
                .labels
                .remove(&id)
                .unwrap_or_else(|| format!("task-{id}"));
            match outcome {
                Ok(value) => {
                    metrics::counter!("mqexport_work_units_total", "pool" => self.name, "outcome" => "success")
                        .increment(1);
                    debug!(pool = self.name, unit = %label, "Work unit finished");
                    report.successes.push((label, value));
                }
                Err(e) => {
                    metrics::counter!("mqexport_work_units_total", "pool" => self.name, "outcome" => "failure")
                        .increment(1);
                    error!(pool = self.name, unit = %label, error = %e, "Work unit failed");
                    report.failures.push(UnitFailure { label, error: e });
                }
            }
        }
        report
    }
}

/// Outcome of every unit of a pool
#[derive(Debug)]
pub struct PoolReport<T> {
    pub total: usize,
    pub successes: Vec<(String, T)>,
    pub failures: Vec<UnitFailure>,
}

impl<T> PoolReport<T> {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Successful values, or every failure as one aggregate error.
    pub fn into_result(self) -> Result<Vec<T>> {
        if self.failures.is_empty() {
            Ok(self.successes.into_iter().map(|(_, v)| v).collect())
        } else {
            Err(Error::Aggregate(AggregateError {
                failed: self.failures.len(),
                total: self.total,
                failures: self.failures,
            }))
        }
    }
}
