//! Multiplexer entry point: one job event in, a fan-out of work units out

use super::dispatcher::{DispatchSummary, Dispatcher};
use crate::bus::{AssetInventory, BusEvent, ExportJobRequest, Publisher};
use crate::clock::{Clock, SystemClock};
use crate::pool::{WorkerPool, DISPATCH_CONCURRENCY};
use crate::{Error, Result};

use std::sync::Arc;
use tracing::{error, info};

/// Clients and settings of one multiplexer invocation
#[derive(Clone)]
pub struct MultiplexContext {
    pub inventory: Arc<dyn AssetInventory>,
    pub publisher: Arc<dyn Publisher>,
    /// Topic work units are published to
    pub target_topic: Option<String>,
    pub clock: Arc<dyn Clock>,
    pub concurrency: usize,
}

impl MultiplexContext {
    pub fn new(inventory: Arc<dyn AssetInventory>, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            inventory,
            publisher,
            target_topic: None,
            clock: Arc::new(SystemClock),
            concurrency: DISPATCH_CONCURRENCY,
        }
    }

    pub fn with_target_topic(mut self, topic: impl Into<String>) -> Self {
        self.target_topic = Some(topic.into());
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Decode an export job from `event` and fan it out.
///
/// An event without data is a no-op. A malformed job fails before any
/// project is listed.
pub async fn multiplex(event: &BusEvent, ctx: &MultiplexContext) -> Result<DispatchSummary> {
    let Some(job) = event.decode::<ExportJobRequest>()? else {
        return Ok(DispatchSummary::default());
    };
    info!("Running multiplexer for monitoring export job {}", job.job_name);

    let dispatcher = Dispatcher::new(
        ctx.inventory.clone(),
        ctx.publisher.clone(),
        ctx.target_topic.clone(),
        ctx.clock.clone(),
    );
    let pool = WorkerPool::new("dispatch", ctx.concurrency);
    dispatcher
        .dispatch(&job.scope, &job.metrics, pool)
        .await
        .inspect_err(|e: &Error| {
            error!("Monitoring export job {} encountered errors! {e}", job.job_name);
        })
}
