//! Fan-out of one export job into per-(project, metric) work units

use super::bucket::resolve_placeholders;
use crate::bus::{AssetInventory, ProjectLister, Publisher, WorkUnit};
use crate::clock::Clock;
use crate::config::{require, TARGET_PUBSUB_TOPIC};
use crate::pool::WorkerPool;
use crate::Result;

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Counts of a finished fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchSummary {
    pub projects: usize,
    pub messages: usize,
}

/// Publishes one work unit per discovered project and metric.
pub struct Dispatcher {
    inventory: Arc<dyn AssetInventory>,
    publisher: Arc<dyn Publisher>,
    /// Destination topic; a missing topic fails each publish
    topic: Option<String>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    pub fn new(
        inventory: Arc<dyn AssetInventory>,
        publisher: Arc<dyn Publisher>,
        topic: Option<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inventory,
            publisher,
            topic,
            clock,
        }
    }

    /// List projects under `scope` and publish `projects × metrics` messages
    /// on `pool`. Fails after every publish finished if any of them failed.
    pub async fn dispatch(
        &self,
        scope: &str,
        metrics: &BTreeMap<String, String>,
        mut pool: WorkerPool<String>,
    ) -> Result<DispatchSummary> {
        let now = self.clock.now();
        let listed = self.submit_all(scope, metrics, now, &mut pool).await;

        // Units already submitted are awaited even if listing broke off
        let report = pool.join().await;
        let projects = listed?;
        let messages = report.total;
        report.into_result()?;

        info!(
            "Performed fanout for {} queries on {} projects.",
            metrics.len(),
            projects
        );
        Ok(DispatchSummary { projects, messages })
    }

    async fn submit_all(
        &self,
        scope: &str,
        metrics: &BTreeMap<String, String>,
        now: chrono::DateTime<chrono::Utc>,
        pool: &mut WorkerPool<String>,
    ) -> Result<usize> {
        let mut lister = ProjectLister::new(self.inventory.as_ref(), scope);
        let mut projects = 0;
        while let Some(project) = lister.next_project().await? {
            projects += 1;
            for (metric, template) in metrics {
                let unit = WorkUnit::single(&project, metric, resolve_placeholders(template, now));
                let data = serde_json::to_vec(&unit)?;
                let publisher = self.publisher.clone();
                let topic = self.topic.clone();
                pool.submit(format!("{project}:{metric}"), async move {
                    let topic = require(TARGET_PUBSUB_TOPIC, topic.as_deref())?;
                    let id = publisher.publish(topic, data).await?;
                    metrics::counter!("mqexport_messages_published_total").increment(1);
                    Ok(id)
                });
            }
            debug!(project = %project, "Queued work units");
        }
        Ok(projects)
    }
}
