//! Publisher loop: latest snapshot into the registry, then one push.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::export::{MetricRegistry, MetricsSink};
use crate::handoff;
use crate::record::Snapshot;

/// Outcome counters of a finished publisher loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    /// Snapshots pushed to the sink.
    pub pushed: u64,
    /// Snapshots dropped because their schema differs from the committed one.
    pub skipped: u64,
}

/// Consumes snapshots and republishes the latest one after every update.
///
/// The metric registry is built lazily from the first snapshot's schema and
/// never rebuilt, so a run commits to one schema.
pub struct Publisher<S> {
    sink: Arc<S>,
    host: String,
    registry: Option<Arc<MetricRegistry>>,
    summary: PublishSummary,
}

impl<S: MetricsSink> Publisher<S> {
    /// Create a publisher labelling every gauge with `host`.
    pub fn new(sink: Arc<S>, host: impl Into<String>) -> Self {
        Self {
            sink,
            host: host.into(),
            registry: None,
            summary: PublishSummary::default(),
        }
    }

    /// Registry built from the first snapshot, if any arrived.
    pub fn registry(&self) -> Option<Arc<MetricRegistry>> {
        self.registry.clone()
    }

    /// Run until the input side closes, `cancel` fires, or a push fails.
    ///
    /// Cancellation is checked only between snapshots; a push in flight
    /// always completes. A push failure is returned without retrying.
    pub async fn run(
        mut self,
        mut rx: handoff::Receiver<Snapshot>,
        cancel: CancellationToken,
    ) -> Result<PublishSummary> {
        loop {
            let snapshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("publisher cancelled");
                    break;
                }
                next = rx.recv() => match next {
                    Some(snapshot) => snapshot,
                    None => {
                        debug!("snapshot stream closed");
                        break;
                    }
                },
            };

            if let Err(e) = self.publish(snapshot).await {
                error!(error = %format!("{e:#}"), "push failed, stopping publisher");
                rx.close();
                return Err(e);
            }
        }

        rx.close();
        info!(
            pushed = self.summary.pushed,
            skipped = self.summary.skipped,
            "publisher stopped",
        );
        Ok(self.summary)
    }

    /// Replace the current snapshot and push once.
    pub async fn publish(&mut self, snapshot: Snapshot) -> Result<()> {
        let registry = self.registry_for(&snapshot)?;

        if snapshot.schema() != registry.schema() {
            if self.summary.skipped == 0 {
                warn!(
                    committed = %registry.schema(),
                    received = %snapshot.schema(),
                    "ignoring interval line from a different schema; mixed-schema streams are unsupported",
                );
            } else {
                debug!(received = %snapshot.schema(), "ignoring mixed-schema interval line");
            }
            self.summary.skipped += 1;
            return Ok(());
        }

        registry.replace(snapshot);
        self.sink
            .push(&registry)
            .await
            .context("pushing metrics to gateway")?;
        self.summary.pushed += 1;

        Ok(())
    }

    fn registry_for(&mut self, snapshot: &Snapshot) -> Result<Arc<MetricRegistry>> {
        if let Some(registry) = &self.registry {
            return Ok(Arc::clone(registry));
        }

        let registry = Arc::new(
            MetricRegistry::new(snapshot.schema(), &self.host)
                .context("building metric registry")?,
        );
        info!(
            schema = %snapshot.schema(),
            fields = snapshot.schema().len(),
            host = %self.host,
            "committed to schema from first interval line",
        );
        self.registry = Some(Arc::clone(&registry));
        Ok(registry)
    }
}
