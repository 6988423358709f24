use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::export::gateway::job_url;
use crate::export::{resolve_host, GatewayClient, MetricsSink};
use crate::handoff;
use crate::ingest::{self, IngestStats};
use crate::lifecycle::{Lifecycle, LifecycleState, ShutdownSignal, Teardown};
use crate::publisher::{PublishSummary, Publisher};

/// How long a finished run waits for the reader to reach end of input.
const READER_GRACE: Duration = Duration::from_millis(250);

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Terminal lifecycle state.
    pub state: LifecycleState,
    /// Publisher counters.
    pub published: PublishSummary,
    /// Reader counters, if the reader reached the end of input.
    pub ingested: Option<IngestStats>,
    /// Outcome of the gateway deregistration.
    pub teardown: Teardown,
}

/// Agent wires the stream reader, publisher and lifecycle together.
pub struct Agent<S> {
    sink: Arc<S>,
    host: String,
    job_url: String,
    lifecycle: Arc<Lifecycle>,
}

impl Agent<GatewayClient> {
    /// Creates an agent pushing to the configured Pushgateway.
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = GatewayClient::new(&cfg.gateway, &cfg.job, cfg.push_timeout)
            .context("creating gateway client")?;
        let job_url = client.url().to_string();
        Ok(Self::from_parts(cfg, client, job_url))
    }
}

impl<S: MetricsSink + 'static> Agent<S> {
    /// Creates an agent around an arbitrary sink.
    pub fn with_sink(cfg: &Config, sink: S) -> Result<Self> {
        let job_url = job_url(&cfg.gateway, &cfg.job)?.to_string();
        Ok(Self::from_parts(cfg, sink, job_url))
    }

    fn from_parts(cfg: &Config, sink: S, job_url: String) -> Self {
        let host = resolve_host(cfg.host.as_deref());

        info!(job_url = %job_url, host = %host, "agent configured");

        Self {
            sink: Arc::new(sink),
            host,
            job_url,
            lifecycle: Arc::new(Lifecycle::new()),
        }
    }

    /// Shared lifecycle handle.
    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        Arc::clone(&self.lifecycle)
    }

    /// Run until the publisher exits or `shutdown` resolves, then deregister.
    ///
    /// Returns an error only when the publisher stopped on a push failure;
    /// deregistration has already been attempted by then.
    pub async fn run<R, W, F>(self, input: R, output: W, shutdown: F) -> Result<RunReport>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
        F: Future<Output = ShutdownSignal>,
    {
        let (tx, rx) = handoff::channel();
        let cancel = CancellationToken::new();

        let mut reader = tokio::spawn(ingest::run(input, output, tx));

        let publisher = Publisher::new(Arc::clone(&self.sink), self.host.clone());
        let mut publishing = tokio::spawn(publisher.run(rx, cancel.child_token()));

        tokio::pin!(shutdown);

        let joined = tokio::select! {
            joined = &mut publishing => {
                self.lifecycle.finish();
                joined
            }
            signal = &mut shutdown => {
                if self.lifecycle.interrupt(signal) {
                    info!(signal = %signal, "received shutdown signal");
                }
                cancel.cancel();
                publishing.await
            }
        };

        let published = joined
            .map_err(|e| anyhow!("publisher task failed: {e}"))
            .and_then(|result| result);

        let sink = Arc::clone(&self.sink);
        let teardown = self
            .lifecycle
            .teardown(|| async move { sink.delete().await })
            .await;
        match &teardown {
            Teardown::Deregistered => {
                info!(job_url = %self.job_url, "deleted metrics from gateway");
            }
            Teardown::Failed(reason) => error!(
                error = %reason,
                "failed to delete metrics from gateway; remove them manually with: curl -X DELETE {}",
                self.job_url,
            ),
        }

        let ingested = match self.lifecycle.state() {
            LifecycleState::Finished => {
                match tokio::time::timeout(READER_GRACE, &mut reader).await {
                    Ok(Ok(Ok(stats))) => Some(stats),
                    Ok(Ok(Err(e))) => {
                        warn!(error = %format!("{e:#}"), "input stream stopped");
                        None
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "reader task failed");
                        None
                    }
                    Err(_) => {
                        debug!("abandoning reader blocked on input");
                        reader.abort();
                        None
                    }
                }
            }
            _ => {
                reader.abort();
                None
            }
        };

        let state = self.lifecycle.state();
        let published = published?;

        info!(
            state = ?state,
            pushed = published.pushed,
            skipped = published.skipped,
            "run complete",
        );

        Ok(RunReport {
            state,
            published,
            ingested,
            teardown,
        })
    }
}
