use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use prometheus::{Encoder, TextEncoder};
use reqwest::Url;
use tracing::debug;

use super::collector::MetricRegistry;

/// Push-model metrics sink, addressed by a single job.
pub trait MetricsSink: Send + Sync {
    /// Upload the registry's current families, replacing the job group.
    fn push(&self, registry: &MetricRegistry) -> impl Future<Output = Result<()>> + Send;

    /// Remove every metric stored under the job.
    fn delete(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Prometheus Pushgateway client.
///
/// Each call is a single HTTP attempt bounded by the request timeout.
pub struct GatewayClient {
    http: reqwest::Client,
    job_url: Url,
}

impl GatewayClient {
    /// Create a client for `job` on the gateway at `gateway`.
    pub fn new(gateway: &str, job: &str, timeout: Duration) -> Result<Self> {
        let job_url = job_url(gateway, job)?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Self { http, job_url })
    }

    /// Fully qualified URL of the job group.
    pub fn url(&self) -> &Url {
        &self.job_url
    }

    async fn check(&self, method: &str, response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "unexpected status {} from {} {}: {}",
                status,
                method,
                self.job_url,
                body.trim()
            );
        }
        Ok(())
    }
}

impl MetricsSink for GatewayClient {
    async fn push(&self, registry: &MetricRegistry) -> Result<()> {
        let body = registry.encode_text()?;
        debug!(url = %self.job_url, bytes = body.len(), "pushing metrics");

        let response = self
            .http
            .put(self.job_url.clone())
            .header(reqwest::header::CONTENT_TYPE, TextEncoder::new().format_type())
            .body(body)
            .send()
            .await
            .with_context(|| format!("PUT {}", self.job_url))?;

        self.check("PUT", response).await
    }

    async fn delete(&self) -> Result<()> {
        debug!(url = %self.job_url, "deleting job metrics");

        let response = self
            .http
            .delete(self.job_url.clone())
            .send()
            .await
            .with_context(|| format!("DELETE {}", self.job_url))?;

        self.check("DELETE", response).await
    }
}

/// Build `{gateway}/metrics/job/{job}`, defaulting the scheme to http.
pub fn job_url(gateway: &str, job: &str) -> Result<Url> {
    let gateway = gateway.trim();
    if gateway.is_empty() {
        bail!("gateway URL is empty");
    }
    if job.is_empty() {
        bail!("job name is empty");
    }

    let with_scheme = if gateway.contains("://") {
        gateway.to_string()
    } else {
        format!("http://{gateway}")
    };

    let mut url =
        Url::parse(&with_scheme).with_context(|| format!("parsing gateway URL {gateway:?}"))?;

    url.path_segments_mut()
        .map_err(|()| anyhow!("gateway URL {gateway:?} cannot carry a path"))?
        .pop_if_empty()
        .extend(["metrics", "job", job]);

    Ok(url)
}
