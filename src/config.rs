use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::export::gateway::job_url;

/// Top-level configuration for the exporter.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Pushgateway job name. Required.
    #[serde(default)]
    pub job: String,

    /// Pushgateway base URL (e.g., "http://pushgateway:9091"). Required.
    #[serde(default)]
    pub gateway: String,

    /// Host label override. Default: the kernel hostname.
    #[serde(default)]
    pub host: Option<String>,

    /// Timeout for each push/delete request. Default: 10s.
    #[serde(default = "default_push_timeout", with = "humantime_serde")]
    pub push_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            job: String::new(),
            gateway: String::new(),
            host: None,
            push_timeout: default_push_timeout(),
        }
    }
}

fn default_push_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub job: Option<String>,
    pub gateway: Option<String>,
    pub host: Option<String>,
    pub push_timeout: Option<Duration>,
}

impl Config {
    /// Load configuration from a YAML file, without validating.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        Ok(cfg)
    }

    /// Build the effective configuration from an optional file plus overrides.
    pub fn resolve(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut cfg = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(job) = overrides.job {
            cfg.job = job;
        }
        if let Some(gateway) = overrides.gateway {
            cfg.gateway = gateway;
        }
        if overrides.host.is_some() {
            cfg.host = overrides.host;
        }
        if let Some(timeout) = overrides.push_timeout {
            cfg.push_timeout = timeout;
        }

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate required fields.
    pub fn validate(&self) -> Result<()> {
        if self.job.trim().is_empty() {
            bail!("job name is required (--job)");
        }

        if self.job.contains('/') {
            bail!("job name must not contain '/': {:?}", self.job);
        }

        if self.gateway.trim().is_empty() {
            bail!("gateway URL is required (--gateway)");
        }

        job_url(&self.gateway, &self.job).context("invalid gateway URL")?;

        if self.push_timeout.is_zero() {
            bail!("push_timeout must be positive");
        }

        Ok(())
    }
}
