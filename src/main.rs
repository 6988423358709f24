use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use tokio::io::BufReader;
use tracing_subscriber::{fmt, EnvFilter};

use vdbench_push::agent::Agent;
use vdbench_push::config::{Config, Overrides};
use vdbench_push::lifecycle::SignalListener;

/// How long runtime shutdown waits for tasks still blocked on stdin.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(200);

/// Tee vdbench output to stdout and push the latest interval report to a
/// Prometheus Pushgateway.
#[derive(Parser)]
#[command(name = "vdbench-push", about)]
struct Cli {
    /// Pushgateway job name.
    #[arg(short, long, env = "VDBENCH_PUSH_JOB")]
    job: Option<String>,

    /// Pushgateway URL (e.g. http://pushgateway:9091).
    #[arg(short, long, env = "VDBENCH_PUSH_GATEWAY")]
    gateway: Option<String>,

    /// Optional YAML configuration file; flags take precedence.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host label value. Defaults to the kernel hostname.
    #[arg(long)]
    host: Option<String>,

    /// Timeout for each push/delete request (e.g. 10s, 500ms).
    #[arg(long, value_parser = parse_duration)]
    push_timeout: Option<Duration>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Build-time version info.
mod version {
    /// Release version string.
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    /// Full version string with platform info.
    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Version) = &cli.command {
        println!("vdbench-push {}", version::full());
        return Ok(());
    }

    // Logs go to stderr; stdout carries the pass-through stream.
    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let overrides = Overrides {
        job: cli.job,
        gateway: cli.gateway,
        host: cli.host,
        push_timeout: cli.push_timeout,
    };

    let cfg = match Config::resolve(cli.config.as_deref(), overrides) {
        Ok(cfg) => cfg,
        Err(e) => Cli::command()
            .error(ErrorKind::MissingRequiredArgument, format!("{e:#}"))
            .exit(),
    };

    tracing::info!(
        version = version::RELEASE,
        commit = version::git_commit(),
        job = %cfg.job,
        gateway = %cfg.gateway,
        "starting vdbench-push",
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    let result = rt.block_on(run(cfg));

    // The reader may still be parked on a stdin read.
    rt.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    result
}

async fn run(cfg: Config) -> Result<()> {
    let mut signals = SignalListener::register()?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        let signal = signals.recv().await;
        let _ = shutdown_tx.send(signal);
    });

    let shutdown = async move {
        match shutdown_rx.await {
            Ok(signal) => signal,
            Err(_) => std::future::pending().await,
        }
    };

    let agent = Agent::new(&cfg)?;
    let report = agent
        .run(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            shutdown,
        )
        .await?;

    tracing::info!(
        state = ?report.state,
        teardown = ?report.teardown,
        "vdbench-push stopped",
    );

    Ok(())
}
