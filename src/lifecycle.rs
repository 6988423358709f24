//! Process lifecycle: running, interrupted, finished, and the one-shot
//! deregistration that ends every run.

use std::fmt;
use std::future::Future;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::OnceCell;

/// Lifecycle state of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    Interrupted(ShutdownSignal),
    Finished,
}

/// Signals that trigger graceful shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Hangup,
    Interrupt,
    Terminate,
    Quit,
}

impl ShutdownSignal {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hangup => "SIGHUP",
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Quit => "SIGQUIT",
        }
    }
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the single teardown action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Teardown {
    Deregistered,
    Failed(String),
}

/// Guards the Running -> {Interrupted, Finished} transition and runs the
/// teardown action at most once.
pub struct Lifecycle {
    state: Mutex<LifecycleState>,
    teardown: OnceCell<Teardown>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState::Running),
            teardown: OnceCell::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Move to Interrupted. Returns false if the run already ended.
    pub fn interrupt(&self, signal: ShutdownSignal) -> bool {
        self.transition(LifecycleState::Interrupted(signal))
    }

    /// Move to Finished. Returns false if the run already ended.
    pub fn finish(&self) -> bool {
        self.transition(LifecycleState::Finished)
    }

    fn transition(&self, to: LifecycleState) -> bool {
        let mut state = self.state.lock();
        if *state != LifecycleState::Running {
            return false;
        }
        *state = to;
        true
    }

    /// Run `deregister` unless it already ran; every caller gets the one outcome.
    ///
    /// A failure is captured, never retried.
    pub async fn teardown<F, Fut>(&self, deregister: F) -> Teardown
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.teardown
            .get_or_init(|| async move {
                match deregister().await {
                    Ok(()) => Teardown::Deregistered,
                    Err(e) => Teardown::Failed(format!("{e:#}")),
                }
            })
            .await
            .clone()
    }

    /// Whether the teardown action has already run.
    pub fn torn_down(&self) -> bool {
        self.teardown.initialized()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener for the signals that end a run: SIGHUP, SIGINT, SIGTERM, SIGQUIT.
///
/// Handlers are installed by [`SignalListener::register`], so a failure to
/// install them surfaces at startup rather than at the first signal.
pub struct SignalListener {
    hangup: Signal,
    interrupt: Signal,
    terminate: Signal,
    quit: Signal,
}

impl SignalListener {
    /// Install handlers. Must be called within a tokio runtime.
    pub fn register() -> Result<Self> {
        Ok(Self {
            hangup: signal(SignalKind::hangup()).context("registering SIGHUP handler")?,
            interrupt: signal(SignalKind::interrupt()).context("registering SIGINT handler")?,
            terminate: signal(SignalKind::terminate()).context("registering SIGTERM handler")?,
            quit: signal(SignalKind::quit()).context("registering SIGQUIT handler")?,
        })
    }

    /// Wait for the next shutdown signal.
    pub async fn recv(&mut self) -> ShutdownSignal {
        tokio::select! {
            _ = self.hangup.recv() => ShutdownSignal::Hangup,
            _ = self.interrupt.recv() => ShutdownSignal::Interrupt,
            _ = self.terminate.recv() => ShutdownSignal::Terminate,
            _ = self.quit.recv() => ShutdownSignal::Quit,
        }
    }
}
