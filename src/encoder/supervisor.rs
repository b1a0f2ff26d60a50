//! Encoder process supervisor
//!
//! Owns the external encoder child process and drives its lifecycle:
//!
//! ```text
//!   Idle ──start()──► Running ◄──resume()── Paused
//!    ▲                  │   └────pause()────►  │
//!    │                  │                      │
//!    │              shutdown()             shutdown()
//!    │                  ▼                      │
//!    └──────────── Terminating ◄───────────────┘
//! ```
//!
//! An encoder that exits on its own goes straight back to `Idle`; consumers
//! see that as the end of the sample stream.

use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::watch;
use tokio::time::Instant;

#[cfg(unix)]
use nix::sys::signal::{kill, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

use crate::error::{Error, Result};

use super::config::{EncoderConfig, DEFAULT_SHUTDOWN_TIMEOUT};

/// Lifecycle state of the encoder process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderState {
    /// No process
    Idle,
    /// Process is running and producing output
    Running,
    /// Process is stopped with SIGSTOP
    Paused,
    /// Shutdown in progress
    Terminating,
}

/// Handles returned by [`ProcessSupervisor::start`]
///
/// The holder of `stdout` is responsible for the output pipe; the sample
/// source drops it as soon as the stream ends.
#[derive(Debug)]
pub struct EncoderOutput {
    /// Encoder standard output
    pub stdout: ChildStdout,
    /// When the process was spawned
    pub started_at: Instant,
    /// State updates from the supervisor
    pub state: watch::Receiver<EncoderState>,
}

/// Supervisor for the external encoder process
pub struct ProcessSupervisor {
    child: Option<Child>,
    started_at: Option<Instant>,
    shutdown_timeout: Duration,
    state_tx: watch::Sender<EncoderState>,
}

impl ProcessSupervisor {
    /// Create an idle supervisor with the default shutdown timeout
    pub fn new() -> Self {
        Self::with_shutdown_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Create an idle supervisor with a custom shutdown timeout
    pub fn with_shutdown_timeout(shutdown_timeout: Duration) -> Self {
        let (state_tx, _) = watch::channel(EncoderState::Idle);

        Self {
            child: None,
            started_at: None,
            shutdown_timeout,
            state_tx,
        }
    }

    /// Create an idle supervisor using the timeout from an encoder config
    pub fn from_config(config: &EncoderConfig) -> Self {
        Self::with_shutdown_timeout(config.shutdown_timeout)
    }

    /// Launch the encoder described by `config`
    pub fn spawn(&mut self, config: &EncoderConfig) -> Result<EncoderOutput> {
        tracing::info!(command = %config.command_line(), "Running encoder");
        self.start(&config.program, config.args(), config.verbose)
    }

    /// Launch an encoder process with stdout captured
    ///
    /// Unless `verbose` is set, stderr goes to the null device.
    pub fn start<I, S>(&mut self, program: &str, args: I, verbose: bool) -> Result<EncoderOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        if self.is_running() {
            return Err(Error::AlreadyRunning);
        }

        let stderr = if verbose {
            Stdio::inherit()
        } else {
            Stdio::null()
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Launch {
                program: program.to_string(),
                source,
            })?;

        let started_at = Instant::now();

        let stdout = child.stdout.take().ok_or_else(|| Error::Launch {
            program: program.to_string(),
            source: std::io::Error::other("stdout was not captured"),
        })?;

        tracing::debug!(pid = ?child.id(), program = program, verbose = verbose, "Encoder started");

        self.child = Some(child);
        self.started_at = Some(started_at);
        self.state_tx.send_replace(EncoderState::Running);

        Ok(EncoderOutput {
            stdout,
            started_at,
            state: self.state_tx.subscribe(),
        })
    }

    /// Stop the encoder with SIGSTOP; no-op without a running process
    pub fn pause(&mut self) -> Result<()> {
        if self.state() != EncoderState::Running {
            return Ok(());
        }

        self.deliver(ControlSignal::Stop)?;
        self.state_tx.send_replace(EncoderState::Paused);
        tracing::info!(pid = ?self.pid(), "Encoder paused");
        Ok(())
    }

    /// Continue a paused encoder with SIGCONT; no-op unless paused
    pub fn resume(&mut self) -> Result<()> {
        if self.state() != EncoderState::Paused {
            return Ok(());
        }

        self.deliver(ControlSignal::Continue)?;
        self.state_tx.send_replace(EncoderState::Running);
        tracing::info!(pid = ?self.pid(), "Encoder resumed");
        Ok(())
    }

    /// Terminate the encoder and wait until it is reaped
    ///
    /// Sends SIGTERM, waits up to the shutdown timeout, then SIGKILLs.
    /// Returns the exit status, or `None` if there was no process.
    pub async fn shutdown(&mut self) -> Result<Option<ExitStatus>> {
        let timeout = self.shutdown_timeout;
        let was_paused = self.state() == EncoderState::Paused;

        let Some(child) = self.child.as_mut() else {
            return Ok(None);
        };

        self.state_tx.send_replace(EncoderState::Terminating);
        let result = terminate(child, timeout, was_paused).await;

        // The child stays in `self` until reaped so an aborted shutdown
        // still kills it on drop.
        self.child = None;
        self.started_at = None;
        self.state_tx.send_replace(EncoderState::Idle);

        let status = result?;
        tracing::info!(status = %status, "Encoder stopped");
        Ok(Some(status))
    }

    /// Check whether the encoder is alive, reaping it if it has exited
    pub fn is_running(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };

        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                tracing::warn!(status = %status, "Encoder exited unexpectedly");
                self.child = None;
                self.started_at = None;
                self.state_tx.send_replace(EncoderState::Idle);
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to poll encoder process");
                true
            }
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> EncoderState {
        *self.state_tx.borrow()
    }

    /// OS process id of the running encoder
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// When the running encoder was started
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    fn deliver(&self, signal: ControlSignal) -> Result<()> {
        match self.pid() {
            Some(pid) => signal.send(pid),
            None => Ok(()),
        }
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
enum ControlSignal {
    Stop,
    Continue,
    Terminate,
}

impl ControlSignal {
    #[cfg(unix)]
    fn send(self, pid: u32) -> Result<()> {
        let signal = match self {
            ControlSignal::Stop => Signal::SIGSTOP,
            ControlSignal::Continue => Signal::SIGCONT,
            ControlSignal::Terminate => Signal::SIGTERM,
        };

        kill(Pid::from_raw(pid as i32), signal)?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn send(self, _pid: u32) -> Result<()> {
        match self {
            ControlSignal::Stop => Err(Error::Unsupported("pausing the encoder")),
            ControlSignal::Continue => Err(Error::Unsupported("resuming the encoder")),
            ControlSignal::Terminate => Err(Error::Unsupported("graceful termination")),
        }
    }
}

async fn terminate(child: &mut Child, timeout: Duration, was_paused: bool) -> Result<ExitStatus> {
    if let Some(pid) = child.id() {
        if let Err(e) = ControlSignal::Terminate.send(pid) {
            tracing::debug!(pid = pid, error = %e, "Graceful termination request failed");
        } else if was_paused {
            // A stopped process only acts on SIGTERM once continued
            if let Err(e) = ControlSignal::Continue.send(pid) {
                tracing::debug!(pid = pid, error = %e, "Continue after termination request failed");
            }
        }
    }

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => Ok(status?),
        Err(_) => {
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Encoder termination timeout, killing process"
            );
            child.kill().await?;
            Ok(child.wait().await?)
        }
    }
}
