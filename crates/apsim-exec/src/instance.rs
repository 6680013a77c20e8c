use std::process::ExitStatus;
use std::time::SystemTime;

use apsim_model::{InputFile, InstanceInfo, InstanceStatus};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::{
    command::BackendCommand,
    error::{ExecError, ExecResult},
    util::{OutputStream, remove_if_exists, spawn_relay},
};

/// One run of the backend against one input file.
///
/// An instance moves `Created -> Running -> Stopped` exactly once; a new
/// input always needs a new instance. Stopping kills the process and removes
/// the input together with the database files the backend wrote beside it.
///
/// Not thread-safe on its own: the owner serializes access.
#[derive(Debug)]
pub struct ServerInstance {
    input: InputFile,
    backend: BackendCommand,
    status: InstanceStatus,
    child: Option<Child>,
    pid: Option<u32>,
    started_at: Option<SystemTime>,
    relays: Vec<JoinHandle<()>>,
}

impl ServerInstance {
    pub fn new(input: InputFile, backend: BackendCommand) -> Self {
        Self {
            input,
            backend,
            status: InstanceStatus::Created,
            child: None,
            pid: None,
            started_at: None,
            relays: Vec::with_capacity(2),
        }
    }

    pub fn input(&self) -> &InputFile {
        &self.input
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Spawn the backend and start relaying its output.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(level = "debug", skip(self), fields(input = %self.input))]
    pub fn start(&mut self) -> ExecResult<()> {
        if self.status.is_running() || self.status.is_terminal() {
            return Err(ExecError::AlreadyStarted);
        }
        if self.backend.program.trim().is_empty() {
            return Err(ExecError::MissingProgram);
        }

        let mut cmd = self.backend.command_for(self.input.path());
        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            program: self.backend.program.clone(),
            source,
        })?;
        let pid = child.id();

        if let Some(stdout) = child.stdout.take() {
            self.relays
                .push(spawn_relay(stdout, OutputStream::Stdout, pid));
        }
        if let Some(stderr) = child.stderr.take() {
            self.relays
                .push(spawn_relay(stderr, OutputStream::Stderr, pid));
        }

        self.child = Some(child);
        self.pid = pid;
        self.started_at = Some(SystemTime::now());
        self.status = InstanceStatus::Running;

        info!(target: "apsim.exec", program = %self.backend.program, pid, input = %self.input, "backend started");
        Ok(())
    }

    /// Kill the backend and delete the input and its derived artifacts.
    ///
    /// Deletions are independent of each other; a failure is logged and the
    /// remaining files are still attempted.
    #[instrument(level = "debug", skip(self), fields(input = %self.input, pid = ?self.pid))]
    pub async fn stop(&mut self) -> ExecResult<()> {
        match self.status {
            InstanceStatus::Running => {}
            InstanceStatus::Created => return Err(ExecError::NotStarted),
            InstanceStatus::Stopped => return Err(ExecError::AlreadyStopped),
        }

        self.kill_process().await;
        self.status = InstanceStatus::Stopped;

        for path in self.input.owned_paths() {
            match remove_if_exists(&path).await {
                Ok(true) => debug!(target: "apsim.exec", path = %path.display(), "removed"),
                Ok(false) => {}
                Err(e) => {
                    warn!(target: "apsim.exec", path = %path.display(), error = %e, "failed to remove backend file")
                }
            }
        }

        info!(target: "apsim.exec", pid = self.pid, input = %self.input, "backend stopped");
        Ok(())
    }

    /// Kill the backend but leave every file in place.
    ///
    /// Used when the manager itself shuts down so the same input can be
    /// resumed later. The instance ends up `Stopped`.
    pub async fn detach(&mut self) {
        if self.status.is_running() {
            self.kill_process().await;
            info!(target: "apsim.exec", pid = self.pid, input = %self.input, "backend killed, files kept");
        }
        self.status = InstanceStatus::Stopped;
    }

    /// Poll the process without blocking.
    ///
    /// Returns the exit status once the backend has died on its own. The
    /// supervisor never restarts it; callers decide what a dead backend means.
    pub fn has_exited(&mut self) -> Option<ExitStatus> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(status) => status,
            Err(e) => {
                warn!(target: "apsim.exec", pid = self.pid, error = %e, "failed to poll backend");
                None
            }
        }
    }

    /// Snapshot for status reporting.
    pub fn info(&mut self) -> InstanceInfo {
        let alive = self.status.is_running() && self.has_exited().is_none();
        InstanceInfo {
            input_file: self.input.clone(),
            pid: self.pid,
            status: self.status,
            alive,
            started_at: self.started_at,
        }
    }

    async fn kill_process(&mut self) {
        if let Some(mut child) = self.child.take() {
            // `kill` also reaps, so no zombie is left behind.
            if let Err(e) = child.kill().await {
                warn!(target: "apsim.exec", pid = self.pid, error = %e, "kill failed; backend may have exited already");
            }
        }
        for relay in self.relays.drain(..) {
            relay.abort();
        }
    }
}
